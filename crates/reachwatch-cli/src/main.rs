mod actions;
mod input;
mod probe;

use actions::{CommandAction, PrintAction};
use clap::Parser;
use probe::{FixedProbe, TcpProbe};
use reachwatch_core::{
    Config, HostEvent, NoProbe, ReachabilityProbe, RefreshAction, RefreshPolicy, Tracker,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reachwatch")]
#[command(version, about = "Refresh when the network comes back or the app returns to the foreground", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/reachwatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Read host events from stdin, one per line, and refresh on favorable transitions
    Run {
        /// Delay between a transition and the refresh
        #[arg(long)]
        delay_ms: Option<u64>,

        /// independent or per-trigger
        #[arg(long)]
        policy: Option<RefreshPolicy>,

        /// Skip the probe and start from this connectivity state
        #[arg(long, value_enum)]
        initial: Option<Initial>,

        /// Shell command to run on refresh instead of printing a line
        #[arg(long)]
        exec: Option<String>,
    },
    /// Print the effective configuration
    Config,
    /// Check that event names parse
    Parse {
        /// e.g. ready online offline resume pause
        events: Vec<String>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Initial {
    Online,
    Offline,
    Unknown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries refresh lines and status, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reachwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            delay_ms,
            policy,
            initial,
            exec,
        }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(delay_ms) = delay_ms {
                config.refresh.delay_ms = delay_ms;
            }
            if let Some(policy) = policy {
                config.refresh.policy = policy;
            }
            config.validate()?;

            run(config, initial, exec).await?;
        }
        Some(Commands::Config) => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
        }
        Some(Commands::Parse { events }) => {
            for raw in events {
                match raw.parse::<HostEvent>() {
                    Ok(event) => println!("{} -> {:?}", raw, event),
                    Err(e) => println!("{} -> error: {}", raw, e),
                }
            }
        }
        None => {
            println!("No command specified. Try --help");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn startup_probe(config: &Config, initial: Option<Initial>) -> Box<dyn ReachabilityProbe> {
    match initial {
        Some(Initial::Online) => Box::new(FixedProbe(true)),
        Some(Initial::Offline) => Box::new(FixedProbe(false)),
        Some(Initial::Unknown) => Box::new(NoProbe),
        None => match &config.probe.address {
            Some(address) => Box::new(TcpProbe::new(address.clone(), config.probe.timeout())),
            None => Box::new(NoProbe),
        },
    }
}

async fn run(config: Config, initial: Option<Initial>, exec: Option<String>) -> anyhow::Result<()> {
    let action: Arc<dyn RefreshAction> = match exec {
        Some(command) => Arc::new(CommandAction::new(command)),
        None => Arc::new(PrintAction),
    };

    let probe = startup_probe(&config, initial);
    let mut tracker = build_tracker(&config, probe.as_ref(), action)?;

    let outcome = drive(&mut tracker, tokio::io::BufReader::new(tokio::io::stdin())).await;
    println!("{}", serde_json::to_string(&tracker.status())?);

    let forwarded = outcome?;
    tracing::info!("forwarded {} events", forwarded);
    Ok(())
}

/// The TCP probe resolves and connects synchronously, so keep it off the
/// async workers. Needs the multi-thread runtime.
fn build_tracker(
    config: &Config,
    probe: &dyn ReachabilityProbe,
    action: Arc<dyn RefreshAction>,
) -> anyhow::Result<Tracker> {
    let tracker =
        tokio::task::block_in_place(|| Tracker::new(&config.refresh, probe, action))?;
    Ok(tracker)
}

/// Feed `source` to the tracker until it ends, then wait for pending refreshes.
/// Refreshes already scheduled still run when reading fails; the read error
/// is returned afterwards.
async fn drive<R>(tracker: &mut Tracker, source: R) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (sender, events) = Tracker::channel(64);
    let reader = tokio::spawn(input::forward_lines(source, sender));

    tracker.run(events).await;
    let read = reader.await;

    tracing::info!("input closed, waiting for pending refreshes");
    tracker.scheduler().settle().await;

    read?
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachwatch_core::{FnAction, RefreshConfig};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

    /// Errors on every read, like a terminal that went away
    struct BrokenInput;

    impl AsyncRead for BrokenInput {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, "input gone")))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_build_tracker_runs_blocking_probe() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = Config::default();
        config.probe.address = Some(listener.local_addr().unwrap().to_string());

        let probe = startup_probe(&config, None);
        let action = Arc::new(FnAction(|| -> anyhow::Result<()> { Ok(()) }));
        let tracker = build_tracker(&config, probe.as_ref(), action).unwrap();

        assert_eq!(tracker.status().online, Some(true));
        assert_eq!(tracker.scheduler().scheduled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_refresh_survives_read_error() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let action = Arc::new(FnAction(move || -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let mut tracker =
            Tracker::new(&RefreshConfig::default(), &FixedProbe(false), action).unwrap();

        let input = tokio::io::BufReader::new((&b"ready\nonline\n"[..]).chain(BrokenInput));
        let result = drive(&mut tracker, input).await;

        assert!(result.is_err());
        assert_eq!(tracker.status().online, Some(true));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
