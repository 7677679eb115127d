// Composition root: owns the state, the scheduler and the wiring between them
use crate::config::RefreshConfig;
use crate::models::{HostEvent, StatusSnapshot};
use crate::scheduler::{RefreshAction, RefreshScheduler};
use crate::source::{ReachabilityProbe, SignalSender};
use crate::status::StatusHolder;
use crate::watcher::TransitionWatcher;
use crate::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Tracks connectivity and lifecycle, refreshing when either turns favorable
///
/// One per application. Build it once at startup and feed it host events.
pub struct Tracker {
    status: StatusHolder,
    scheduler: RefreshScheduler,
    ready: bool,
}

impl Tracker {
    /// Probe, seed, then subscribe. The seed lands before any subscriber
    /// exists, so starting up never triggers a refresh on its own.
    pub fn new<P>(config: &RefreshConfig, probe: &P, action: Arc<dyn RefreshAction>) -> Result<Self>
    where
        P: ReachabilityProbe + ?Sized,
    {
        let initial_online = match probe.probe() {
            Ok(online) => {
                debug!("startup probe says online={}", online);
                Some(online)
            }
            Err(e) => {
                warn!("startup reachability probe failed, connectivity unknown: {:#}", e);
                None
            }
        };

        let mut status = StatusHolder::new(initial_online);
        let scheduler = RefreshScheduler::new(config.delay(), config.policy, action)?;
        TransitionWatcher::attach(&mut status, scheduler.clone());

        info!(
            "tracker started (online={:?}, delay={:?}, policy={})",
            initial_online,
            scheduler.delay(),
            scheduler.policy()
        );

        Ok(Self {
            status,
            scheduler,
            ready: false,
        })
    }

    /// Host-side sender plus the receiver to hand to `run`
    pub fn channel(capacity: usize) -> (SignalSender, mpsc::Receiver<HostEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (SignalSender::new(tx), rx)
    }

    /// Apply one host event. Returns whether tracked state changed.
    ///
    /// Connectivity and lifecycle events that arrive before `Ready` are
    /// dropped, since nothing is listening for them yet.
    pub fn handle(&mut self, event: HostEvent) -> bool {
        if event.needs_ready() && !self.ready {
            debug!("host not ready, ignoring {}", event);
            return false;
        }

        match event {
            HostEvent::Ready => {
                if self.ready {
                    debug!("duplicate ready event ignored");
                } else {
                    info!("host ready, listening for connectivity and lifecycle events");
                    self.ready = true;
                }
                false
            }
            HostEvent::NetworkAvailable => self.status.set_online(true),
            HostEvent::NetworkUnavailable => self.status.set_online(false),
            HostEvent::EnteredForeground => self.status.set_foreground(true),
            HostEvent::EnteredBackground => self.status.set_foreground(false),
        }
    }

    /// Apply events in arrival order until every sender is gone
    pub async fn run(&mut self, mut events: mpsc::Receiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!("event source closed");
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }
}
