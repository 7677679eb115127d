// What "refresh" means when running from the terminal
use reachwatch_core::RefreshAction;
use tracing::debug;

/// Prints `<timestamp> refresh` on stdout
pub struct PrintAction;

#[async_trait::async_trait]
impl RefreshAction for PrintAction {
    async fn refresh(&self) -> anyhow::Result<()> {
        println!("{} refresh", chrono::Utc::now().to_rfc3339());
        Ok(())
    }
}

/// Runs a shell command; a non-zero exit counts as a failed refresh
pub struct CommandAction {
    command: String,
}

impl CommandAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait::async_trait]
impl RefreshAction for CommandAction {
    async fn refresh(&self) -> anyhow::Result<()> {
        debug!("running refresh command: {}", self.command);
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .status()
            .await?;

        if !status.success() {
            anyhow::bail!("`{}` exited with {}", self.command, status);
        }
        Ok(())
    }
}
