use thiserror::Error;

/// Everything that can go wrong while wiring up a tracker
///
/// Refresh failures are deliberately absent: the scheduler swallows them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown host event: {0}")]
    ParseEvent(String),

    #[error("No tokio runtime available to schedule refreshes on")]
    NoRuntime,

    #[error("Tracker stopped listening, dropped event: {0}")]
    TrackerStopped(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}
