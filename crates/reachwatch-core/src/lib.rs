// Connectivity + lifecycle tracking that kicks off a refresh when things look up
pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod source;
pub mod status;
pub mod tracker;
pub mod watcher;

pub use config::{Config, ProbeConfig, RefreshConfig};
pub use error::Error;
pub use models::{HostEvent, RefreshRequest, StatusSnapshot, Trigger};
pub use scheduler::{FnAction, RefreshAction, RefreshPolicy, RefreshScheduler};
pub use source::{NoProbe, ReachabilityProbe, SignalSender};
pub use status::{Observable, StatusHolder};
pub use tracker::Tracker;
pub use watcher::TransitionWatcher;

/// Result type alias so signatures stay short
pub type Result<T> = std::result::Result<T, Error>;
