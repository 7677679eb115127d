use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Events reported by the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEvent {
    /// Host finished booting; listeners may be registered from here on
    Ready,
    NetworkAvailable,
    NetworkUnavailable,
    EnteredForeground,
    EnteredBackground,
}

impl HostEvent {
    /// Connectivity and lifecycle events are only observed after `Ready`
    pub fn needs_ready(&self) -> bool {
        !matches!(self, HostEvent::Ready)
    }
}

impl FromStr for HostEvent {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ready" | "deviceready" => Ok(HostEvent::Ready),
            "online" => Ok(HostEvent::NetworkAvailable),
            "offline" => Ok(HostEvent::NetworkUnavailable),
            "resume" | "foreground" => Ok(HostEvent::EnteredForeground),
            "pause" | "background" => Ok(HostEvent::EnteredBackground),
            other => Err(crate::Error::ParseEvent(other.to_string())),
        }
    }
}

impl std::fmt::Display for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostEvent::Ready => write!(f, "ready"),
            HostEvent::NetworkAvailable => write!(f, "online"),
            HostEvent::NetworkUnavailable => write!(f, "offline"),
            HostEvent::EnteredForeground => write!(f, "resume"),
            HostEvent::EnteredBackground => write!(f, "pause"),
        }
    }
}

/// Which tracked field produced a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Connectivity,
    Lifecycle,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Connectivity => write!(f, "connectivity"),
            Trigger::Lifecycle => write!(f, "lifecycle"),
        }
    }
}

/// A pure "go fetch fresh data" signal. Carries nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshRequest;

/// Point-in-time copy of the tracked state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// `None` until connectivity has been observed at least once
    pub online: Option<bool>,
    pub foreground: bool,
}
