use crate::scheduler::RefreshPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
///
/// Loaded from an explicit path or the per-user config dir.
/// Priority: CLI flags > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // No config file? Use defaults
            Ok(Self::default())
        }
    }

    /// Load config from an explicit path. Unlike `load`, a missing file is an error.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.refresh.delay_ms == 0 {
            return Err(crate::Error::ConfigError(
                "refresh.delay_ms must be greater than zero".into(),
            ));
        }
        if self.probe.timeout_ms == 0 {
            return Err(crate::Error::ConfigError(
                "probe.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Get the config file path
    /// Uses XDG on Linux/macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("reachwatch");

        Ok(config_dir.join("config.toml"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshConfig {
    /// Delay between a qualifying transition and the refresh, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// How overlapping requests are handled
    #[serde(default)]
    pub policy: RefreshPolicy,
}

impl RefreshConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            policy: RefreshPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// host:port to connect to for the startup reachability probe.
    /// Unset means the probe is unavailable and `online` starts unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_probe_timeout() -> u64 {
    1000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            address: None,
            timeout_ms: default_probe_timeout(),
        }
    }
}
