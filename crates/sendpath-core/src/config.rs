//! Configuration system for sendpath.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SENDPATH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/sendpath/config.toml
//!   3. ~/.config/sendpath/config.toml

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::strategy::StrategyKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub zerocopy: ZeroCopyConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen address for the server.
    pub bind_addr: IpAddr,
    /// TCP port the server listens on and the client connects to.
    pub port: u16,
    /// listen(2) backlog.
    pub backlog: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Send path used when none is given on the command line.
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroCopyConfig {
    /// Drain the error queue every N accepted sends. 0 is treated as 1.
    pub drain_interval: u64,
    /// poll(2) timeout for one drain pass.
    pub poll_timeout_ms: u64,
    /// Upper bound on the end-of-session drain.
    pub final_drain_timeout_ms: u64,
    /// If SO_ZEROCOPY cannot be enabled, send without MSG_ZEROCOPY instead
    /// of letting every send fail.
    pub fallback_to_gather: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Append one CSV row per client connection. Unset = no CSV.
    pub csv_path: Option<PathBuf>,
    /// Value written to the Implementation column.
    pub label: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            backlog: 100,
        }
    }
}

impl Default for ZeroCopyConfig {
    fn default() -> Self {
        Self {
            drain_interval: 100,
            poll_timeout_ms: 1,
            final_drain_timeout_ms: 100,
            fallback_to_gather: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            label: "sendpath".to_string(),
        }
    }
}

impl ZeroCopyConfig {
    pub fn drain_interval(&self) -> u64 {
        self.drain_interval.max(1)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn final_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.final_drain_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("sendpath")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BenchConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path(), |key| std::env::var(key).ok())
    }

    /// Load from an explicit file, with `var` as the environment.
    pub fn load_from(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            BenchConfig::default()
        };
        config.apply_env_overrides(var);
        Ok(config)
    }

    /// [`load`](Self::load), but a file that cannot be read or parsed is
    /// logged and replaced by defaults. Both binaries start this way.
    pub fn load_or_default() -> Self {
        Self::or_default(Self::load())
    }

    fn or_default(loaded: Result<Self, ConfigError>) -> Self {
        loaded.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            BenchConfig::default()
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SENDPATH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply SENDPATH_* overrides. Values that fail to parse are ignored
    /// with a warning.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("SENDPATH_NETWORK__BIND_ADDR") {
            match v.parse() {
                Ok(addr) => self.network.bind_addr = addr,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid SENDPATH_NETWORK__BIND_ADDR"),
            }
        }
        if let Some(v) = var("SENDPATH_NETWORK__PORT") {
            match v.parse() {
                Ok(p) => self.network.port = p,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid SENDPATH_NETWORK__PORT"),
            }
        }
        if let Some(v) = var("SENDPATH_SERVER__STRATEGY") {
            match v.parse() {
                Ok(s) => self.server.strategy = s,
                Err(e) => tracing::warn!(error = %e, "ignoring SENDPATH_SERVER__STRATEGY"),
            }
        }
        if let Some(v) = var("SENDPATH_ZEROCOPY__DRAIN_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.zerocopy.drain_interval = n;
            }
        }
        if let Some(v) = var("SENDPATH_ZEROCOPY__FALLBACK_TO_GATHER") {
            self.zerocopy.fallback_to_gather = v == "true" || v == "1";
        }
        if let Some(v) = var("SENDPATH_REPORT__CSV_PATH") {
            self.report.csv_path = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = var("SENDPATH_REPORT__LABEL") {
            self.report.label = v;
        }
    }
}
