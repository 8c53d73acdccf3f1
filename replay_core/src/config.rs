//! Inspector configuration.
//!
//! Loaded from JSON, with `INSPECTOR_CONFIG_PATH` overriding the builtin copy.

use std::{
    env, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use telemetry_proto::Side;
use thiserror::Error;

use crate::aggregate::BoardSize;

pub const BUILTIN_INSPECTOR_CONFIG: &str = include_str!("data/inspector_config.json");
pub const CONFIG_PATH_ENV: &str = "INSPECTOR_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub board: BoardSize,
    /// Number of tracked entities per side; toggles outside this range are ignored.
    pub entity_count: usize,
    pub gateway: GatewayConfig,
    pub replay: ReplayConfig,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            board: BoardSize::default(),
            entity_count: 16,
            gateway: GatewayConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

/// Live ingestion settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    /// Hold each reply until the operator acknowledges (bounded by `ack_timeout_ms`).
    pub synchronous_ack: bool,
    /// Minimum wait before replying when `synchronous_ack` is off.
    pub reply_delay_ms: u64,
    pub ack_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8088),
            synchronous_ack: false,
            reply_delay_ms: 250,
            ack_timeout_ms: 30_000,
        }
    }
}

impl GatewayConfig {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Replay navigation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub key_repeat_interval_ms: u64,
    /// A held key with no press/repeat event for this long counts as released.
    pub key_release_grace_ms: u64,
    pub tracker_side: Side,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            key_repeat_interval_ms: 100,
            key_release_grace_ms: 150,
            tracker_side: Side::Blue,
        }
    }
}

impl ReplayConfig {
    pub fn key_repeat_interval(&self) -> Duration {
        Duration::from_millis(self.key_repeat_interval_ms)
    }

    pub fn key_release_grace(&self) -> Duration {
        Duration::from_millis(self.key_release_grace_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse inspector config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read inspector config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InspectorConfig {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json_str(BUILTIN_INSPECTOR_CONFIG)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        InspectorConfig::from_json_str(&contents)
    }
}

/// Resolve configuration: explicit path, then `INSPECTOR_CONFIG_PATH`, then
/// the builtin copy. A file that fails to load is logged and skipped.
pub fn load_inspector_config(explicit: Option<&Path>) -> InspectorConfig {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

    if let Some(path) = candidate {
        match InspectorConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "match_inspector::config",
                    path = %path.display(),
                    "inspector_config.loaded=file"
                );
                return config;
            }
            Err(err) => {
                tracing::warn!(
                    target: "match_inspector::config",
                    path = %path.display(),
                    error = %err,
                    "inspector_config.load_failed"
                );
            }
        }
    }

    match InspectorConfig::builtin() {
        Ok(config) => {
            tracing::info!(
                target: "match_inspector::config",
                "inspector_config.loaded=builtin"
            );
            config
        }
        Err(err) => {
            tracing::error!(
                target: "match_inspector::config",
                error = %err,
                "inspector_config.builtin_invalid=using_defaults"
            );
            InspectorConfig::default()
        }
    }
}

/// Shorthand for [`load_inspector_config`] with no explicit path.
pub fn load_inspector_config_from_env() -> InspectorConfig {
    load_inspector_config(None)
}
