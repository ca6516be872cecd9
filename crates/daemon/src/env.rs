// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: TOML file plus environment overrides.
//!
//! The master encryption key is read by the vault (`SENTRA_MASTER_KEY` /
//! `SENTRA_KEY_SEED`), not here.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Environment override for the HTTP bind address.
pub const HTTP_ADDR_ENV: &str = "SENTRA_HTTP_ADDR";
/// Environment override for the state directory.
pub const STATE_DIR_ENV: &str = "SENTRA_STATE_DIR";

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("cannot read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("cannot parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("invalid {HTTP_ADDR_ENV}: {0}")]
    BadAddr(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP bind address for agent endpoints, webhooks, and the realtime
    /// WebSocket.
    pub http_addr: SocketAddr,
    /// Reject unknown connector-config fields instead of logging them.
    pub strict_config: bool,
    /// Worker count for the normalization queue.
    pub queue_workers: usize,
    /// State directory for daemon-local files (logs, dev store dumps).
    pub state_dir: PathBuf,
    /// Lifecycle sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8787)),
            strict_config: false,
            queue_workers: sentra_queue::DEFAULT_WORKERS,
            state_dir: default_state_dir(),
            sweep_interval_secs: 60,
        }
    }
}

impl DaemonConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&PathBuf>) -> Result<Self, EnvError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| EnvError::Read(path.clone(), e))?;
                toml::from_str(&text).map_err(|e| EnvError::Parse(path.clone(), e))?
            }
            None => Self::default(),
        };

        if let Ok(addr) = std::env::var(HTTP_ADDR_ENV) {
            config.http_addr = addr.parse().map_err(|_| EnvError::BadAddr(addr))?;
        }
        if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
            config.state_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn parse_mode(&self) -> sentra_core::Parse {
        if self.strict_config {
            sentra_core::Parse::Strict
        } else {
            sentra_core::Parse::Lenient
        }
    }
}

/// `~/.local/state/sentra` (or `$XDG_STATE_HOME/sentra`).
fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sentra")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
