use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CallCenterError, Result};

/// Call center configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallCenterConfig {
    /// Operator pool settings
    pub dispatcher: DispatcherConfig,

    /// Session server settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LogConfig,
}

/// Operator pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Requested number of operators
    pub operators: usize,

    /// Largest pool that may be requested
    pub max_operators: usize,

    /// Pool size used when the request exceeds `max_operators`
    pub fallback_operators: usize,
}

/// Session server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,

    /// Send updates to every connected session, not only the originator
    pub broadcast_updates: bool,

    /// Close sessions that send nothing for this many seconds
    pub idle_timeout_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines
    pub json: bool,

    /// Include file and line information
    pub file_info: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            operators: 10,
            max_operators: 26,
            fallback_operators: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5678)),
            broadcast_updates: true,
            idle_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}

impl CallCenterConfig {
    /// Reject settings the dispatcher and server cannot run with
    pub fn validate(&self) -> Result<()> {
        let d = &self.dispatcher;
        if d.fallback_operators > d.max_operators {
            return Err(CallCenterError::config(format!(
                "fallback_operators ({}) exceeds max_operators ({})",
                d.fallback_operators, d.max_operators
            )));
        }
        if self.server.idle_timeout_secs == Some(0) {
            return Err(CallCenterError::config("idle_timeout_secs must be positive"));
        }
        Ok(())
    }
}
