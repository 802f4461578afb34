use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use gitvm_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server settings, loadable from TOML. Every key is optional.
///
/// ```toml
/// bind_addr = "0.0.0.0:7420"
/// ledger_dir = "/var/lib/gitvm/ledger"
/// recent_max = 200
///
/// [ledger]
/// sync_mode = "every_write"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub ledger_dir: PathBuf,
    /// Receipts returned by `/v1/ledger/receipts` when no `limit` is given.
    pub recent_default: usize,
    /// Hard cap on `/v1/ledger/receipts?limit=`.
    pub recent_max: usize,
    /// Lines returned by `/v1/ledger/stream` when no `limit` is given.
    pub stream_default_limit: usize,
    /// Hard cap on `/v1/ledger/stream?limit=`.
    pub stream_max_limit: usize,
    pub ledger: LedgerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 7420)),
            ledger_dir: PathBuf::from("ledger"),
            recent_default: 50,
            recent_max: 500,
            stream_default_limit: 100,
            stream_max_limit: 1000,
            ledger: LedgerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults must sit inside their caps, and caps must allow at least one item.
    pub fn validate(&self) -> ServerResult<()> {
        if self.recent_max == 0 || self.stream_max_limit == 0 {
            return Err(ServerError::Config("limits must be at least 1".into()));
        }
        if self.recent_default > self.recent_max {
            return Err(ServerError::Config(format!(
                "recent_default ({}) exceeds recent_max ({})",
                self.recent_default, self.recent_max
            )));
        }
        if self.stream_default_limit > self.stream_max_limit {
            return Err(ServerError::Config(format!(
                "stream_default_limit ({}) exceeds stream_max_limit ({})",
                self.stream_default_limit, self.stream_max_limit
            )));
        }
        Ok(())
    }

    pub(crate) fn clamp_recent(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.recent_default)
            .min(self.recent_max)
    }

    pub(crate) fn clamp_stream(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.stream_default_limit)
            .min(self.stream_max_limit)
    }
}
