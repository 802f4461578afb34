use serde::{Deserialize, Serialize};

/// Flush/sync strategy for log appends and root publication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` the log after every append and the root temp file before rename.
    #[default]
    EveryWrite,
    /// Flush to the OS and rely on its page cache.
    OsDefault,
}

/// Configuration carried by a [`Ledger`](crate::Ledger) handle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub sync_mode: SyncMode,
}

impl LedgerConfig {
    pub(crate) fn fsync(&self) -> bool {
        matches!(self.sync_mode, SyncMode::EveryWrite)
    }
}
