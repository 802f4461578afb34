use std::io;
use std::path::{Path, PathBuf};

use gitvm_crypto::ChainIntegrityError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Filesystem failure, with the operation and path that hit it.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The exclusive writer lock could not be taken. Nothing was written.
    #[error("failed to lock ledger {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed record at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("chain integrity violation: {0}")]
    Integrity(#[from] ChainIntegrityError),

    #[error("cursor {cursor} is beyond the end of the log ({file_size} bytes)")]
    CursorOutOfRange { cursor: u64, file_size: u64 },

    #[error("timestamp {ts_unix_ms} is earlier than the last receipt ({last_ts_unix_ms})")]
    NonMonotonicTimestamp {
        ts_unix_ms: i64,
        last_ts_unix_ms: i64,
    },

    /// The log does not end in a newline: a write was interrupted.
    #[error("log tail is torn: {file_size} byte log does not end with a newline")]
    TornTail { file_size: u64 },

    /// `ROOT.txt` and the log tail disagree in a way reconciliation cannot repair.
    #[error("root pointer {published:?} does not match log tail root {tail_root:?}")]
    RootDiverged { published: String, tail_root: String },
}

impl LedgerError {
    /// Returns `true` for failures that mean corruption or tampering.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Integrity(_) | Self::RootDiverged { .. } | Self::TornTail { .. }
        )
    }
}

/// Convenience alias used throughout the ledger crate.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Build a `map_err` adapter that tags an `io::Error` with its operation and path.
pub(crate) fn io_err(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> LedgerError {
    let path = path.to_path_buf();
    move |source| LedgerError::Io { op, path, source }
}
