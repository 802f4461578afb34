//! Reconciliation of `ROOT.txt` against the log tail.
//!
//! A writer that crashes after appending to `receipts.jsonl` but before the
//! `ROOT.txt` rename leaves one receipt whose root was never published. That
//! state is recognisable: the tail receipt chains from the published root. In
//! that case the root is republished. Anything else is divergence and is
//! surfaced, never papered over.

use gitvm_crypto::{fold, receipt_hash};
use serde::Serialize;
use tracing::{debug, warn};

use crate::atomic::write_atomic;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::lock::LedgerLock;
use crate::paths::LedgerPaths;
use crate::reader::read_root_file;
use crate::tail::{read_tail, Tail};

/// What a reconciliation pass found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No receipts and no published root.
    Empty,
    /// `ROOT.txt` already matched the log tail.
    Consistent { root: String },
    /// The tail receipt's root was published after an interrupted append.
    Republished { previous: String, root: String },
}

impl ReconcileOutcome {
    /// The root that is current after reconciliation (`""` for an empty ledger).
    pub fn root(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Consistent { root } | Self::Republished { root, .. } => root,
        }
    }
}

/// Take the writer lock and reconcile.
pub(crate) fn reconcile(paths: &LedgerPaths, config: &LedgerConfig) -> Result<ReconcileOutcome> {
    if !paths.dir.exists() {
        return Ok(ReconcileOutcome::Empty);
    }
    let _lock = LedgerLock::acquire(&paths.lock)?;
    let tail = read_tail(&paths.log)?;
    reconcile_locked(paths, config, tail.as_ref())
}

/// Reconcile with the writer lock already held by the caller.
pub(crate) fn reconcile_locked(
    paths: &LedgerPaths,
    config: &LedgerConfig,
    tail: Option<&Tail>,
) -> Result<ReconcileOutcome> {
    let published = read_root_file(&paths.root)?;

    let Some(tail) = tail else {
        return match published {
            None => Ok(ReconcileOutcome::Empty),
            Some(root) if root.is_empty() => Ok(ReconcileOutcome::Empty),
            Some(root) => Err(LedgerError::RootDiverged {
                published: root,
                tail_root: String::new(),
            }),
        };
    };

    let published = published.unwrap_or_default();
    let receipt = &tail.receipt;
    if receipt.root == published {
        debug!(root = %published, "root pointer consistent with log tail");
        return Ok(ReconcileOutcome::Consistent { root: published });
    }

    let hash = receipt_hash(receipt);
    let chains_from_published = receipt.prev_root == published
        && receipt.receipt_hash == hash
        && receipt.root == fold(&published, &hash);
    if !chains_from_published {
        return Err(LedgerError::RootDiverged {
            published,
            tail_root: receipt.root.clone(),
        });
    }

    write_atomic(
        &paths.root,
        format!("{}\n", receipt.root).as_bytes(),
        config.fsync(),
    )?;
    warn!(
        previous = %published,
        root = %receipt.root,
        offset = tail.offset,
        "republished root for receipt appended before an interrupted root update"
    );
    Ok(ReconcileOutcome::Republished {
        previous: published,
        root: receipt.root.clone(),
    })
}
