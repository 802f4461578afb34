use std::path::{Path, PathBuf};

use gitvm_types::Receipt;

use crate::config::LedgerConfig;
use crate::error::Result;
use crate::paths::LedgerPaths;
use crate::reader::{self, SliceOptions, SliceResult};
use crate::recovery::{self, ReconcileOutcome};
use crate::traits::{ReceiptReader, ReceiptWriter};
use crate::verify::{self, VerifyOutcome};
use crate::writer;

/// Handle to one ledger directory.
///
/// The handle holds no open files and no cached state; every call goes to
/// disk. Any number of handles, in any number of processes, may point at the
/// same directory. Writers serialize on the directory's lock file.
#[derive(Clone, Debug)]
pub struct Ledger {
    paths: LedgerPaths,
    config: LedgerConfig,
}

impl Ledger {
    /// Handle with the default (fully durable) configuration.
    ///
    /// Nothing is created until the first [`emit`](Self::emit).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(dir, LedgerConfig::default())
    }

    pub fn with_config(dir: impl Into<PathBuf>, config: LedgerConfig) -> Self {
        let dir = dir.into();
        Self {
            paths: LedgerPaths::new(&dir),
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.paths.dir
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Append `receipt` to the chain and publish the new root.
    ///
    /// The integrity fields of `receipt` are overwritten. A zero timestamp is
    /// filled in with the current time; an explicit one may not be earlier
    /// than the previous receipt's.
    pub fn emit(&self, receipt: Receipt) -> Result<Receipt> {
        writer::emit(&self.paths, &self.config, receipt)
    }

    /// Recompute the whole chain and check it against `ROOT.txt`.
    pub fn verify(&self) -> Result<VerifyOutcome> {
        verify::verify(&self.paths)
    }

    /// Repair a root pointer left behind by an interrupted emit.
    ///
    /// Takes the writer lock. Intended for process startup; `emit` performs the
    /// same check on every call.
    pub fn reconcile(&self) -> Result<ReconcileOutcome> {
        recovery::reconcile(&self.paths, &self.config)
    }

    /// The published root, `""` for an empty ledger.
    pub fn get_root(&self) -> Result<String> {
        reader::get_root(&self.paths)
    }

    pub fn read_receipts(&self) -> Result<Vec<Receipt>> {
        reader::read_receipts(&self.paths)
    }

    pub fn read_slice(&self, options: &SliceOptions) -> Result<SliceResult> {
        reader::read_slice(&self.paths, options)
    }

    pub fn recent(&self, n: usize) -> Result<Vec<Receipt>> {
        reader::recent(&self.paths, n)
    }
}

impl ReceiptWriter for Ledger {
    fn emit(&self, receipt: Receipt) -> Result<Receipt> {
        Ledger::emit(self, receipt)
    }
}

impl ReceiptReader for Ledger {
    fn get_root(&self) -> Result<String> {
        Ledger::get_root(self)
    }

    fn read_receipts(&self) -> Result<Vec<Receipt>> {
        Ledger::read_receipts(self)
    }

    fn read_slice(&self, options: &SliceOptions) -> Result<SliceResult> {
        Ledger::read_slice(self, options)
    }

    fn recent(&self, n: usize) -> Result<Vec<Receipt>> {
        Ledger::recent(self, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncMode;
    use gitvm_types::{ActorRef, GitPush, RepoRef};
    use std::sync::Arc;

    fn push() -> Receipt {
        Receipt::new(
            RepoRef::new(1, "acme/widgets"),
            ActorRef::new(2, "octo"),
            GitPush {
                git_ref: "refs/heads/dev".into(),
                before: "0".repeat(40),
                after: "1".repeat(40),
            },
        )
    }

    #[test]
    fn new_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("lazy");
        let ledger = Ledger::new(&target);
        assert_eq!(ledger.dir(), target.as_path());
        assert!(!target.exists());
        assert_eq!(ledger.verify().unwrap(), VerifyOutcome::Empty);
        assert!(!target.exists());
    }

    #[test]
    fn relaxed_sync_mode_still_chains() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::with_config(
            dir.path(),
            LedgerConfig {
                sync_mode: SyncMode::OsDefault,
            },
        );
        assert_eq!(ledger.config().sync_mode, SyncMode::OsDefault);
        ledger.emit(push()).unwrap();
        ledger.emit(push()).unwrap();
        assert!(matches!(
            ledger.verify().unwrap(),
            VerifyOutcome::Verified { receipts: 2, .. }
        ));
    }

    #[test]
    fn usable_through_trait_objects() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::new(dir.path()));
        let writer: Arc<dyn ReceiptWriter> = ledger.clone();
        let reader: Arc<dyn ReceiptReader> = ledger;

        let stored = writer.emit(push()).unwrap();
        assert_eq!(reader.get_root().unwrap(), stored.root);
        assert_eq!(reader.read_receipts().unwrap(), vec![stored.clone()]);
        assert_eq!(reader.recent(1).unwrap(), vec![stored]);
        let slice = reader.read_slice(&SliceOptions::new()).unwrap();
        assert_eq!(slice.lines.len(), 1);
    }
}
