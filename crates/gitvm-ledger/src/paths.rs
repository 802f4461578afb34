use std::path::{Path, PathBuf};

pub(crate) const LOG_FILE: &str = "receipts.jsonl";
pub(crate) const ROOT_FILE: &str = "ROOT.txt";
pub(crate) const LOCK_FILE: &str = "ledger.lock";

/// File locations inside one ledger directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LedgerPaths {
    pub dir: PathBuf,
    pub log: PathBuf,
    pub root: PathBuf,
    pub lock: PathBuf,
}

impl LedgerPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            log: dir.join(LOG_FILE),
            root: dir.join(ROOT_FILE),
            lock: dir.join(LOCK_FILE),
        }
    }
}
