//! Trust-nothing verification of a ledger directory.
//!
//! Every stored hash is recomputed from canonical bytes; nothing in the log is
//! taken at face value. Verification takes no lock. The scan is bounded by the
//! log size observed on entry, so receipts appended during the scan are not
//! read. `ROOT.txt` is read after the scan, and an `emit` that publishes in
//! between makes it disagree with the scanned chain. Run against a quiet
//! ledger, or treat `RootPointerMismatch` from a live one as "retry".

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use gitvm_crypto::{ChainIntegrityError, ChainVerifier};
use gitvm_types::Receipt;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{io_err, LedgerError, Result};
use crate::paths::LedgerPaths;
use crate::reader::read_root_file;

/// Result of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// No receipts and no published root.
    Empty,
    /// Every link and the root pointer checked out.
    Verified { receipts: u64, root: String },
}

/// Verify the ledger in `dir` from genesis.
pub fn verify_ledger(dir: &Path) -> Result<VerifyOutcome> {
    verify(&LedgerPaths::new(dir))
}

pub(crate) fn verify(paths: &LedgerPaths) -> Result<VerifyOutcome> {
    let (count, root) = match File::open(&paths.log) {
        Ok(file) => {
            let file_size = file.metadata().map_err(io_err("stat", &paths.log))?.len();
            walk_chain(BufReader::new(file.take(file_size)), &paths.log)?
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => (0, String::new()),
        Err(e) => return Err(io_err("open", &paths.log)(e)),
    };
    check_root_pointer(paths, count, root)
}

/// Compare the scanned chain with `ROOT.txt`.
fn check_root_pointer(paths: &LedgerPaths, count: u64, root: String) -> Result<VerifyOutcome> {
    match read_root_file(&paths.root)? {
        None if count > 0 => {
            return Err(ChainIntegrityError::RootPointerMissing { expected: root }.into())
        }
        Some(published) if published != root => {
            return Err(ChainIntegrityError::RootPointerMismatch {
                expected: root,
                actual: published,
            }
            .into())
        }
        _ => {}
    }

    if count == 0 {
        return Ok(VerifyOutcome::Empty);
    }
    info!(receipts = count, root = %root, "ledger verified");
    Ok(VerifyOutcome::Verified {
        receipts: count,
        root,
    })
}

/// Check every link in order. Returns the receipt count and the final root.
fn walk_chain<R: BufRead>(mut reader: R, path: &Path) -> Result<(u64, String)> {
    let mut prev_root = String::new();
    let mut count = 0u64;
    let mut offset = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(io_err("read", path))?;
        if n == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            return Err(LedgerError::TornTail {
                file_size: offset + n as u64,
            });
        }

        let receipt: Receipt =
            serde_json::from_slice(&buf[..n - 1]).map_err(|e| LedgerError::MalformedRecord {
                offset,
                reason: e.to_string(),
            })?;
        count += 1;
        prev_root = ChainVerifier::check_link(count, &prev_root, &receipt).map_err(|e| {
            warn!(index = count, offset, error = %e, "chain verification failed");
            e
        })?;
        offset += n as u64;
    }
    Ok((count, prev_root))
}
