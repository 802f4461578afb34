//! The append path.
//!
//! Everything between "read current root" and "publish new root" runs under
//! the exclusive [`LedgerLock`], which gives all writers on one filesystem a
//! strict total order.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use gitvm_crypto::seal;
use gitvm_types::Receipt;
use tracing::{debug, warn};

use crate::atomic::write_atomic;
use crate::config::LedgerConfig;
use crate::error::{io_err, LedgerError, Result};
use crate::lock::LedgerLock;
use crate::paths::LedgerPaths;
use crate::recovery::reconcile_locked;
use crate::tail::read_tail;

/// Append one receipt and publish the new root.
///
/// `version`, `prev_root`, `receipt_hash` and `root` are always recomputed. A
/// zero `ts_unix_ms` is replaced by the current time (never earlier than the
/// previous receipt); a caller-supplied timestamp earlier than the previous
/// receipt is rejected.
pub(crate) fn emit(
    paths: &LedgerPaths,
    config: &LedgerConfig,
    mut receipt: Receipt,
) -> Result<Receipt> {
    fs::create_dir_all(&paths.dir).map_err(io_err("create ledger directory", &paths.dir))?;

    let _lock = LedgerLock::acquire(&paths.lock)?;

    let tail = read_tail(&paths.log)?;
    let prev_root = reconcile_locked(paths, config, tail.as_ref())?
        .root()
        .to_string();

    let last_ts = tail.as_ref().map(|t| t.receipt.ts_unix_ms);
    if receipt.ts_unix_ms == 0 {
        receipt.ts_unix_ms = now_unix_ms().max(last_ts.unwrap_or(0));
    } else if let Some(last_ts) = last_ts.filter(|&last| receipt.ts_unix_ms < last) {
        return Err(LedgerError::NonMonotonicTimestamp {
            ts_unix_ms: receipt.ts_unix_ms,
            last_ts_unix_ms: last_ts,
        });
    }

    seal(&mut receipt, &prev_root);

    let mut line =
        serde_json::to_vec(&receipt).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    line.push(b'\n');

    append_line(paths, config, &line)?;
    write_atomic(
        &paths.root,
        format!("{}\n", receipt.root).as_bytes(),
        config.fsync(),
    )?;

    debug!(
        event_type = receipt.event_type(),
        repo = %receipt.repo.full,
        root = %receipt.root,
        bytes = line.len(),
        "receipt appended"
    );
    Ok(receipt)
}

/// Append one newline-terminated record in a single write.
fn append_line(paths: &LedgerPaths, config: &LedgerConfig, line: &[u8]) -> Result<()> {
    let fsync = config.fsync();
    append_with(paths, line, |file| {
        if fsync {
            file.sync_data()
        } else {
            file.flush()
        }
    })
}

/// If the write fails part-way the log is cut back to its previous length, so
/// a failed emit never leaves a torn record behind. Once the whole record is
/// in the file it stays: a failed `persist` may still have made it durable,
/// and the next emit reconciles the root it chains to.
fn append_with<F>(paths: &LedgerPaths, line: &[u8], persist: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log)
        .map_err(io_err("open", &paths.log))?;
    let start = file
        .metadata()
        .map_err(io_err("stat", &paths.log))?
        .len();

    if let Err(e) = file.write_all(line) {
        if let Err(rollback) = file.set_len(start) {
            warn!(
                path = %paths.log.display(),
                offset = start,
                error = %rollback,
                "failed to roll back partial append"
            );
        }
        return Err(io_err("append to", &paths.log)(e));
    }

    persist(&mut file).map_err(|e| {
        warn!(
            path = %paths.log.display(),
            offset = start,
            error = %e,
            "record appended but not persisted; root left unpublished"
        );
        io_err("sync", &paths.log)(e)
    })
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
