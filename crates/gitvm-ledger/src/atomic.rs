use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{io_err, LedgerError, Result};

/// Replace `path` with `contents` via a temp file in the same directory and a rename.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], fsync: bool) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err("create temp file in", parent))?;
    tmp.write_all(contents)
        .map_err(io_err("write temp file for", path))?;
    if fsync {
        tmp.as_file()
            .sync_all()
            .map_err(io_err("sync temp file for", path))?;
    }

    tmp.persist(path).map_err(|e| LedgerError::Io {
        op: "rename temp file onto",
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
