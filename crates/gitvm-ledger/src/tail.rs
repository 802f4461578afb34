//! Backwards read of the last complete record in the log.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use gitvm_types::Receipt;

use crate::error::{io_err, LedgerError, Result};

const CHUNK: u64 = 8 * 1024;

/// The last record of the log and where it starts.
#[derive(Debug)]
pub(crate) struct Tail {
    pub receipt: Receipt,
    pub offset: u64,
}

/// Read the last receipt without scanning the whole log.
///
/// `Ok(None)` when the log is missing or empty. A log whose final byte is not
/// `\n` is reported as [`LedgerError::TornTail`].
pub(crate) fn read_tail(path: &Path) -> Result<Option<Tail>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err("open", path)(e)),
    };
    let file_size = file.metadata().map_err(io_err("stat", path))?.len();
    if file_size == 0 {
        return Ok(None);
    }

    let mut pos = file_size;
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let start = pos.saturating_sub(CHUNK);
        let mut chunk = vec![0u8; (pos - start) as usize];
        file.seek(SeekFrom::Start(start))
            .map_err(io_err("seek", path))?;
        file.read_exact(&mut chunk).map_err(io_err("read", path))?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        pos = start;

        if buf.last() != Some(&b'\n') {
            return Err(LedgerError::TornTail { file_size });
        }
        let body = &buf[..buf.len() - 1];
        match body.iter().rposition(|&b| b == b'\n') {
            Some(i) => return parse_tail(&body[i + 1..], pos + i as u64 + 1).map(Some),
            None if pos == 0 => return parse_tail(body, 0).map(Some),
            None => continue,
        }
    }
}

fn parse_tail(line: &[u8], offset: u64) -> Result<Tail> {
    let receipt = serde_json::from_slice(line).map_err(|e| LedgerError::MalformedRecord {
        offset,
        reason: e.to_string(),
    })?;
    Ok(Tail { receipt, offset })
}
