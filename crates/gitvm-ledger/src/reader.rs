//! Lock-free read path: root lookup, full scans, and the cursor slicer.
//!
//! Readers never take the writer lock. The log is append-only and every
//! record is written with a single `write_all`, so a reader that only looks at
//! `\n`-terminated lines below its size snapshot sees a consistent prefix.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use gitvm_types::Receipt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{io_err, LedgerError, Result};
use crate::paths::LedgerPaths;

/// Filters and pagination for [`crate::Ledger::read_slice`].
///
/// All bounds compose. `since_ts`/`until_ts` are inclusive, `since_root` and
/// `until_root` are exclusive. `since_root` is matched against the lines
/// scanned from `cursor` onwards: nothing is returned until that receipt has
/// been passed, so continue a paginated read with the returned cursor alone.
/// An empty root is the genesis root and bounds nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceOptions {
    /// Byte offset to resume from.
    pub cursor: u64,
    pub since_ts: Option<i64>,
    pub until_ts: Option<i64>,
    pub since_root: Option<String>,
    pub until_root: Option<String>,
    /// Maximum number of lines to return. `None` means no limit.
    pub limit: Option<usize>,
}

impl SliceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(mut self, cursor: u64) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_since_ts(mut self, ts_unix_ms: i64) -> Self {
        self.since_ts = Some(ts_unix_ms);
        self
    }

    pub fn with_until_ts(mut self, ts_unix_ms: i64) -> Self {
        self.until_ts = Some(ts_unix_ms);
        self
    }

    pub fn with_since_root(mut self, root: impl Into<String>) -> Self {
        self.since_root = Some(root.into());
        self
    }

    pub fn with_until_root(mut self, root: impl Into<String>) -> Self {
        self.until_root = Some(root.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of raw log lines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SliceResult {
    /// Raw JSON lines, without their trailing newline, in append order.
    pub lines: Vec<String>,
    /// Pass this back as [`SliceOptions::cursor`] to continue.
    pub next_cursor: u64,
    /// Size of the log when the call started.
    pub file_size: u64,
}

/// The two fields the slicer filters on. Lines are not decoded any further.
#[derive(Deserialize)]
struct LineHeader {
    #[serde(default)]
    ts_unix_ms: i64,
    #[serde(default)]
    root: String,
}

/// Contents of `ROOT.txt` with trailing whitespace removed, or `None` if absent.
pub(crate) fn read_root_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.trim_end().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err("read", path)(e)),
    }
}

/// The published root, `""` for a ledger with no receipts.
pub(crate) fn get_root(paths: &LedgerPaths) -> Result<String> {
    Ok(read_root_file(&paths.root)?.unwrap_or_default())
}

fn open_log(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err("open", path)(e)),
    }
}

/// What [`scan_lines`] does after visiting a line.
enum Step {
    Next,
    /// Stop and leave the line unconsumed.
    StopBefore,
    /// Stop after consuming the line.
    StopAfter,
}

/// Visit every complete line of `reader`, starting at byte `start`.
///
/// The callback gets the line without its newline and the line's offset. A
/// trailing fragment without `\n` is never visited or consumed. Returns the
/// offset of the first unconsumed byte.
fn scan_lines<R: BufRead>(
    mut reader: R,
    path: &Path,
    start: u64,
    mut visit: impl FnMut(&[u8], u64) -> Result<Step>,
) -> Result<u64> {
    let mut buf = Vec::new();
    let mut pos = start;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(io_err("read", path))?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Ok(pos);
        }
        let offset = pos;
        pos += n as u64;
        match visit(&buf[..n - 1], offset)? {
            Step::Next => {}
            Step::StopBefore => return Ok(offset),
            Step::StopAfter => return Ok(pos),
        }
    }
}

fn malformed(offset: u64, reason: impl ToString) -> LedgerError {
    LedgerError::MalformedRecord {
        offset,
        reason: reason.to_string(),
    }
}

/// Parse every complete receipt in the log. A missing log is an empty ledger.
pub(crate) fn read_receipts(paths: &LedgerPaths) -> Result<Vec<Receipt>> {
    let Some(file) = open_log(&paths.log)? else {
        return Ok(Vec::new());
    };
    let mut receipts = Vec::new();
    scan_lines(BufReader::new(file), &paths.log, 0, |line, offset| {
        receipts.push(serde_json::from_slice(line).map_err(|e| malformed(offset, e))?);
        Ok(Step::Next)
    })?;
    Ok(receipts)
}

/// The last `n` receipts, oldest first.
pub(crate) fn recent(paths: &LedgerPaths, n: usize) -> Result<Vec<Receipt>> {
    let mut receipts = read_receipts(paths)?;
    let skip = receipts.len().saturating_sub(n);
    Ok(receipts.split_off(skip))
}

/// Filtered, resumable view of the log.
///
/// The scan never reads past the size observed on entry, so concurrent
/// appends show up in the next call rather than half-way through this one.
pub(crate) fn read_slice(paths: &LedgerPaths, opts: &SliceOptions) -> Result<SliceResult> {
    let Some(mut file) = open_log(&paths.log)? else {
        return Ok(SliceResult::default());
    };
    let file_size = file.metadata().map_err(io_err("stat", &paths.log))?.len();
    if opts.cursor > file_size {
        return Err(LedgerError::CursorOutOfRange {
            cursor: opts.cursor,
            file_size,
        });
    }

    let mut result = SliceResult {
        lines: Vec::new(),
        next_cursor: opts.cursor,
        file_size,
    };
    if opts.limit == Some(0) || opts.cursor == file_size {
        return Ok(result);
    }

    file.seek(SeekFrom::Start(opts.cursor))
        .map_err(io_err("seek", &paths.log))?;
    let reader = BufReader::new(file.take(file_size - opts.cursor));

    // An empty root names the genesis state, which precedes every line.
    let since_root = opts.since_root.as_deref().filter(|r| !r.is_empty());
    let until_root = opts.until_root.as_deref().filter(|r| !r.is_empty());
    let mut gate_open = since_root.is_none();
    let lines = &mut result.lines;
    result.next_cursor = scan_lines(reader, &paths.log, opts.cursor, |line, offset| {
        let text = std::str::from_utf8(line).map_err(|e| malformed(offset, e))?;
        let header: LineHeader = serde_json::from_str(text).map_err(|e| malformed(offset, e))?;

        if !gate_open {
            gate_open = since_root == Some(header.root.as_str());
            return Ok(Step::Next);
        }
        if until_root == Some(header.root.as_str()) {
            return Ok(Step::StopBefore);
        }
        if opts.since_ts.is_some_and(|since| header.ts_unix_ms < since) {
            return Ok(Step::Next);
        }
        // Timestamps are non-decreasing, so nothing later can match.
        if opts.until_ts.is_some_and(|until| header.ts_unix_ms > until) {
            return Ok(Step::StopBefore);
        }

        lines.push(text.to_string());
        match opts.limit {
            Some(limit) if lines.len() >= limit => Ok(Step::StopAfter),
            _ => Ok(Step::Next),
        }
    })?;

    debug!(
        cursor = opts.cursor,
        next_cursor = result.next_cursor,
        file_size,
        lines = result.lines.len(),
        "slice read"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use gitvm_types::{ActorRef, CiRunEnd, RepoRef};
    use std::fs::OpenOptions;
    use std::io::Write;

    fn run_end(k: i64) -> Receipt {
        Receipt::new(
            RepoRef::new(3, "acme/infra"),
            ActorRef::new(4, "ci-bot"),
            CiRunEnd {
                run_id: k,
                workflow_id: "build.yml".into(),
                commit_sha: format!("{k:040}"),
                git_ref: "refs/heads/main".into(),
                event: "push".into(),
                status: "success".into(),
                duration_ms: 1_200 * k,
            },
        )
    }

    /// Ten receipts with `ts_unix_ms = 1_000_000 * k`; returns the roots, 1-based.
    fn ten(dir: &Path) -> (Ledger, Vec<String>) {
        let ledger = Ledger::new(dir);
        let mut roots = vec![String::new()];
        for k in 1..=10 {
            let r = ledger.emit(run_end(k).with_timestamp(1_000_000 * k)).unwrap();
            roots.push(r.root);
        }
        (ledger, roots)
    }

    fn run_ids(result: &SliceResult) -> Vec<i64> {
        result
            .lines
            .iter()
            .map(|l| {
                let r: Receipt = serde_json::from_str(l).unwrap();
                match r.payload {
                    gitvm_types::Payload::CiRunEnd(p) => p.run_id,
                    other => panic!("unexpected payload {other}"),
                }
            })
            .collect()
    }

    #[test]
    fn missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        let result = ledger.read_slice(&SliceOptions::new()).unwrap();
        assert_eq!(result, SliceResult::default());
        assert_eq!(ledger.get_root().unwrap(), "");
        assert!(ledger.read_receipts().unwrap().is_empty());
        assert!(ledger.recent(5).unwrap().is_empty());
    }

    #[test]
    fn timestamp_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());

        let since = ledger
            .read_slice(&SliceOptions::new().with_since_ts(5_000_000))
            .unwrap();
        assert_eq!(run_ids(&since), (5..=10).collect::<Vec<_>>());

        let until = ledger
            .read_slice(&SliceOptions::new().with_until_ts(5_000_000))
            .unwrap();
        assert_eq!(run_ids(&until), (1..=5).collect::<Vec<_>>());
    }

    #[test]
    fn root_bounds_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, roots) = ten(dir.path());

        let since = ledger
            .read_slice(&SliceOptions::new().with_since_root(&roots[3]))
            .unwrap();
        assert_eq!(run_ids(&since), (4..=10).collect::<Vec<_>>());

        let until = ledger
            .read_slice(&SliceOptions::new().with_until_root(&roots[5]))
            .unwrap();
        assert_eq!(run_ids(&until), (1..=4).collect::<Vec<_>>());

        let between = ledger
            .read_slice(
                &SliceOptions::new()
                    .with_since_root(&roots[2])
                    .with_until_root(&roots[6]),
            )
            .unwrap();
        assert_eq!(run_ids(&between), vec![3, 4, 5]);
    }

    #[test]
    fn genesis_root_bounds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, roots) = ten(dir.path());
        assert_eq!(roots[0], "");

        let since = ledger
            .read_slice(&SliceOptions::new().with_since_root(&roots[0]))
            .unwrap();
        assert_eq!(run_ids(&since), (1..=10).collect::<Vec<_>>());
        assert_eq!(since.next_cursor, since.file_size);

        let until = ledger
            .read_slice(&SliceOptions::new().with_until_root(""))
            .unwrap();
        assert_eq!(run_ids(&until), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_since_root_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());
        let result = ledger
            .read_slice(&SliceOptions::new().with_since_root("b3:nowhere"))
            .unwrap();
        assert!(result.lines.is_empty());
        assert_eq!(result.next_cursor, result.file_size);
    }

    #[test]
    fn limit_pages_resume_without_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());

        let first = ledger
            .read_slice(&SliceOptions::new().with_limit(3))
            .unwrap();
        assert_eq!(run_ids(&first), vec![1, 2, 3]);

        let second = ledger
            .read_slice(
                &SliceOptions::new()
                    .with_cursor(first.next_cursor)
                    .with_limit(3),
            )
            .unwrap();
        assert_eq!(run_ids(&second), vec![4, 5, 6]);
        assert_eq!(first.file_size, second.file_size);
    }

    #[test]
    fn cursor_pagination_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = ledger
                .read_slice(&SliceOptions::new().with_cursor(cursor).with_limit(4))
                .unwrap();
            if page.lines.is_empty() {
                assert_eq!(page.next_cursor, page.file_size);
                break;
            }
            seen.extend(run_ids(&page));
            cursor = page.next_cursor;
        }
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn pagination_follows_a_growing_log() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());

        let first = ledger.read_slice(&SliceOptions::new()).unwrap();
        assert_eq!(first.lines.len(), 10);
        ledger.emit(run_end(11)).unwrap();

        let second = ledger
            .read_slice(&SliceOptions::new().with_cursor(first.next_cursor))
            .unwrap();
        assert_eq!(run_ids(&second), vec![11]);
        assert!(second.file_size > first.file_size);
    }

    #[test]
    fn stop_on_upper_bound_leaves_line_unconsumed() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, roots) = ten(dir.path());

        let page = ledger
            .read_slice(&SliceOptions::new().with_until_root(&roots[5]))
            .unwrap();
        let rest = ledger
            .read_slice(&SliceOptions::new().with_cursor(page.next_cursor))
            .unwrap();
        assert_eq!(run_ids(&rest), (5..=10).collect::<Vec<_>>());

        let page = ledger
            .read_slice(&SliceOptions::new().with_until_ts(2_000_000))
            .unwrap();
        let rest = ledger
            .read_slice(&SliceOptions::new().with_cursor(page.next_cursor).with_limit(1))
            .unwrap();
        assert_eq!(run_ids(&rest), vec![3]);
    }

    #[test]
    fn zero_limit_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());
        let result = ledger
            .read_slice(&SliceOptions::new().with_cursor(0).with_limit(0))
            .unwrap();
        assert!(result.lines.is_empty());
        assert_eq!(result.next_cursor, 0);
    }

    #[test]
    fn cursor_past_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());
        let size = ledger.read_slice(&SliceOptions::new()).unwrap().file_size;
        let err = ledger
            .read_slice(&SliceOptions::new().with_cursor(size + 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::CursorOutOfRange { cursor, file_size }
            if cursor == size + 1 && file_size == size));

        // Exactly at the end is a valid, empty page.
        let at_end = ledger
            .read_slice(&SliceOptions::new().with_cursor(size))
            .unwrap();
        assert!(at_end.lines.is_empty());
        assert_eq!(at_end.next_cursor, size);
    }

    #[test]
    fn partial_trailing_line_is_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());
        let complete = ledger.read_slice(&SliceOptions::new()).unwrap();

        let mut f = OpenOptions::new()
            .append(true)
            .open(dir.path().join("receipts.jsonl"))
            .unwrap();
        f.write_all(b"{\"version\":1,\"type\":\"ci.ru").unwrap();
        drop(f);

        let result = ledger.read_slice(&SliceOptions::new()).unwrap();
        assert_eq!(result.lines, complete.lines);
        assert_eq!(result.next_cursor, complete.next_cursor);
        assert!(result.file_size > complete.file_size);
        assert_eq!(ledger.read_receipts().unwrap().len(), 10);
    }

    #[test]
    fn malformed_line_reports_offset() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, _) = ten(dir.path());
        let size = ledger.read_slice(&SliceOptions::new()).unwrap().file_size;

        let mut f = OpenOptions::new()
            .append(true)
            .open(dir.path().join("receipts.jsonl"))
            .unwrap();
        f.write_all(b"not json\n").unwrap();
        drop(f);

        let err = ledger.read_slice(&SliceOptions::new()).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedRecord { offset, .. } if offset == size));
    }

    #[test]
    fn recent_returns_the_tail_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, roots) = ten(dir.path());
        let last = ledger.recent(3).unwrap();
        assert_eq!(
            last.iter().map(|r| r.root.as_str()).collect::<Vec<_>>(),
            vec![roots[8].as_str(), roots[9].as_str(), roots[10].as_str()]
        );
        assert_eq!(ledger.recent(100).unwrap().len(), 10);
        assert!(ledger.recent(0).unwrap().is_empty());
    }

    #[test]
    fn root_file_whitespace_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ROOT.txt");
        fs::write(&path, "b3:abc\r\n").unwrap();
        assert_eq!(read_root_file(&path).unwrap().as_deref(), Some("b3:abc"));
    }

    #[test]
    fn options_deserialize_from_partial_input() {
        let opts: SliceOptions =
            serde_json::from_str(r#"{"cursor":42,"limit":7,"until_root":"b3:x"}"#).unwrap();
        assert_eq!(
            opts,
            SliceOptions::new()
                .with_cursor(42)
                .with_limit(7)
                .with_until_root("b3:x")
        );
    }
}
