//! Whitelist sources: admin-maintained files that can grant a partition to a
//! restricted submission.
//!
//! Each source implements [`PartitionGrant`]. The gate asks them in order and
//! allows the submission if any one grants. A source that cannot read its file
//! grants nothing; it does not stop the other sources from being asked.

/// Flat list of partitions open to every restricted submission.
pub mod allowlist;
/// Snapshot cache keyed on file identity (size, mtime, inode).
pub mod cache;
/// `<gid>:<partition>[,<partition>...]` map of per-group grants.
pub mod group_map;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::ops::ControlFlow;
use std::path::Path;

use crate::error::GateError;

/// One authorization predicate consulted for restricted submissions.
pub trait PartitionGrant: Send + Sync {
    /// Short name used in audit lines ("allowlist", "group-map").
    fn name(&self) -> &str;

    /// Whether this source grants `partition` to `group`.
    ///
    /// Unreadable policy data is `Ok(false)`. Only operational faults that must
    /// not be mistaken for a verdict come back as `Err`.
    fn grants(&self, group: u32, partition: &str) -> Result<bool, GateError>;
}

/// A physical line from a whitelist file.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line {
    /// Line content with the terminator stripped.
    Text(String),
    /// Line exceeded the byte cap; carries the bytes consumed for it.
    TooLong(usize),
    /// Line is not valid UTF-8. It can never equal a partition name.
    Invalid,
}

/// Open `path` and feed each line to `visit` (1-based line numbers).
///
/// `max_bytes` counts the terminator; a final line without one is counted as if
/// it had it. At most `max_bytes + 1` bytes of a line are buffered, the rest of
/// an overlong line is skipped unread. Only an I/O error aborts the read, so
/// callers never build on a partial file; a bad line only affects itself.
pub(crate) fn read_lines<F>(path: &Path, max_bytes: usize, mut visit: F) -> Result<(), GateError>
where
    F: FnMut(usize, Line) -> ControlFlow<()>,
{
    let file = File::open(path).map_err(|source| GateError::ConfigAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut number = 0;
    let io_error = |line: usize, e: std::io::Error| GateError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: e.to_string(),
    };

    loop {
        buf.clear();
        let limit = max_bytes as u64 + 1;
        let read = reader
            .by_ref()
            .take(limit)
            .read_until(b'\n', &mut buf)
            .map_err(|e| io_error(number + 1, e))?;
        if read == 0 {
            return Ok(());
        }
        number += 1;

        let terminated = buf.last() == Some(&b'\n');
        let line = if !terminated && read as u64 == limit {
            let rest = reader
                .skip_until(b'\n')
                .map_err(|e| io_error(number, e))?;
            Line::TooLong(read + rest.max(1))
        } else if !terminated && read + 1 > max_bytes {
            Line::TooLong(read + 1)
        } else if read > max_bytes {
            Line::TooLong(read)
        } else {
            if terminated {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            match std::str::from_utf8(&buf) {
                Ok(text) => Line::Text(text.to_owned()),
                Err(_) => Line::Invalid,
            }
        };

        if visit(number, line).is_break() {
            return Ok(());
        }
    }
}
