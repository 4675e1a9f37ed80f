//! Incremental tailing state for append-only log files.
//!
//! Per file the tailer remembers `(inode, byte offset)`. A pull reads only
//! the bytes appended since the previous pull; an inode change or a length
//! shrink (rotation, truncation) resets the offset to zero so nothing is
//! lost. The dedup filter downstream absorbs any re-reads that causes.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
struct TailState {
    inode: u64,
    offset: u64,
}

/// Byte-offset tailer over a set of append-only files.
#[derive(Debug, Default)]
pub struct FileTailer {
    state: HashMap<PathBuf, TailState>,
}

impl FileTailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the complete lines appended to `path` since the previous call.
    ///
    /// A trailing partial line (no newline yet) is held back; its bytes are
    /// re-read on the next pull once the writer finishes the line.
    pub fn read_new_lines(&mut self, path: &Path) -> std::io::Result<Vec<String>> {
        let mut file = File::open(path)?;
        let meta = file.metadata()?;
        let inode = inode_of(&meta);
        let len = meta.len();

        let start = match self.state.get(path) {
            Some(s) if s.inode == inode && len >= s.offset => s.offset,
            // Rotated or truncated: start over from the beginning.
            _ => 0,
        };

        if len == start {
            self.state
                .insert(path.to_path_buf(), TailState { inode, offset: start });
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity((len - start) as usize);
        file.take(len - start).read_to_end(&mut buf)?;

        let complete = match buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => 0,
        };

        self.state.insert(
            path.to_path_buf(),
            TailState {
                inode,
                offset: start + complete as u64,
            },
        );

        let text = String::from_utf8_lossy(&buf[..complete]);
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Drop tailing state for files no longer present in `live`, so handles
    /// and offsets for rotated-away files are released promptly.
    pub fn retain_files(&mut self, live: &HashSet<PathBuf>) {
        self.state.retain(|path, _| live.contains(path));
    }

    /// Number of files currently tracked.
    pub fn tracked_files(&self) -> usize {
        self.state.len()
    }
}

#[cfg(unix)]
fn inode_of(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn inode_of(_meta: &std::fs::Metadata) -> u64 {
    // Length-shrink detection still catches truncation on other platforms.
    0
}
