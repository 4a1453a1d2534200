//! File-backed source partitions.
//!
//! A source node has one partition per input file. Files are opened when the
//! source is constructed so that a missing or unreadable input is reported
//! before any work is scheduled. The engine does not parse file contents: a
//! partition is simply the sequence of its lines, terminators stripped.

use crate::utils::lock;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One input file backing one source partition.
#[derive(Debug)]
pub(crate) struct SourceFile {
    path: PathBuf,
    /// Handle opened at construction, handed to the first reader.
    handle: Mutex<Option<File>>,
}

impl SourceFile {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open source file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            handle: Mutex::new(Some(file)),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Line iterator over the whole file.
    ///
    /// The first call consumes the handle opened at construction; later
    /// readers (a second transform over the same source) reopen the path and
    /// start from the beginning.
    pub(crate) fn lines(&self) -> io::Result<Lines<BufReader<File>>> {
        let file = match lock(&self.handle).take() {
            Some(f) => f,
            None => File::open(&self.path)?,
        };
        Ok(BufReader::new(file).lines())
    }
}

/// Expand a glob pattern into a sorted list of matching files.
///
/// Directories are skipped. Sorting gives a deterministic partition order.
///
/// # Errors
///
/// Returns an error for an invalid pattern or an unreadable glob entry.
#[cfg(feature = "glob")]
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths =
        glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}
