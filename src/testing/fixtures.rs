//! Temporary source files for tests.

use crate::pipeline::Pipeline;
use crate::rdd::{Rdd, source_from_files};
use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One file per partition inside a temporary directory.
///
/// The directory, and every file in it, is removed when this value is dropped,
/// so keep it alive for as long as any source built from it may be read.
#[derive(Debug)]
pub struct PartitionFiles {
    dir: TempDir,
    paths: Vec<PathBuf>,
}

impl PartitionFiles {
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// A source over these files, partition `i` reading file `i`.
    ///
    /// # Errors
    ///
    /// See [`source_from_files`].
    pub fn source(&self, pipeline: &Pipeline) -> Result<Rdd<String>> {
        source_from_files(pipeline, &self.paths)
    }
}

/// Write each inner sequence to its own file, one item per line.
///
/// Files are named `part-00000.txt`, `part-00001.txt`, ... so a sorted glob
/// over the directory sees them in partition order.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be written.
///
/// # Example
///
/// ```
/// use minispark::testing::write_partitions;
///
/// let files = write_partitions([vec!["a"], vec!["b"]]).unwrap();
/// assert_eq!(files.paths().len(), 2);
/// ```
pub fn write_partitions<P, L>(partitions: P) -> Result<PartitionFiles>
where
    P: IntoIterator<Item = L>,
    L: IntoIterator,
    L::Item: Display,
{
    let dir = tempfile::tempdir().context("creating fixture directory")?;
    let mut paths = Vec::new();
    for (i, lines) in partitions.into_iter().enumerate() {
        let path = dir.path().join(format!("part-{i:05}.txt"));
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        paths.push(path);
    }
    Ok(PartitionFiles { dir, paths })
}

/// Lines `0..n` of a numeric sequence split across `parts` files, in order.
///
/// Handy for load tests: `numbered_partitions(4, 1000)` gives 4 files of 250
/// consecutive integers each (the last file takes the remainder).
///
/// # Errors
///
/// See [`write_partitions`].
pub fn numbered_partitions(parts: usize, n: usize) -> Result<PartitionFiles> {
    let parts = parts.max(1);
    let per = n / parts;
    write_partitions((0..parts).map(|p| {
        let end = if p + 1 == parts { n } else { (p + 1) * per };
        p * per..end
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_file_per_partition() -> Result<()> {
        let files = write_partitions([vec![1, 2, 3], vec![], vec![4]])?;
        assert_eq!(files.paths().len(), 3);
        assert_eq!(std::fs::read_to_string(&files.paths()[0])?, "1\n2\n3\n");
        assert_eq!(std::fs::read_to_string(&files.paths()[1])?, "");
        assert!(files.paths().iter().all(|p| p.starts_with(files.dir())));
        Ok(())
    }

    #[test]
    fn numbered_covers_the_range() -> Result<()> {
        let files = numbered_partitions(3, 10)?;
        let total: usize = files
            .paths()
            .iter()
            .map(|p| std::fs::read_to_string(p).map(|s| s.lines().count()))
            .sum::<std::io::Result<usize>>()?;
        assert_eq!(total, 10);
        assert_eq!(std::fs::read_to_string(&files.paths()[2])?, "6\n7\n8\n9\n");
        Ok(())
    }
}
