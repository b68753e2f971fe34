//! Pack-time entry filtering and the ignore-file pattern loader.
//!
//! The engine consults an injected [`PackFilter`] for each pack candidate and
//! honors its yes/no decision; glob matching itself lives outside this crate.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ArchiveError, Result};

/// Decides whether a filesystem object becomes an archive entry.
///
/// A `false` decision omits the entry entirely.
pub trait PackFilter: Send + Sync {
    fn include(&self, path: &Path, size: u64, is_dir: bool) -> bool;
}

/// The default filter: everything is included.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepAll;

impl PackFilter for KeepAll {
    fn include(&self, _path: &Path, _size: u64, _is_dir: bool) -> bool {
        true
    }
}

/// Read exclude patterns from an ignore file.
///
/// The format is line-oriented: `#`-prefixed and blank lines are skipped,
/// every remaining line is one glob pattern. Duplicates are dropped while
/// the original order is preserved. The returned patterns are plain strings;
/// evaluating them is the caller's concern.
pub fn read_ignore_patterns(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| ArchiveError::from_io(e, path))?;
    let reader = BufReader::new(file);

    let mut seen = HashSet::new();
    let mut patterns = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| ArchiveError::from_io(e, path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            patterns.push(trimmed.to_string());
        }
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ignore_file_skips_comments_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".packignore");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# build output").unwrap();
        writeln!(file, "target/**").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "*.log").unwrap();
        writeln!(file, "target/**").unwrap();
        writeln!(file, "  *.tmp  ").unwrap();

        let patterns = read_ignore_patterns(&path).unwrap();
        assert_eq!(patterns, vec!["target/**", "*.log", "*.tmp"]);
    }

    #[test]
    fn missing_ignore_file_is_an_io_error() {
        let err = read_ignore_patterns(Path::new("/nonexistent/.packignore")).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }
}
