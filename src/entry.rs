//! Per-entry metadata and the per-call archive summary.

use std::path::PathBuf;

use crate::formats::ArchiveFormat;

/// The kind of object one archive entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Hardlink,
    /// Device nodes, fifos and other special objects the engine skips.
    Other,
}

/// Metadata for a single archive entry.
///
/// Built while enumerating an archive (from filesystem walks when packing,
/// from container headers when unpacking or listing) and never mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Relative path inside the archive, `/`-separated.
    pub path: PathBuf,
    /// Logical (uncompressed) size in bytes.
    pub size: u64,
    /// Stored (compressed) size in bytes, where the container reports one;
    /// equal to `size` for containers that store entries verbatim.
    pub stored_size: u64,
    /// Modification time as seconds since the Unix epoch, if recorded.
    pub modified: Option<u64>,
    /// Unix permission bits, if recorded.
    pub mode: Option<u32>,
    pub kind: EntryKind,
    /// Link target for `Symlink` and `Hardlink` entries.
    pub link_target: Option<PathBuf>,
}

/// Aggregate result of one pack, unpack or list call.
///
/// Built incrementally while the operation runs and returned once per call;
/// the caller owns it exclusively after return.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub format: ArchiveFormat,
    pub entries: Vec<Entry>,
    /// Sum of logical entry sizes.
    pub total_size: u64,
    /// Sum of stored entry sizes.
    pub total_stored: u64,
}

impl ArchiveSummary {
    pub(crate) fn new(format: ArchiveFormat) -> Self {
        Self {
            format,
            entries: Vec::new(),
            total_size: 0,
            total_stored: 0,
        }
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        self.total_size += entry.size;
        self.total_stored += entry.stored_size;
        self.entries.push(entry);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries of a given kind, e.g. regular files only.
    pub fn count_of(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_entry(name: &str, size: u64) -> Entry {
        Entry {
            path: PathBuf::from(name),
            size,
            stored_size: size,
            modified: None,
            mode: None,
            kind: EntryKind::File,
            link_target: None,
        }
    }

    #[test]
    fn summary_aggregates_sizes() {
        let mut summary = ArchiveSummary::new(ArchiveFormat::Tar);
        summary.push(file_entry("a.txt", 5));
        summary.push(file_entry("sub/b.txt", 6));
        assert_eq!(summary.entry_count(), 2);
        assert_eq!(summary.total_size, 11);
        assert_eq!(summary.count_of(EntryKind::File), 2);
        assert_eq!(summary.count_of(EntryKind::Directory), 0);
    }
}
