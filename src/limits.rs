//! Size and compression-ratio enforcement for streamed entry payloads.
//!
//! `CheckedWriter` decorates a destination byte sink and validates every
//! write while bytes are in flight: declared-size overruns (truncation and
//! overflow attacks), the per-file cap, the per-operation total cap, and the
//! decompression-bomb ratio cap all abort the stream at the first excess
//! write instead of after the fact. A violation is an error, never a warning.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};
use crate::options::ArchiveOptions;

/// Running byte total for one pack/unpack invocation.
///
/// Scoped to a single operation and borrowed mutably by each entry's
/// `CheckedWriter` in turn; never shared across concurrent calls.
#[derive(Debug, Default)]
pub(crate) struct SizeTracker {
    written: u64,
}

impl SizeTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }
}

/// Writer decorator enforcing size and ratio policy on one entry's payload.
pub(crate) struct CheckedWriter<'a, W: Write> {
    inner: W,
    entry: PathBuf,
    enabled: bool,
    max_file: u64,
    max_total: u64,
    max_ratio: f64,
    /// Final size the container header declared for this entry, if any.
    declared: Option<u64>,
    /// Per-entry output cap derived from the entry's stored size and the
    /// ratio limit; rejects bombs mid-stream rather than post-hoc.
    ratio_cap: Option<u64>,
    /// Whole-operation output cap for single-stream containers, checked
    /// against the running total.
    stream_cap: Option<u64>,
    entry_written: u64,
    tracker: &'a mut SizeTracker,
}

impl<'a, W: Write> CheckedWriter<'a, W> {
    pub(crate) fn new(
        inner: W,
        entry: &Path,
        options: &ArchiveOptions,
        tracker: &'a mut SizeTracker,
    ) -> Self {
        Self {
            inner,
            entry: entry.to_path_buf(),
            enabled: options.size_check,
            max_file: options.max_file_size,
            max_total: options.max_total_size,
            max_ratio: options.max_ratio,
            declared: None,
            ratio_cap: None,
            stream_cap: None,
            entry_written: 0,
            tracker,
        }
    }

    /// Enforce the uncompressed size the container header declared.
    ///
    /// Any write that would push past it fails mid-stream. Applied regardless
    /// of the `size_check` toggle; a payload outgrowing its own header is a
    /// correctness violation, not a policy cap.
    pub(crate) fn declared_size(mut self, declared: u64) -> Self {
        self.declared = Some(declared);
        self
    }

    /// Provide the stored (compressed) size of this entry's payload, arming
    /// the mid-stream ratio cap when size checking is on.
    pub(crate) fn stored_size(mut self, stored: u64) -> Self {
        if self.enabled && self.max_ratio > 0.0 && stored > 0 {
            self.ratio_cap = Some((stored as f64 * self.max_ratio) as u64);
        }
        self
    }

    /// Provide the stored size of the whole archive stream, arming a ratio
    /// cap on the operation's running total. Used by single-stream formats
    /// and TGZ, where per-entry stored sizes are unknowable.
    pub(crate) fn stream_stored_size(mut self, stored: u64) -> Self {
        if self.enabled && self.max_ratio > 0.0 && stored > 0 {
            self.stream_cap = Some((stored as f64 * self.max_ratio) as u64);
        }
        self
    }

    /// Bytes written through this decorator for the current entry.
    pub(crate) fn entry_written(&self) -> u64 {
        self.entry_written
    }

    fn ratio_err(&self) -> io::Error {
        ArchiveError::RatioExceeded {
            entry: self.entry.clone(),
            limit: self.max_ratio,
        }
        .into_io()
    }
}

impl<W: Write> Write for CheckedWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(declared) = self.declared {
            if self.entry_written + buf.len() as u64 > declared {
                return Err(ArchiveError::DeclaredSizeExceeded {
                    entry: self.entry.clone(),
                    declared,
                }
                .into_io());
            }
        }

        let written = self.inner.write(buf)?;
        let written_u64 = written as u64;
        self.entry_written += written_u64;
        self.tracker.written += written_u64;

        if self.enabled {
            if self.max_file > 0 && self.entry_written > self.max_file {
                return Err(ArchiveError::SizeLimitExceeded {
                    entry: self.entry.clone(),
                    limit: self.max_file,
                }
                .into_io());
            }
            if self.max_total > 0 && self.tracker.written > self.max_total {
                return Err(ArchiveError::TotalSizeExceeded {
                    entry: self.entry.clone(),
                    limit: self.max_total,
                }
                .into_io());
            }
            if let Some(cap) = self.ratio_cap {
                if self.entry_written > cap {
                    return Err(self.ratio_err());
                }
            }
            if let Some(cap) = self.stream_cap {
                if self.tracker.written() > cap {
                    return Err(self.ratio_err());
                }
            }
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Post-entry compression-ratio check for entries whose stored size is only
/// reliable once the copy completes.
///
/// Only evaluated when size checking is enabled; ratios at or below the limit
/// pass.
pub(crate) fn check_ratio(
    entry: &Path,
    original: u64,
    stored: u64,
    options: &ArchiveOptions,
) -> Result<()> {
    if !options.size_check || options.max_ratio <= 0.0 || stored == 0 {
        return Ok(());
    }
    let ratio = original as f64 / stored as f64;
    if ratio > options.max_ratio {
        return Err(ArchiveError::RatioExceeded {
            entry: entry.to_path_buf(),
            limit: options.max_ratio,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked_options(max_file: u64, max_total: u64, max_ratio: f64) -> ArchiveOptions {
        ArchiveOptions {
            size_check: true,
            max_file_size: max_file,
            max_total_size: max_total,
            max_ratio,
            ..ArchiveOptions::default()
        }
    }

    #[test]
    fn exactly_the_limit_succeeds() {
        let options = checked_options(8, 0, 0.0);
        let mut tracker = SizeTracker::new();
        let mut sink = Vec::new();
        let mut writer = CheckedWriter::new(&mut sink, Path::new("a"), &options, &mut tracker);
        writer.write_all(&[0u8; 8]).unwrap();
        assert_eq!(writer.entry_written(), 8);
    }

    #[test]
    fn one_byte_past_the_limit_fails() {
        let options = checked_options(8, 0, 0.0);
        let mut tracker = SizeTracker::new();
        let mut sink = Vec::new();
        let mut writer = CheckedWriter::new(&mut sink, Path::new("a"), &options, &mut tracker);
        writer.write_all(&[0u8; 8]).unwrap();
        let err = writer.write_all(&[0u8; 1]).unwrap_err();
        let err = ArchiveError::from_io(err, Path::new("a"));
        assert!(matches!(err, ArchiveError::SizeLimitExceeded { limit: 8, .. }));
    }

    #[test]
    fn total_limit_spans_entries() {
        let options = checked_options(0, 10, 0.0);
        let mut tracker = SizeTracker::new();

        let mut sink = Vec::new();
        let mut first = CheckedWriter::new(&mut sink, Path::new("a"), &options, &mut tracker);
        first.write_all(&[0u8; 6]).unwrap();
        drop(first);

        let mut sink = Vec::new();
        let mut second = CheckedWriter::new(&mut sink, Path::new("b"), &options, &mut tracker);
        let err = second.write_all(&[0u8; 6]).unwrap_err();
        let err = ArchiveError::from_io(err, Path::new("b"));
        assert!(matches!(err, ArchiveError::TotalSizeExceeded { limit: 10, .. }));
    }

    #[test]
    fn declared_size_is_enforced_before_writing() {
        let options = ArchiveOptions::default(); // size_check off
        let mut tracker = SizeTracker::new();
        let mut sink = Vec::new();
        let mut writer = CheckedWriter::new(&mut sink, Path::new("a"), &options, &mut tracker)
            .declared_size(4);
        writer.write_all(&[0u8; 4]).unwrap();
        let err = writer.write_all(&[0u8; 1]).unwrap_err();
        let err = ArchiveError::from_io(err, Path::new("a"));
        assert!(matches!(
            err,
            ArchiveError::DeclaredSizeExceeded { declared: 4, .. }
        ));
        // Nothing past the declared size reached the sink.
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn ratio_cap_trips_mid_stream() {
        let options = checked_options(0, 0, 4.0);
        let mut tracker = SizeTracker::new();
        let mut sink = Vec::new();
        // Stored size 10 with ratio 4.0 allows at most 40 output bytes.
        let mut writer = CheckedWriter::new(&mut sink, Path::new("a"), &options, &mut tracker)
            .stored_size(10);
        writer.write_all(&[0u8; 40]).unwrap();
        let err = writer.write_all(&[0u8; 1]).unwrap_err();
        let err = ArchiveError::from_io(err, Path::new("a"));
        assert!(matches!(err, ArchiveError::RatioExceeded { .. }));
    }

    #[test]
    fn caps_are_dormant_when_size_check_is_off() {
        let options = ArchiveOptions {
            size_check: false,
            max_file_size: 1,
            max_total_size: 1,
            max_ratio: 1.0,
            ..ArchiveOptions::default()
        };
        let mut tracker = SizeTracker::new();
        let mut sink = Vec::new();
        let mut writer = CheckedWriter::new(&mut sink, Path::new("a"), &options, &mut tracker)
            .stored_size(1);
        writer.write_all(&[0u8; 64]).unwrap();
        assert_eq!(sink.len(), 64);
    }

    #[test]
    fn post_entry_ratio_boundary() {
        let options = checked_options(0, 0, 5.0);
        // Exactly at the limit passes.
        check_ratio(Path::new("a"), 50, 10, &options).unwrap();
        // Above the limit fails.
        let err = check_ratio(Path::new("a"), 51, 10, &options).unwrap_err();
        assert!(matches!(err, ArchiveError::RatioExceeded { .. }));
    }
}
