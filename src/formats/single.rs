//! Shared plumbing for the single-stream formats (GZIP, BZIP2, ZLIB).
//!
//! These containers hold exactly one compressed payload and no internal
//! directory, so packing takes a single regular file and unpacking
//! synthesizes one output file under the target directory.

use std::fs::{File, Metadata};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::archiver::{PackContext, ReadContext};
use crate::error::{ArchiveError, Result};
use crate::fsx;
use crate::limits::{check_ratio, CheckedWriter, SizeTracker};
use crate::memory_pool::{buffer_size_for, copy_through};

/// Single-stream packing accepts exactly one regular file as its source.
pub(crate) fn require_regular_file(src: &Path) -> Result<Metadata> {
    let meta = std::fs::symlink_metadata(src).map_err(|e| ArchiveError::from_io(e, src))?;
    if !meta.is_file() {
        return Err(ArchiveError::InvalidArgument(format!(
            "'{}' is not a regular file; single-stream formats hold exactly one file",
            src.display()
        )));
    }
    Ok(meta)
}

/// Stream `src`'s bytes into `encoder` through a pooled buffer, returning
/// the byte count and the encoder for finalization.
pub(crate) fn pack_payload<W: Write>(
    ctx: &PackContext,
    src: &Path,
    size_hint: u64,
    mut encoder: W,
) -> Result<(u64, W)> {
    let mut file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let mut buf = ctx.pool.acquire(buffer_size_for(size_hint));
    let copied =
        copy_through(&mut file, &mut encoder, &mut buf).map_err(|e| ArchiveError::from_io(e, src))?;
    Ok((copied, encoder))
}

/// Decompress one payload into `dest` under full size/ratio policy.
///
/// `prefix` carries bytes the caller already pulled from the decoder (GZIP
/// parses its name header lazily, so the first chunk is read before the
/// output path is known). Returns the decompressed byte count.
pub(crate) fn write_single_file(
    ctx: &ReadContext,
    archive: &Path,
    dest: &Path,
    entry: &Path,
    stored: u64,
    decoder: &mut dyn Read,
    prefix: &[u8],
) -> Result<u64> {
    let out = fsx::create_output_file(dest, ctx.options)?;
    let mut tracker = SizeTracker::new();
    let mut checked = CheckedWriter::new(BufWriter::new(out), entry, ctx.options, &mut tracker)
        .stored_size(stored);

    checked
        .write_all(prefix)
        .map_err(|e| ArchiveError::from_io(e, archive))?;
    let mut buf = ctx.pool.acquire(buffer_size_for(stored.saturating_mul(4)));
    copy_through(decoder, &mut checked, &mut buf).map_err(|e| ArchiveError::from_io(e, archive))?;
    checked
        .flush()
        .map_err(|e| ArchiveError::from_io(e, archive))?;

    let written = checked.entry_written();
    check_ratio(entry, written, stored, ctx.options)?;
    Ok(written)
}

/// Decompress-and-discard pass used by listing: single-stream headers do not
/// record the original size, so it has to be measured.
pub(crate) fn measure_payload(
    ctx: &ReadContext,
    archive: &Path,
    decoder: &mut dyn Read,
) -> Result<u64> {
    let mut buf = ctx.pool.acquire(buffer_size_for(1 << 20));
    let mut sink = io::sink();
    copy_through(decoder, &mut sink, &mut buf).map_err(|e| ArchiveError::from_io(e, archive))
}
