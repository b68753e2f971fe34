//! GZIP adapter: one RFC 1952 member with an optional stored name/mtime.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::GzBuilder;

use crate::archiver::{PackContext, ReadContext};
use crate::entry::{ArchiveSummary, Entry, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::formats::{single, ArchiveFormat};
use crate::fsx;
use crate::memory_pool::buffer_size_for;
use crate::sanitize::sanitize_entry_path;

const EXTENSIONS: &[&str] = &[".gz"];

pub(crate) fn pack(ctx: &PackContext, src: &Path, dst: &Path) -> Result<ArchiveSummary> {
    let meta = single::require_regular_file(src)?;
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mtime = fsx::modified_unix_secs(&meta);

    ctx.progress.begin_entry(Path::new(&name));
    let out = fsx::create_output_file(dst, ctx.options)?;
    let encoder = GzBuilder::new()
        .filename(name.as_bytes())
        .mtime(mtime.unwrap_or(0) as u32)
        .write(BufWriter::new(out), ctx.options.level.to_flate2());

    let (copied, encoder) = single::pack_payload(ctx, src, meta.len(), encoder)?;
    let mut inner = encoder
        .finish()
        .map_err(|e| ArchiveError::from_io(e, dst))?;
    std::io::Write::flush(&mut inner).map_err(|e| ArchiveError::from_io(e, dst))?;
    ctx.progress.end_entry(Path::new(&name));

    let stored = std::fs::metadata(dst)
        .map_err(|e| ArchiveError::from_io(e, dst))?
        .len();
    let mut summary = ArchiveSummary::new(ArchiveFormat::Gzip);
    summary.push(Entry {
        path: PathBuf::from(name),
        size: copied,
        stored_size: stored,
        modified: mtime,
        mode: fsx::file_mode(&meta),
        kind: EntryKind::File,
        link_target: None,
    });
    Ok(summary)
}

pub(crate) fn unpack(ctx: &ReadContext, src: &Path, target_dir: &Path) -> Result<ArchiveSummary> {
    let stored = std::fs::metadata(src)
        .map_err(|e| ArchiveError::from_io(e, src))?
        .len();
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));

    // The name header is parsed lazily; pull the first chunk before
    // resolving the output path.
    let mut head = ctx.pool.acquire(buffer_size_for(stored));
    let head_len = read_chunk(&mut decoder, &mut head, src)?;
    let (name, mtime) = recorded_metadata(&decoder, src);

    let dest = sanitize_entry_path(target_dir, &name, ctx.options.skip_path_validation)?;
    let entry_path = PathBuf::from(&name);

    ctx.progress.begin_entry(&entry_path);
    let written = single::write_single_file(
        ctx,
        src,
        &dest,
        &entry_path,
        stored,
        &mut decoder,
        &head[..head_len],
    )?;
    ctx.progress.end_entry(&entry_path);

    let mut summary = ArchiveSummary::new(ArchiveFormat::Gzip);
    summary.push(Entry {
        path: entry_path,
        size: written,
        stored_size: stored,
        modified: mtime,
        mode: None,
        kind: EntryKind::File,
        link_target: None,
    });
    Ok(summary)
}

pub(crate) fn list(ctx: &ReadContext, src: &Path) -> Result<ArchiveSummary> {
    let stored = std::fs::metadata(src)
        .map_err(|e| ArchiveError::from_io(e, src))?
        .len();
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));

    let size = single::measure_payload(ctx, src, &mut decoder)?;
    let (name, mtime) = recorded_metadata(&decoder, src);

    let mut summary = ArchiveSummary::new(ArchiveFormat::Gzip);
    summary.push(Entry {
        path: PathBuf::from(name),
        size,
        stored_size: stored,
        modified: mtime,
        mode: None,
        kind: EntryKind::File,
        link_target: None,
    });
    Ok(summary)
}

/// Name and mtime from the GZIP header, with the name falling back to the
/// archive's own file name minus its extension.
fn recorded_metadata<R: Read>(decoder: &GzDecoder<R>, src: &Path) -> (String, Option<u64>) {
    let header = decoder.header();
    let name = header
        .and_then(|h| h.filename())
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            fsx::strip_archive_extension(src, EXTENSIONS)
                .to_string_lossy()
                .into_owned()
        });
    let mtime = header
        .map(|h| h.mtime())
        .filter(|&m| m > 0)
        .map(u64::from);
    (name, mtime)
}

fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8], src: &Path) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::from_io(e, src)),
        }
    }
}
