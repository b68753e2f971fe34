//! ZLIB adapter: one raw RFC 1950 stream, no name or timestamp fields.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::archiver::{PackContext, ReadContext};
use crate::entry::{ArchiveSummary, Entry, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::formats::{single, ArchiveFormat};
use crate::fsx;
use crate::sanitize::sanitize_entry_path;

const EXTENSIONS: &[&str] = &[".zz", ".zlib", ".zl"];

pub(crate) fn pack(ctx: &PackContext, src: &Path, dst: &Path) -> Result<ArchiveSummary> {
    let meta = single::require_regular_file(src)?;
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    ctx.progress.begin_entry(Path::new(&name));
    let out = fsx::create_output_file(dst, ctx.options)?;
    let encoder = ZlibEncoder::new(BufWriter::new(out), ctx.options.level.to_flate2());

    let (copied, encoder) = single::pack_payload(ctx, src, meta.len(), encoder)?;
    let mut inner = encoder
        .finish()
        .map_err(|e| ArchiveError::from_io(e, dst))?;
    inner.flush().map_err(|e| ArchiveError::from_io(e, dst))?;
    ctx.progress.end_entry(Path::new(&name));

    let stored = std::fs::metadata(dst)
        .map_err(|e| ArchiveError::from_io(e, dst))?
        .len();
    let mut summary = ArchiveSummary::new(ArchiveFormat::Zlib);
    summary.push(Entry {
        path: PathBuf::from(name),
        size: copied,
        stored_size: stored,
        modified: fsx::modified_unix_secs(&meta),
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
    let mut decoder = ZlibDecoder::new(BufReader::new(file));

    // No name field in the stream; derive it from the archive's own name.
    let name = fsx::strip_archive_extension(src, EXTENSIONS)
        .to_string_lossy()
        .into_owned();
    let dest = sanitize_entry_path(target_dir, &name, ctx.options.skip_path_validation)?;
    let entry_path = PathBuf::from(&name);

    ctx.progress.begin_entry(&entry_path);
    let written =
        single::write_single_file(ctx, src, &dest, &entry_path, stored, &mut decoder, &[])?;
    ctx.progress.end_entry(&entry_path);

    let mut summary = ArchiveSummary::new(ArchiveFormat::Zlib);
    summary.push(Entry {
        path: entry_path,
        size: written,
        stored_size: stored,
        modified: None,
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
    let mut decoder = ZlibDecoder::new(BufReader::new(file));

    let size = single::measure_payload(ctx, src, &mut decoder)?;
    let name = fsx::strip_archive_extension(src, EXTENSIONS)
        .to_string_lossy()
        .into_owned();

    let mut summary = ArchiveSummary::new(ArchiveFormat::Zlib);
    summary.push(Entry {
        path: PathBuf::from(name),
        size,
        stored_size: stored,
        modified: None,
        mode: None,
        kind: EntryKind::File,
        link_target: None,
    });
    Ok(summary)
}
