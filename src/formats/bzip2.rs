//! BZIP2 adapter: read side only. Streams are unpacked and listed; creating
//! them is rejected at the dispatch level.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;

use crate::archiver::ReadContext;
use crate::entry::{ArchiveSummary, Entry, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::formats::{single, ArchiveFormat};
use crate::fsx;
use crate::sanitize::sanitize_entry_path;

const EXTENSIONS: &[&str] = &[".bz2", ".bzip2"];

pub(crate) fn unpack(ctx: &ReadContext, src: &Path, target_dir: &Path) -> Result<ArchiveSummary> {
    let stored = std::fs::metadata(src)
        .map_err(|e| ArchiveError::from_io(e, src))?
        .len();
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let mut decoder = BzDecoder::new(BufReader::new(file));

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

    let mut summary = ArchiveSummary::new(ArchiveFormat::Bzip2);
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
    let mut decoder = BzDecoder::new(BufReader::new(file));

    let size = single::measure_payload(ctx, src, &mut decoder)?;
    let name = fsx::strip_archive_extension(src, EXTENSIONS)
        .to_string_lossy()
        .into_owned();

    let mut summary = ArchiveSummary::new(ArchiveFormat::Bzip2);
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
