//! ZIP adapter. Entries carry a central directory with per-entry sizes,
//! timestamps and Unix modes, so both the declared-size and the per-entry
//! ratio caps can be armed before the first payload byte moves.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Timelike};
use tracing::warn;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::archiver::{walk_source, PackContext, ReadContext};
use crate::entry::{ArchiveSummary, Entry, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::formats::ArchiveFormat;
use crate::fsx;
use crate::limits::{check_ratio, CheckedWriter, SizeTracker};
use crate::memory_pool::{buffer_size_for, copy_through};
use crate::options::CompressionLevel;
use crate::sanitize::sanitize_entry_path;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub(crate) fn pack(ctx: &PackContext, src: &Path, dst: &Path) -> Result<ArchiveSummary> {
    let items = walk_source(src, ctx.filter)?;
    let out = fsx::create_output_file(dst, ctx.options)?;
    let mut writer = ZipWriter::new(BufWriter::new(out));
    let mut entries: Vec<Entry> = Vec::new();

    for item in &items {
        let name = fsx::entry_name(&item.rel);
        let opts = entry_options(ctx, &item.meta);
        ctx.progress.begin_entry(&item.rel);
        match item.kind() {
            EntryKind::Directory => {
                writer
                    .add_directory(name.as_str(), opts)
                    .map_err(|e| zip_err(e, dst))?;
                entries.push(Entry {
                    path: item.rel.clone(),
                    size: 0,
                    stored_size: 0,
                    modified: fsx::modified_unix_secs(&item.meta),
                    mode: fsx::file_mode(&item.meta),
                    kind: EntryKind::Directory,
                    link_target: None,
                });
            }
            EntryKind::File => {
                writer
                    .start_file(name.as_str(), opts)
                    .map_err(|e| zip_err(e, dst))?;
                let mut file =
                    File::open(&item.abs).map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                let mut buf = ctx.pool.acquire(buffer_size_for(item.meta.len()));
                let copied = copy_through(&mut file, &mut writer, &mut buf)
                    .map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                entries.push(Entry {
                    path: item.rel.clone(),
                    size: copied,
                    stored_size: 0,
                    modified: fsx::modified_unix_secs(&item.meta),
                    mode: fsx::file_mode(&item.meta),
                    kind: EntryKind::File,
                    link_target: None,
                });
            }
            EntryKind::Symlink => {
                let target = std::fs::read_link(&item.abs)
                    .map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                let target_text = target.to_string_lossy().into_owned();
                writer
                    .add_symlink(name.as_str(), target_text.as_str(), opts)
                    .map_err(|e| zip_err(e, dst))?;
                entries.push(Entry {
                    path: item.rel.clone(),
                    size: target_text.len() as u64,
                    stored_size: 0,
                    modified: fsx::modified_unix_secs(&item.meta),
                    mode: fsx::file_mode(&item.meta),
                    kind: EntryKind::Symlink,
                    link_target: Some(target),
                });
            }
            _ => {
                warn!(path = %item.abs.display(), "skipping special file");
            }
        }
        ctx.progress.end_entry(&item.rel);
    }

    let mut inner = writer.finish().map_err(|e| zip_err(e, dst))?;
    inner.flush().map_err(|e| ArchiveError::from_io(e, dst))?;
    drop(inner);

    // Compressed sizes are only known once the central directory is written;
    // read them back so the pack summary agrees with a later listing. Written
    // entries and summary entries align one to one (skipped specials appear
    // in neither).
    let file = File::open(dst).map_err(|e| ArchiveError::from_io(e, dst))?;
    let mut written = ZipArchive::new(BufReader::new(file)).map_err(|e| zip_err(e, dst))?;
    let mut summary = ArchiveSummary::new(ArchiveFormat::Zip);
    for (index, mut entry) in entries.into_iter().enumerate() {
        if index < written.len() {
            entry.stored_size = written
                .by_index(index)
                .map_err(|e| zip_err(e, dst))?
                .compressed_size();
        }
        summary.push(entry);
    }
    Ok(summary)
}

pub(crate) fn unpack(ctx: &ReadContext, src: &Path, target_dir: &Path) -> Result<ArchiveSummary> {
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| zip_err(e, src))?;

    let mut summary = ArchiveSummary::new(ArchiveFormat::Zip);
    let mut tracker = SizeTracker::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| zip_err(e, src))?;
        let name = entry.name().to_string();
        let dest = sanitize_entry_path(target_dir, &name, ctx.options.skip_path_validation)?;
        let entry_path = PathBuf::from(&name);

        let declared = entry.size();
        let stored = entry.compressed_size();
        let mode = entry.unix_mode().map(|m| m & 0o7777);
        let mtime = unix_secs_from_zip(entry.last_modified());
        let kind = entry_kind(entry.is_dir(), entry.unix_mode());

        ctx.progress.begin_entry(&entry_path);
        match kind {
            EntryKind::Directory => {
                std::fs::create_dir_all(&dest).map_err(|e| ArchiveError::from_io(e, &dest))?;
                if let Some(mode) = mode {
                    let _ = fsx::set_unix_permissions(&dest, mode);
                }
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: 0,
                    stored_size: 0,
                    modified: mtime,
                    mode,
                    kind: EntryKind::Directory,
                    link_target: None,
                });
            }
            EntryKind::Symlink => {
                let target =
                    read_link_payload(ctx, &mut entry, &entry_path, declared, stored, &mut tracker)?;
                fsx::prepare_link_site(&dest, ctx.options)?;
                fsx::make_symlink(&target, &dest).map_err(|e| ArchiveError::from_io(e, &dest))?;
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: declared,
                    stored_size: stored,
                    modified: mtime,
                    mode,
                    kind: EntryKind::Symlink,
                    link_target: Some(target),
                });
            }
            _ => {
                let out = fsx::create_output_file(&dest, ctx.options)?;
                let mut checked =
                    CheckedWriter::new(BufWriter::new(out), &entry_path, ctx.options, &mut tracker)
                        .declared_size(declared)
                        .stored_size(stored);

                let mut buf = ctx.pool.acquire(buffer_size_for(declared));
                copy_through(&mut entry, &mut checked, &mut buf)
                    .map_err(|e| ArchiveError::from_io(e, src))?;
                checked
                    .flush()
                    .map_err(|e| ArchiveError::from_io(e, src))?;
                let written = checked.entry_written();
                drop(checked);

                if let Some(mode) = mode {
                    let _ = fsx::set_unix_permissions(&dest, mode);
                }
                check_ratio(&entry_path, written, stored, ctx.options)?;
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: written,
                    stored_size: stored,
                    modified: mtime,
                    mode,
                    kind: EntryKind::File,
                    link_target: None,
                });
            }
        }
        ctx.progress.end_entry(&entry_path);
    }
    Ok(summary)
}

pub(crate) fn list(ctx: &ReadContext, src: &Path) -> Result<ArchiveSummary> {
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| zip_err(e, src))?;

    let mut summary = ArchiveSummary::new(ArchiveFormat::Zip);
    let mut tracker = SizeTracker::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| zip_err(e, src))?;
        let entry_path = PathBuf::from(entry.name());
        let kind = entry_kind(entry.is_dir(), entry.unix_mode());
        let declared = entry.size();
        let compressed = entry.compressed_size();
        let link = if kind == EntryKind::Symlink {
            Some(read_link_payload(
                ctx,
                &mut entry,
                &entry_path,
                declared,
                compressed,
                &mut tracker,
            )?)
        } else {
            None
        };
        let (size, stored) = match kind {
            EntryKind::File | EntryKind::Symlink => (declared, compressed),
            _ => (0, 0),
        };
        summary.push(Entry {
            path: entry_path,
            size,
            stored_size: stored,
            modified: unix_secs_from_zip(entry.last_modified()),
            mode: entry.unix_mode().map(|m| m & 0o7777),
            kind,
            link_target: link,
        });
    }
    Ok(summary)
}

fn entry_options(ctx: &PackContext, meta: &std::fs::Metadata) -> FileOptions {
    let mut opts = FileOptions::default();
    opts = match ctx.options.level {
        CompressionLevel::None => opts.compression_method(CompressionMethod::Stored),
        level => opts
            .compression_method(CompressionMethod::Deflated)
            .compression_level(level.zip_deflate_level()),
    };
    if let Some(mode) = fsx::file_mode(meta) {
        opts = opts.unix_permissions(mode);
    }
    if let Some(dt) = fsx::modified_unix_secs(meta).and_then(zip_datetime_from_unix) {
        opts = opts.last_modified_time(dt);
    }
    opts
}

fn entry_kind(is_dir: bool, unix_mode: Option<u32>) -> EntryKind {
    if is_dir {
        EntryKind::Directory
    } else if unix_mode.map_or(false, |m| m & S_IFMT == S_IFLNK) {
        EntryKind::Symlink
    } else {
        EntryKind::File
    }
}

/// A ZIP symlink stores its target as the entry payload.
///
/// The payload lands in memory instead of a file, so it runs through the
/// same validating writer as file entries: the declared size, the size caps
/// and the ratio cap all apply, and the bytes count toward the running
/// total.
fn read_link_payload<R: Read>(
    ctx: &ReadContext,
    reader: &mut R,
    entry: &Path,
    declared: u64,
    stored: u64,
    tracker: &mut SizeTracker,
) -> Result<PathBuf> {
    let mut raw = Vec::new();
    let mut checked = CheckedWriter::new(&mut raw, entry, ctx.options, tracker)
        .declared_size(declared)
        .stored_size(stored);
    let mut buf = ctx.pool.acquire(buffer_size_for(declared));
    copy_through(reader, &mut checked, &mut buf).map_err(|e| ArchiveError::from_io(e, entry))?;
    drop(checked);
    Ok(PathBuf::from(String::from_utf8_lossy(&raw).into_owned()))
}

fn zip_datetime_from_unix(secs: u64) -> Option<zip::DateTime> {
    let dt = chrono::DateTime::from_timestamp(secs as i64, 0)?.naive_utc();
    zip::DateTime::from_date_and_time(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
    )
    .ok()
}

fn unix_secs_from_zip(dt: zip::DateTime) -> Option<u64> {
    let date =
        chrono::NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))?;
    let time = date.and_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?;
    let secs = time.and_utc().timestamp();
    u64::try_from(secs).ok()
}

fn zip_err(err: ZipError, path: &Path) -> ArchiveError {
    match err {
        ZipError::Io(e) => ArchiveError::from_io(e, path),
        other => ArchiveError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    }
}
