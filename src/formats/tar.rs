//! TAR adapter, covering plain `.tar` and gzip-compressed `.tar.gz`.
//!
//! Packing drives a `tar::Builder` over the walked source tree; unpacking
//! iterates entries manually instead of using the crate's own `unpack` so
//! every destination path goes through sanitization and every payload
//! through the checked writer.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::EntryType;
use tracing::warn;

use crate::archiver::{walk_source, PackContext, ReadContext};
use crate::entry::{ArchiveSummary, Entry, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::formats::ArchiveFormat;
use crate::fsx;
use crate::limits::{CheckedWriter, SizeTracker};
use crate::memory_pool::{buffer_size_for, copy_through};
use crate::sanitize::sanitize_entry_path;

/// Stream codec wrapped around the TAR container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TarCodec {
    Plain,
    Gzip,
}

impl TarCodec {
    fn format(self) -> ArchiveFormat {
        match self {
            TarCodec::Plain => ArchiveFormat::Tar,
            TarCodec::Gzip => ArchiveFormat::Tgz,
        }
    }
}

pub(crate) fn pack(
    ctx: &PackContext,
    src: &Path,
    dst: &Path,
    codec: TarCodec,
) -> Result<ArchiveSummary> {
    let items = walk_source(src, ctx.filter)?;
    let out = fsx::create_output_file(dst, ctx.options)?;
    let mut summary = ArchiveSummary::new(codec.format());

    match codec {
        TarCodec::Plain => {
            let writer = append_items(ctx, &items, dst, BufWriter::new(out), &mut summary)?;
            finish_writer(writer, dst)?;
        }
        TarCodec::Gzip => {
            let encoder = GzEncoder::new(BufWriter::new(out), ctx.options.level.to_flate2());
            let encoder = append_items(ctx, &items, dst, encoder, &mut summary)?;
            let inner = encoder
                .finish()
                .map_err(|e| ArchiveError::from_io(e, dst))?;
            finish_writer(inner, dst)?;
        }
    }
    Ok(summary)
}

fn finish_writer<W: Write>(mut writer: W, dst: &Path) -> Result<()> {
    writer.flush().map_err(|e| ArchiveError::from_io(e, dst))
}

fn append_items<W: Write>(
    ctx: &PackContext,
    items: &[crate::archiver::WalkItem],
    dst: &Path,
    writer: W,
    summary: &mut ArchiveSummary,
) -> Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for item in items {
        ctx.progress.begin_entry(&item.rel);
        match item.kind() {
            EntryKind::Directory => {
                builder
                    .append_dir(&item.rel, &item.abs)
                    .map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                summary.push(Entry {
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
                let mut header = tar::Header::new_gnu();
                header.set_metadata(&item.meta);
                let file =
                    File::open(&item.abs).map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                builder
                    .append_data(&mut header, &item.rel, file)
                    .map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                summary.push(Entry {
                    path: item.rel.clone(),
                    size: item.meta.len(),
                    stored_size: item.meta.len(),
                    modified: fsx::modified_unix_secs(&item.meta),
                    mode: fsx::file_mode(&item.meta),
                    kind: EntryKind::File,
                    link_target: None,
                });
            }
            EntryKind::Symlink => {
                let target = std::fs::read_link(&item.abs)
                    .map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                let mut header = tar::Header::new_gnu();
                header.set_metadata(&item.meta);
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                builder
                    .append_link(&mut header, &item.rel, &target)
                    .map_err(|e| ArchiveError::from_io(e, &item.abs))?;
                summary.push(Entry {
                    path: item.rel.clone(),
                    size: 0,
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

    builder
        .into_inner()
        .map_err(|e| ArchiveError::from_io(e, dst))
}

pub(crate) fn unpack(
    ctx: &ReadContext,
    src: &Path,
    target_dir: &Path,
    codec: TarCodec,
) -> Result<ArchiveSummary> {
    let stream_stored = std::fs::metadata(src)
        .map_err(|e| ArchiveError::from_io(e, src))?
        .len();
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let reader: Box<dyn Read> = match codec {
        TarCodec::Plain => Box::new(BufReader::new(file)),
        TarCodec::Gzip => Box::new(GzDecoder::new(BufReader::new(file))),
    };
    let mut archive = tar::Archive::new(reader);

    // Per-entry stored sizes are only meaningful for a plain container; a
    // gzip-wrapped stream gets a ratio cap on the running total instead.
    let per_entry_stored = codec == TarCodec::Plain;

    let mut summary = ArchiveSummary::new(codec.format());
    let mut tracker = SizeTracker::new();

    for entry in archive.entries().map_err(|e| ArchiveError::from_io(e, src))? {
        let mut entry = entry.map_err(|e| ArchiveError::from_io(e, src))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let dest = sanitize_entry_path(target_dir, &name, ctx.options.skip_path_validation)?;
        let entry_path = PathBuf::from(&name);

        let header = entry.header();
        let entry_type = header.entry_type();
        let size = header.size().map_err(|e| ArchiveError::from_io(e, src))?;
        let mode = header.mode().ok();
        let mtime = header.mtime().ok();

        ctx.progress.begin_entry(&entry_path);
        match entry_type {
            EntryType::Directory => {
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
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                let out = fsx::create_output_file(&dest, ctx.options)?;
                let checked =
                    CheckedWriter::new(BufWriter::new(out), &entry_path, ctx.options, &mut tracker)
                        .declared_size(size);
                let mut checked = if per_entry_stored {
                    checked.stored_size(size)
                } else {
                    checked.stream_stored_size(stream_stored)
                };

                let mut buf = ctx.pool.acquire(buffer_size_for(size));
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
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: written,
                    stored_size: if per_entry_stored { written } else { 0 },
                    modified: mtime,
                    mode,
                    kind: EntryKind::File,
                    link_target: None,
                });
            }
            EntryType::Symlink => {
                let target = link_target(&entry, src)?;
                fsx::prepare_link_site(&dest, ctx.options)?;
                fsx::make_symlink(&target, &dest).map_err(|e| ArchiveError::from_io(e, &dest))?;
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: 0,
                    stored_size: 0,
                    modified: mtime,
                    mode,
                    kind: EntryKind::Symlink,
                    link_target: Some(target),
                });
            }
            EntryType::Link => {
                let target = link_target(&entry, src)?;
                // Hardlink sources must stay inside the target directory too.
                let source = sanitize_entry_path(
                    target_dir,
                    &target.to_string_lossy(),
                    ctx.options.skip_path_validation,
                )?;
                fsx::prepare_link_site(&dest, ctx.options)?;
                std::fs::hard_link(&source, &dest)
                    .map_err(|e| ArchiveError::from_io(e, &dest))?;
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: 0,
                    stored_size: 0,
                    modified: mtime,
                    mode,
                    kind: EntryKind::Hardlink,
                    link_target: Some(target),
                });
            }
            other => {
                warn!(path = %entry_path.display(), kind = ?other, "skipping special entry");
                summary.push(Entry {
                    path: entry_path.clone(),
                    size: 0,
                    stored_size: 0,
                    modified: mtime,
                    mode,
                    kind: EntryKind::Other,
                    link_target: None,
                });
            }
        }
        ctx.progress.end_entry(&entry_path);
    }
    Ok(summary)
}

pub(crate) fn list(_ctx: &ReadContext, src: &Path, codec: TarCodec) -> Result<ArchiveSummary> {
    let file = File::open(src).map_err(|e| ArchiveError::from_io(e, src))?;
    let reader: Box<dyn Read> = match codec {
        TarCodec::Plain => Box::new(BufReader::new(file)),
        TarCodec::Gzip => Box::new(GzDecoder::new(BufReader::new(file))),
    };
    let mut archive = tar::Archive::new(reader);

    let mut summary = ArchiveSummary::new(codec.format());
    for entry in archive.entries().map_err(|e| ArchiveError::from_io(e, src))? {
        let entry = entry.map_err(|e| ArchiveError::from_io(e, src))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let header = entry.header();
        let size = header.size().map_err(|e| ArchiveError::from_io(e, src))?;
        let kind = kind_of(header.entry_type());
        let link = match kind {
            EntryKind::Symlink | EntryKind::Hardlink => {
                Some(link_target(&entry, src)?)
            }
            _ => None,
        };
        summary.push(Entry {
            path: PathBuf::from(name),
            size: if kind == EntryKind::File { size } else { 0 },
            stored_size: if kind == EntryKind::File && codec == TarCodec::Plain {
                size
            } else {
                0
            },
            modified: header.mtime().ok(),
            mode: header.mode().ok(),
            kind,
            link_target: link,
        });
    }
    Ok(summary)
}

fn kind_of(entry_type: EntryType) -> EntryKind {
    match entry_type {
        EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => EntryKind::File,
        EntryType::Directory => EntryKind::Directory,
        EntryType::Symlink => EntryKind::Symlink,
        EntryType::Link => EntryKind::Hardlink,
        _ => EntryKind::Other,
    }
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, src: &Path) -> Result<PathBuf> {
    entry
        .link_name()
        .map_err(|e| ArchiveError::from_io(e, src))?
        .map(|cow| cow.into_owned())
        .ok_or_else(|| {
            ArchiveError::InvalidArgument(format!(
                "link entry in '{}' has no target",
                src.display()
            ))
        })
}
