//! The engine entry points: format dispatch and the shared pack-side walk.
//!
//! An [`Archiver`] owns the buffer pool and routes each call to the matching
//! format adapter. Every call runs synchronously on the caller's thread;
//! distinct calls on distinct archive paths are independent and may run
//! concurrently, sharing only the pool.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::entry::{ArchiveSummary, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::filter::{KeepAll, PackFilter};
use crate::formats::tar::TarCodec;
use crate::formats::{self, ArchiveFormat};
use crate::memory_pool::BufferPool;
use crate::options::ArchiveOptions;
use crate::progress::{NullProgress, ProgressSink};

/// Per-call context handed to the pack side of each adapter.
pub(crate) struct PackContext<'a> {
    pub options: &'a ArchiveOptions,
    pub pool: &'a BufferPool,
    pub progress: &'a dyn ProgressSink,
    pub filter: &'a dyn PackFilter,
}

/// Per-call context handed to the unpack/list side of each adapter.
pub(crate) struct ReadContext<'a> {
    pub options: &'a ArchiveOptions,
    pub pool: &'a BufferPool,
    pub progress: &'a dyn ProgressSink,
}

/// One filesystem object selected for packing.
#[derive(Debug)]
pub(crate) struct WalkItem {
    /// Absolute (as-given) path on disk.
    pub abs: PathBuf,
    /// Path relative to the pack root, used as the archive entry name.
    pub rel: PathBuf,
    /// Metadata from `symlink_metadata`: symlinks are recorded, not followed.
    pub meta: Metadata,
}

impl WalkItem {
    pub(crate) fn kind(&self) -> EntryKind {
        let file_type = self.meta.file_type();
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// Enumerate the source in physical on-disk walk order, consulting the pack
/// filter for every candidate. A filtered-out entry is omitted entirely.
pub(crate) fn walk_source(src: &Path, filter: &dyn PackFilter) -> Result<Vec<WalkItem>> {
    let meta = std::fs::symlink_metadata(src).map_err(|e| ArchiveError::from_io(e, src))?;

    if !meta.is_dir() {
        let rel = PathBuf::from(
            src.file_name()
                .ok_or_else(|| ArchiveError::InvalidArgument(format!(
                    "source path '{}' has no file name",
                    src.display()
                )))?,
        );
        if !filter.include(&rel, meta.len(), false) {
            return Ok(Vec::new());
        }
        return Ok(vec![WalkItem {
            abs: src.to_path_buf(),
            rel,
            meta,
        }]);
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| src.to_path_buf());
            match e.into_io_error() {
                Some(io_err) => ArchiveError::from_io(io_err, &path),
                None => ArchiveError::InvalidArgument(format!(
                    "walk loop detected under '{}'",
                    path.display()
                )),
            }
        })?;
        let meta = entry.metadata().map_err(|e| {
            let path = entry.path().to_path_buf();
            match e.into_io_error() {
                Some(io_err) => ArchiveError::from_io(io_err, &path),
                None => ArchiveError::InvalidArgument(format!(
                    "walk loop detected under '{}'",
                    path.display()
                )),
            }
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| {
                ArchiveError::InvalidArgument(format!(
                    "walked path '{}' is outside the source root",
                    entry.path().display()
                ))
            })?
            .to_path_buf();
        if !filter.include(&rel, meta.len(), meta.is_dir()) {
            continue;
        }
        items.push(WalkItem {
            abs: entry.path().to_path_buf(),
            rel,
            meta,
        });
    }
    Ok(items)
}

/// Packs, unpacks and lists archives across the supported formats.
///
/// Owns the buffer pool shared by its operations; everything else is scoped
/// to one call. `Archiver` is cheap to create and may be shared across
/// threads.
#[derive(Debug, Default)]
pub struct Archiver {
    pool: BufferPool,
}

impl Archiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack `src` (a file or directory tree) into the archive at `dst`,
    /// with the format chosen from `dst`'s extension.
    pub fn pack(&self, src: &Path, dst: &Path, options: &ArchiveOptions) -> Result<ArchiveSummary> {
        self.pack_with(src, dst, options, &NullProgress, &KeepAll)
    }

    /// [`pack`](Self::pack) with injected progress and filter collaborators.
    pub fn pack_with(
        &self,
        src: &Path,
        dst: &Path,
        options: &ArchiveOptions,
        progress: &dyn ProgressSink,
        filter: &dyn PackFilter,
    ) -> Result<ArchiveSummary> {
        require_path(src, "source")?;
        require_path(dst, "destination")?;
        if !src.exists() {
            return Err(ArchiveError::NotFound(src.to_path_buf()));
        }
        if dst.exists() && !options.overwrite {
            return Err(ArchiveError::AlreadyExists(dst.to_path_buf()));
        }
        let format = ArchiveFormat::from_path(dst).ok_or_else(|| {
            ArchiveError::UnsupportedFormat {
                path: dst.to_path_buf(),
                detail: "unrecognized archive extension".into(),
            }
        })?;

        debug!(format = %format, src = %src.display(), dst = %dst.display(), "pack");
        progress.begin_archive(dst);
        let ctx = PackContext {
            options,
            pool: &self.pool,
            progress,
            filter,
        };
        match format {
            ArchiveFormat::Zip => formats::zip::pack(&ctx, src, dst),
            ArchiveFormat::Tar => formats::tar::pack(&ctx, src, dst, TarCodec::Plain),
            ArchiveFormat::Tgz => formats::tar::pack(&ctx, src, dst, TarCodec::Gzip),
            ArchiveFormat::Gzip => formats::gzip::pack(&ctx, src, dst),
            ArchiveFormat::Bzip2 => Err(ArchiveError::UnsupportedFormat {
                path: dst.to_path_buf(),
                detail: "bzip2 archives can be unpacked and listed, not created".into(),
            }),
            ArchiveFormat::Zlib => formats::zlib::pack(&ctx, src, dst),
        }
    }

    /// Unpack the archive at `src` into `target_dir`, creating it if needed.
    pub fn unpack(
        &self,
        src: &Path,
        target_dir: &Path,
        options: &ArchiveOptions,
    ) -> Result<ArchiveSummary> {
        self.unpack_with(src, target_dir, options, &NullProgress)
    }

    /// [`unpack`](Self::unpack) with an injected progress sink.
    pub fn unpack_with(
        &self,
        src: &Path,
        target_dir: &Path,
        options: &ArchiveOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ArchiveSummary> {
        require_path(src, "source")?;
        require_path(target_dir, "target directory")?;
        if !src.exists() {
            return Err(ArchiveError::NotFound(src.to_path_buf()));
        }
        let format = ArchiveFormat::detect(src)?;

        std::fs::create_dir_all(target_dir).map_err(|e| ArchiveError::from_io(e, target_dir))?;

        debug!(format = %format, src = %src.display(), target = %target_dir.display(), "unpack");
        progress.begin_archive(src);
        let ctx = ReadContext {
            options,
            pool: &self.pool,
            progress,
        };
        match format {
            ArchiveFormat::Zip => formats::zip::unpack(&ctx, src, target_dir),
            ArchiveFormat::Tar => formats::tar::unpack(&ctx, src, target_dir, TarCodec::Plain),
            ArchiveFormat::Tgz => formats::tar::unpack(&ctx, src, target_dir, TarCodec::Gzip),
            ArchiveFormat::Gzip => formats::gzip::unpack(&ctx, src, target_dir),
            ArchiveFormat::Bzip2 => formats::bzip2::unpack(&ctx, src, target_dir),
            ArchiveFormat::Zlib => formats::zlib::unpack(&ctx, src, target_dir),
        }
    }

    /// Enumerate the archive at `src` without writing anything to disk.
    ///
    /// Single-stream formats have no size field in their headers, so listing
    /// them performs a full decompress-and-discard pass to measure the
    /// original size.
    pub fn list(&self, src: &Path) -> Result<ArchiveSummary> {
        require_path(src, "source")?;
        if !src.exists() {
            return Err(ArchiveError::NotFound(src.to_path_buf()));
        }
        let format = ArchiveFormat::detect(src)?;

        debug!(format = %format, src = %src.display(), "list");
        let options = ArchiveOptions::default();
        let ctx = ReadContext {
            options: &options,
            pool: &self.pool,
            progress: &NullProgress,
        };
        match format {
            ArchiveFormat::Zip => formats::zip::list(&ctx, src),
            ArchiveFormat::Tar => formats::tar::list(&ctx, src, TarCodec::Plain),
            ArchiveFormat::Tgz => formats::tar::list(&ctx, src, TarCodec::Gzip),
            ArchiveFormat::Gzip => formats::gzip::list(&ctx, src),
            ArchiveFormat::Bzip2 => formats::bzip2::list(&ctx, src),
            ArchiveFormat::Zlib => formats::zlib::list(&ctx, src),
        }
    }
}

fn require_path(path: &Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ArchiveError::InvalidArgument(format!("{what} path is empty")));
    }
    Ok(())
}
