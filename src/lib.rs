//! # Omnipack Core Library
//!
//! A format-uniform archive engine: the same pack, unpack and list calls
//! work across ZIP, TAR, TAR+GZIP, GZIP, BZIP2 and ZLIB archives, with the
//! format chosen from the destination extension when packing and detected
//! from the extension or the leading magic bytes when reading.
//!
//! Extraction is hardened by default. Entry names are validated against
//! path traversal before anything touches the disk, and the optional size
//! checks bound per-file output, whole-operation output and the
//! compression ratio to stop decompression bombs mid-stream.
//!
//! ## Key Modules
//!
//! - [`archiver`]: The engine entry points and format dispatch.
//! - [`formats`]: One adapter per supported container.
//! - [`sanitize`]: Entry-name validation against path traversal.
//! - [`memory_pool`]: Reusable copy buffers shared across operations.
//! - [`options`]: Per-call configuration.
//!
//! ## Examples
//!
//! ```no_run
//! use std::path::Path;
//! use omnipack::{Archiver, ArchiveOptions};
//!
//! # fn main() -> omnipack::Result<()> {
//! let archiver = Archiver::new();
//! archiver.pack(Path::new("photos"), Path::new("photos.zip"), &ArchiveOptions::default())?;
//! let summary = archiver.list(Path::new("photos.zip"))?;
//! println!("{} entries", summary.entry_count());
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod entry;
pub mod error;
pub use error::{ArchiveError, Result};

pub mod filter;
pub mod formats;
pub mod memory_pool;
pub mod options;
pub mod progress;
pub mod sanitize;

mod fsx;
mod limits;

pub use archiver::Archiver;
pub use entry::{ArchiveSummary, Entry, EntryKind};
pub use filter::{KeepAll, PackFilter};
pub use formats::ArchiveFormat;
pub use memory_pool::BufferPool;
pub use options::{ArchiveOptions, CompressionLevel};
pub use progress::{NullProgress, ProgressSink};
pub use sanitize::sanitize_entry_path;

use std::path::Path;

/// Pack `src` into the archive at `dst` with a one-off [`Archiver`].
pub fn pack(src: &Path, dst: &Path, options: &ArchiveOptions) -> Result<ArchiveSummary> {
    Archiver::new().pack(src, dst, options)
}

/// Unpack the archive at `src` into `target_dir` with a one-off [`Archiver`].
pub fn unpack(src: &Path, target_dir: &Path, options: &ArchiveOptions) -> Result<ArchiveSummary> {
    Archiver::new().unpack(src, target_dir, options)
}

/// List the archive at `src` with a one-off [`Archiver`].
pub fn list(src: &Path) -> Result<ArchiveSummary> {
    Archiver::new().list(src)
}
