use std::io;
use std::path::{Path, PathBuf};

/// The primary error type for all operations in the `omnipack` crate.
///
/// The first error raised during an operation aborts the remaining entries;
/// there is no partial-archive continuation and no automatic retry. Every
/// variant carries enough context (archive path, entry name, limit) for
/// precise diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A required argument was empty or otherwise unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The source archive or source tree does not exist.
    #[error("source not found: '{0}'")]
    NotFound(PathBuf),

    /// The destination exists and overwriting was not enabled.
    #[error("destination already exists: '{0}' (overwrite is disabled)")]
    AlreadyExists(PathBuf),

    /// The extension is unrecognized or the format reader rejected the header.
    #[error("unsupported archive format for '{path}': {detail}")]
    UnsupportedFormat { path: PathBuf, detail: String },

    /// An entry name resolves outside the target extraction directory.
    #[error("path traversal detected: entry '{entry}' escapes '{target}'")]
    PathTraversal { entry: PathBuf, target: PathBuf },

    /// A single entry exceeded the configured per-file size limit.
    #[error("entry '{entry}' exceeds the per-file size limit of {limit} bytes")]
    SizeLimitExceeded { entry: PathBuf, limit: u64 },

    /// The operation exceeded the configured total size limit.
    #[error("total size limit of {limit} bytes exceeded at entry '{entry}'")]
    TotalSizeExceeded { entry: PathBuf, limit: u64 },

    /// An entry's original:stored ratio exceeded the configured maximum.
    #[error("entry '{entry}' exceeds the compression ratio limit of {limit:.1}")]
    RatioExceeded { entry: PathBuf, limit: f64 },

    /// An entry produced more bytes than the size its own header declared.
    #[error("entry '{entry}' produced more bytes than its declared size of {declared}")]
    DeclaredSizeExceeded { entry: PathBuf, declared: u64 },

    /// An I/O error occurred, with the path where it happened.
    #[error("I/O error on path '{path}': {source}")]
    Io { source: io::Error, path: PathBuf },
}

impl ArchiveError {
    /// Wrap an I/O error with path context.
    ///
    /// Errors produced by the validating writer travel through `io::Error`
    /// (the `Write` trait leaves no other channel); those are unwrapped back
    /// into their original variant instead of being buried under `Io`.
    pub(crate) fn from_io(err: io::Error, path: &Path) -> Self {
        let is_ours = err
            .get_ref()
            .map(|inner| inner.is::<ArchiveError>())
            .unwrap_or(false);
        if is_ours {
            // Both unwraps are guarded by the check above.
            let inner = err.into_inner().unwrap();
            return *inner.downcast::<ArchiveError>().unwrap();
        }
        ArchiveError::Io {
            source: err,
            path: path.to_path_buf(),
        }
    }

    /// Smuggle this error through an `io::Error` for use inside `Write` impls.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::Other, self)
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_roundtrip_preserves_limit_variant() {
        let original = ArchiveError::SizeLimitExceeded {
            entry: PathBuf::from("a.txt"),
            limit: 42,
        };
        let io_err = original.into_io();
        let back = ArchiveError::from_io(io_err, Path::new("archive.zip"));
        assert!(matches!(
            back,
            ArchiveError::SizeLimitExceeded { limit: 42, .. }
        ));
    }

    #[test]
    fn plain_io_errors_gain_path_context() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let wrapped = ArchiveError::from_io(io_err, Path::new("/tmp/x"));
        match wrapped {
            ArchiveError::Io { path, .. } => assert_eq!(path, PathBuf::from("/tmp/x")),
            other => panic!("unexpected variant: {other}"),
        }
    }
}
