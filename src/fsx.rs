//! Small cross-platform filesystem helpers shared by the format adapters.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};
use crate::options::ArchiveOptions;

/// Set POSIX permission bits on Unix; no-op elsewhere.
#[cfg(unix)]
pub(crate) fn set_unix_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_unix_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Create a symbolic link pointing at `target`.
#[cfg(unix)]
pub(crate) fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    // Archives rarely mark directory symlinks as such; file symlinks cover
    // the common case.
    std::os::windows::fs::symlink_file(target, link)
}

/// Unix permission bits from filesystem metadata, if the platform has them.
#[cfg(unix)]
pub(crate) fn file_mode(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub(crate) fn file_mode(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}

/// Modification time as seconds since the Unix epoch.
pub(crate) fn modified_unix_secs(meta: &std::fs::Metadata) -> Option<u64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

/// Open `path` for writing, honoring the overwrite policy and creating
/// parent directories as needed. An existing destination with overwrite
/// disabled fails before any byte of it is touched.
pub(crate) fn create_output_file(path: &Path, options: &ArchiveOptions) -> Result<File> {
    if path.exists() && !options.overwrite {
        return Err(ArchiveError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::from_io(e, parent))?;
        }
    }
    File::create(path).map_err(|e| ArchiveError::from_io(e, path))
}

/// Clear the way for a link about to be created at `path`: parents exist,
/// and any previous occupant is gone (or refused, per the overwrite policy).
pub(crate) fn prepare_link_site(path: &Path, options: &ArchiveOptions) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::from_io(e, parent))?;
        }
    }
    if std::fs::symlink_metadata(path).is_ok() {
        if !options.overwrite {
            return Err(ArchiveError::AlreadyExists(path.to_path_buf()));
        }
        std::fs::remove_file(path).map_err(|e| ArchiveError::from_io(e, path))?;
    }
    Ok(())
}

/// Archive-internal entry name for a relative path: `/`-separated on every
/// platform.
pub(crate) fn entry_name(rel: &Path) -> String {
    let mut name = String::new();
    for component in rel.components() {
        if !name.is_empty() {
            name.push('/');
        }
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

/// Strip a known archive extension from a file name, used to derive the
/// output name of single-stream archives that do not record one.
pub(crate) fn strip_archive_extension(archive: &Path, extensions: &[&str]) -> PathBuf {
    if let Some(name) = archive.file_name().and_then(|n| n.to_str()) {
        let lower = name.to_ascii_lowercase();
        for ext in extensions {
            if lower.len() > ext.len() && lower.ends_with(ext) {
                return PathBuf::from(&name[..name.len() - ext.len()]);
            }
        }
        return PathBuf::from(format!("{name}.out"));
    }
    PathBuf::from("output.out")
}
