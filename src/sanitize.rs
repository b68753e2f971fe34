//! Entry-name validation against path traversal (zip-slip).
//!
//! Archive entry names are attacker-controlled. Every name is normalized and
//! lexically resolved before extraction, and the resolved path must stay
//! inside the target directory. Validation is purely lexical; nothing here
//! touches the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::{ArchiveError, Result};

/// Map an archive entry name to a safe extraction path under `target_dir`.
///
/// Rules:
/// - separators are normalized (`\` is treated as `/`) before analysis;
/// - absolute names, drive-letter names (`C:...`) and UNC-style `//` prefixes
///   are rejected outright;
/// - `.` segments are dropped and `..` segments are resolved, then the joined
///   path must still be prefixed by the cleaned target directory — this
///   catches disguised traversal like `a/../../b` and a bare trailing `..`;
/// - an empty name or `"."` refers to the target directory itself.
///
/// With `skip_validation` set the naive join is returned unchecked. This is
/// an explicit opt-out for trusted inputs, not a default.
pub fn sanitize_entry_path(
    target_dir: &Path,
    entry_name: &str,
    skip_validation: bool,
) -> Result<PathBuf> {
    if skip_validation {
        return Ok(target_dir.join(entry_name));
    }

    let normalized = entry_name.replace('\\', "/");
    if normalized.is_empty() || normalized == "." {
        return Ok(target_dir.to_path_buf());
    }

    let traversal = || ArchiveError::PathTraversal {
        entry: PathBuf::from(entry_name),
        target: target_dir.to_path_buf(),
    };

    // Absolute and UNC-style prefixes never belong in an entry name.
    if normalized.starts_with('/') {
        return Err(traversal());
    }
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return Err(traversal());
    }

    let cleaned_target = clean(target_dir);
    let joined = clean(&cleaned_target.join(&normalized));
    if !joined.starts_with(&cleaned_target) {
        return Err(traversal());
    }
    Ok(joined)
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> &'static Path {
        Path::new("/tmp/x")
    }

    #[test]
    fn benign_relative_name_joins() {
        let resolved = sanitize_entry_path(target(), "a/b.txt", false).unwrap();
        assert_eq!(resolved, Path::new("/tmp/x/a/b.txt"));
    }

    #[test]
    fn traversal_segments_rejected() {
        let err = sanitize_entry_path(target(), "../../etc/passwd", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn disguised_traversal_rejected() {
        let err = sanitize_entry_path(target(), "a/../../b", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn trailing_dotdot_rejected() {
        let err = sanitize_entry_path(target(), "..", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn absolute_name_rejected() {
        let err = sanitize_entry_path(target(), "/etc/passwd", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn backslash_separators_normalized() {
        let resolved = sanitize_entry_path(target(), "a\\b\\c.txt", false).unwrap();
        assert_eq!(resolved, Path::new("/tmp/x/a/b/c.txt"));

        let err = sanitize_entry_path(target(), "..\\..\\evil", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn drive_letter_rejected() {
        let err = sanitize_entry_path(target(), "C:\\Windows\\evil.dll", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn unc_prefix_rejected() {
        let err = sanitize_entry_path(target(), "\\\\server\\share\\f", false).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversal { .. }));
    }

    #[test]
    fn empty_and_dot_refer_to_target() {
        assert_eq!(sanitize_entry_path(target(), "", false).unwrap(), target());
        assert_eq!(sanitize_entry_path(target(), ".", false).unwrap(), target());
    }

    #[test]
    fn interleaved_noop_segments_cleaned() {
        let resolved = sanitize_entry_path(target(), "./a/./b.txt", false).unwrap();
        assert_eq!(resolved, Path::new("/tmp/x/a/b.txt"));
    }

    #[test]
    fn internal_dotdot_that_stays_inside_is_allowed() {
        let resolved = sanitize_entry_path(target(), "a/../b.txt", false).unwrap();
        assert_eq!(resolved, Path::new("/tmp/x/b.txt"));
    }

    #[test]
    fn opt_out_returns_naive_join() {
        let resolved = sanitize_entry_path(target(), "../outside", true).unwrap();
        assert_eq!(resolved, Path::new("/tmp/x/../outside"));
    }
}
