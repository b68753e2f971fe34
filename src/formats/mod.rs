//! The closed set of supported container/codec formats and their detection.
//!
//! Each format is a variant of one sum type; the dispatcher selects the
//! matching adapter rather than dispatching through a shared base type.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ArchiveError, Result};

pub(crate) mod bzip2;
pub(crate) mod gzip;
pub(crate) mod single;
pub(crate) mod tar;
pub(crate) mod zip;
pub(crate) mod zlib;

/// One of the six supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// ZIP container (local + central directory records).
    Zip,
    /// TAR container (ustar-style headers with type flags).
    Tar,
    /// TAR entries through a GZIP stream.
    Tgz,
    /// Single GZIP member (RFC 1952, optional stored name/mtime).
    Gzip,
    /// Single BZIP2 member; decompression and listing only.
    Bzip2,
    /// Single ZLIB stream (RFC 1950).
    Zlib,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Tgz => "tar.gz",
            ArchiveFormat::Gzip => "gzip",
            ArchiveFormat::Bzip2 => "bzip2",
            ArchiveFormat::Zlib => "zlib",
        };
        f.write_str(name)
    }
}

impl ArchiveFormat {
    /// Recognize a format from the archive's file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".taz") {
            Some(ArchiveFormat::Tgz)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if name.ends_with(".gz") {
            Some(ArchiveFormat::Gzip)
        } else if name.ends_with(".bz2") || name.ends_with(".bzip2") {
            Some(ArchiveFormat::Bzip2)
        } else if name.ends_with(".zz") || name.ends_with(".zlib") || name.ends_with(".zl") {
            Some(ArchiveFormat::Zlib)
        } else {
            None
        }
    }

    /// Recognize a format from the first bytes of the file.
    ///
    /// Order matters: the distinctive magics go first, the loose zlib
    /// CMF/FLG check and the deep ustar probe last.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") {
            return Some(ArchiveFormat::Zip);
        }
        if header.starts_with(b"\x1f\x8b") {
            return Some(ArchiveFormat::Gzip);
        }
        if header.starts_with(b"BZh") {
            return Some(ArchiveFormat::Bzip2);
        }
        if header.len() >= 265 && &header[257..262] == b"ustar" {
            return Some(ArchiveFormat::Tar);
        }
        if header.len() >= 2
            && header[0] == 0x78
            && (u16::from(header[0]) * 256 + u16::from(header[1])) % 31 == 0
        {
            return Some(ArchiveFormat::Zlib);
        }
        None
    }

    /// Detect the format of an existing archive: extension first, magic-byte
    /// sniffing as a fallback for unrecognized names.
    pub(crate) fn detect(path: &Path) -> Result<Self> {
        if let Some(format) = Self::from_path(path) {
            return Ok(format);
        }

        let mut file = File::open(path).map_err(|e| ArchiveError::from_io(e, path))?;
        let mut header = [0u8; 512];
        let mut filled = 0;
        while filled < header.len() {
            match file.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ArchiveError::from_io(e, path)),
            }
        }

        Self::sniff(&header[..filled]).ok_or_else(|| ArchiveError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: "unrecognized extension and no known magic bytes".into(),
        })
    }
}
