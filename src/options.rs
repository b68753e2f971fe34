//! Per-call configuration for pack, unpack and list operations.
//!
//! Every call owns its own `ArchiveOptions` instance; there is no shared or
//! global configuration, so concurrent calls with different settings never
//! observe each other.

/// Compression effort for formats that support a configurable level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Store entries without compression (ZIP `store`, DEFLATE level 0).
    None,
    /// Fastest compression.
    Fast,
    /// The codec's default trade-off.
    Default,
    /// Best (slowest) compression.
    Best,
    /// Huffman-coding-only mode. DEFLATE backends without a dedicated
    /// Huffman-only strategy fall back to the fastest level.
    HuffmanOnly,
}

impl CompressionLevel {
    pub(crate) fn to_flate2(self) -> flate2::Compression {
        match self {
            CompressionLevel::None => flate2::Compression::none(),
            CompressionLevel::Fast | CompressionLevel::HuffmanOnly => flate2::Compression::fast(),
            CompressionLevel::Default => flate2::Compression::default(),
            CompressionLevel::Best => flate2::Compression::best(),
        }
    }

    /// Deflate level for the `zip` crate; `None` keeps the codec default.
    pub(crate) fn zip_deflate_level(self) -> Option<i32> {
        match self {
            CompressionLevel::None => None, // ZIP switches to `store` instead
            CompressionLevel::Fast | CompressionLevel::HuffmanOnly => Some(1),
            CompressionLevel::Default => None,
            CompressionLevel::Best => Some(9),
        }
    }
}

/// Holds all configuration options for a single archive operation.
///
/// Immutable for the duration of one call. The size caps are only enforced
/// while `size_check` is on; a cap of `0` (or a ratio of `0.0`) means that
/// particular cap is unlimited.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Compression level for formats that accept one.
    pub level: CompressionLevel,
    /// Replace existing destination files instead of failing.
    pub overwrite: bool,
    /// Master toggle for size and compression-ratio enforcement.
    pub size_check: bool,
    /// Maximum decompressed bytes for any single entry.
    pub max_file_size: u64,
    /// Maximum decompressed bytes across the whole operation.
    pub max_total_size: u64,
    /// Maximum original:stored compression ratio per entry.
    pub max_ratio: f64,
    /// Escape hatch: skip entry-name validation for trusted inputs.
    pub skip_path_validation: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::Default,
            overwrite: false,
            size_check: false,
            max_file_size: 1 << 30,       // 1 GiB per entry
            max_total_size: 10 << 30,     // 10 GiB per operation
            max_ratio: 100.0,
            skip_path_validation: false,
        }
    }
}
