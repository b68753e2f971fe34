//! Progress reporting hooks for archive operations.
//!
//! The engine calls into an injected sink at defined points and passes only
//! path information; the sink decides whether and how to render anything.
//! The core has no dependency on terminal output.

use std::path::Path;

/// Observer for the defined progress points of one operation.
///
/// All hooks default to no-ops so implementors only override what they need.
pub trait ProgressSink: Send + Sync {
    /// Called once before an archive is opened or created.
    fn begin_archive(&self, _archive: &Path) {}

    /// Called before each entry is written or extracted.
    fn begin_entry(&self, _entry: &Path) {}

    /// Called after each entry has been written or extracted.
    fn end_entry(&self, _entry: &Path) {}
}

/// The default sink: reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}
