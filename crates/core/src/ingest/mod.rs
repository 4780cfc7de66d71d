//! Parsing and extraction of changed files on a bounded worker pool.

pub mod scheduler;

pub use scheduler::{JobOutcome, ParallelScheduler, ParseJob, SchedulerConfig};

use std::path::Path;

use crate::model::{FileExtraction, ParseFailure};

/// Language front end: turns one file's bytes into its entity batch.
///
/// Implementations must be stateless across calls; each call builds whatever
/// parser state it needs and drops it before returning.
pub trait SourceAnalyzer: Send + Sync + 'static {
    fn language(&self) -> &str;

    /// File extensions handled, without the leading dot.
    fn extensions(&self) -> &[&str];

    /// `path` is root-relative and is recorded on every produced entity.
    fn analyze(&self, path: &Path, source: &[u8]) -> Result<FileExtraction, ParseFailure>;
}
