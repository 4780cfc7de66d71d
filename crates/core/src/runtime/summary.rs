use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one indexing run.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Files that went through the analyzer and were committed.
    pub parsed: usize,
    pub failed: Vec<FailedFile>,
    /// Unresolved references left in the whole index after the run.
    pub unresolved: usize,
    pub cancelled: bool,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.modified == 0 && self.removed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} modified, {} removed, {} failed, {} unresolved references ({} ms{})",
            self.added,
            self.modified,
            self.removed,
            self.failed.len(),
            self.unresolved,
            self.duration.as_millis(),
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}

fn as_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}
