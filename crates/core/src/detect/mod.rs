//! Change detection: which files need (re)indexing in this run.

pub mod scanner;

pub use scanner::{Listing, ScannedFile, Scanner};

use crate::model::Fingerprint;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Disjoint classification of the current file set against the stored table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: BTreeSet<PathBuf>,
    pub modified: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
    pub unchanged: BTreeSet<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Moves removals below an unreadable directory back to unchanged: a
    /// file that could not be listed is not known to be gone. Returns how
    /// many were kept.
    pub fn keep_unlisted(&mut self, unreadable: &[PathBuf]) -> usize {
        let kept: Vec<PathBuf> = self
            .removed
            .iter()
            .filter(|path| unreadable.iter().any(|dir| path.starts_with(dir)))
            .cloned()
            .collect();
        for path in &kept {
            self.removed.remove(path);
            self.unchanged.insert(path.clone());
        }
        kept.len()
    }
}

pub struct ChangeDetector;

impl ChangeDetector {
    /// Single pass over `current`, one map lookup per file.
    ///
    /// `stored` maps every known path to its last good fingerprint; a known
    /// path without one (never parsed successfully, or a damaged record) is
    /// reported as modified.
    pub fn detect<'a, I>(current: I, stored: &HashMap<PathBuf, Option<Fingerprint>>) -> ChangeSet
    where
        I: IntoIterator<Item = (&'a PathBuf, &'a Fingerprint)>,
    {
        let mut changes = ChangeSet::default();
        let mut seen = 0usize;

        for (path, fingerprint) in current {
            match stored.get(path) {
                None => {
                    changes.added.insert(path.clone());
                }
                Some(Some(previous)) if previous == fingerprint => {
                    seen += 1;
                    changes.unchanged.insert(path.clone());
                }
                Some(_) => {
                    seen += 1;
                    changes.modified.insert(path.clone());
                }
            }
        }

        if seen < stored.len() {
            let present: BTreeSet<&PathBuf> = changes
                .modified
                .iter()
                .chain(changes.unchanged.iter())
                .collect();
            changes.removed = stored
                .keys()
                .filter(|p| !present.contains(p))
                .cloned()
                .collect();
        }

        changes
    }
}
