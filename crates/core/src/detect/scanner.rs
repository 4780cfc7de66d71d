use crate::model::Fingerprint;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A file found on disk with its fingerprint. Bytes are kept only when the
/// fingerprint differs from the stored one.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Path relative to the project root.
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub content: Option<Vec<u8>>,
}

/// Result of walking the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Root-relative candidate files, sorted.
    pub paths: Vec<PathBuf>,
    /// Root-relative directories the walk could not read. An empty path
    /// means the failure could not be placed, so nothing is known to be gone.
    pub unreadable: Vec<PathBuf>,
}

pub struct Scanner<'a> {
    root: &'a Path,
    extensions: &'a [String],
    exclude: &'a [PathBuf],
}

pub fn is_relevant_path(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with('.') {
            return false;
        }
        if matches!(name, "target" | "build" | "node_modules" | "out") {
            return false;
        }
    }
    true
}

impl<'a> Scanner<'a> {
    pub fn new(root: &'a Path, extensions: &'a [String], exclude: &'a [PathBuf]) -> Self {
        Self {
            root,
            extensions,
            exclude,
        }
    }

    /// Every candidate source file, plus the directories that failed to
    /// read. Files below an unreadable directory are unknown, not removed.
    pub fn collect_paths(&self) -> Listing {
        let mut listing = Listing::default();
        let walk = WalkBuilder::new(self.root)
            .filter_entry(|entry| entry.depth() == 0 || is_relevant_path(entry.path()))
            .build();
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Cannot walk {}: {}", self.root.display(), err);
                    let dir = error_path(&err)
                        .and_then(|p| p.strip_prefix(self.root).ok())
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    listing.unreadable.push(dir);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !self.has_wanted_extension(path) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(self.root) else {
                continue;
            };
            if !self.is_excluded(relative) {
                listing.paths.push(relative.to_path_buf());
            }
        }
        listing.paths.sort();
        listing.unreadable.sort();
        listing.unreadable.dedup();
        listing
    }

    /// Hashes every path in parallel against the stored fingerprint table.
    ///
    /// A file that cannot be read keeps its stored fingerprint so it is
    /// neither re-parsed nor dropped; an unreadable file with no history is
    /// skipped.
    pub fn fingerprint(
        &self,
        paths: &[PathBuf],
        stored: &HashMap<PathBuf, Option<Fingerprint>>,
    ) -> Vec<ScannedFile> {
        let mut scanned: Vec<ScannedFile> = paths
            .par_iter()
            .filter_map(|relative| {
                let previous = stored.get(relative).copied().flatten();
                match fs::read(self.root.join(relative)) {
                    Ok(bytes) => {
                        let fingerprint = Fingerprint::of(&bytes);
                        let content = (previous != Some(fingerprint)).then_some(bytes);
                        Some(ScannedFile {
                            path: relative.clone(),
                            fingerprint,
                            content,
                        })
                    }
                    Err(err) => {
                        tracing::warn!("Cannot read {}: {}", relative.display(), err);
                        previous.map(|fingerprint| ScannedFile {
                            path: relative.clone(),
                            fingerprint,
                            content: None,
                        })
                    }
                }
            })
            .collect();
        scanned.sort_by(|a, b| a.path.cmp(&b.path));
        scanned
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude.iter().any(|prefix| relative.starts_with(prefix))
    }
}

/// The path an `ignore` error is about, through its wrappers.
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn collects_java_files_and_honours_exclusions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main/java/a/A.java", "class A {}");
        write(dir.path(), "src/test/java/a/ATest.java", "class ATest {}");
        write(dir.path(), "build/generated/G.java", "class G {}");
        write(dir.path(), "README.md", "# readme");

        let extensions = vec!["java".to_string()];
        let exclude = vec![PathBuf::from("src/test")];
        let scanner = Scanner::new(dir.path(), &extensions, &exclude);

        let listing = scanner.collect_paths();
        assert_eq!(listing.paths, vec![PathBuf::from("src/main/java/a/A.java")]);
        assert!(listing.unreadable.is_empty());
    }

    #[test]
    fn keeps_bytes_only_for_changed_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.java", "class A {}");
        write(dir.path(), "B.java", "class B {}");

        let extensions = vec!["java".to_string()];
        let scanner = Scanner::new(dir.path(), &extensions, &[]);
        let paths = scanner.collect_paths().paths;

        let mut stored = HashMap::new();
        stored.insert(PathBuf::from("A.java"), Some(Fingerprint::of(b"class A {}")));

        let scanned = scanner.fingerprint(&paths, &stored);
        assert_eq!(scanned.len(), 2);
        assert!(scanned[0].content.is_none());
        assert_eq!(scanned[1].content.as_deref(), Some(&b"class B {}"[..]));
    }

    #[test]
    fn walk_failures_are_reported_not_swallowed() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("unmounted");
        let extensions = vec!["java".to_string()];
        let scanner = Scanner::new(&missing, &extensions, &[]);

        let listing = scanner.collect_paths();
        assert!(listing.paths.is_empty());
        assert_eq!(listing.unreadable, vec![PathBuf::new()]);
    }

    #[test]
    fn error_path_sees_through_wrappers() {
        let err = ignore::Error::WithDepth {
            depth: 2,
            err: Box::new(ignore::Error::WithPath {
                path: PathBuf::from("/proj/src/locked"),
                err: Box::new(ignore::Error::Io(std::io::Error::other("permission denied"))),
            }),
        };
        assert_eq!(error_path(&err), Some(Path::new("/proj/src/locked")));
        assert_eq!(error_path(&ignore::Error::Io(std::io::Error::other("x"))), None);
    }
}
