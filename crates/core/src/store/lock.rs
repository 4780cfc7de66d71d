use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

/// Exclusive writer lock: a `.lock` file holding the writer's process id,
/// created next to the store and removed on drop. A lock left behind by a
/// process that no longer runs is reclaimed.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn lock_path(store: &Path) -> PathBuf {
        store.with_extension("lock")
    }

    pub fn acquire(store: &Path) -> Result<Self> {
        let path = Self::lock_path(store);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match Self::create(&path) {
            Err(IndexError::StoreLocked(_)) if Self::is_stale(&path) => {
                tracing::warn!("Reclaiming stale lock {}", path.display());
                fs::remove_file(&path)?;
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(IndexError::StoreLocked(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// A lock is stale when it names a process that is gone. Unreadable or
    /// half-written locks are treated as held.
    fn is_stale(path: &Path) -> bool {
        let Ok(text) = fs::read_to_string(path) else {
            return false;
        };
        match text.trim().parse::<u32>() {
            Ok(pid) => !process_alive(pid),
            Err(_) => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a portable liveness check the lock is assumed to be held.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_writer_is_refused_until_first_releases() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("index.bin");

        let first = StoreLock::acquire(&store).unwrap();
        assert_eq!(
            fs::read_to_string(first.path()).unwrap().trim(),
            std::process::id().to_string()
        );
        assert!(matches!(
            StoreLock::acquire(&store),
            Err(IndexError::StoreLocked(_))
        ));

        drop(first);
        assert!(StoreLock::acquire(&store).is_ok());
    }

    #[test]
    fn half_written_lock_is_held() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("index.bin");
        fs::write(StoreLock::lock_path(&store), "").unwrap();

        assert!(matches!(
            StoreLock::acquire(&store),
            Err(IndexError::StoreLocked(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn lock_of_a_dead_writer_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("index.bin");

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead = child.id();
        child.wait().unwrap();
        fs::write(StoreLock::lock_path(&store), format!("{dead}\n")).unwrap();

        let lock = StoreLock::acquire(&store).unwrap();
        assert_eq!(
            fs::read_to_string(lock.path()).unwrap().trim(),
            std::process::id().to_string()
        );
    }
}
