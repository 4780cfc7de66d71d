//! Index store with snapshot isolation.
//!
//! Readers clone the current `Arc<IndexState>` and keep it for as long as they
//! like. A commit takes the write lock, mutates through `Arc::make_mut` (which
//! copies the state only when a reader still holds the old snapshot) and
//! releases it, so a reader sees a file either entirely before or entirely
//! after its commit.

pub mod lock;
pub mod persist;
pub mod state;

pub use lock::StoreLock;
pub use state::{CommitReport, EdgeKind, FileEntry, GraphEdge, IndexState, IndexStats};

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{IndexError, Result};
use crate::model::{Entity, EntityId, Fingerprint, ParseOutcome};

pub struct IndexStore {
    current: RwLock<Arc<IndexState>>,
    location: Option<PathBuf>,
}

impl IndexStore {
    /// A store that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexState::new())),
            location: None,
        }
    }

    /// Opens the store at `path`, starting empty if nothing was saved yet.
    /// Corrupt or incompatible content is an error; it is never discarded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = persist::load(&path)?.unwrap_or_default();
        Ok(Self {
            current: RwLock::new(Arc::new(state)),
            location: Some(path),
        })
    }

    /// An empty store bound to `path`; whatever is there gets overwritten on
    /// the next save.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexState::new())),
            location: Some(path.into()),
        }
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Immutable view of the committed state.
    pub fn snapshot(&self) -> Result<Arc<IndexState>> {
        let guard = self
            .current
            .read()
            .map_err(|_| IndexError::Internal("index lock poisoned".into()))?;
        Ok(Arc::clone(&guard))
    }

    fn write<R>(&self, f: impl FnOnce(&mut IndexState) -> R) -> Result<R> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| IndexError::Internal("index lock poisoned".into()))?;
        Ok(f(Arc::make_mut(&mut guard)))
    }

    /// Replaces everything attributed to `path` in one step. A failed parse
    /// only updates the file's status; its previous entities stay visible.
    pub fn commit_file(
        &self,
        path: &Path,
        fingerprint: Fingerprint,
        outcome: ParseOutcome,
    ) -> Result<CommitReport> {
        self.write(|state| match outcome {
            ParseOutcome::Parsed(mut extraction) => {
                extraction.path = path.to_path_buf();
                state.commit(fingerprint, extraction)
            }
            ParseOutcome::Failed(failure) => {
                state.record_failure(path, failure);
                CommitReport::default()
            }
        })
    }

    /// Removes `path` and cascades. Returns `false` if the file was unknown.
    /// Links into the removed entities are detached by the next
    /// [`IndexStore::settle`], [`IndexStore::relink`] or save.
    pub fn remove_file(&self, path: &Path) -> Result<bool> {
        self.write(|state| state.remove(path))
    }

    /// Applies queued detaches (see [`IndexState::settle`]).
    pub fn settle(&self) -> Result<usize> {
        self.write(|state| state.settle())
    }

    /// Settles, then re-resolves the stored references of `paths` (see
    /// [`IndexState::relink`]).
    pub fn relink(&self, paths: &[PathBuf]) -> Result<usize> {
        self.write(|state| state.relink(paths))
    }

    /// Index-wide reconciliation pass. Returns how many previously
    /// unresolved links now have a target.
    pub fn resolve_pending(&self) -> Result<usize> {
        self.write(|state| state.relink_all())
    }

    pub fn get(&self, id: &EntityId) -> Result<Entity> {
        self.snapshot()?
            .get(id)
            .cloned()
            .ok_or_else(|| IndexError::NotFound(id.clone()))
    }

    pub fn callers_of(&self, method: &EntityId) -> Result<BTreeSet<EntityId>> {
        let snapshot = self.known(method)?;
        Ok(snapshot.callers_of(method))
    }

    pub fn supertypes_of(&self, class: &EntityId) -> Result<BTreeSet<EntityId>> {
        let snapshot = self.known(class)?;
        Ok(snapshot.supertypes_of(class))
    }

    pub fn subtypes_of(&self, class: &EntityId) -> Result<BTreeSet<EntityId>> {
        let snapshot = self.known(class)?;
        Ok(snapshot.subtypes_of(class))
    }

    pub fn fingerprints(&self) -> Result<HashMap<PathBuf, Option<Fingerprint>>> {
        Ok(self.snapshot()?.fingerprints())
    }

    pub fn file(&self, path: &Path) -> Result<FileEntry> {
        self.snapshot()?
            .file(path)
            .cloned()
            .ok_or_else(|| IndexError::FileNotFound(path.to_path_buf()))
    }

    pub fn unresolved_count(&self) -> Result<usize> {
        Ok(self.snapshot()?.unresolved_count())
    }

    fn known(&self, id: &EntityId) -> Result<Arc<IndexState>> {
        let snapshot = self.snapshot()?;
        if snapshot.contains(id) {
            Ok(snapshot)
        } else {
            Err(IndexError::NotFound(id.clone()))
        }
    }

    /// Persists the current snapshot. A store without a location is a no-op.
    ///
    /// Queued detaches are applied to the written copy only, so a checkpoint
    /// in the middle of a run leaves the live state untouched.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.location else {
            return Ok(());
        };
        let snapshot = self.snapshot()?;
        if snapshot.is_settled() {
            persist::save(snapshot.as_ref(), path)
        } else {
            let mut settled = (*snapshot).clone();
            settled.settle();
            persist::save(&settled, path)
        }
    }

    /// Drops all state and deletes the persisted file.
    pub fn clear(&self) -> Result<()> {
        self.write(|state| *state = IndexState::new())?;
        if let Some(path) = self.location.as_ref().filter(|p| p.exists()) {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassEntity, ClassFlavor, FileExtraction, ParseFailure, Range};

    fn extraction(path: &str, class: &str) -> FileExtraction {
        let mut x = FileExtraction::new(path);
        x.classes.push(ClassEntity {
            id: EntityId::class(class),
            name: class.to_string(),
            flavor: ClassFlavor::Class,
            file: PathBuf::from(path),
            span: Range::default(),
            modifiers: vec![],
            annotations: vec![],
            type_parameters: vec![],
            superclass: None,
            interfaces: vec![],
            enclosing: None,
        });
        x
    }

    #[test]
    fn snapshot_taken_before_commit_is_unaffected() {
        let store = IndexStore::in_memory();
        let before = store.snapshot().unwrap();

        store
            .commit_file(
                Path::new("A.java"),
                Fingerprint::of(b"a"),
                ParseOutcome::Parsed(extraction("A.java", "A")),
            )
            .unwrap();

        assert!(!before.contains(&EntityId::class("A")));
        assert!(store.snapshot().unwrap().contains(&EntityId::class("A")));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let store = IndexStore::in_memory();
        let missing = EntityId::method("Nope.never()");
        assert!(matches!(store.get(&missing), Err(IndexError::NotFound(_))));
        assert!(matches!(store.callers_of(&missing), Err(IndexError::NotFound(_))));
        assert!(matches!(
            store.file(Path::new("Nope.java")),
            Err(IndexError::FileNotFound(_))
        ));
    }

    #[test]
    fn first_failure_creates_record_without_fingerprint() {
        let store = IndexStore::in_memory();
        store
            .commit_file(
                Path::new("Bad.java"),
                Fingerprint::of(b"bad"),
                ParseOutcome::Failed(ParseFailure::at("syntax error", 1, 1)),
            )
            .unwrap();

        let fingerprints = store.fingerprints().unwrap();
        assert_eq!(fingerprints.get(Path::new("Bad.java")), Some(&None));
        assert!(store.remove_file(Path::new("Bad.java")).unwrap());
        assert!(!store.remove_file(Path::new("Bad.java")).unwrap());
    }

    #[test]
    fn checkpoint_with_queued_detaches_is_loadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.bin");
        let store = IndexStore::create(&path);

        let mut caller = extraction("A.java", "A");
        let foo = crate::model::MethodEntity {
            id: EntityId::method("A.foo()"),
            name: "foo".into(),
            class: EntityId::class("A"),
            file: PathBuf::from("A.java"),
            span: Range::default(),
            modifiers: vec![],
            annotations: vec![],
            return_type: None,
            parameters: vec![],
            is_constructor: false,
        };
        caller.calls.push(crate::model::RawCall {
            caller: foo.id.clone(),
            scope: EntityId::class("A"),
            name: "bar".into(),
            arguments: 0,
            receiver: crate::model::Receiver::Type("B".into()),
            span: Range::default(),
        });
        caller.methods.push(foo);
        let mut callee = extraction("B.java", "B");
        callee.methods.push(crate::model::MethodEntity {
            id: EntityId::method("B.bar()"),
            name: "bar".into(),
            class: EntityId::class("B"),
            file: PathBuf::from("B.java"),
            span: Range::default(),
            modifiers: vec![],
            annotations: vec![],
            return_type: None,
            parameters: vec![],
            is_constructor: false,
        });

        for (file, x) in [("B.java", callee), ("A.java", caller)] {
            store
                .commit_file(Path::new(file), Fingerprint::of(file.as_bytes()), ParseOutcome::Parsed(x))
                .unwrap();
        }
        store.remove_file(Path::new("B.java")).unwrap();
        store.save().unwrap();

        assert!(!store.snapshot().unwrap().is_settled());
        let reopened = IndexStore::open(&path).unwrap();
        assert_eq!(reopened.unresolved_count().unwrap(), 1);
    }

    #[test]
    fn open_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"definitely not an index").unwrap();
        assert!(matches!(
            IndexStore::open(&path),
            Err(IndexError::StoreCorruption { .. })
        ));
    }
}
