//! In-memory index: entity graph plus the per-file records it is derived from.
//!
//! `files` is the source of truth. The graph, the id map and the name map are
//! derived from it and rebuilt on load. Every edge remembers the file whose
//! links produced it, so a file's contribution can be withdrawn exactly.
//!
//! Commits and removals do not detach links in other files right away. An
//! entity that loses its last declaration is queued, and [`IndexState::settle`]
//! decides once the batch is done: links to ids declared again by then keep
//! their targets, the rest become placeholders. The outcome of a run is
//! therefore the same whichever file commits first.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::link::{LinkResolver, SymbolIndex};
use crate::model::{
    CallEdge, Entity, EntityId, EntityKind, FileExtraction, FileLinks, Fingerprint,
    InheritanceEdge, ParseFailure, ParseStatus, SourceFile, SuperRelation, now_millis,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Calls,
    Extends,
    Implements,
    Contains,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::Contains => "contains",
        }
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calls" => Ok(EdgeKind::Calls),
            "extends" => Ok(EdgeKind::Extends),
            "implements" => Ok(EdgeKind::Implements),
            "contains" => Ok(EdgeKind::Contains),
            other => Err(format!("unknown edge kind '{other}'")),
        }
    }
}

impl From<SuperRelation> for EdgeKind {
    fn from(relation: SuperRelation) -> Self {
        match relation {
            SuperRelation::Extends => EdgeKind::Extends,
            SuperRelation::Implements => EdgeKind::Implements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    /// File whose links produced this edge.
    pub origin: PathBuf,
}

/// Committed state of one source file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub source: SourceFile,
    /// Last successful extraction; empty if the file never parsed.
    pub extraction: FileExtraction,
    pub links: FileLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub entities: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files: usize,
    pub failed_files: usize,
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
    pub call_edges: usize,
    pub inheritance_edges: usize,
    pub unresolved: usize,
}

const LINK_EDGES: [EdgeKind; 3] = [EdgeKind::Calls, EdgeKind::Extends, EdgeKind::Implements];
const SUPER_EDGES: [EdgeKind; 2] = [EdgeKind::Extends, EdgeKind::Implements];

#[derive(Clone, Default)]
pub struct IndexState {
    topology: StableDiGraph<Entity, GraphEdge>,
    ids: HashMap<EntityId, NodeIndex>,
    /// Simple name -> ids carrying it.
    names: HashMap<String, BTreeSet<EntityId>>,
    /// Every file declaring an id. The smallest path owns the node.
    claims: HashMap<EntityId, BTreeSet<PathBuf>>,
    files: BTreeMap<PathBuf, FileEntry>,
    /// Ids that lost their last declaration since the last settle, with the
    /// files whose links pointed at them.
    orphaned: BTreeMap<EntityId, BTreeSet<PathBuf>>,
}

impl IndexState {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Read-only accessors ----

    pub fn topology(&self) -> &StableDiGraph<Entity, GraphEdge> {
        &self.topology
    }

    pub fn node(&self, id: &EntityId) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.node(id).and_then(|idx| self.topology.node_weight(idx))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn files(&self) -> &BTreeMap<PathBuf, FileEntry> {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn entity_count(&self) -> usize {
        self.topology.node_count()
    }

    pub fn fingerprints(&self) -> HashMap<PathBuf, Option<Fingerprint>> {
        self.files
            .iter()
            .map(|(path, entry)| (path.clone(), entry.source.fingerprint))
            .collect()
    }

    /// Ids sharing a simple name, any kind.
    pub fn ids_named(&self, simple: &str) -> impl Iterator<Item = &EntityId> {
        self.names.get(simple).into_iter().flatten()
    }

    fn neighbors(&self, id: &EntityId, dir: Direction, kinds: &[EdgeKind]) -> BTreeSet<EntityId> {
        let Some(idx) = self.node(id) else {
            return BTreeSet::new();
        };
        self.topology
            .edges_directed(idx, dir)
            .filter(|e| kinds.contains(&e.weight().kind))
            .filter_map(|e| {
                let other = match dir {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                self.topology.node_weight(other).map(|n| n.id().clone())
            })
            .collect()
    }

    pub fn callers_of(&self, method: &EntityId) -> BTreeSet<EntityId> {
        self.neighbors(method, Direction::Incoming, &[EdgeKind::Calls])
    }

    pub fn supertypes_of(&self, class: &EntityId) -> BTreeSet<EntityId> {
        self.neighbors(class, Direction::Outgoing, &SUPER_EDGES)
    }

    pub fn subtypes_of(&self, class: &EntityId) -> BTreeSet<EntityId> {
        self.neighbors(class, Direction::Incoming, &SUPER_EDGES)
    }

    pub fn call_edges(&self) -> Vec<CallEdge> {
        let mut edges: Vec<CallEdge> = self
            .files
            .iter()
            .flat_map(|(path, entry)| entry.links.call_edges(path))
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }

    pub fn inheritance_edges(&self) -> Vec<InheritanceEdge> {
        let mut edges: Vec<InheritanceEdge> = self
            .files
            .iter()
            .flat_map(|(path, entry)| entry.links.inheritance_edges(path))
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }

    pub fn unresolved_count(&self) -> usize {
        self.files.values().map(|e| e.links.unresolved_count()).sum()
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            files: self.files.len(),
            failed_files: self
                .files
                .values()
                .filter(|e| !e.source.status.is_ok())
                .count(),
            unresolved: self.unresolved_count(),
            ..Default::default()
        };
        for entity in self.topology.node_weights() {
            match entity.kind() {
                EntityKind::Class => stats.classes += 1,
                EntityKind::Method => stats.methods += 1,
                EntityKind::Field => stats.fields += 1,
            }
        }
        for edge in self.topology.edge_weights() {
            match edge.kind {
                EdgeKind::Calls => stats.call_edges += 1,
                EdgeKind::Extends | EdgeKind::Implements => stats.inheritance_edges += 1,
                EdgeKind::Contains => {}
            }
        }
        stats
    }

    // ---- Mutation ----

    /// Replaces everything attributed to `extraction.path` with the new batch
    /// and links it against the current index.
    pub fn commit(&mut self, fingerprint: Fingerprint, extraction: FileExtraction) -> CommitReport {
        let path = extraction.path.clone();

        let new_ids: HashSet<EntityId> = extraction.entity_ids().cloned().collect();
        if let Some(old) = self.files.remove(&path) {
            let old_ids: Vec<EntityId> = old.extraction.entity_ids().cloned().collect();
            self.remove_origin_edges(&path, &old_ids, None);
            for id in old_ids.iter().filter(|id| !new_ids.contains(*id)) {
                self.release(id, &path);
            }
        }

        for entity in extraction.entities() {
            self.claim(entity, &path);
        }

        let entities = extraction.entity_count();
        self.files.insert(
            path.clone(),
            FileEntry {
                source: SourceFile::new(path.clone(), Some(fingerprint), ParseStatus::Ok),
                extraction,
                links: FileLinks::default(),
            },
        );

        self.add_contains_edges(&path);
        self.link_supertypes(&path);
        self.link_calls(&path);

        CommitReport {
            entities,
            unresolved: self
                .files
                .get(&path)
                .map(|e| e.links.unresolved_count())
                .unwrap_or(0),
        }
    }

    /// Records a failed attempt. Previously committed entities stay in place.
    pub fn record_failure(&mut self, path: &Path, failure: ParseFailure) {
        match self.files.get_mut(path) {
            Some(entry) => {
                entry.source.status = ParseStatus::Failed(failure);
                entry.source.last_indexed = now_millis();
            }
            None => {
                self.files.insert(
                    path.to_path_buf(),
                    FileEntry {
                        source: SourceFile::new(path.to_path_buf(), None, ParseStatus::Failed(failure)),
                        extraction: FileExtraction::new(path),
                        links: FileLinks::default(),
                    },
                );
            }
        }
    }

    /// Drops a file and everything it declared. Links elsewhere that pointed
    /// into it are detached on the next [`IndexState::settle`]. Returns
    /// `false` if the file was unknown.
    pub fn remove(&mut self, path: &Path) -> bool {
        let Some(old) = self.files.remove(path) else {
            return false;
        };
        let old_ids: Vec<EntityId> = old.extraction.entity_ids().cloned().collect();
        self.remove_origin_edges(path, &old_ids, None);
        for id in &old_ids {
            self.release(id, path);
        }
        true
    }

    /// Whether every queued detach has been applied.
    pub fn is_settled(&self) -> bool {
        self.orphaned.is_empty()
    }

    /// Applies the detaches queued by commits and removals. Links to an id
    /// that is declared again by now get their edges back; every other link
    /// to a queued id becomes a placeholder. Returns how many links lost a
    /// target.
    pub fn settle(&mut self) -> usize {
        let orphaned = std::mem::take(&mut self.orphaned);
        let mut detached = 0;
        for (id, origins) in orphaned {
            let declared = self.contains(&id);
            for origin in origins {
                if declared {
                    self.restore_edges(&origin, &id);
                } else if let Some(entry) = self.files.get_mut(&origin) {
                    detached += entry.links.detach_target(&id);
                }
            }
        }
        if detached > 0 {
            tracing::debug!("Settling left {} links unresolved", detached);
        }
        detached
    }

    /// Re-resolves the stored references of `paths` without re-parsing.
    ///
    /// Supertypes of every file are linked before any call, since call
    /// resolution walks the inheritance graph. Returns the number of links
    /// that went from unresolved to resolved.
    pub fn relink(&mut self, paths: &[PathBuf]) -> usize {
        self.settle();
        let before: HashMap<PathBuf, FileLinks> = paths
            .iter()
            .filter_map(|p| self.files.get(p).map(|e| (p.clone(), e.links.clone())))
            .collect();

        let present: Vec<&PathBuf> = paths.iter().filter(|p| before.contains_key(*p)).collect();
        for path in &present {
            self.link_supertypes(path);
        }
        for path in &present {
            self.link_calls(path);
        }

        before
            .iter()
            .map(|(path, old)| {
                self.files
                    .get(path)
                    .map(|entry| newly_bound(old, &entry.links))
                    .unwrap_or(0)
            })
            .sum()
    }

    pub fn relink_all(&mut self) -> usize {
        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        self.relink(&paths)
    }

    // ---- Internals ----

    fn claim(&mut self, entity: Entity, path: &Path) {
        let id = entity.id().clone();
        let claimants = self.claims.entry(id.clone()).or_default();
        claimants.insert(path.to_path_buf());
        let is_owner = claimants.first().map(|p| p.as_path()) == Some(path);
        let owner = claimants.first().cloned();

        match self.ids.get(&id).copied() {
            None => {
                let idx = self.topology.add_node(entity);
                self.ids.insert(id.clone(), idx);
                self.names
                    .entry(id.simple_name().to_string())
                    .or_default()
                    .insert(id);
            }
            Some(idx) => {
                if is_owner {
                    self.topology[idx] = entity;
                } else if let Some(owner) = owner {
                    tracing::warn!(
                        "{} is declared in both {} and {}; keeping {}",
                        id,
                        owner.display(),
                        path.display(),
                        owner.display()
                    );
                }
            }
        }
    }

    /// Withdraws `path`'s claim on `id`. The node disappears with its last
    /// claimant, and the files linking to it are queued for [`Self::settle`].
    fn release(&mut self, id: &EntityId, path: &Path) {
        let Some(claimants) = self.claims.get_mut(id) else {
            return;
        };
        claimants.remove(path);

        if let Some(next_owner) = claimants.first().cloned() {
            if let (Some(idx), Some(entity)) = (
                self.ids.get(id).copied(),
                self.files
                    .get(&next_owner)
                    .and_then(|e| e.extraction.find_entity(id)),
            ) {
                self.topology[idx] = entity;
            }
            return;
        }
        self.claims.remove(id);

        let Some(idx) = self.ids.remove(id) else {
            return;
        };
        let origins: BTreeSet<PathBuf> = self
            .topology
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().kind != EdgeKind::Contains)
            .map(|e| e.weight().origin.clone())
            .filter(|origin| origin.as_path() != path)
            .collect();
        self.topology.remove_node(idx);

        if let Some(ids) = self.names.get_mut(id.simple_name()) {
            ids.remove(id);
            if ids.is_empty() {
                self.names.remove(id.simple_name());
            }
        }

        if !origins.is_empty() {
            self.orphaned.entry(id.clone()).or_default().extend(origins);
        }
    }

    /// Re-adds the edges of `origin`'s links that still name `target`.
    fn restore_edges(&mut self, origin: &Path, target: &EntityId) {
        let Some(entry) = self.files.get(origin) else {
            return;
        };
        let mut sources: Vec<(EntityId, EdgeKind)> = entry
            .links
            .calls
            .iter()
            .filter(|link| link.targets.contains(target))
            .map(|link| (link.call.caller.clone(), EdgeKind::Calls))
            .collect();
        sources.extend(
            entry
                .links
                .supertypes
                .iter()
                .filter(|link| link.target.as_ref() == Some(target))
                .map(|link| (link.reference.class.clone(), link.reference.relation.into())),
        );
        for (source, kind) in sources {
            self.add_edge(&source, target, kind, origin);
        }
    }

    /// Removes edges produced by `path` that leave any of `sources`.
    fn remove_origin_edges(&mut self, path: &Path, sources: &[EntityId], kinds: Option<&[EdgeKind]>) {
        let mut doomed: Vec<EdgeIndex> = Vec::new();
        for id in sources {
            let Some(idx) = self.node(id) else {
                continue;
            };
            doomed.extend(
                self.topology
                    .edges_directed(idx, Direction::Outgoing)
                    .filter(|e| e.weight().origin.as_path() == path)
                    .filter(|e| kinds.is_none_or(|k| k.contains(&e.weight().kind)))
                    .map(|e| e.id()),
            );
        }
        doomed.sort();
        doomed.dedup();
        for edge in doomed {
            self.topology.remove_edge(edge);
        }
    }

    fn add_edge(&mut self, from: &EntityId, to: &EntityId, kind: EdgeKind, origin: &Path) {
        if let (Some(from), Some(to)) = (self.node(from), self.node(to)) {
            let exists = self
                .topology
                .edges_connecting(from, to)
                .any(|e| e.weight().kind == kind && e.weight().origin.as_path() == origin);
            if !exists {
                self.topology.add_edge(
                    from,
                    to,
                    GraphEdge {
                        kind,
                        origin: origin.to_path_buf(),
                    },
                );
            }
        }
    }

    fn add_contains_edges(&mut self, path: &Path) {
        let Some(entry) = self.files.get(path) else {
            return;
        };
        let x = &entry.extraction;
        let pairs: Vec<(EntityId, EntityId)> = x
            .classes
            .iter()
            .filter_map(|c| c.enclosing.clone().map(|outer| (outer, c.id.clone())))
            .chain(x.methods.iter().map(|m| (m.class.clone(), m.id.clone())))
            .chain(x.fields.iter().map(|f| (f.class.clone(), f.id.clone())))
            .collect();
        for (from, to) in pairs {
            self.add_edge(&from, &to, EdgeKind::Contains, path);
        }
    }

    fn link_supertypes(&mut self, path: &Path) {
        let Some(entry) = self.files.get(path) else {
            return;
        };
        let sources: Vec<EntityId> = entry.extraction.classes.iter().map(|c| c.id.clone()).collect();
        self.remove_origin_edges(path, &sources, Some(&SUPER_EDGES));

        let Some(entry) = self.files.get(path) else {
            return;
        };
        let links = LinkResolver::new(self, &entry.extraction).link_supertypes();

        for link in &links {
            if let Some(target) = &link.target {
                self.add_edge(&link.reference.class, target, link.reference.relation.into(), path);
            }
        }
        if let Some(entry) = self.files.get_mut(path) {
            entry.links.supertypes = links;
        }
    }

    fn link_calls(&mut self, path: &Path) {
        let Some(entry) = self.files.get(path) else {
            return;
        };
        let sources: Vec<EntityId> = entry.extraction.methods.iter().map(|m| m.id.clone()).collect();
        self.remove_origin_edges(path, &sources, Some(&[EdgeKind::Calls]));

        let Some(entry) = self.files.get(path) else {
            return;
        };
        let links = LinkResolver::new(self, &entry.extraction).link_calls();

        for link in &links {
            for target in &link.targets {
                self.add_edge(&link.call.caller, target, EdgeKind::Calls, path);
            }
        }
        if let Some(entry) = self.files.get_mut(path) {
            entry.links.calls = links;
        }
    }

    // ---- Persistence support ----

    /// Rebuilds graph and indexes from stored file records, trusting the
    /// stored link outcomes. A link naming an entity that no file declares
    /// means the records are inconsistent.
    pub(crate) fn from_entries(entries: Vec<FileEntry>) -> Result<Self, String> {
        let mut state = IndexState::new();
        for entry in entries {
            let path = entry.source.path.clone();
            for entity in entry.extraction.entities() {
                state.claim(entity, &path);
            }
            state.files.insert(path, entry);
        }

        let paths: Vec<PathBuf> = state.files.keys().cloned().collect();
        for path in &paths {
            state.add_contains_edges(path);
            let links = state.files.get(path).map(|e| e.links.clone()).unwrap_or_default();
            for link in &links.supertypes {
                if let Some(target) = &link.target {
                    state.require(target, path)?;
                    state.add_edge(&link.reference.class, target, link.reference.relation.into(), path);
                }
            }
            for link in &links.calls {
                for target in &link.targets {
                    state.require(target, path)?;
                    state.add_edge(&link.call.caller, target, EdgeKind::Calls, path);
                }
            }
        }
        Ok(state)
    }

    fn require(&self, id: &EntityId, path: &Path) -> Result<(), String> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(format!("{} links to missing entity {}", path.display(), id))
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values()
    }

    #[cfg(test)]
    pub(crate) fn edge_count(&self, kind: EdgeKind) -> usize {
        self.topology.edge_weights().filter(|e| e.kind == kind).count()
    }
}

fn newly_bound(before: &FileLinks, after: &FileLinks) -> usize {
    let calls = before
        .calls
        .iter()
        .zip(after.calls.iter())
        .filter(|(b, a)| !b.is_resolved() && a.is_resolved())
        .count();
    let supers = before
        .supertypes
        .iter()
        .zip(after.supertypes.iter())
        .filter(|(b, a)| b.target.is_none() && a.target.is_some())
        .count();
    calls + supers
}

impl SymbolIndex for IndexState {
    fn has_class(&self, qualified: &str) -> bool {
        self.contains(&EntityId::class(qualified))
    }

    fn classes_named(&self, simple: &str) -> Vec<EntityId> {
        self.ids_named(simple)
            .filter(|id| id.kind == EntityKind::Class)
            .cloned()
            .collect()
    }

    fn methods_of(&self, class: &EntityId, name: &str) -> Vec<EntityId> {
        self.ids_named(name)
            .filter(|id| id.kind == EntityKind::Method && id.parent_name() == Some(class.name.as_str()))
            .cloned()
            .collect()
    }

    fn supertypes(&self, class: &EntityId) -> Vec<EntityId> {
        self.supertypes_of(class).into_iter().collect()
    }

    fn classes_declaring(&self, method_name: &str) -> Vec<EntityId> {
        let owners: BTreeSet<EntityId> = self
            .ids_named(method_name)
            .filter(|id| id.kind == EntityKind::Method)
            .filter_map(|id| id.parent_name().map(EntityId::class))
            .filter(|class| self.contains(class))
            .collect();
        owners.into_iter().collect()
    }

    fn package_of(&self, class: &EntityId) -> Option<String> {
        let entity = self.get(class)?;
        self.files
            .get(entity.file())
            .and_then(|entry| entry.extraction.package.clone())
    }
}
