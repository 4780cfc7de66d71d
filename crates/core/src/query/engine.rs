use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use super::model::{
    AnnotatedEntity, Caller, DependencyGraph, FileOutline, GraphLink, GraphNode, GraphScope,
    ImpactEntry, NamedCallSite,
};
use crate::error::{IndexError, Result};
use crate::model::{Entity, EntityId, EntityKind, Reference};
use crate::store::{EdgeKind, IndexState, IndexStats};

const IMPACT_EDGES: [EdgeKind; 3] = [EdgeKind::Calls, EdgeKind::Extends, EdgeKind::Implements];

/// Read-only queries over one committed snapshot. Results never change
/// underneath a caller, even while a run commits further files.
#[derive(Clone)]
pub struct QueryEngine {
    state: Arc<IndexState>,
}

impl QueryEngine {
    pub fn new(state: Arc<IndexState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    fn require(&self, id: &EntityId) -> Result<()> {
        if self.state.contains(id) {
            Ok(())
        } else {
            Err(IndexError::NotFound(id.clone()))
        }
    }

    pub fn get(&self, id: &EntityId) -> Result<Entity> {
        self.state
            .get(id)
            .cloned()
            .ok_or_else(|| IndexError::NotFound(id.clone()))
    }

    /// Callers of `method`, ordered by id. With `include_unresolved`, methods
    /// holding an unresolved call with the same simple name are appended
    /// (flagged `resolved: false`).
    pub fn references(&self, method: &EntityId, include_unresolved: bool) -> Result<Vec<Caller>> {
        self.require(method)?;

        let resolved = self.state.callers_of(method);
        let mut callers: Vec<Caller> = resolved
            .iter()
            .map(|id| Caller {
                id: id.clone(),
                resolved: true,
            })
            .collect();

        if include_unresolved {
            let name = method.simple_name();
            let pending: BTreeSet<EntityId> = self
                .state
                .files()
                .values()
                .flat_map(|entry| entry.links.calls.iter())
                .filter(|link| !link.is_resolved() && link.call.name == name)
                .map(|link| link.call.caller.clone())
                .filter(|caller| !resolved.contains(caller))
                .collect();
            callers.extend(pending.into_iter().map(|id| Caller {
                id,
                resolved: false,
            }));
        }

        callers.sort_by_key(|c| c.id.to_string());
        Ok(callers)
    }

    /// Everything that transitively depends on `id` through callers and
    /// subtypes, breadth-first up to `max_depth`. The start entity itself is
    /// not reported, even when a cycle leads back to it.
    pub fn impact(&self, id: &EntityId, max_depth: usize) -> Result<Vec<ImpactEntry>> {
        self.require(id)?;
        let graph = self.state.topology();

        let mut visited: HashSet<EntityId> = HashSet::from([id.clone()]);
        let mut queue: VecDeque<(EntityId, usize)> = VecDeque::from([(id.clone(), 0)]);
        let mut reached = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(idx) = self.state.node(&current) else {
                continue;
            };
            let mut next: Vec<EntityId> = graph
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| IMPACT_EDGES.contains(&e.weight().kind))
                .filter_map(|e| graph.node_weight(e.source()).map(|n| n.id().clone()))
                .collect();
            next.sort();
            next.dedup();
            for dependent in next {
                if visited.insert(dependent.clone()) {
                    reached.push(ImpactEntry {
                        id: dependent.clone(),
                        depth: depth + 1,
                    });
                    queue.push_back((dependent, depth + 1));
                }
            }
        }

        reached.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        Ok(reached)
    }

    pub fn dependency_graph(&self, scope: &GraphScope) -> DependencyGraph {
        let graph = self.state.topology();

        let mut nodes: Vec<GraphNode> = graph
            .node_weights()
            .filter(|entity| scope.matches_entity(entity.id()))
            .map(|entity| GraphNode {
                id: entity.id().clone(),
                name: entity.name().to_string(),
                file: entity.file().to_path_buf(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let included: HashSet<&EntityId> = nodes.iter().map(|n| &n.id).collect();

        let mut edges: BTreeSet<GraphLink> = graph
            .edge_references()
            .filter(|e| scope.matches_edge(e.weight().kind))
            .filter_map(|e| {
                let source = graph.node_weight(e.source())?.id();
                let target = graph.node_weight(e.target())?.id();
                (included.contains(source) && included.contains(target)).then(|| GraphLink {
                    source: source.clone(),
                    target: Reference::Resolved(target.clone()),
                    kind: e.weight().kind,
                })
            })
            .collect();

        if scope.include_unresolved {
            for (path, entry) in self.state.files() {
                if scope.matches_edge(EdgeKind::Calls) {
                    for edge in entry.links.call_edges(path) {
                        if matches!(edge.callee, Reference::Unresolved { .. })
                            && included.contains(&edge.caller)
                        {
                            edges.insert(GraphLink {
                                source: edge.caller,
                                target: edge.callee,
                                kind: EdgeKind::Calls,
                            });
                        }
                    }
                }
                for edge in entry.links.inheritance_edges(path) {
                    let kind = EdgeKind::from(edge.relation);
                    if matches!(edge.supertype, Reference::Unresolved { .. })
                        && scope.matches_edge(kind)
                        && included.contains(&edge.subclass)
                    {
                        edges.insert(GraphLink {
                            source: edge.subclass,
                            target: edge.supertype,
                            kind,
                        });
                    }
                }
            }
        }

        DependencyGraph {
            nodes,
            edges: edges.into_iter().collect(),
        }
    }

    /// The whole index, placeholders included.
    pub fn export_graph(&self) -> DependencyGraph {
        self.dependency_graph(&GraphScope::all())
    }

    /// Every call site whose method name is `name`, resolved or not.
    ///
    /// Files that recorded their identifiers are skipped unless `name` is one
    /// of them; files without that list are always scanned.
    pub fn references_by_name(&self, name: &str) -> Vec<NamedCallSite> {
        let mut sites: Vec<NamedCallSite> = self
            .state
            .files()
            .iter()
            .filter(|(_, entry)| {
                let identifiers = &entry.extraction.identifiers;
                identifiers.is_empty() || identifiers.binary_search_by(|i| i.as_str().cmp(name)).is_ok()
            })
            .flat_map(|(path, entry)| {
                entry
                    .links
                    .calls
                    .iter()
                    .filter(move |link| link.call.name == name)
                    .map(move |link| NamedCallSite {
                        caller: link.call.caller.clone(),
                        file: path.clone(),
                        span: link.call.span,
                        targets: link.targets.clone(),
                    })
            })
            .collect();
        sites.sort_by(|a, b| {
            a.caller
                .cmp(&b.caller)
                .then_with(|| a.span.start_line.cmp(&b.span.start_line))
                .then_with(|| a.span.start_col.cmp(&b.span.start_col))
        });
        sites
    }

    pub fn outline(&self, path: &Path) -> Result<FileOutline> {
        let entry = self
            .state
            .file(path)
            .ok_or_else(|| IndexError::FileNotFound(path.to_path_buf()))?;
        Ok(FileOutline {
            path: path.to_path_buf(),
            package: entry.extraction.package.clone(),
            imports: entry.extraction.imports.clone(),
            status: entry.source.status.clone(),
            fingerprint: entry.source.fingerprint,
            entities: entry.extraction.entities().collect(),
            unresolved: entry.links.unresolved_count(),
        })
    }

    /// Entities carrying an annotation whose simple name is that of `name`
    /// (`Service` and `org.springframework.stereotype.Service` both match).
    pub fn annotated_with(&self, name: &str) -> Vec<AnnotatedEntity> {
        let wanted = simple(name);
        let mut found: Vec<AnnotatedEntity> = self
            .state
            .topology()
            .node_weights()
            .flat_map(|entity| {
                entity
                    .annotations()
                    .iter()
                    .filter(move |a| simple(&a.name) == wanted)
                    .map(|a| AnnotatedEntity {
                        id: entity.id().clone(),
                        annotation: a.clone(),
                    })
            })
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Ids whose simple name is `name`, optionally restricted to one kind.
    pub fn find(&self, name: &str, kind: Option<EntityKind>) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .state
            .ids_named(name)
            .filter(|id| kind.is_none_or(|k| id.kind == k))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> IndexStats {
        self.state.stats()
    }
}

fn simple(name: &str) -> &str {
    let name = name.trim_start_matches('@');
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Annotation, ClassEntity, ClassFlavor, FileExtraction, Fingerprint, MethodEntity, Range,
        RawCall, Receiver,
    };
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn class(file: &str, qname: &str) -> ClassEntity {
        ClassEntity {
            id: EntityId::class(qname),
            name: qname.rsplit('.').next().unwrap().to_string(),
            flavor: ClassFlavor::Class,
            file: PathBuf::from(file),
            span: Range::default(),
            modifiers: vec![],
            annotations: vec![],
            type_parameters: vec![],
            superclass: None,
            interfaces: vec![],
            enclosing: None,
        }
    }

    fn method(file: &str, class: &str, name: &str) -> MethodEntity {
        MethodEntity {
            id: EntityId::method(format!("{class}.{name}()")),
            name: name.to_string(),
            class: EntityId::class(class),
            file: PathBuf::from(file),
            span: Range::default(),
            modifiers: vec![],
            annotations: vec![],
            return_type: None,
            parameters: vec![],
            is_constructor: false,
        }
    }

    /// Chain `C.c() -> B.b() -> A.a()`, plus a dangling `ghost()` call in C.
    fn engine() -> QueryEngine {
        let mut state = IndexState::new();
        let mut previous: Option<(&str, &str)> = None;
        for (file, cls, name) in [("A.java", "A", "a"), ("B.java", "B", "b"), ("C.java", "C", "c")] {
            let mut x = FileExtraction::new(file);
            let mut c = class(file, cls);
            if cls == "A" {
                c.annotations.push(Annotation {
                    name: "org.acme.Service".into(),
                    arguments: BTreeMap::new(),
                    target: c.id.clone(),
                });
            }
            x.classes.push(c);
            let m = method(file, cls, name);
            if let Some((callee_class, callee)) = previous {
                x.calls.push(RawCall {
                    caller: m.id.clone(),
                    scope: m.class.clone(),
                    name: callee.into(),
                    arguments: 0,
                    receiver: Receiver::Type(callee_class.into()),
                    span: Range::default(),
                });
            }
            if cls == "C" {
                x.calls.push(RawCall {
                    caller: m.id.clone(),
                    scope: m.class.clone(),
                    name: "ghost".into(),
                    arguments: 0,
                    receiver: Receiver::Unknown,
                    span: Range::new(3, 4, 3, 11),
                });
            }
            x.methods.push(m);
            state.commit(Fingerprint::of(file.as_bytes()), x);
            previous = Some((cls, name));
        }
        QueryEngine::new(Arc::new(state))
    }

    #[test]
    fn references_are_direct_callers_only() {
        let q = engine();
        let callers = q.references(&EntityId::method("A.a()"), false).unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].id, EntityId::method("B.b()"));
        assert!(callers[0].resolved);
    }

    #[test]
    fn impact_is_depth_ordered_and_bounded() {
        let q = engine();
        let all = q.impact(&EntityId::method("A.a()"), 5).unwrap();
        assert_eq!(
            all,
            vec![
                ImpactEntry { id: EntityId::method("B.b()"), depth: 1 },
                ImpactEntry { id: EntityId::method("C.c()"), depth: 2 },
            ]
        );
        assert_eq!(q.impact(&EntityId::method("A.a()"), 1).unwrap().len(), 1);
        assert!(q.impact(&EntityId::method("A.a()"), 0).unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_are_errors_not_empty_results() {
        let q = engine();
        let missing = EntityId::method("Z.z()");
        assert!(matches!(q.references(&missing, true), Err(IndexError::NotFound(_))));
        assert!(matches!(q.impact(&missing, 3), Err(IndexError::NotFound(_))));
        assert!(matches!(
            q.outline(Path::new("Z.java")),
            Err(IndexError::FileNotFound(_))
        ));
    }

    #[test]
    fn graph_scope_filters_and_placeholders() {
        let q = engine();
        let full = q.export_graph();
        assert_eq!(full.nodes.len(), 6);
        assert!(full.edges.iter().any(|e| matches!(
            &e.target,
            Reference::Unresolved { name, .. } if name == "ghost"
        )));

        let calls_only = q.dependency_graph(&GraphScope {
            kinds: Some(BTreeSet::from([EntityKind::Method])),
            edge_kinds: Some(BTreeSet::from([EdgeKind::Calls])),
            ..Default::default()
        });
        assert_eq!(calls_only.nodes.len(), 3);
        assert_eq!(calls_only.edges.len(), 2);

        let dot = full.to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("?ghost"));
    }

    #[test]
    fn identifier_list_narrows_name_lookup() {
        let mut state = IndexState::new();
        for (file, identifiers) in [("Scouted.java", vec!["S", "run", "s"]), ("Other.java", vec!["O", "o"])] {
            let cls = file.trim_end_matches(".java");
            let mut x = FileExtraction::new(file);
            x.classes.push(class(file, cls));
            let m = method(file, cls, &cls.to_lowercase());
            x.calls.push(RawCall {
                caller: m.id.clone(),
                scope: m.class.clone(),
                name: "run".into(),
                arguments: 0,
                receiver: Receiver::Unknown,
                span: Range::default(),
            });
            x.methods.push(m);
            x.identifiers = identifiers.into_iter().map(String::from).collect();
            state.commit(Fingerprint::of(file.as_bytes()), x);
        }
        let q = QueryEngine::new(Arc::new(state));

        let sites = q.references_by_name("run");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].file, PathBuf::from("Scouted.java"));
    }

    #[test]
    fn name_based_lookups() {
        let q = engine();
        let ghost = q.references_by_name("ghost");
        assert_eq!(ghost.len(), 1);
        assert!(ghost[0].targets.is_empty());
        assert_eq!(ghost[0].file, PathBuf::from("C.java"));

        let services = q.annotated_with("@Service");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, EntityId::class("A"));

        assert_eq!(q.find("b", Some(EntityKind::Method)), vec![EntityId::method("B.b()")]);
    }

    #[test]
    fn outline_lists_declared_entities() {
        let q = engine();
        let outline = q.outline(Path::new("C.java")).unwrap();
        assert_eq!(outline.entities.len(), 2);
        assert_eq!(outline.unresolved, 1);
        assert!(outline.status.is_ok());
    }
}
