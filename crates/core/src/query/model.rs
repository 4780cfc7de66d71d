use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::model::{
    Annotation, Entity, EntityId, EntityKind, Fingerprint, Import, ParseStatus, Range, Reference,
};
use crate::store::EdgeKind;

/// A caller of some method. `resolved` is false for call sites that only
/// match by name and are still unresolved placeholders.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: EntityId,
    pub resolved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImpactEntry {
    pub id: EntityId,
    pub depth: usize,
}

/// A call site found by method name alone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NamedCallSite {
    pub caller: EntityId,
    pub file: PathBuf,
    pub span: Range,
    pub targets: Vec<EntityId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedEntity {
    pub id: EntityId,
    pub annotation: Annotation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileOutline {
    pub path: PathBuf,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub status: ParseStatus,
    pub fingerprint: Option<Fingerprint>,
    pub entities: Vec<Entity>,
    pub unresolved: usize,
}

/// Filter for [`super::QueryEngine::dependency_graph`]. `None` means no
/// restriction on that axis.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphScope {
    /// Qualified-name prefix, matched on whole segments (`com.acme` matches
    /// `com.acme.Repo` but not `com.acmex.Repo`).
    pub package: Option<String>,
    pub kinds: Option<BTreeSet<EntityKind>>,
    pub edge_kinds: Option<BTreeSet<EdgeKind>>,
    pub include_unresolved: bool,
}

impl GraphScope {
    /// Everything, placeholders included.
    pub fn all() -> Self {
        Self {
            include_unresolved: true,
            ..Default::default()
        }
    }

    pub fn matches_entity(&self, id: &EntityId) -> bool {
        if let Some(kinds) = &self.kinds
            && !kinds.contains(&id.kind)
        {
            return false;
        }
        match &self.package {
            Some(prefix) if !prefix.is_empty() => {
                id.name == *prefix
                    || id
                        .name
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }
            _ => true,
        }
    }

    pub fn matches_edge(&self, kind: EdgeKind) -> bool {
        self.edge_kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: EntityId,
    pub name: String,
    pub file: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphLink {
    pub source: EntityId,
    pub target: Reference,
    pub kind: EdgeKind,
}

/// Exported subgraph. Nodes and edges are sorted, so equal indexes export
/// identically.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphLink>,
}

impl DependencyGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Graphviz rendering. Unresolved targets appear as `?name` nodes.
    pub fn to_dot(&self) -> String {
        let mut graph: DiGraph<String, String> = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();

        let mut node_for = |graph: &mut DiGraph<String, String>, label: String| {
            *index
                .entry(label.clone())
                .or_insert_with(|| graph.add_node(label))
        };

        for node in &self.nodes {
            node_for(&mut graph, node.id.to_string());
        }
        for edge in &self.edges {
            let source = node_for(&mut graph, edge.source.to_string());
            let target_label = match &edge.target {
                Reference::Resolved(id) => id.to_string(),
                Reference::Unresolved { name, .. } => format!("?{name}"),
            };
            let target = node_for(&mut graph, target_label);
            graph.add_edge(source, target, edge.kind.as_str().to_string());
        }

        format!("{}", Dot::new(&graph))
    }
}
