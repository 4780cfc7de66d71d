use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::extraction::{RawCall, RawSupertype, SuperRelation};
use super::id::EntityId;

/// Resolution outcome of one call site. No targets means the call is an
/// unresolved placeholder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CallLink {
    pub call: RawCall,
    pub targets: Vec<EntityId>,
}

impl CallLink {
    pub fn is_resolved(&self) -> bool {
        !self.targets.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SupertypeLink {
    pub reference: RawSupertype,
    pub target: Option<EntityId>,
}

/// Link outcomes for the references of one file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLinks {
    pub calls: Vec<CallLink>,
    pub supertypes: Vec<SupertypeLink>,
}

impl FileLinks {
    pub fn unresolved_count(&self) -> usize {
        self.calls.iter().filter(|c| !c.is_resolved()).count()
            + self.supertypes.iter().filter(|s| s.target.is_none()).count()
    }

    /// Drops `target` from every link that points at it. Returns how many
    /// links were touched.
    pub fn detach_target(&mut self, target: &EntityId) -> usize {
        let mut touched = 0;
        for link in &mut self.calls {
            let before = link.targets.len();
            link.targets.retain(|t| t != target);
            if link.targets.len() != before {
                touched += 1;
            }
        }
        for link in &mut self.supertypes {
            if link.target.as_ref() == Some(target) {
                link.target = None;
                touched += 1;
            }
        }
        touched
    }

    pub fn call_edges(&self, file: &Path) -> Vec<CallEdge> {
        let mut edges = Vec::new();
        for link in &self.calls {
            if link.targets.is_empty() {
                edges.push(CallEdge {
                    caller: link.call.caller.clone(),
                    callee: Reference::Unresolved {
                        name: link.call.name.clone(),
                        file: file.to_path_buf(),
                    },
                });
            }
            for target in &link.targets {
                edges.push(CallEdge {
                    caller: link.call.caller.clone(),
                    callee: Reference::Resolved(target.clone()),
                });
            }
        }
        edges
    }

    pub fn inheritance_edges(&self, file: &Path) -> Vec<InheritanceEdge> {
        self.supertypes
            .iter()
            .map(|link| InheritanceEdge {
                subclass: link.reference.class.clone(),
                relation: link.reference.relation,
                supertype: match &link.target {
                    Some(target) => Reference::Resolved(target.clone()),
                    None => Reference::Unresolved {
                        name: link.reference.name.clone(),
                        file: file.to_path_buf(),
                    },
                },
            })
            .collect()
    }
}

/// Target side of an edge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Reference {
    Resolved(EntityId),
    /// Placeholder carrying the raw simple name and the file that holds the reference.
    Unresolved { name: String, file: PathBuf },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallEdge {
    pub caller: EntityId,
    pub callee: Reference,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InheritanceEdge {
    pub subclass: EntityId,
    pub relation: SuperRelation,
    pub supertype: Reference,
}
