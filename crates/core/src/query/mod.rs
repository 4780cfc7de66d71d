pub mod engine;
pub mod model;

pub use engine::QueryEngine;
pub use model::{
    AnnotatedEntity, Caller, DependencyGraph, FileOutline, GraphLink, GraphNode, GraphScope,
    ImpactEntry, NamedCallSite,
};
