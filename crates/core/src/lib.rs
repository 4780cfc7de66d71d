//! Incremental structural index of a source tree.
//!
//! A run fingerprints the tree, re-parses only files whose content changed,
//! commits each file's entities atomically and keeps call and inheritance
//! edges between them. See [`runtime::Indexer`] for the entry point and
//! [`query::QueryEngine`] for reading the result.

pub mod config;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod link;
pub mod logging;
pub mod model;
pub mod query;
pub mod runtime;
pub mod store;

pub use config::IndexerConfig;
pub use error::{IndexError, Result};
pub use ingest::SourceAnalyzer;
pub use query::QueryEngine;
pub use runtime::{Indexer, RunSummary};
pub use store::IndexStore;
