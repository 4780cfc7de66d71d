use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use jindex_core::model::EntityId;
use jindex_core::{Indexer, IndexerConfig};
use jindex_java::JavaAnalyzer;
use tempfile::TempDir;

/// A throwaway project root with its own index directory.
pub struct Project {
    pub root: TempDir,
    pub index: TempDir,
}

#[allow(dead_code)]
impl Project {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            index: TempDir::new().unwrap(),
        }
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let project = Self::new();
        for (path, body) in files {
            project.write(path, body);
        }
        project
    }

    pub fn write(&self, rel: &str, body: &str) {
        let path = self.root.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    pub fn delete(&self, rel: &str) {
        fs::remove_file(self.root.path().join(rel)).unwrap();
    }

    pub fn config(&self) -> IndexerConfig {
        let mut config = IndexerConfig::new(self.root.path());
        config.index_dir = Some(self.index.path().to_path_buf());
        config
    }

    pub fn indexer(&self) -> Indexer {
        self.indexer_with(self.config())
    }

    pub fn indexer_with(&self, config: IndexerConfig) -> Indexer {
        Indexer::builder(config)
            .with_analyzer(Arc::new(JavaAnalyzer::new().unwrap()))
            .build()
            .unwrap()
    }

    pub fn index_file(&self) -> PathBuf {
        self.config().index_path()
    }

    pub fn index_bytes(&self) -> Vec<u8> {
        fs::read(self.index_file()).unwrap()
    }
}

#[allow(dead_code)]
pub fn id(text: &str) -> EntityId {
    text.parse().unwrap()
}
