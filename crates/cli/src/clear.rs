use std::path::PathBuf;
use std::sync::Arc;

use jindex_core::{Indexer, IndexerConfig};
use jindex_java::JavaAnalyzer;
use tracing::info;

pub fn run(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let indexer = Indexer::builder(IndexerConfig::load(path.clone())?)
            .with_analyzer(Arc::new(JavaAnalyzer::new()?))
            .rebuild(true)
            .build()?;
        info!("Clearing index for project at: {}...", path.display());
        indexer.clear()?;
        println!("Index for {} cleared.", path.display());
        return Ok(());
    }

    let mut config = IndexerConfig::default();
    config.apply_env(|key| std::env::var(key).ok())?;
    let dir = config.index_dir();
    if !dir.exists() {
        println!("No indices at {}.", dir.display());
        return Ok(());
    }
    info!("Clearing all indices at: {}...", dir.display());
    let mut removed = 0usize;
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "bin") {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    println!("Removed {removed} indices from {}.", dir.display());
    Ok(())
}
