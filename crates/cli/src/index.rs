use std::path::PathBuf;
use std::sync::Arc;

use jindex_core::{Indexer, IndexerConfig};
use jindex_java::JavaAnalyzer;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::view::FailureRow;

/// Flags that take precedence over the file and environment layers.
pub struct Overrides {
    pub rebuild: bool,
    pub workers: Option<usize>,
    pub exclude: Vec<PathBuf>,
    pub timeout_ms: Option<u64>,
}

fn open(path: PathBuf, rebuild: bool, apply: impl FnOnce(&mut IndexerConfig)) -> Result<Indexer, Box<dyn std::error::Error>> {
    let mut config = IndexerConfig::load(path)?;
    apply(&mut config);
    let indexer = Indexer::builder(config)
        .with_analyzer(Arc::new(JavaAnalyzer::new()?))
        .rebuild(rebuild)
        .build()?;
    Ok(indexer)
}

pub async fn run(path: PathBuf, overrides: Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let Overrides {
        rebuild,
        workers,
        exclude,
        timeout_ms,
    } = overrides;
    let indexer = open(path.clone(), rebuild, |config| {
        if let Some(workers) = workers {
            config.workers = workers;
        }
        if let Some(timeout_ms) = timeout_ms {
            config.parse_timeout_ms = timeout_ms;
        }
        config.exclude.extend(exclude);
    })?;
    info!("Indexing project at: {}...", path.display());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; finishing committed files");
            on_interrupt.cancel();
        }
    });

    let summary = indexer.run_with_cancel(cancel).await?;

    println!("{summary}");
    println!("Parsed:    {}", summary.parsed);
    println!("Unchanged: {}", summary.unchanged);
    if !summary.failed.is_empty() {
        let rows: Vec<FailureRow> = summary.failed.iter().map(FailureRow::from).collect();
        println!("{}", crate::view::table(rows));
    }
    if summary.cancelled {
        println!("Run cancelled; re-run to index the remaining files.");
    }
    Ok(())
}

pub fn reconcile(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let indexer = open(path, false, |_| {})?;
    let bound = indexer.resolve_pending()?;
    let remaining = indexer.store().unresolved_count()?;
    println!("Bound {bound} references; {remaining} still unresolved.");
    Ok(())
}
