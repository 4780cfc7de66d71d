//! Run orchestration: scan, detect, remove, parse, commit, re-link, persist.

mod summary;

pub use summary::{FailedFile, RunSummary};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use crate::detect::{ChangeDetector, Scanner};
use crate::error::{IndexError, Result};
use crate::ingest::{ParallelScheduler, ParseJob, SchedulerConfig, SourceAnalyzer};
use crate::model::ParseOutcome;
use crate::query::QueryEngine;
use crate::store::{IndexStore, StoreLock};

pub struct IndexerBuilder {
    config: IndexerConfig,
    analyzer: Option<Arc<dyn SourceAnalyzer>>,
    rebuild: bool,
}

impl IndexerBuilder {
    pub fn with_analyzer(mut self, analyzer: Arc<dyn SourceAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Start from an empty index instead of loading the stored one. This is
    /// the recovery path after a corruption or version error.
    pub fn rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    pub fn build(mut self) -> Result<Indexer> {
        let analyzer = self
            .analyzer
            .ok_or_else(|| IndexError::Config("no source analyzer registered".into()))?;
        if self.config.extensions.is_empty() {
            self.config.extensions = analyzer.extensions().iter().map(|e| e.to_string()).collect();
        }
        self.config.validate()?;
        tracing::debug!(
            "Using the {} analyzer for .{}",
            analyzer.language(),
            self.config.extensions.join(", .")
        );

        let index_path = self.config.index_path();
        let lock = StoreLock::acquire(&index_path)?;
        tracing::debug!("Holding writer lock {}", lock.path().display());
        let store = if self.rebuild {
            tracing::info!("Rebuilding index at {}", index_path.display());
            IndexStore::create(&index_path)
        } else {
            IndexStore::open(&index_path)?
        };

        Ok(Indexer {
            config: self.config,
            store: Arc::new(store),
            analyzer,
            _lock: lock,
        })
    }
}

/// Owns the store of one project root for the lifetime of the process and
/// holds its writer lock.
pub struct Indexer {
    config: IndexerConfig,
    store: Arc<IndexStore>,
    analyzer: Arc<dyn SourceAnalyzer>,
    _lock: StoreLock,
}

impl Indexer {
    pub fn builder(config: IndexerConfig) -> IndexerBuilder {
        IndexerBuilder {
            config,
            analyzer: None,
            rebuild: false,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Query engine over the current snapshot.
    pub fn query(&self) -> Result<QueryEngine> {
        Ok(QueryEngine::new(self.store.snapshot()?))
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// One incremental pass over the project root. Cancelling stops dispatch,
    /// discards outcomes not yet committed and persists what was committed.
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let stored = self.store.fingerprints()?;
        let (scanned, unreadable) = {
            let root = self.config.root.clone();
            let extensions = self.config.extensions.clone();
            let exclude = self.config.exclude.clone();
            let stored = stored.clone();
            tokio::task::spawn_blocking(move || {
                let scanner = Scanner::new(&root, &extensions, &exclude);
                let listing = scanner.collect_paths();
                let scanned = scanner.fingerprint(&listing.paths, &stored);
                (scanned, listing.unreadable)
            })
            .await
            .map_err(|e| IndexError::Internal(format!("scan join failure: {e}")))?
        };

        let mut changes = ChangeDetector::detect(
            scanned.iter().map(|f| (&f.path, &f.fingerprint)),
            &stored,
        );
        let kept = changes.keep_unlisted(&unreadable);
        if kept > 0 {
            tracing::warn!(
                "{} indexed files sit below unreadable directories; keeping them",
                kept
            );
        }
        summary.added = changes.added.len();
        summary.modified = changes.modified.len();
        summary.removed = changes.removed.len();
        summary.unchanged = changes.unchanged.len();
        tracing::info!(
            "Scanned {} files: {} added, {} modified, {} removed, {} unchanged",
            scanned.len(),
            summary.added,
            summary.modified,
            summary.removed,
            summary.unchanged
        );

        for path in &changes.removed {
            self.store.remove_file(path)?;
        }

        let jobs: Vec<ParseJob> = scanned
            .into_iter()
            .filter(|f| changes.added.contains(&f.path) || changes.modified.contains(&f.path))
            .filter_map(|f| match f.content {
                Some(content) => Some(ParseJob {
                    path: f.path,
                    fingerprint: f.fingerprint,
                    content,
                }),
                None => {
                    tracing::warn!("No content captured for {}; skipping", f.path.display());
                    None
                }
            })
            .collect();

        let mut committed: Vec<PathBuf> = Vec::new();
        if !jobs.is_empty() {
            let scheduler = ParallelScheduler::new(
                Arc::clone(&self.analyzer),
                SchedulerConfig {
                    workers: self.config.workers,
                    parse_timeout: self.config.parse_timeout(),
                },
            );
            tracing::info!(
                "Parsing {} files with {} workers",
                jobs.len(),
                scheduler.workers()
            );

            let mut outcomes = scheduler.dispatch(jobs, cancel.clone());
            let mut since_checkpoint = 0usize;
            loop {
                let done = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    done = outcomes.recv() => match done {
                        Some(done) => done,
                        None => break,
                    },
                };

                summary.parsed += 1;
                match &done.outcome {
                    ParseOutcome::Parsed(_) => {
                        tracing::debug!(
                            "Parsed {} in {:?}",
                            done.path.display(),
                            done.elapsed
                        );
                        committed.push(done.path.clone());
                    }
                    ParseOutcome::Failed(failure) => {
                        tracing::warn!("Failed to parse {}: {}", done.path.display(), failure);
                        summary.failed.push(FailedFile {
                            path: done.path.clone(),
                            reason: failure.to_string(),
                        });
                    }
                }
                self.store
                    .commit_file(&done.path, done.fingerprint, done.outcome)?;

                since_checkpoint += 1;
                if self.config.checkpoint_every > 0 && since_checkpoint >= self.config.checkpoint_every {
                    self.store.save()?;
                    since_checkpoint = 0;
                }
            }
        }

        if summary.cancelled {
            tracing::info!("Run cancelled after {} commits", summary.parsed);
        }

        // Detaches queued by removals and commits are decided against the
        // final entity set, then the links of committed files are redone so
        // none of them depends on commit order.
        committed.sort();
        self.store.relink(&committed)?;

        self.store.save()?;

        summary.failed.sort_by(|a, b| a.path.cmp(&b.path));
        summary.unresolved = self.store.unresolved_count()?;
        summary.duration = started.elapsed();
        tracing::info!("{}", summary);
        Ok(summary)
    }

    /// Explicit index-wide reconciliation of unresolved references. Returns
    /// the number of links that gained a target.
    pub fn resolve_pending(&self) -> Result<usize> {
        let bound = self.store.resolve_pending()?;
        self.store.save()?;
        tracing::info!("Reconciliation bound {} references", bound);
        Ok(bound)
    }

    /// Forgets everything and deletes the stored index.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}
