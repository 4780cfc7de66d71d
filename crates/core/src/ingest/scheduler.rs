use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use super::SourceAnalyzer;
use crate::model::{Fingerprint, ParseFailure, ParseOutcome};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub parse_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            parse_timeout: Duration::from_millis(10_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseJob {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub content: Vec<u8>,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub outcome: ParseOutcome,
    pub elapsed: Duration,
}

/// Runs the analyzer for each job on the blocking pool, at most `workers` at
/// a time, and streams outcomes back in completion order.
///
/// A job that panics or outlives `parse_timeout` yields a failure for its
/// file. On timeout the permit is released and the result is discarded, but
/// the blocking thread keeps running until the analyzer returns. Dropping the
/// runtime waits for such threads; owners shut it down with
/// `Runtime::shutdown_timeout` instead.
pub struct ParallelScheduler {
    analyzer: Arc<dyn SourceAnalyzer>,
    config: SchedulerConfig,
}

impl ParallelScheduler {
    pub fn new(analyzer: Arc<dyn SourceAnalyzer>, config: SchedulerConfig) -> Self {
        Self { analyzer, config }
    }

    pub fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Must be called inside a tokio runtime. The receiver closes once every
    /// dispatched job has reported, or right after cancellation stops dispatch
    /// and in-flight jobs drain.
    pub fn dispatch(
        &self,
        jobs: Vec<ParseJob>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<JobOutcome> {
        let workers = self.workers();
        let (tx, rx) = mpsc::channel(workers * 2);
        let permits = Arc::new(Semaphore::new(workers));
        let analyzer = Arc::clone(&self.analyzer);
        let timeout = self.config.parse_timeout;

        tokio::spawn(async move {
            for job in jobs {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    permit = Arc::clone(&permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let analyzer = Arc::clone(&analyzer);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = run_job(analyzer, job, timeout).await;
                    // The receiver may be gone after cancellation.
                    let _ = tx.send(outcome).await;
                });
            }
        });

        rx
    }
}

async fn run_job(analyzer: Arc<dyn SourceAnalyzer>, job: ParseJob, timeout: Duration) -> JobOutcome {
    let started = Instant::now();
    let ParseJob {
        path,
        fingerprint,
        content,
    } = job;

    let task_path = path.clone();
    let handle = tokio::task::spawn_blocking(move || analyzer.analyze(&task_path, &content));

    let outcome = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => ParseOutcome::from(result),
        Ok(Err(join_error)) => {
            let reason = if join_error.is_panic() {
                format!("analyzer panicked: {}", panic_message(join_error.into_panic()))
            } else {
                "analysis task was cancelled".to_string()
            };
            tracing::warn!("{}: {}", path.display(), reason);
            ParseOutcome::Failed(ParseFailure::new(reason))
        }
        Err(_) => {
            tracing::warn!(
                "{}: parse timed out after {} ms",
                path.display(),
                timeout.as_millis()
            );
            ParseOutcome::Failed(ParseFailure::new(format!(
                "timed out after {} ms",
                timeout.as_millis()
            )))
        }
    };

    JobOutcome {
        path,
        fingerprint,
        outcome,
        elapsed: started.elapsed(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
