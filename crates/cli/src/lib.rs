mod clear;
mod index;
mod query;
mod view;

use clap::{Parser, Subcommand, ValueEnum};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// How long shutdown waits for blocking threads. A parse that hit its
/// timeout may still be running on one of them.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(
    name = "jindex",
    version,
    about = "Incremental structural index for Java source trees",
    long_about = "jindex scans a Java source tree, extracts classes, methods, fields, annotations, \
                  inheritance and call edges, and keeps them in a persistent index that is updated \
                  incrementally. Queries answer reference lookups, impact analysis and graph export."
)]
pub struct Cli {
    /// Also log to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a project, re-parsing only files that changed since the last run
    #[command(
        long_about = "Fingerprints every source file under the project root and re-parses the ones \
                      that changed. By default the index is stored in ~/.jindex/indices/."
    )]
    Index {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// Discard the stored index and start from scratch
        #[arg(long)]
        rebuild: bool,
        #[arg(long)]
        workers: Option<usize>,
        /// Root-relative directory to skip (repeatable)
        #[arg(long, value_name = "DIR")]
        exclude: Vec<PathBuf>,
        /// Per-file parse timeout in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// List the callers of a method
    Refs {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// Method id, e.g. `method:com.acme.Repo.save(String)`
        id: String,
        /// Also list callers whose call is unresolved but uses the same name
        #[arg(long)]
        unresolved: bool,
    },
    /// Everything that depends on an entity through callers and subtypes
    Impact {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        id: String,
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },
    /// Export the dependency graph
    Graph {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = GraphFormat::Json)]
        format: GraphFormat,
        /// Keep only entities under this package
        #[arg(long)]
        package: Option<String>,
        /// Leave out unresolved placeholders
        #[arg(long)]
        resolved_only: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-resolve every unresolved reference against the whole index
    Reconcile {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
    },
    /// Show index statistics
    Stats {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
    },
    /// Find entities by simple name
    Find {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        name: String,
        /// class, method or field
        #[arg(long)]
        kind: Option<String>,
    },
    /// Show what one file declares
    Outline {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// File path relative to the project root
        file: PathBuf,
    },
    /// List entities carrying an annotation
    Annotated {
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// Annotation name, with or without `@`
        name: String,
    },
    /// Delete built indices
    #[command(
        long_about = "Removes index files. With a path only that project's index is removed; \
                      otherwise every index in the index directory is."
    )]
    Clear {
        #[arg(value_name = "PROJECT_PATH")]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GraphFormat {
    Json,
    Dot,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = jindex_core::logging::init_logging("cli", cli.verbose);

    match cli.command {
        Commands::Index {
            path,
            rebuild,
            workers,
            exclude,
            timeout_ms,
        } => block_on(index::run(
            path,
            index::Overrides {
                rebuild,
                workers,
                exclude,
                timeout_ms,
            },
        ))?,
        Commands::Reconcile { path } => index::reconcile(path),
        Commands::Refs {
            path,
            id,
            unresolved,
        } => query::refs(path, &id, unresolved),
        Commands::Impact { path, id, depth } => query::impact(path, &id, depth),
        Commands::Graph {
            path,
            format,
            package,
            resolved_only,
            output,
        } => query::graph(path, format, package, resolved_only, output),
        Commands::Stats { path } => query::stats(path),
        Commands::Find { path, name, kind } => query::find(path, &name, kind.as_deref()),
        Commands::Outline { path, file } => query::outline(path, &file),
        Commands::Annotated { path, name } => query::annotated(path, &name),
        Commands::Clear { path } => clear::run(path),
    }
}

/// Runs `future` on a fresh runtime and shuts it down without waiting for
/// stuck blocking threads, which a plain drop would do.
fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    let output = rt.block_on(future);
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn abandoned_blocking_work_does_not_hold_up_exit() {
        let started = Instant::now();
        let value = block_on(async {
            let stuck = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(5)));
            let _ = tokio::time::timeout(Duration::from_millis(50), stuck).await;
            7
        })
        .unwrap();
        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn index_flags_parse() {
        let cli = Cli::try_parse_from([
            "jindex", "index", "proj", "--rebuild", "--workers", "4", "--exclude", "gen",
            "--exclude", "vendor", "--timeout-ms", "500",
        ])
        .unwrap();
        match cli.command {
            Commands::Index {
                path,
                rebuild,
                workers,
                exclude,
                timeout_ms,
            } => {
                assert_eq!(path, PathBuf::from("proj"));
                assert!(rebuild);
                assert_eq!(workers, Some(4));
                assert_eq!(exclude, vec![PathBuf::from("gen"), PathBuf::from("vendor")]);
                assert_eq!(timeout_ms, Some(500));
            }
            _ => panic!("expected index"),
        }
    }

    #[test]
    fn graph_defaults_to_json() {
        let cli = Cli::try_parse_from(["jindex", "graph", "proj", "--package", "com.acme"]).unwrap();
        match cli.command {
            Commands::Graph {
                format, package, ..
            } => {
                assert!(matches!(format, GraphFormat::Json));
                assert_eq!(package.as_deref(), Some("com.acme"));
            }
            _ => panic!("expected graph"),
        }
    }

    #[test]
    fn impact_depth_defaults_to_three() {
        let cli = Cli::try_parse_from(["jindex", "impact", "proj", "class:a.B"]).unwrap();
        assert!(matches!(cli.command, Commands::Impact { depth: 3, .. }));
    }
}
