//! Indexer settings, layered: defaults, then `jindex.json` in the project
//! root, then `JINDEX_*` environment variables. Callers apply explicit
//! overrides (CLI flags) last and call [`IndexerConfig::validate`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IndexError, Result};

pub const CONFIG_FILE: &str = "jindex.json";
pub const DEFAULT_INDEX_DIR: &str = ".jindex/indices";

pub const ENV_INDEX_DIR: &str = "JINDEX_INDEX_DIR";
pub const ENV_WORKERS: &str = "JINDEX_WORKERS";
pub const ENV_PARSE_TIMEOUT_MS: &str = "JINDEX_PARSE_TIMEOUT_MS";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IndexerConfig {
    /// Project root; always taken from the caller, never from the file.
    #[serde(skip)]
    pub root: PathBuf,
    /// Where index files live. `None` means `~/.jindex/indices`.
    pub index_dir: Option<PathBuf>,
    /// Root-relative directory prefixes to skip.
    pub exclude: Vec<PathBuf>,
    pub workers: usize,
    pub parse_timeout_ms: u64,
    /// Persist after every N commits; 0 persists only at the end of a run.
    pub checkpoint_every: usize,
    /// File extensions to index; empty means the analyzer's own list.
    pub extensions: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index_dir: None,
            exclude: Vec::new(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            parse_timeout_ms: 10_000,
            checkpoint_every: 0,
            extensions: Vec::new(),
        }
    }
}

impl IndexerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Defaults, then `<root>/jindex.json` if present, then the environment.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut config = Self::from_file(&root.join(CONFIG_FILE))?.unwrap_or_default();
        config.root = root;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)
            .map_err(|e| IndexError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(Some(config))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup(ENV_INDEX_DIR).filter(|v| !v.is_empty()) {
            self.index_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            self.workers = parse_number(ENV_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_PARSE_TIMEOUT_MS) {
            self.parse_timeout_ms = parse_number(ENV_PARSE_TIMEOUT_MS, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(IndexError::Config("workers must be at least 1".into()));
        }
        if self.parse_timeout_ms == 0 {
            return Err(IndexError::Config("parse_timeout_ms must be positive".into()));
        }
        if self.extensions.is_empty() {
            return Err(IndexError::Config("no source extensions configured".into()));
        }
        if self.exclude.iter().any(|p| p.is_absolute()) {
            return Err(IndexError::Config(
                "exclude entries must be relative to the project root".into(),
            ));
        }
        Ok(())
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_millis(self.parse_timeout_ms)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.index_dir.clone().unwrap_or_else(default_index_dir)
    }

    /// `<index_dir>/<first 16 hex digits of sha256(canonical root)>.bin`
    pub fn index_path(&self) -> PathBuf {
        let canonical = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
        let name = hex::encode(digest);
        self.index_dir().join(format!("{}.bin", &name[..16]))
    }
}

pub fn default_index_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_INDEX_DIR)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IndexError::Config(format!("{key}: expected a number, got '{value}'")))
}
