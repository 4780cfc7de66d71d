use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// SHA-256 digest of a file's bytes.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

/// One-based source position used in failure reports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub reason: String,
    pub location: Option<Position>,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            location: None,
        }
    }

    pub fn at(reason: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            reason: reason.into(),
            location: Some(Position { line, column }),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(pos) => write!(f, "{} at {}:{}", self.reason, pos.line, pos.column),
            None => f.write_str(&self.reason),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum ParseStatus {
    Ok,
    Failed(ParseFailure),
}

impl ParseStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseStatus::Ok)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Fingerprint of the last successfully indexed content. `None` until the
    /// file parses once.
    pub fingerprint: Option<Fingerprint>,
    /// Unix epoch milliseconds of the last commit attempt.
    pub last_indexed: u64,
    pub status: ParseStatus,
}

impl SourceFile {
    pub fn new(path: PathBuf, fingerprint: Option<Fingerprint>, status: ParseStatus) -> Self {
        Self {
            path,
            fingerprint,
            last_indexed: now_millis(),
            status,
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
