//! On-disk envelope: `MAGIC | version (u32 LE) | sha256(payload) | payload`,
//! where payload is zstd-compressed MessagePack of the per-file records.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::state::{FileEntry, IndexState};
use crate::error::{IndexError, Result};

pub const MAGIC: &[u8; 8] = b"JINDEX\x00\x01";
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4 + 32;

#[derive(Serialize)]
struct StoredIndexRef<'a> {
    files: Vec<&'a FileEntry>,
}

#[derive(Deserialize)]
struct StoredIndex {
    files: Vec<FileEntry>,
}

pub fn encode(state: &IndexState) -> Result<Vec<u8>> {
    let stored = StoredIndexRef {
        files: state.entries().collect(),
    };
    // Named encoding: internally tagged enums do not survive the compact form.
    let packed = rmp_serde::to_vec_named(&stored)
        .map_err(|e| IndexError::Encode(format!("MSGPACK error: {e}")))?;
    let payload = zstd::encode_all(&packed[..], 0)
        .map_err(|e| IndexError::Encode(format!("Zstd compression failed: {e}")))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&Sha256::digest(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode(path: &Path, bytes: &[u8]) -> Result<IndexState> {
    let corrupt = |reason: String| IndexError::StoreCorruption {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }
    let (version, rest) = rest.split_at(4);
    let found = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
    if found != FORMAT_VERSION {
        return Err(IndexError::StoreVersion {
            path: path.to_path_buf(),
            found,
            expected: FORMAT_VERSION,
        });
    }
    let (digest, payload) = rest.split_at(32);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    let packed = zstd::decode_all(payload)
        .map_err(|e| corrupt(format!("zstd decompression failed: {e}")))?;
    let stored: StoredIndex =
        rmp_serde::from_slice(&packed).map_err(|e| corrupt(format!("MSGPACK error: {e}")))?;

    IndexState::from_entries(stored.files).map_err(corrupt)
}

/// Loads the store at `path`. A missing file is an empty history, anything
/// unreadable is an error.
pub fn load(path: &Path) -> Result<Option<IndexState>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let state = decode(path, &bytes)?;
    tracing::info!(
        "Loaded index from {} ({} files, {} entities)",
        path.display(),
        state.files().len(),
        state.entity_count()
    );
    Ok(Some(state))
}

/// Writes to a sibling temp file and renames it over `path`.
pub fn save(state: &IndexState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = encode(state)?;

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;

    tracing::info!("Saved index to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassEntity, ClassFlavor, EntityId, FileExtraction, Fingerprint, Range};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_state() -> IndexState {
        let mut x = FileExtraction::new("a/Thing.java");
        x.package = Some("a".into());
        x.classes.push(ClassEntity {
            id: EntityId::class("a.Thing"),
            name: "Thing".into(),
            flavor: ClassFlavor::Record,
            file: PathBuf::from("a/Thing.java"),
            span: Range::new(0, 0, 2, 1),
            modifiers: vec!["public".into()],
            annotations: vec![],
            type_parameters: vec![],
            superclass: None,
            interfaces: vec![],
            enclosing: None,
        });
        let mut state = IndexState::new();
        state.commit(Fingerprint::of(b"thing"), x);
        state
    }

    #[test]
    fn save_then_load_restores_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx").join("store.bin");
        let state = sample_state();

        save(&state, &path).unwrap();
        let loaded = load(&path).unwrap().unwrap();

        assert_eq!(loaded.fingerprints(), state.fingerprints());
        assert!(loaded.get(&EntityId::class("a.Thing")).is_some());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_store_is_empty_history() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("absent.bin")).unwrap().is_none());
    }

    #[test]
    fn damaged_bytes_are_corruption_not_empty() {
        let path = Path::new("store.bin");
        let mut bytes = encode(&sample_state()).unwrap();

        assert!(matches!(
            decode(path, &bytes[..10]),
            Err(IndexError::StoreCorruption { .. })
        ));

        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            decode(path, &bytes),
            Err(IndexError::StoreCorruption { .. })
        ));

        let mut wrong_magic = encode(&sample_state()).unwrap();
        wrong_magic[0] = b'X';
        assert!(matches!(
            decode(path, &wrong_magic),
            Err(IndexError::StoreCorruption { .. })
        ));
    }

    #[test]
    fn other_format_version_is_reported_distinctly() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[MAGIC.len()..MAGIC.len() + 4].copy_from_slice(&99u32.to_le_bytes());
        match decode(Path::new("store.bin"), &bytes) {
            Err(IndexError::StoreVersion { found, expected, .. }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, FORMAT_VERSION);
            }
            other => panic!("expected version error, got {:?}", other.map(|_| ())),
        }
    }
}
