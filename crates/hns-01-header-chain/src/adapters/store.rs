//! File-backed header store.
//!
//! Persists the in-memory header window in a self-describing CBOR envelope
//! next to a SHA-256 checksum sidecar. Writes go to a sibling temp path
//! and land via `rename`; the checksum is committed in the same save, so a
//! crash between the two renames shows up as a mismatch and forces a
//! clean re-bootstrap instead of a silently wrong chain.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ciborium::Value;
use sha2::{Digest, Sha256};

use crate::domain::{ChainError, Header, HeaderChain};

const BLOB_FILE: &str = "headers.bin";
const CHECKSUM_FILE: &str = "headers.sha256";
const CORRUPT_SUFFIX: &str = "corrupt";

/// What a successful load hands back.
#[derive(Debug)]
pub struct StoredChain {
    /// The persisted window, oldest first.
    pub headers: Vec<Header>,
    /// Tip height at save time.
    pub tip_height: u32,
    /// Height of the first header in the window.
    pub first_height: u32,
    /// Save wall-clock, milliseconds since epoch.
    pub timestamp_ms: u64,
}

/// Header persistence with incremental and forced saves.
pub struct HeaderStore {
    blob_path: PathBuf,
    checksum_path: PathBuf,
    save_window: u32,
    last_saved_height: Option<u32>,
    appended_since_save: u32,
}

impl HeaderStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path, save_window: u32) -> Result<Self, ChainError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            blob_path: dir.join(BLOB_FILE),
            checksum_path: dir.join(CHECKSUM_FILE),
            save_window: save_window.max(1),
            last_saved_height: None,
            appended_since_save: 0,
        })
    }

    /// Load the persisted window. `Ok(None)` means nothing usable on disk
    /// (missing files or checksum mismatch) and the caller re-bootstraps
    /// from the checkpoint.
    pub fn load(&mut self) -> Result<Option<StoredChain>, ChainError> {
        let blob = match fs::read(&self.blob_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checksum = match fs::read(&self.checksum_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("[hns-01] 💾 header blob present but checksum missing");
                self.quarantine();
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let digest = Sha256::digest(&blob);
        if digest.as_slice() != checksum.as_slice() {
            tracing::warn!("[hns-01] 💾 header store checksum mismatch, re-bootstrapping");
            self.quarantine();
            return Ok(None);
        }

        let stored = decode_envelope(&blob)?;
        self.last_saved_height = Some(stored.tip_height);
        tracing::info!(
            "[hns-01] 💾 loaded {} headers, tip height {}",
            stored.headers.len(),
            stored.tip_height
        );
        Ok(Some(stored))
    }

    /// Note one appended header; saves when the incremental window fills.
    /// Returns whether a save happened.
    pub fn record_append(&mut self, chain: &HeaderChain) -> Result<bool, ChainError> {
        self.appended_since_save += 1;
        if self.appended_since_save >= self.save_window {
            self.force_save(chain)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Save unconditionally. `last_saved_height` advances only after the
    /// rename succeeds.
    pub fn force_save(&mut self, chain: &HeaderChain) -> Result<(), ChainError> {
        let envelope = encode_envelope(chain);
        let digest = Sha256::digest(&envelope);

        write_atomic(&self.blob_path, &envelope)?;
        write_atomic(&self.checksum_path, &digest)?;

        self.last_saved_height = Some(chain.tip_height());
        self.appended_since_save = 0;
        tracing::debug!(
            "[hns-01] 💾 saved {} headers at tip {}",
            chain.len(),
            chain.tip_height()
        );
        Ok(())
    }

    /// Highest tip height known to be on disk.
    pub fn last_saved_height(&self) -> Option<u32> {
        self.last_saved_height
    }

    /// Appends recorded since the last save.
    pub fn pending_appends(&self) -> u32 {
        self.appended_since_save
    }

    /// Remove both files, for a checkpoint-rotation re-bootstrap.
    pub fn clear(&mut self) -> Result<(), ChainError> {
        for path in [&self.blob_path, &self.checksum_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.last_saved_height = None;
        self.appended_since_save = 0;
        Ok(())
    }

    /// Move a bad blob aside for forensics instead of deleting it.
    fn quarantine(&self) {
        let target = self.blob_path.with_extension(CORRUPT_SUFFIX);
        if let Err(e) = fs::rename(&self.blob_path, &target) {
            tracing::debug!("[hns-01] could not quarantine corrupt blob: {}", e);
        }
        let _ = fs::remove_file(&self.checksum_path);
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ChainError> {
    // Suffix (not replace) the extension: the blob and checksum share a
    // file stem and must not share a temp path.
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);
    let mut file = fs::File::create(&temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp, path)?;
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn encode_envelope(chain: &HeaderChain) -> Vec<u8> {
    let headers: Vec<Value> = chain
        .window()
        .map(|h| Value::Bytes(h.encode().to_vec()))
        .collect();
    let envelope = Value::Map(vec![
        (Value::Text("headers".into()), Value::Array(headers)),
        (
            Value::Text("height".into()),
            Value::Integer(chain.tip_height().into()),
        ),
        (
            Value::Text("first_height".into()),
            Value::Integer(chain.first_in_memory_height().into()),
        ),
        (
            Value::Text("timestamp".into()),
            Value::Integer(now_ms().into()),
        ),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut out).expect("vec write cannot fail");
    out
}

fn decode_envelope(bytes: &[u8]) -> Result<StoredChain, ChainError> {
    let value: Value = ciborium::de::from_reader(bytes).map_err(|e| ChainError::Format {
        reason: format!("store envelope: {}", e),
    })?;
    let map = value.as_map().ok_or_else(|| ChainError::Format {
        reason: "store envelope is not a map".to_string(),
    })?;

    let mut headers = None;
    let mut tip_height = None;
    let mut first_height = None;
    let mut timestamp_ms = 0u64;

    for (key, val) in map {
        match key.as_text() {
            Some("headers") => {
                let array = val.as_array().ok_or_else(|| ChainError::Format {
                    reason: "headers is not an array".to_string(),
                })?;
                let mut decoded = Vec::with_capacity(array.len());
                for entry in array {
                    let bytes = entry.as_bytes().ok_or_else(|| ChainError::Format {
                        reason: "header entry is not a byte string".to_string(),
                    })?;
                    decoded.push(Header::decode(bytes)?);
                }
                headers = Some(decoded);
            }
            Some("height") => tip_height = int_field(val, "height")?,
            Some("first_height") => first_height = int_field(val, "first_height")?,
            Some("timestamp") => {
                timestamp_ms = val
                    .as_integer()
                    .and_then(|i| u64::try_from(i).ok())
                    .unwrap_or(0);
            }
            _ => {}
        }
    }

    let headers = headers.ok_or_else(|| missing("headers"))?;
    let tip_height = tip_height.ok_or_else(|| missing("height"))?;
    let first_height = first_height.ok_or_else(|| missing("first_height"))?;

    if headers.is_empty() {
        return Err(ChainError::Format {
            reason: "store envelope holds no headers".to_string(),
        });
    }
    if first_height + headers.len() as u32 - 1 != tip_height {
        return Err(ChainError::Format {
            reason: "store envelope heights inconsistent".to_string(),
        });
    }

    Ok(StoredChain {
        headers,
        tip_height,
        first_height,
        timestamp_ms,
    })
}

fn int_field(val: &Value, name: &str) -> Result<Option<u32>, ChainError> {
    let i = val.as_integer().ok_or_else(|| ChainError::Format {
        reason: format!("{} is not an integer", name),
    })?;
    let v = u32::try_from(i).map_err(|_| ChainError::Format {
        reason: format!("{} out of range", name),
    })?;
    Ok(Some(v))
}

fn missing(name: &str) -> ChainError {
    ChainError::Format {
        reason: format!("store envelope missing {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Hash;

    fn linked(prev: Hash, n: usize) -> Vec<Header> {
        let mut prev = prev;
        let mut out = Vec::new();
        for i in 0..n {
            let header = Header {
                nonce: i as u32,
                time: 1_700_000_000 + i as u64,
                prev_block: prev,
                name_root: [0xaa; 32],
                extra_nonce: [0; 24],
                reserved_root: [0; 32],
                witness_root: [0; 32],
                merkle_root: [0; 32],
                version: 0,
                bits: 0x207f_ffff,
                mask: [0; 32],
            };
            prev = header.pow_hash();
            out.push(header);
        }
        out
    }

    fn chain(n: usize) -> HeaderChain {
        HeaderChain::from_stored(linked([0u8; 32], n), 100, 5000, false).unwrap()
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 10).unwrap();
        let chain = chain(20);

        store.force_save(&chain).unwrap();
        assert_eq!(store.last_saved_height(), Some(119));

        let mut reopened = HeaderStore::open(dir.path(), 10).unwrap();
        let stored = reopened.load().unwrap().unwrap();
        assert_eq!(stored.tip_height, 119);
        assert_eq!(stored.first_height, 100);
        assert_eq!(stored.headers.len(), 20);
        assert_eq!(stored.headers[5], *chain.header_at(105).unwrap());
        assert!(stored.timestamp_ms > 0);
    }

    #[test]
    fn test_save_is_stable_on_disk() {
        // Saving and loading with no appends in between reproduces the
        // same window byte-for-byte.
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 10).unwrap();
        let chain = chain(5);
        store.force_save(&chain).unwrap();
        let first = fs::read(dir.path().join(BLOB_FILE)).unwrap();
        let stored = store.load().unwrap().unwrap();
        let restored =
            HeaderChain::from_stored(stored.headers, stored.first_height, 5000, false).unwrap();
        store.force_save(&restored).unwrap();
        let second = fs::read(dir.path().join(BLOB_FILE)).unwrap();
        // timestamps differ; headers and heights must not
        let a = decode_envelope(&first).unwrap();
        let b = decode_envelope(&second).unwrap();
        assert_eq!(a.headers, b.headers);
        assert_eq!(a.tip_height, b.tip_height);
        assert_eq!(a.first_height, b.first_height);
    }

    #[test]
    fn test_checksum_matches_blob() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 10).unwrap();
        store.force_save(&chain(3)).unwrap();

        let blob = fs::read(dir.path().join(BLOB_FILE)).unwrap();
        let checksum = fs::read(dir.path().join(CHECKSUM_FILE)).unwrap();
        assert_eq!(Sha256::digest(&blob).as_slice(), checksum.as_slice());
    }

    #[test]
    fn test_corrupt_blob_rejected_and_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 10).unwrap();
        store.force_save(&chain(3)).unwrap();

        // flip one byte
        let path = dir.path().join(BLOB_FILE);
        let mut blob = fs::read(&path).unwrap();
        blob[10] ^= 0xff;
        fs::write(&path, &blob).unwrap();

        let mut reopened = HeaderStore::open(dir.path(), 10).unwrap();
        assert!(reopened.load().unwrap().is_none());
        assert!(dir.path().join("headers.corrupt").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 10).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_incremental_save_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 3).unwrap();
        let chain = chain(4);

        assert!(!store.record_append(&chain).unwrap());
        assert!(!store.record_append(&chain).unwrap());
        assert!(store.record_append(&chain).unwrap());
        assert_eq!(store.pending_appends(), 0);
        assert_eq!(store.last_saved_height(), Some(103));
    }

    #[test]
    fn test_clear_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HeaderStore::open(dir.path(), 10).unwrap();
        store.force_save(&chain(3)).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.last_saved_height(), None);
    }
}
