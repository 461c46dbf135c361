//! File-backed fast store.
//!
//! The file is a JSON object of string keys to string values, so the ledger
//! blob and the expected count live side by side the way a browser-style
//! key/value store would hold them. Every write rewrites the file through a
//! sibling temp file and a rename.
//!
//! Nothing unreadable is ever overwritten. A ledger blob that does not decode
//! cleanly is moved to a `station_ledger_damaged_<stamp>` key before a new
//! ledger replaces it, and a file that is not a JSON object is renamed to a
//! `.damaged-<stamp>` sibling before the store starts a fresh one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult, StoreError};
use crate::ledger::LedgerEntry;
use crate::store::path::{check_store_path, StoreKind};
use crate::store::FastStore;

/// Key holding the JSON-serialized ledger array.
pub const LEDGER_KEY: &str = "station_ledger";
/// Key holding the expected ledger size.
pub const EXPECTED_COUNT_KEY: &str = "station_ledger_meta";
/// Prefix of keys holding ledger blobs that were set aside undecoded.
pub const DAMAGED_LEDGER_PREFIX: &str = "station_ledger_damaged_";

type BlobMap = BTreeMap<String, String>;

/// Decode the ledger blob one entry at a time. Only a blob that is not a JSON
/// array fails as a whole.
fn decode_entries(
    blob: &str,
) -> Result<Vec<Result<LedgerEntry, serde_json::Error>>, serde_json::Error> {
    let items: Vec<serde_json::Value> = serde_json::from_str(blob)?;
    Ok(items.into_iter().map(serde_json::from_value).collect())
}

fn decodes_cleanly(blob: &str) -> bool {
    matches!(decode_entries(blob), Ok(items) if items.iter().all(Result::is_ok))
}

fn damage_stamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Move a ledger blob that would lose data on rewrite to its own key.
fn set_aside_damaged_ledger(map: &mut BlobMap) {
    if map.get(LEDGER_KEY).map_or(true, |blob| decodes_cleanly(blob)) {
        return;
    }
    if let Some(blob) = map.remove(LEDGER_KEY) {
        let key = format!("{DAMAGED_LEDGER_PREFIX}{}", damage_stamp());
        warn!("Ledger blob does not decode cleanly, keeping it under {}", key);
        map.insert(key, blob);
    }
}

#[derive(Debug)]
pub struct FileFastStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileFastStore {
    pub async fn open(path: impl AsRef<Path>) -> StationResult<Self> {
        let path = path.as_ref();
        check_store_path(path, StoreKind::Fast).map_err(|e| StationError::Config(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StationError::FastStore(e.into()))?;
        }

        info!("Fast store at {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BlobMap, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(BlobMap::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BlobMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    /// Current map for a read-modify-write. An unparsable file is renamed
    /// aside and replaced by an empty map.
    async fn read_map_for_update(&self) -> Result<BlobMap, StoreError> {
        match self.read_map().await {
            Ok(map) => Ok(map),
            Err(StoreError::Serialization(e)) => {
                let aside = self.path.with_extension(format!("damaged-{}", damage_stamp()));
                warn!(
                    "Fast store file {:?} is unreadable ({}), moved to {:?}",
                    self.path, e, aside
                );
                tokio::fs::rename(&self.path, &aside).await?;
                Ok(BlobMap::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map_for_update().await?;
        if key == LEDGER_KEY {
            set_aside_damaged_ledger(&mut map);
        }
        map.insert(key.to_string(), value);

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&map)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Fast store key {} written", key);
        Ok(())
    }
}

#[async_trait]
impl FastStore for FileFastStore {
    async fn load_ledger(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let Some(blob) = self.get(LEDGER_KEY).await? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for (index, item) in decode_entries(&blob)?.into_iter().enumerate() {
            match item {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(index, "Skipping unreadable ledger entry: {}", e),
            }
        }
        Ok(entries)
    }

    async fn save_ledger(&self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        let blob = serde_json::to_string(entries)?;
        self.set(LEDGER_KEY, blob).await
    }

    async fn load_expected_count(&self) -> Result<usize, StoreError> {
        // An unparsable count reads as 0, which can never raise a mismatch.
        Ok(self
            .get(EXPECTED_COUNT_KEY)
            .await?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0))
    }

    async fn save_expected_count(&self, count: usize) -> Result<(), StoreError> {
        self.set(EXPECTED_COUNT_KEY, count.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityHash;

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFastStore::open(dir.path().join("fast.json")).await.unwrap();
        assert!(store.load_ledger().await.unwrap().is_empty());
        assert_eq!(store.load_expected_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ledger_and_count_share_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        let store = FileFastStore::open(&path).await.unwrap();

        let entries = vec![
            LedgerEntry::new(IdentityHash::new("a"), "1"),
            LedgerEntry::new(IdentityHash::new("b"), "2"),
        ];
        store.save_ledger(&entries).await.unwrap();
        store.save_expected_count(2).await.unwrap();

        let reopened = FileFastStore::open(&path).await.unwrap();
        assert_eq!(reopened.load_ledger().await.unwrap(), entries);
        assert_eq!(reopened.load_expected_count().await.unwrap(), 2);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw[LEDGER_KEY].is_string());
        assert_eq!(raw[EXPECTED_COUNT_KEY], "2");
    }

    #[tokio::test]
    async fn test_corrupt_ledger_blob_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        std::fs::write(&path, r#"{"station_ledger": "not json"}"#).unwrap();
        let store = FileFastStore::open(&path).await.unwrap();
        assert!(matches!(
            store.load_ledger().await,
            Err(StoreError::Serialization(_))
        ));
    }

    fn raw_map(path: &Path) -> BlobMap {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn damaged_blobs(path: &Path) -> Vec<String> {
        raw_map(path)
            .into_iter()
            .filter(|(k, _)| k.starts_with(DAMAGED_LEDGER_PREFIX))
            .map(|(_, v)| v)
            .collect()
    }

    const HALF_BROKEN_LEDGER: &str = r#"[{"identityHash":"aaa","candidateId":"1","castAt":"2024-05-01T10:00:00Z"},{"identityHash":"bbb","candidateId":"2"}]"#;

    fn write_half_broken(path: &Path) {
        let file = BlobMap::from([(LEDGER_KEY.to_string(), HALF_BROKEN_LEDGER.to_string())]);
        std::fs::write(path, serde_json::to_string(&file).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_entry_skips_only_itself() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        write_half_broken(&path);

        let store = FileFastStore::open(&path).await.unwrap();
        let entries = store.load_ledger().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity_hash.as_str(), "aaa");
    }

    #[tokio::test]
    async fn test_save_sets_damaged_ledger_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        write_half_broken(&path);

        let store = FileFastStore::open(&path).await.unwrap();
        let kept = store.load_ledger().await.unwrap();
        store.save_ledger(&kept).await.unwrap();

        assert_eq!(damaged_blobs(&path), vec![HALF_BROKEN_LEDGER.to_string()]);
        assert_eq!(store.load_ledger().await.unwrap(), kept);

        // A clean blob is replaced without leaving another copy behind
        store.save_ledger(&[]).await.unwrap();
        assert_eq!(damaged_blobs(&path).len(), 1);
    }

    #[tokio::test]
    async fn test_write_moves_unparsable_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = FileFastStore::open(&path).await.unwrap();
        store.save_expected_count(3).await.unwrap();
        assert_eq!(store.load_expected_count().await.unwrap(), 3);

        let aside: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".damaged-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(std::fs::read_to_string(&aside[0]).unwrap(), "garbage");
    }

    #[tokio::test]
    async fn test_rejects_memory_path() {
        assert!(FileFastStore::open(":memory:").await.is_err());
    }
}
