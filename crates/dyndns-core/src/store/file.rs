// # File Record Store
//
// File-based implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Provides durable record storage across daemon restarts and crashes. All
// lookups and per-domain locking are delegated to an inner
// `MemoryRecordStore`; every accepted mutation is written through to disk
// before the call returns.
//
// ## Write Failures
//
// - Create, token replacement and delete are undone in memory when the
//   write fails, so the caller's error matches the store's state
// - Record updates stay applied in memory and the store stays dirty; the
//   next successful write or `flush` puts them on disk
//
// ## Write Serialization
//
// Each write rewrites the whole file under one lock. Mutations for different
// domains still run concurrently in memory; only their disk writes queue.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "next_id": 3,
//   "records": [
//     {
//       "id": 1,
//       "domain_name": "home.example.com",
//       "zone_name": "example.com",
//       "record_name": "home",
//       "ipv4_address": "203.0.113.5",
//       ...
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::record::{DynamicRecord, OwnerId, RecordId};
use crate::store::memory::MemoryRecordStore;
use crate::traits::record_store::{RecordMutation, RecordStore};

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based record store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::record::DynamicRecord;
/// use dyndns_core::store::FileRecordStore;
/// use dyndns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/dyndns/records.json").await?;
///
///     // Atomically written to disk before returning
///     let record = DynamicRecord::new(1, "home.example.com", None, "token".into());
///     store.create(record).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    inner: MemoryRecordStore,
    /// Serializes snapshot+write so the newest state always lands last
    write_lock: Mutex<()>,
    /// Set when memory holds changes the file does not
    dirty: AtomicBool,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    next_id: RecordId,
    records: Vec<DynamicRecord>,
}

/// Why loading a store file failed
enum LoadError {
    /// The file exists but does not parse
    Corrupt(Error),
    /// Anything else (permissions, I/O)
    Other(Error),
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If corruption detected, try to load from backup
    /// 4. If both fail, start with an empty store
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let state = Self::load_with_recovery(&path).await?;
        let inner = MemoryRecordStore::from_records(state.records, state.next_id)?;

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        })
    }

    /// Load the store file with automatic recovery
    async fn load_with_recovery(path: &Path) -> Result<StoreFileFormat, Error> {
        match Self::load(path).await {
            Ok(state) => {
                tracing::debug!("Loaded record store: {} records", state.records.len());
                Ok(state)
            }
            Err(LoadError::Other(e)) => Err(e),
            Err(LoadError::Corrupt(e)) => {
                tracing::warn!(
                    "Record store appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(Self::empty_state());
                }

                match Self::load(&backup_path).await {
                    Ok(state) => {
                        tracing::info!(
                            "Recovered record store from backup: {} records",
                            state.records.len()
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(state)
                    }
                    Err(LoadError::Corrupt(backup_err)) | Err(LoadError::Other(backup_err)) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(Self::empty_state())
                    }
                }
            }
        }
    }

    async fn load(path: &Path) -> Result<StoreFileFormat, LoadError> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(Self::empty_state());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Other(Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::store(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            )))
        })?;

        if state.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                state.version
            );
        }

        // Duplicates mean the file is not a state we ever wrote
        MemoryRecordStore::from_records(state.records.clone(), state.next_id)
            .map_err(LoadError::Corrupt)?;

        Ok(state)
    }

    fn empty_state() -> StoreFileFormat {
        StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            next_id: 1,
            records: Vec::new(),
        }
    }

    /// Write the current state to disk atomically
    async fn write_state(&self) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let state = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            next_id: self.inner.next_id().await,
            records: self.inner.snapshot().await,
        };

        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| Error::store(format!("Failed to serialize records: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.dirty.store(false, Ordering::SeqCst);
        tracing::trace!("Record store written: {}", self.path.display());
        Ok(())
    }

    /// Mark memory as ahead of disk, then write through
    async fn persist(&self) -> Result<(), Error> {
        self.dirty.store(true, Ordering::SeqCst);
        self.write_state().await
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn create(&self, record: DynamicRecord) -> Result<DynamicRecord, Error> {
        let created = self.inner.create(record).await?;
        if let Err(e) = self.persist().await {
            self.inner.remove_owned(created.owner_id, created.id).await;
            return Err(e);
        }
        Ok(created)
    }

    async fn get_by_domain(&self, domain_name: &str) -> Result<Option<DynamicRecord>, Error> {
        self.inner.get_by_domain(domain_name).await
    }

    async fn get_by_token(&self, update_token: &str) -> Result<Option<DynamicRecord>, Error> {
        self.inner.get_by_token(update_token).await
    }

    async fn get_owned(
        &self,
        owner_id: OwnerId,
        id: RecordId,
    ) -> Result<Option<DynamicRecord>, Error> {
        self.inner.get_owned(owner_id, id).await
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DynamicRecord>, Error> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn count_by_owner(&self, owner_id: OwnerId) -> Result<usize, Error> {
        self.inner.count_by_owner(owner_id).await
    }

    async fn modify(
        &self,
        domain_name: &str,
        mutation: RecordMutation<'_>,
    ) -> Result<Option<DynamicRecord>, Error> {
        match self.inner.modify_tracked(domain_name, mutation).await {
            Some((record, true)) => {
                // Memory stays ahead of disk; the next write or flush retries
                if let Err(e) = self.persist().await {
                    tracing::warn!(
                        domain = %record.domain_name,
                        "Record change kept in memory, store write failed: {}",
                        e
                    );
                }
                Ok(Some(record))
            }
            Some((record, false)) => Ok(Some(record)),
            None => Ok(None),
        }
    }

    async fn replace_token(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        new_token: &str,
    ) -> Result<bool, Error> {
        let Some(previous) = self.inner.swap_token(owner_id, id, new_token).await? else {
            return Ok(false);
        };
        if previous == new_token {
            return Ok(true);
        }

        if let Err(e) = self.persist().await {
            if let Err(undo) = self.inner.swap_token(owner_id, id, &previous).await {
                tracing::warn!(id, "Failed to restore previous token: {}", undo);
            }
            return Err(e);
        }
        Ok(true)
    }

    async fn delete_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<bool, Error> {
        let Some(removed) = self.inner.remove_owned(owner_id, id).await else {
            return Ok(false);
        };

        if let Err(e) = self.persist().await {
            let domain = removed.domain_name.clone();
            if let Err(undo) = self.inner.restore(removed).await {
                tracing::warn!(%domain, "Failed to restore deleted record: {}", undo);
            }
            return Err(e);
        }
        Ok(true)
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.dirty.load(Ordering::SeqCst) {
            self.write_state().await
        } else {
            Ok(())
        }
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
