// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides a fast store that doesn't persist across restarts. Also serves as
// the in-memory index behind `FileRecordStore`.
//
// ## Locking
//
// The index (domain, token and id maps) sits behind one `RwLock`; each
// record sits behind its own `Mutex`. A mutation takes the index read lock
// only until it holds the record lock, then works on that record alone, so
// updates for different domains never wait on each other. Operations that
// change the index itself (create, token replacement, delete) take the index
// write lock first and the record lock second, never the other way round.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - Tokens handed out before the restart stop working

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::record::{DynamicRecord, OwnerId, RecordId, normalize_domain};
use crate::traits::record_store::{RecordMutation, RecordStore};

type RecordHandle = Arc<Mutex<DynamicRecord>>;

/// In-memory record store implementation
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::record::DynamicRecord;
/// use dyndns_core::store::MemoryRecordStore;
/// use dyndns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     let record = DynamicRecord::new(1, "home.example.com", None, "token".into());
///     let created = store.create(record).await?;
///
///     let found = store.get_by_domain("HOME.example.com").await?;
///     assert_eq!(found.map(|r| r.id), Some(created.id));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<Index>>,
}

#[derive(Debug)]
struct Index {
    /// Normalized domain -> record
    records: HashMap<String, RecordHandle>,
    /// Update token -> normalized domain
    tokens: HashMap<String, String>,
    /// Record id -> normalized domain
    ids: HashMap<RecordId, String>,
    next_id: RecordId,
}

impl Index {
    fn empty() -> Self {
        Self {
            records: HashMap::new(),
            tokens: HashMap::new(),
            ids: HashMap::new(),
            next_id: 1,
        }
    }

    fn handle_by_id(&self, id: RecordId) -> Option<RecordHandle> {
        self.ids
            .get(&id)
            .and_then(|domain| self.records.get(domain))
            .cloned()
    }
}

impl MemoryRecordStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Index::empty())),
        }
    }

    /// Rebuild a store from previously persisted records
    ///
    /// `next_id` is raised above the largest id present so ids are never
    /// reused. Duplicate domains, tokens or ids are rejected.
    pub fn from_records(records: Vec<DynamicRecord>, next_id: RecordId) -> Result<Self, Error> {
        let mut index = Index::empty();
        index.next_id = next_id.max(1);

        for mut record in records {
            record.domain_name = normalize_domain(&record.domain_name);
            let domain = record.domain_name.clone();

            if index.records.contains_key(&domain) {
                return Err(Error::store(format!("duplicate domain in store: {domain}")));
            }
            if index.tokens.contains_key(&record.update_token) {
                return Err(Error::store(format!("duplicate token in store for {domain}")));
            }
            if index.ids.contains_key(&record.id) {
                return Err(Error::store(format!("duplicate record id {}", record.id)));
            }

            index.next_id = index.next_id.max(record.id + 1);
            index
                .tokens
                .insert(record.update_token.clone(), domain.clone());
            index.ids.insert(record.id, domain.clone());
            index
                .records
                .insert(domain, Arc::new(Mutex::new(record)));
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(index)),
        })
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// Next id that will be assigned
    pub async fn next_id(&self) -> RecordId {
        self.inner.read().await.next_id
    }

    /// Copy of every record, ordered by id
    pub async fn snapshot(&self) -> Vec<DynamicRecord> {
        let handles: Vec<RecordHandle> = {
            let guard = self.inner.read().await;
            guard.records.values().cloned().collect()
        };

        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            records.push(handle.lock().await.clone());
        }
        records.sort_by_key(|r| r.id);
        records
    }

    async fn handle_by_domain(&self, domain_name: &str) -> Option<RecordHandle> {
        let domain = normalize_domain(domain_name);
        let guard = self.inner.read().await;
        guard.records.get(&domain).cloned()
    }

    async fn owner_records(&self, owner_id: OwnerId) -> Vec<DynamicRecord> {
        let handles: Vec<RecordHandle> = {
            let guard = self.inner.read().await;
            guard.records.values().cloned().collect()
        };

        let mut records = Vec::new();
        for handle in handles {
            let record = handle.lock().await;
            if record.owner_id == owner_id {
                records.push(record.clone());
            }
        }
        records
    }

    /// Apply a mutation and report whether it asked to be persisted
    pub(crate) async fn modify_tracked(
        &self,
        domain_name: &str,
        mutation: RecordMutation<'_>,
    ) -> Option<(DynamicRecord, bool)> {
        let domain = normalize_domain(domain_name);
        let mut record = {
            let guard = self.inner.read().await;
            let handle = guard.records.get(&domain).cloned()?;
            // Locked before the index guard drops: a delete cannot detach it in between
            handle.lock_owned().await
        };

        let id = record.id;
        let domain = record.domain_name.clone();
        let token = record.update_token.clone();
        let owner_id = record.owner_id;

        let dirty = mutation(&mut *record);

        record.id = id;
        record.domain_name = domain;
        record.update_token = token;
        record.owner_id = owner_id;

        Some((record.clone(), dirty))
    }

    /// Replace a record's token, returning the token it held before
    ///
    /// `None` when the record is missing or owned by someone else.
    pub(crate) async fn swap_token(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        new_token: &str,
    ) -> Result<Option<String>, Error> {
        let mut guard = self.inner.write().await;

        let Some(handle) = guard.handle_by_id(id) else {
            return Ok(None);
        };
        let mut record = handle.lock().await;
        if record.owner_id != owner_id {
            return Ok(None);
        }

        if let Some(holder) = guard.tokens.get(new_token) {
            if *holder == record.domain_name {
                return Ok(Some(new_token.to_string()));
            }
            return Err(Error::conflict("Update token already in use"));
        }

        guard.tokens.remove(&record.update_token);
        guard
            .tokens
            .insert(new_token.to_string(), record.domain_name.clone());
        let previous = std::mem::replace(&mut record.update_token, new_token.to_string());

        Ok(Some(previous))
    }

    /// Remove an owned record and hand it back
    pub(crate) async fn remove_owned(&self, owner_id: OwnerId, id: RecordId) -> Option<DynamicRecord> {
        let mut guard = self.inner.write().await;

        let handle = guard.handle_by_id(id)?;
        let record = handle.lock().await;
        if record.owner_id != owner_id {
            return None;
        }

        guard.tokens.remove(&record.update_token);
        guard.ids.remove(&record.id);
        guard.records.remove(&record.domain_name);

        Some(record.clone())
    }

    /// Put a removed record back under its original id
    pub(crate) async fn restore(&self, record: DynamicRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;

        if guard.records.contains_key(&record.domain_name)
            || guard.tokens.contains_key(&record.update_token)
            || guard.ids.contains_key(&record.id)
        {
            return Err(Error::conflict(format!(
                "Cannot restore {}: slot taken",
                record.domain_name
            )));
        }

        let domain = record.domain_name.clone();
        guard
            .tokens
            .insert(record.update_token.clone(), domain.clone());
        guard.ids.insert(record.id, domain.clone());
        guard
            .records
            .insert(domain, Arc::new(Mutex::new(record)));

        Ok(())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, mut record: DynamicRecord) -> Result<DynamicRecord, Error> {
        record.domain_name = normalize_domain(&record.domain_name);

        let mut guard = self.inner.write().await;
        if guard.records.contains_key(&record.domain_name) {
            return Err(Error::conflict(format!(
                "Domain already exists: {}",
                record.domain_name
            )));
        }
        if guard.tokens.contains_key(&record.update_token) {
            return Err(Error::conflict("Update token already in use"));
        }

        record.id = guard.next_id;
        guard.next_id += 1;

        let domain = record.domain_name.clone();
        guard
            .tokens
            .insert(record.update_token.clone(), domain.clone());
        guard.ids.insert(record.id, domain.clone());
        guard
            .records
            .insert(domain, Arc::new(Mutex::new(record.clone())));

        Ok(record)
    }

    async fn get_by_domain(&self, domain_name: &str) -> Result<Option<DynamicRecord>, Error> {
        match self.handle_by_domain(domain_name).await {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_by_token(&self, update_token: &str) -> Result<Option<DynamicRecord>, Error> {
        let handle = {
            let guard = self.inner.read().await;
            guard
                .tokens
                .get(update_token)
                .and_then(|domain| guard.records.get(domain))
                .cloned()
        };

        let Some(handle) = handle else {
            return Ok(None);
        };

        // The token may have been replaced between the index read and now.
        let record = handle.lock().await;
        if record.update_token == update_token {
            Ok(Some(record.clone()))
        } else {
            Ok(None)
        }
    }

    async fn get_owned(
        &self,
        owner_id: OwnerId,
        id: RecordId,
    ) -> Result<Option<DynamicRecord>, Error> {
        let handle = {
            let guard = self.inner.read().await;
            guard.handle_by_id(id)
        };

        let Some(handle) = handle else {
            return Ok(None);
        };

        let record = handle.lock().await;
        if record.owner_id == owner_id {
            Ok(Some(record.clone()))
        } else {
            Ok(None)
        }
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DynamicRecord>, Error> {
        let mut records = self.owner_records(owner_id).await;
        records.sort_by(|a, b| a.domain_name.cmp(&b.domain_name));
        Ok(records)
    }

    async fn count_by_owner(&self, owner_id: OwnerId) -> Result<usize, Error> {
        Ok(self.owner_records(owner_id).await.len())
    }

    async fn modify(
        &self,
        domain_name: &str,
        mutation: RecordMutation<'_>,
    ) -> Result<Option<DynamicRecord>, Error> {
        Ok(self
            .modify_tracked(domain_name, mutation)
            .await
            .map(|(record, _)| record))
    }

    async fn replace_token(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        new_token: &str,
    ) -> Result<bool, Error> {
        Ok(self.swap_token(owner_id, id, new_token).await?.is_some())
    }

    async fn delete_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<bool, Error> {
        Ok(self.remove_owned(owner_id, id).await.is_some())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
