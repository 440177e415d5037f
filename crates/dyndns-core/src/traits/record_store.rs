// # Record Store Trait
//
// Defines the interface for durable dynamic DNS record storage.
//
// ## Purpose
//
// The record store is the single source of truth for managed names. It
// enforces the two uniqueness invariants (domain name, update token) and
// serializes mutations per domain so concurrent updates never lose a change
// or double-count one.
//
// ## Implementations
//
// - In-memory: `MemoryRecordStore`
// - File-based: `FileRecordStore` (JSON with atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::RecordStore;
//
// let store = /* RecordStore implementation */;
// let record = store.get_by_domain("home.example.com").await?;
// ```

use async_trait::async_trait;

use crate::record::{DynamicRecord, OwnerId, RecordId};

/// In-place mutation applied under the store's per-domain lock
///
/// The closure receives the current record and returns `true` when it
/// changed something that must be persisted. Identity fields (`id`,
/// `domain_name`, `update_token`, `owner_id`) are restored after the closure
/// runs; use [`RecordStore::replace_token`] to change a token.
pub type RecordMutation<'a> = &'a mut (dyn FnMut(&mut DynamicRecord) -> bool + Send);

/// Trait for record store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Mutations of the same domain must be applied one at a time; mutations of
/// different domains must not block each other.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Implement locking/concurrency control for thread safety
/// - ✅ Cache state in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Decide which address to accept (owned by `UpdateResolver`)
/// - ❌ Touch the DNS host cache (owned by `UpdateResolver`)
/// - ❌ Retry internally; return an error and let the caller decide
///
/// Domain arguments may be passed in any case; implementations compare
/// against the normalized form.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record, assigning its identifier
    ///
    /// # Returns
    ///
    /// - `Ok(DynamicRecord)`: The stored record with its assigned id
    /// - `Err(Error::Conflict)`: The domain name or token is already taken
    /// - `Err(Error)`: Storage error
    async fn create(&self, record: DynamicRecord) -> Result<DynamicRecord, crate::Error>;

    /// Look up a record by domain name (case-insensitive)
    async fn get_by_domain(&self, domain_name: &str)
    -> Result<Option<DynamicRecord>, crate::Error>;

    /// Look up a record by update token (case-sensitive)
    async fn get_by_token(&self, update_token: &str)
    -> Result<Option<DynamicRecord>, crate::Error>;

    /// Look up a record by id, only if it belongs to `owner_id`
    async fn get_owned(
        &self,
        owner_id: OwnerId,
        id: RecordId,
    ) -> Result<Option<DynamicRecord>, crate::Error>;

    /// List all records of an owner, ordered by domain name ascending
    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DynamicRecord>, crate::Error>;

    /// Count the records of an owner
    async fn count_by_owner(&self, owner_id: OwnerId) -> Result<usize, crate::Error>;

    /// Apply a mutation to one record under its per-domain lock
    ///
    /// # Returns
    ///
    /// - `Ok(Some(DynamicRecord))`: The record after the mutation
    /// - `Ok(None)`: No record with that domain name
    /// - `Err(Error)`: Storage error (the in-memory change may not be durable)
    async fn modify(
        &self,
        domain_name: &str,
        mutation: RecordMutation<'_>,
    ) -> Result<Option<DynamicRecord>, crate::Error>;

    /// Replace the update token of an owned record
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Token replaced
    /// - `Ok(false)`: No such record for this owner
    /// - `Err(Error::Conflict)`: The new token is already in use
    async fn replace_token(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        new_token: &str,
    ) -> Result<bool, crate::Error>;

    /// Delete an owned record
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Deleted
    /// - `Ok(false)`: No such record for this owner
    async fn delete_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<bool, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Backend name for logging
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Serialized `StoreConfig` for this backend
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn RecordStore>, crate::Error>;
}
