//! Owner-scoped record management
//!
//! The RecordService is what the account layer calls: create, delete, list,
//! token regeneration and small edits. Every operation is scoped to the
//! owning account; a record owned by someone else behaves exactly like a
//! missing one.
//!
//! Entitlement checks (`current < max_domains`) belong to the caller, see
//! [`crate::entitlement`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::UpdateConfig;
use crate::error::{Error, Result};
use crate::record::{
    DynamicRecord, MAX_NOTES_LENGTH, OwnerId, RecordId, generate_token, normalize_domain,
    validate_domain_name,
};
use crate::traits::RecordStore;

/// Attempts at finding an unused token before giving up
const TOKEN_ATTEMPTS: usize = 3;

/// Record management for the account layer
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    store_timeout: Duration,
}

impl RecordService {
    /// Create a service over a store
    pub fn new(store: Arc<dyn RecordStore>, config: &UpdateConfig) -> Self {
        Self {
            store,
            store_timeout: config.store_timeout(),
        }
    }

    /// Run a store operation under the configured time budget
    async fn timed<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .map_err(|_| Error::Timeout(self.store_timeout))?
    }

    /// Register a new domain for an owner
    ///
    /// The zone defaults to the last two labels of the domain. A fresh
    /// update token is generated.
    ///
    /// # Returns
    ///
    /// - `Ok(DynamicRecord)`: The created record
    /// - `Err(Error::InvalidInput)`: Malformed domain or zone
    /// - `Err(Error::Conflict)`: The domain is already registered
    /// - `Err(Error::StoreUnavailable)`: No unique token could be allocated
    pub async fn create_record(
        &self,
        owner_id: OwnerId,
        domain_name: &str,
        zone_name: Option<&str>,
    ) -> Result<DynamicRecord> {
        let domain = normalize_domain(domain_name);
        validate_domain_name(&domain)?;

        let zone = zone_name.map(normalize_domain).filter(|z| !z.is_empty());
        if let Some(zone) = &zone {
            validate_domain_name(zone)?;
            if domain != *zone && !domain.ends_with(&format!(".{zone}")) {
                return Err(Error::invalid_input(format!(
                    "Domain {} is not inside zone {}",
                    domain, zone
                )));
            }
        }

        if self.timed(self.store.get_by_domain(&domain)).await?.is_some() {
            return Err(Error::conflict(format!("Domain already exists: {}", domain)));
        }

        for _ in 0..TOKEN_ATTEMPTS {
            let record = DynamicRecord::new(owner_id, &domain, zone.as_deref(), generate_token());
            match self.timed(self.store.create(record)).await {
                Ok(created) => {
                    info!(
                        domain = %created.domain_name,
                        id = created.id,
                        owner_id,
                        "Dynamic DNS record created"
                    );
                    return Ok(created);
                }
                Err(Error::Conflict(msg)) => {
                    // Either the domain raced in or the token collided
                    if self.timed(self.store.get_by_domain(&domain)).await?.is_some() {
                        return Err(Error::Conflict(msg));
                    }
                    debug!(domain = %domain, "Token collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::store("Could not allocate a unique update token"))
    }

    /// Delete an owned record
    pub async fn delete_record(&self, owner_id: OwnerId, id: RecordId) -> Result<bool> {
        let deleted = self.timed(self.store.delete_owned(owner_id, id)).await?;
        if deleted {
            info!(id, owner_id, "Dynamic DNS record deleted");
        }
        Ok(deleted)
    }

    /// Replace the update token of an owned record
    ///
    /// The old token stops working immediately.
    pub async fn regenerate_token(&self, owner_id: OwnerId, id: RecordId) -> Result<bool> {
        for _ in 0..TOKEN_ATTEMPTS {
            let token = generate_token();
            match self.timed(self.store.replace_token(owner_id, id, &token)).await {
                Ok(replaced) => {
                    if replaced {
                        info!(id, owner_id, "Update token regenerated");
                    }
                    return Ok(replaced);
                }
                Err(Error::Conflict(_)) => debug!(id, "Token collision, retrying"),
                Err(e) => return Err(e),
            }
        }

        Err(Error::store("Could not allocate a unique update token"))
    }

    /// List an owner's records, domain ascending
    pub async fn list_records(&self, owner_id: OwnerId) -> Result<Vec<DynamicRecord>> {
        self.timed(self.store.list_by_owner(owner_id)).await
    }

    /// Fetch one owned record
    pub async fn get_record(&self, owner_id: OwnerId, id: RecordId) -> Result<Option<DynamicRecord>> {
        self.timed(self.store.get_owned(owner_id, id)).await
    }

    /// Number of records an owner holds
    pub async fn count_records(&self, owner_id: OwnerId) -> Result<usize> {
        self.timed(self.store.count_by_owner(owner_id)).await
    }

    /// Replace the notes of an owned record
    ///
    /// Empty notes clear the field.
    pub async fn set_notes(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        notes: Option<&str>,
    ) -> Result<bool> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        if let Some(n) = notes
            && n.chars().count() > MAX_NOTES_LENGTH
        {
            return Err(Error::invalid_input(format!(
                "Notes too long: {} chars (max {})",
                n.chars().count(),
                MAX_NOTES_LENGTH
            )));
        }

        let notes = notes.map(str::to_string);
        self.modify_owned(owner_id, id, move |record| {
            record.notes = notes.clone();
        })
        .await
    }

    /// Enable or disable an owned record
    ///
    /// An inactive record accepts no updates and is never resolved.
    pub async fn set_active(&self, owner_id: OwnerId, id: RecordId, active: bool) -> Result<bool> {
        let changed = self
            .modify_owned(owner_id, id, move |record| {
                record.is_active = active;
            })
            .await?;
        if changed {
            info!(id, owner_id, active, "Dynamic DNS record activation changed");
        }
        Ok(changed)
    }

    /// Apply an edit to an owned record under its per-domain lock
    async fn modify_owned<F>(&self, owner_id: OwnerId, id: RecordId, mut edit: F) -> Result<bool>
    where
        F: FnMut(&mut DynamicRecord) + Send,
    {
        let Some(record) = self.get_record(owner_id, id).await? else {
            return Ok(false);
        };

        let mut applied = false;
        let mut mutation = |r: &mut DynamicRecord| -> bool {
            // The domain may have been deleted and re-registered meanwhile
            if r.id != id || r.owner_id != owner_id {
                return false;
            }
            edit(r);
            applied = true;
            true
        };

        self.timed(self.store.modify(&record.domain_name, &mut mutation))
            .await?;
        Ok(applied)
    }
}
