//! Update token authentication
//!
//! Matches a `(domain, token)` pair to an active record. A wrong token, an
//! unknown domain and an inactive record all produce the same `None`; the
//! caller can never tell them apart.

use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::record::{DynamicRecord, normalize_domain};
use crate::traits::RecordStore;

/// Validates update credentials against the record store
#[derive(Clone)]
pub struct TokenAuthenticator {
    store: Arc<dyn RecordStore>,
}

impl TokenAuthenticator {
    /// Create an authenticator over a store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Find the active record matching both domain and token
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: Credentials are valid
    /// - `Ok(None)`: No active record matches both (never says which part failed)
    /// - `Err(Error)`: The store could not be read
    pub async fn authenticate(
        &self,
        domain_name: &str,
        update_token: &str,
    ) -> Result<Option<DynamicRecord>, crate::Error> {
        let domain = normalize_domain(domain_name);
        if domain.is_empty() || update_token.is_empty() {
            return Ok(None);
        }

        let record = self.store.get_by_domain(&domain).await?;
        Ok(record.filter(|r| matches(r, update_token)))
    }
}

/// Whether a record is active and holds exactly this token
///
/// The token comparison runs in constant time.
pub fn matches(record: &DynamicRecord, update_token: &str) -> bool {
    let token_ok: bool = record
        .update_token
        .as_bytes()
        .ct_eq(update_token.as_bytes())
        .into();
    record.is_active && token_ok
}
