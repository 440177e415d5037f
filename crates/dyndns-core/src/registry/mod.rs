//! Plugin-based record store registry
//!
//! The registry maps store type names to factories, so the daemon can pick
//! a backend from configuration without a hardcoded if-else chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dyndns_core::registry::StoreRegistry;
//! use dyndns_core::config::StoreConfig;
//!
//! let registry = StoreRegistry::with_builtin();
//! let store = registry
//!     .create_store(&StoreConfig::File { path: "records.json".into() })
//!     .await?;
//! ```

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{RecordStore, RecordStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of record store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` backends registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
        registry.register_store("file", Box::new(FileRecordStoreFactory));
        registry
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        let name = name.into();
        let mut stores = self.stores.write().unwrap_or_else(|e| e.into_inner());
        stores.insert(name, Arc::from(factory));
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
        let store_type = config.type_name();

        let factory = {
            let stores = self.stores.read().unwrap_or_else(|e| e.into_inner());
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        let config_json = serde_json::to_value(config)?;
        factory.create(&config_json).await
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(|e| e.into_inner());
        stores.keys().cloned().collect()
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(|e| e.into_inner());
        stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_registration() {
        let registry = StoreRegistry::new();
        assert!(!registry.has_store("memory"));

        registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
        assert!(registry.has_store("memory"));
        assert!(registry.list_stores().contains(&"memory".to_string()));
    }

    #[tokio::test]
    async fn test_registry_creates_builtin_stores() {
        let registry = StoreRegistry::with_builtin();

        let memory = registry.create_store(&StoreConfig::Memory).await.unwrap();
        assert_eq!(memory.store_name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let file = registry
            .create_store(&StoreConfig::File {
                path: path.to_string_lossy().into_owned(),
            })
            .await
            .unwrap();
        assert_eq!(file.store_name(), "file");
    }

    #[tokio::test]
    async fn test_registry_unknown_type() {
        let registry = StoreRegistry::new();
        assert!(matches!(
            registry.create_store(&StoreConfig::Memory).await,
            Err(Error::Config(_))
        ));
    }
}
