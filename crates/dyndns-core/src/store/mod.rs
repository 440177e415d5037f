// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies, plus their registry factories.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::{RecordStore, RecordStoreFactory};

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

/// Factory for `MemoryRecordStore`
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryRecordStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Arc<dyn RecordStore>, Error> {
        Ok(Arc::new(MemoryRecordStore::new()))
    }
}

/// Factory for `FileRecordStore`
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for FileRecordStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Arc<dyn RecordStore>, Error> {
        match serde_json::from_value::<StoreConfig>(config.clone())? {
            StoreConfig::File { path } => Ok(Arc::new(FileRecordStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory received {} configuration",
                other.type_name()
            ))),
        }
    }
}
