//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that observe the update and
//! resolution path without a real DNS host or disk.

#![allow(dead_code)]

use async_trait::async_trait;
use dyndns_core::config::{AppRecord, UpdateConfig};
use dyndns_core::error::{Error, Result};
use dyndns_core::record::{DynamicRecord, OwnerId, RecordId};
use dyndns_core::traits::{CachedRecord, DnsCache, RecordMutation, RecordStore};
use dyndns_core::{MemoryRecordStore, QueryResponder, RecordService, UpdateResolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A DNS cache that records every push
#[derive(Clone, Default)]
pub struct RecordingDnsCache {
    pushed: Arc<Mutex<Vec<CachedRecord>>>,
    call_count: Arc<AtomicUsize>,
}

impl RecordingDnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache_record() calls
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Everything pushed so far, in order
    pub fn pushed(&self) -> Vec<CachedRecord> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsCache for RecordingDnsCache {
    async fn cache_record(&self, record: &CachedRecord) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.pushed.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn cache_name(&self) -> &'static str {
        "recording"
    }
}

/// A DNS cache that always fails
#[derive(Clone, Default)]
pub struct FailingDnsCache {
    call_count: Arc<AtomicUsize>,
}

impl FailingDnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsCache for FailingDnsCache {
    async fn cache_record(&self, _record: &CachedRecord) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Err(Error::Other("host cache unreachable".to_string()))
    }

    fn cache_name(&self) -> &'static str {
        "failing"
    }
}

/// A store that delays every call before delegating to memory
pub struct SlowRecordStore {
    inner: MemoryRecordStore,
    delay: Duration,
}

impl SlowRecordStore {
    pub fn new(inner: MemoryRecordStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl RecordStore for SlowRecordStore {
    async fn create(&self, record: DynamicRecord) -> Result<DynamicRecord> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(record).await
    }

    async fn get_by_domain(&self, domain_name: &str) -> Result<Option<DynamicRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_domain(domain_name).await
    }

    async fn get_by_token(&self, update_token: &str) -> Result<Option<DynamicRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_token(update_token).await
    }

    async fn get_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<Option<DynamicRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_owned(owner_id, id).await
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DynamicRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_by_owner(owner_id).await
    }

    async fn count_by_owner(&self, owner_id: OwnerId) -> Result<usize> {
        tokio::time::sleep(self.delay).await;
        self.inner.count_by_owner(owner_id).await
    }

    async fn modify(
        &self,
        domain_name: &str,
        mutation: RecordMutation<'_>,
    ) -> Result<Option<DynamicRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.modify(domain_name, mutation).await
    }

    async fn replace_token(&self, owner_id: OwnerId, id: RecordId, new_token: &str) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.replace_token(owner_id, id, new_token).await
    }

    async fn delete_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_owned(owner_id, id).await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "slow"
    }
}

/// A store whose backend is gone
#[derive(Default)]
pub struct FailingRecordStore {
    call_count: AtomicUsize,
}

impl FailingRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("connection refused"))
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn create(&self, _record: DynamicRecord) -> Result<DynamicRecord> {
        self.fail()
    }

    async fn get_by_domain(&self, _domain_name: &str) -> Result<Option<DynamicRecord>> {
        self.fail()
    }

    async fn get_by_token(&self, _update_token: &str) -> Result<Option<DynamicRecord>> {
        self.fail()
    }

    async fn get_owned(&self, _owner_id: OwnerId, _id: RecordId) -> Result<Option<DynamicRecord>> {
        self.fail()
    }

    async fn list_by_owner(&self, _owner_id: OwnerId) -> Result<Vec<DynamicRecord>> {
        self.fail()
    }

    async fn count_by_owner(&self, _owner_id: OwnerId) -> Result<usize> {
        self.fail()
    }

    async fn modify(
        &self,
        _domain_name: &str,
        _mutation: RecordMutation<'_>,
    ) -> Result<Option<DynamicRecord>> {
        self.fail()
    }

    async fn replace_token(
        &self,
        _owner_id: OwnerId,
        _id: RecordId,
        _new_token: &str,
    ) -> Result<bool> {
        self.fail()
    }

    async fn delete_owned(&self, _owner_id: OwnerId, _id: RecordId) -> Result<bool> {
        self.fail()
    }

    async fn flush(&self) -> Result<()> {
        self.fail()
    }

    fn store_name(&self) -> &'static str {
        "failing"
    }
}

/// A store where every freshly generated token collides
pub struct TokenClashStore {
    inner: MemoryRecordStore,
    attempts: AtomicUsize,
}

impl TokenClashStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of create and replace_token calls
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn clash<T>(&self) -> Result<T> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::conflict("Update token already in use"))
    }
}

#[async_trait]
impl RecordStore for TokenClashStore {
    async fn create(&self, _record: DynamicRecord) -> Result<DynamicRecord> {
        self.clash()
    }

    async fn get_by_domain(&self, domain_name: &str) -> Result<Option<DynamicRecord>> {
        self.inner.get_by_domain(domain_name).await
    }

    async fn get_by_token(&self, update_token: &str) -> Result<Option<DynamicRecord>> {
        self.inner.get_by_token(update_token).await
    }

    async fn get_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<Option<DynamicRecord>> {
        self.inner.get_owned(owner_id, id).await
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DynamicRecord>> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn count_by_owner(&self, owner_id: OwnerId) -> Result<usize> {
        self.inner.count_by_owner(owner_id).await
    }

    async fn modify(
        &self,
        domain_name: &str,
        mutation: RecordMutation<'_>,
    ) -> Result<Option<DynamicRecord>> {
        self.inner.modify(domain_name, mutation).await
    }

    async fn replace_token(
        &self,
        _owner_id: OwnerId,
        _id: RecordId,
        _new_token: &str,
    ) -> Result<bool> {
        self.clash()
    }

    async fn delete_owned(&self, owner_id: OwnerId, id: RecordId) -> Result<bool> {
        self.inner.delete_owned(owner_id, id).await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "token-clash"
    }
}

/// Everything wired against one in-memory store
pub struct Harness {
    pub store: Arc<MemoryRecordStore>,
    pub cache: RecordingDnsCache,
    pub resolver: UpdateResolver,
    pub service: RecordService,
    pub responder: QueryResponder,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryRecordStore::new());
        let cache = RecordingDnsCache::new();
        let config = UpdateConfig::default();

        Self {
            resolver: UpdateResolver::new(store.clone(), Arc::new(cache.clone()), &config),
            service: RecordService::new(store.clone(), &config),
            responder: QueryResponder::new(store.clone(), config.lookup_timeout()),
            store,
            cache,
        }
    }

    /// Create a record for owner 1 and return it
    pub async fn create(&self, domain: &str) -> DynamicRecord {
        self.service
            .create_record(1, domain, None)
            .await
            .expect("create succeeds")
    }

    /// Current state of a record
    pub async fn fetch(&self, domain: &str) -> DynamicRecord {
        self.store
            .get_by_domain(domain)
            .await
            .expect("lookup succeeds")
            .expect("record exists")
    }
}

/// App record covering exactly one name
pub fn app_record(name: &str, ttl: u32) -> AppRecord {
    AppRecord::new(name, ttl)
}
