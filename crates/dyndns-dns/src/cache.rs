//! In-process DNS answer cache
//!
//! Holds answers the update path pushes after an address change. The host
//! falls back to it when the responder defers, and an entry for a name and
//! type always replaces the previous one, so a stale answer never outlives
//! a fresh update.

use async_trait::async_trait;
use dyndns_core::record::normalize_domain;
use dyndns_core::responder::AnswerData;
use dyndns_core::traits::{CachedRecord, DnsCache};
use dyndns_core::{DnsAnswer, DnsQuery, QueryType};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    data: AnswerData,
    expires_at: Instant,
}

/// TTL-bounded answer cache keyed by name and type
#[derive(Debug, Default)]
pub struct AnswerCache {
    entries: RwLock<HashMap<(String, QueryType), Entry>>,
}

impl AnswerCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an answer
    pub async fn insert(&self, name: &str, data: AnswerData, ttl: u32) {
        let query_type = match data {
            AnswerData::A(_) => QueryType::A,
            AnswerData::Aaaa(_) => QueryType::Aaaa,
            AnswerData::Txt(_) => QueryType::Txt,
        };
        let entry = Entry {
            data,
            expires_at: Instant::now() + Duration::from_secs(u64::from(ttl)),
        };

        self.entries
            .write()
            .await
            .insert((normalize_domain(name), query_type), entry);
    }

    /// Look up a live answer, with its remaining TTL
    pub async fn lookup(&self, query: &DnsQuery) -> Option<DnsAnswer> {
        let key = (normalize_domain(&query.name), query.query_type);
        let now = Instant::now();

        let entries = self.entries.read().await;
        let entry = entries.get(&key)?;
        if now >= entry.expires_at {
            return None;
        }

        let remaining = entry.expires_at.saturating_duration_since(now);
        Some(DnsAnswer {
            name: query.name.clone(),
            ttl: u32::try_from(remaining.as_secs().max(1)).unwrap_or(u32::MAX),
            data: entry.data.clone(),
        })
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Number of entries, live or expired
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DnsCache for AnswerCache {
    async fn cache_record(&self, record: &CachedRecord) -> Result<(), dyndns_core::Error> {
        let data = match record.address {
            IpAddr::V4(ip) => AnswerData::A(ip),
            IpAddr::V6(ip) => AnswerData::Aaaa(ip),
        };
        self.insert(&record.name, data, record.ttl).await;
        tracing::trace!(name = %record.name, record_type = record.type_name(), "Answer cached");
        Ok(())
    }

    fn cache_name(&self) -> &'static str {
        "answer-cache"
    }
}
