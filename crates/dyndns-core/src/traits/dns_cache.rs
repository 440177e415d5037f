// # DNS Cache Hook
//
// Defines the interface the update path uses to push a freshly accepted
// address into the host DNS server's answer cache, so an earlier cached
// (stale or negative) answer for the same name and type is superseded
// immediately instead of lingering until its TTL runs out.
//
// ## Implementations
//
// - `dyndns-dns`: `AnswerCache` (in-process host cache)
// - `NoopDnsCache`: when no host cache is attached

use async_trait::async_trait;
use std::net::IpAddr;

/// A resource record pushed into the host cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    /// Normalized owner name
    pub name: String,
    /// The address; its family selects A or AAAA
    pub address: IpAddr,
    /// Time-to-live in seconds
    pub ttl: u32,
}

impl CachedRecord {
    /// Create a cache entry
    pub fn new(name: impl Into<String>, address: IpAddr, ttl: u32) -> Self {
        Self {
            name: name.into(),
            address,
            ttl,
        }
    }

    /// Record type mnemonic (`A` or `AAAA`)
    pub fn type_name(&self) -> &'static str {
        match self.address {
            IpAddr::V4(_) => "A",
            IpAddr::V6(_) => "AAAA",
        }
    }
}

/// Trait for host DNS cache integrations
///
/// # Failure Semantics
///
/// Errors are logged by the caller and otherwise ignored: the stored record
/// is already correct, only propagation latency suffers.
#[async_trait]
pub trait DnsCache: Send + Sync {
    /// Insert or replace the cached answer for `record.name` and its type
    async fn cache_record(&self, record: &CachedRecord) -> Result<(), crate::Error>;

    /// Cache name for logging
    fn cache_name(&self) -> &'static str;
}

/// A cache hook that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDnsCache;

#[async_trait]
impl DnsCache for NoopDnsCache {
    async fn cache_record(&self, _record: &CachedRecord) -> Result<(), crate::Error> {
        Ok(())
    }

    fn cache_name(&self) -> &'static str {
        "noop"
    }
}
