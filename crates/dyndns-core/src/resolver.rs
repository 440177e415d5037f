//! Update resolution
//!
//! The UpdateResolver turns an authenticated update callback into a record
//! write:
//! - Picks candidate addresses from the supplied literals, falling back to
//!   the observed client address
//! - Decides what changed and bumps the audit fields under the per-domain lock
//! - Pushes each changed family into the host DNS cache
//!
//! ## Candidate Selection
//!
//! ```text
//! ipv4=<literal> ──parse──► IPv4 candidate ─┐
//! ipv6=<literal> ──parse──► IPv6 candidate ─┼──► compare with stored ──► write
//! client address ──(no valid literal)───────┘
//! ```
//!
//! An unparseable literal is dropped as if it was never supplied.

use chrono::Utc;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth;
use crate::config::UpdateConfig;
use crate::error::{Error, Result};
use crate::record::{DynamicRecord, UpdateStatus, normalize_domain};
use crate::traits::{CachedRecord, DnsCache, RecordStore};

/// An inbound update callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Domain to update (any case)
    pub domain: String,
    /// Update token (case-sensitive)
    pub token: String,
    /// Supplied IPv4 literal, if any
    pub ipv4: Option<String>,
    /// Supplied IPv6 literal, if any
    pub ipv6: Option<String>,
    /// Remote address of the connection
    pub observed: Option<IpAddr>,
}

impl UpdateRequest {
    /// Create a request carrying only credentials
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Supply an IPv4 literal
    pub fn with_ipv4(mut self, ipv4: impl Into<String>) -> Self {
        self.ipv4 = Some(ipv4.into());
        self
    }

    /// Supply an IPv6 literal
    pub fn with_ipv6(mut self, ipv6: impl Into<String>) -> Self {
        self.ipv6 = Some(ipv6.into());
        self
    }

    /// Set the observed client address
    pub fn with_observed(mut self, observed: IpAddr) -> Self {
        self.observed = Some(observed);
        self
    }
}

/// Addresses an update would write, per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Candidates {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// Choose candidate addresses for an update
///
/// Each literal is parsed for its own family only. When neither literal is
/// valid, the observed address fills the slot of its family; IPv4-mapped
/// IPv6 client addresses count as IPv4.
pub fn plan_candidates(
    ipv4: Option<&str>,
    ipv6: Option<&str>,
    observed: Option<IpAddr>,
) -> Candidates {
    let mut candidates = Candidates {
        ipv4: ipv4.and_then(|s| s.trim().parse::<Ipv4Addr>().ok()),
        ipv6: ipv6.and_then(|s| s.trim().parse::<Ipv6Addr>().ok()),
    };

    if candidates.ipv4.is_none() && candidates.ipv6.is_none() {
        match observed.map(|ip| ip.to_canonical()) {
            Some(IpAddr::V4(ip)) => candidates.ipv4 = Some(ip),
            Some(IpAddr::V6(ip)) => candidates.ipv6 = Some(ip),
            None => {}
        }
    }

    candidates
}

/// Result of an update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// At least one family changed
    Updated {
        ipv4_changed: bool,
        ipv6_changed: bool,
    },
    /// Authenticated, nothing to change
    NoChange,
    /// Domain/token pair did not match an active record
    Rejected,
}

impl UpdateOutcome {
    /// Whether the caller authenticated
    pub fn accepted(&self) -> bool {
        !matches!(self, UpdateOutcome::Rejected)
    }
}

/// Applies update callbacks to the record store
#[derive(Clone)]
pub struct UpdateResolver {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn DnsCache>,
    store_timeout: Duration,
    cache_ttl: u32,
}

impl UpdateResolver {
    /// Create a resolver
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn DnsCache>, config: &UpdateConfig) -> Self {
        Self {
            store,
            cache,
            store_timeout: config.store_timeout(),
            cache_ttl: config.cache_ttl_secs,
        }
    }

    /// Apply an update and report whether the caller authenticated
    pub async fn update(
        &self,
        domain: &str,
        token: &str,
        ipv4: Option<&str>,
        ipv6: Option<&str>,
        observed: Option<IpAddr>,
    ) -> Result<bool> {
        let request = UpdateRequest {
            domain: domain.to_string(),
            token: token.to_string(),
            ipv4: ipv4.map(str::to_string),
            ipv6: ipv6.map(str::to_string),
            observed,
        };
        Ok(self.apply(&request).await?.accepted())
    }

    /// Apply an update
    ///
    /// Authentication, change detection and the audit write all happen inside
    /// one store mutation, so concurrent updates of the same domain count
    /// every change exactly once.
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateOutcome)`: Rejected, unchanged or updated
    /// - `Err(Error::Timeout | Error::StoreUnavailable)`: Retryable store failure
    pub async fn apply(&self, request: &UpdateRequest) -> Result<UpdateOutcome> {
        let domain = normalize_domain(&request.domain);
        if domain.is_empty() || request.token.is_empty() {
            return Ok(UpdateOutcome::Rejected);
        }

        let candidates = plan_candidates(
            request.ipv4.as_deref(),
            request.ipv6.as_deref(),
            request.observed,
        );
        let observed = request.observed.map(|ip| ip.to_canonical());
        let token = request.token.as_str();
        let now = Utc::now();

        let mut outcome = UpdateOutcome::Rejected;
        let mut mutation = |record: &mut DynamicRecord| -> bool {
            if !auth::matches(record, token) {
                outcome = UpdateOutcome::Rejected;
                return false;
            }

            let ipv4 = candidates.ipv4.filter(|ip| record.ipv4_address != Some(*ip));
            let ipv6 = candidates.ipv6.filter(|ip| record.ipv6_address != Some(*ip));

            record.last_update_attempt = Some(now);
            record.last_update_ip = observed;

            if ipv4.is_none() && ipv6.is_none() {
                record.last_update_status = Some(UpdateStatus::NoChange);
                outcome = UpdateOutcome::NoChange;
                return true;
            }

            if ipv4.is_some() {
                record.ipv4_address = ipv4;
            }
            if ipv6.is_some() {
                record.ipv6_address = ipv6;
            }
            record.last_updated = now;
            record.update_count += 1;
            record.last_update_status = Some(UpdateStatus::Success);
            outcome = UpdateOutcome::Updated {
                ipv4_changed: ipv4.is_some(),
                ipv6_changed: ipv6.is_some(),
            };
            true
        };

        let record = tokio::time::timeout(
            self.store_timeout,
            self.store.modify(&domain, &mut mutation),
        )
        .await
        .map_err(|_| Error::Timeout(self.store_timeout))??;

        let Some(record) = record else {
            debug!(domain = %domain, "Update rejected");
            return Ok(UpdateOutcome::Rejected);
        };

        match outcome {
            UpdateOutcome::Rejected => {
                debug!(domain = %domain, "Update rejected");
            }
            UpdateOutcome::NoChange => {
                debug!(domain = %domain, "Update accepted, addresses unchanged");
            }
            UpdateOutcome::Updated {
                ipv4_changed,
                ipv6_changed,
            } => {
                info!(
                    domain = %domain,
                    ipv4 = ?record.ipv4_address,
                    ipv6 = ?record.ipv6_address,
                    update_count = record.update_count,
                    "DNS record updated"
                );

                if ipv4_changed && let Some(ip) = record.ipv4_address {
                    self.push_to_cache(&record.domain_name, IpAddr::V4(ip)).await;
                }
                if ipv6_changed && let Some(ip) = record.ipv6_address {
                    self.push_to_cache(&record.domain_name, IpAddr::V6(ip)).await;
                }
            }
        }

        Ok(outcome)
    }

    /// Push a fresh answer into the host cache; failures only cost latency
    async fn push_to_cache(&self, name: &str, address: IpAddr) {
        let entry = CachedRecord::new(name, address, self.cache_ttl);
        match tokio::time::timeout(self.store_timeout, self.cache.cache_record(&entry)).await {
            Ok(Ok(())) => {
                debug!(
                    name = %entry.name,
                    record_type = entry.type_name(),
                    cache = self.cache.cache_name(),
                    "Pushed record into DNS cache"
                );
            }
            Ok(Err(e)) => {
                warn!(
                    name = %entry.name,
                    record_type = entry.type_name(),
                    "Failed to update DNS cache: {}",
                    e
                );
            }
            Err(_) => {
                warn!(
                    name = %entry.name,
                    record_type = entry.type_name(),
                    "DNS cache update timed out"
                );
            }
        }
    }
}
