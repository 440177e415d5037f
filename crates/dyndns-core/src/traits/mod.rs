//! Core traits for the dynamic DNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RecordStore`]: Durable, uniqueness-enforcing record persistence
//! - [`DnsCache`]: Push fresh answers into the host DNS server's cache

pub mod dns_cache;
pub mod record_store;

pub use dns_cache::{CachedRecord, DnsCache, NoopDnsCache};
pub use record_store::{RecordMutation, RecordStore, RecordStoreFactory};
