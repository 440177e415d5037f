// # dyndns-core
//
// Core library for the dynamic DNS record updater.
//
// ## Architecture Overview
//
// This library owns the record-update and resolution path:
// - **RecordStore**: Trait for durable, uniqueness-enforcing record storage
// - **TokenAuthenticator**: Matches a (domain, token) pair to an active record
// - **UpdateResolver**: Chooses the addresses to accept and applies the write
// - **QueryResponder**: Synthesizes A/AAAA/TXT answers for managed names
// - **DnsCache**: Hook that pushes fresh answers into the host DNS cache
// - **RecordService**: Owner-scoped record management for the account layer
// - **StoreRegistry**: Plugin-based registry for record store backends
//
// ## Design Principles
//
// 1. **Injected handles**: Stores and caches are passed in as `Arc<dyn _>`
// 2. **Fail-open resolution**: Query errors become "defer to host", never panics
// 3. **Opaque authentication**: A bad token and a bad domain look identical
// 4. **Per-domain serialization**: Mutations of one record never interleave

pub mod auth;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod responder;
pub mod service;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use auth::TokenAuthenticator;
pub use config::{AppRecord, AppRecordData, ServiceConfig, StoreConfig};
pub use error::{Error, Result};
pub use record::{DynamicRecord, OwnerId, RecordId, UpdateStatus};
pub use registry::StoreRegistry;
pub use resolver::{UpdateOutcome, UpdateRequest, UpdateResolver};
pub use responder::{DeferReason, DnsAnswer, DnsQuery, QueryOutcome, QueryResponder, QueryType};
pub use service::RecordService;
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{CachedRecord, DnsCache, NoopDnsCache, RecordStore};
