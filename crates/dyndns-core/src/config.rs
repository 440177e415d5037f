//! Configuration types for the dynamic DNS system
//!
//! This module defines all configuration structures used throughout the
//! workspace. The daemon builds a [`ServiceConfig`] from the environment and
//! hands the relevant pieces to each component.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entitlement::{PlanLimits, PlanTier};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// App record registered with the DNS host
    #[serde(default)]
    pub app_record: AppRecord,

    /// Update path settings
    #[serde(default)]
    pub update: UpdateConfig,

    /// Plan limits for record creation
    #[serde(default)]
    pub plans: PlanLimits,

    /// HTTP listener settings
    #[serde(default)]
    pub http: HttpConfig,

    /// DNS listener settings
    #[serde(default)]
    pub dns: DnsConfig,
}

impl ServiceConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            store: StoreConfig::default(),
            app_record: AppRecord::default(),
            update: UpdateConfig::default(),
            plans: PlanLimits::default(),
            http: HttpConfig::default(),
            dns: DnsConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.app_record.validate()?;
        self.update.validate()?;

        if self.http.listen.is_empty() {
            return Err(crate::Error::config("HTTP listen address cannot be empty"));
        }
        if self.dns.listen.is_empty() {
            return Err(crate::Error::config("DNS listen address cannot be empty"));
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based record store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory record store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Store file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name used for registry lookup
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// The record a DNS host registers this application under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
    /// Name pattern; a leading `*` matches any name
    #[serde(default = "default_app_record_name")]
    pub name: String,

    /// TTL of synthesized answers, in seconds
    #[serde(default = "default_app_record_ttl")]
    pub ttl: u32,

    /// Free-form data attached to the app record
    #[serde(default)]
    pub data: AppRecordData,
}

impl AppRecord {
    /// Create an app record with default data
    pub fn new(name: impl Into<String>, ttl: u32) -> Self {
        Self {
            name: name.into(),
            ttl,
            data: AppRecordData::default(),
        }
    }

    /// Set the app record data
    pub fn with_data(mut self, data: AppRecordData) -> Self {
        self.data = data;
        self
    }

    /// Validate the app record
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("App record name cannot be empty"));
        }
        Ok(())
    }
}

impl Default for AppRecord {
    fn default() -> Self {
        Self::new(default_app_record_name(), default_app_record_ttl())
    }
}

/// Settings carried in the app record's data field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecordData {
    /// CIDR networks allowed to query
    #[serde(default = "default_allowed_networks")]
    pub allowed_networks: Vec<String>,

    /// Whether updates must present a token
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,
}

impl AppRecordData {
    /// Parse app record data, falling back to defaults on empty or invalid JSON
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }

        match serde_json::from_str(raw) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Invalid app record data, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

impl Default for AppRecordData {
    fn default() -> Self {
        Self {
            allowed_networks: default_allowed_networks(),
            require_auth: default_require_auth(),
        }
    }
}

/// Update path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Time budget for a single store operation (in milliseconds)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Time budget for a responder lookup (in milliseconds)
    ///
    /// Kept short: a slow lookup defers to the host instead of stalling
    /// the DNS reply.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// TTL of entries pushed into the host DNS cache (in seconds)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u32,
}

impl UpdateConfig {
    /// Store operation timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Responder lookup timeout
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Validate the update configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.store_timeout_ms == 0 {
            return Err(crate::Error::config("Store timeout must be > 0"));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(crate::Error::config("Lookup timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Socket address to bind
    #[serde(default = "default_http_listen")]
    pub listen: String,

    /// Plan assigned to owners the directory does not know
    #[serde(default)]
    pub default_plan: PlanTier,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            default_plan: PlanTier::default(),
        }
    }
}

/// DNS listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// UDP socket address to bind
    #[serde(default = "default_dns_listen")]
    pub listen: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen: default_dns_listen(),
        }
    }
}

fn default_app_record_name() -> String {
    "*".to_string()
}

fn default_app_record_ttl() -> u32 {
    60
}

fn default_allowed_networks() -> Vec<String> {
    vec!["0.0.0.0/0".to_string(), "::/0".to_string()]
}

fn default_require_auth() -> bool {
    true
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_lookup_timeout_ms() -> u64 {
    250
}

fn default_cache_ttl_secs() -> u32 {
    60
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_dns_listen() -> String {
    "0.0.0.0:5353".to_string()
}
