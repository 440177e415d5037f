//! The dynamic DNS record and helpers for deriving its identity fields
//!
//! A [`DynamicRecord`] is the unit of storage: one per managed domain name.
//! Domain names are stored normalized (lowercase, no trailing dot) so the
//! store can compare them exactly while callers compare case-insensitively.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Store-assigned record identifier
pub type RecordId = u64;

/// Identifier of the owning account (external account directory)
pub type OwnerId = u64;

/// Length of a generated update token
pub const TOKEN_LENGTH: usize = 32;

/// Maximum length of the freeform notes field
pub const MAX_NOTES_LENGTH: usize = 255;

/// Record name used when the domain is the zone apex
pub const APEX_RECORD_NAME: &str = "@";

/// Outcome of the most recent update attempt against a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStatus {
    /// At least one address changed
    Success,
    /// Authenticated, but every candidate matched the stored value or was invalid
    NoChange,
    /// The attempt was refused
    Rejected,
}

/// A managed domain name and its dynamic state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRecord {
    /// Store-assigned identifier
    pub id: RecordId,
    /// Normalized fully-qualified name this record answers for
    pub domain_name: String,
    /// Zone the record lives in
    pub zone_name: String,
    /// Name relative to the zone, `@` at the apex
    pub record_name: String,
    /// Capability credential authorizing updates
    pub update_token: String,
    /// Last accepted IPv4 address
    pub ipv4_address: Option<Ipv4Addr>,
    /// Last accepted IPv6 address
    pub ipv6_address: Option<Ipv6Addr>,
    /// Inactive records are neither updated nor resolved
    pub is_active: bool,
    /// Owning account
    pub owner_id: OwnerId,
    pub created_on: DateTime<Utc>,
    /// Time of the last address change
    pub last_updated: DateTime<Utc>,
    /// Number of updates that changed an address
    pub update_count: u64,
    pub last_update_attempt: Option<DateTime<Utc>>,
    pub last_update_status: Option<UpdateStatus>,
    /// Client address observed on the last authenticated attempt
    pub last_update_ip: Option<IpAddr>,
    pub notes: Option<String>,
}

impl DynamicRecord {
    /// Build a fresh, active record with no addresses
    ///
    /// The identifier is assigned by the store on insert; `0` is a placeholder.
    pub fn new(
        owner_id: OwnerId,
        domain_name: &str,
        zone_name: Option<&str>,
        update_token: String,
    ) -> Self {
        let domain_name = normalize_domain(domain_name);
        let (zone_name, record_name) = split_zone(&domain_name, zone_name);
        let now = Utc::now();

        Self {
            id: 0,
            domain_name,
            zone_name,
            record_name,
            update_token,
            ipv4_address: None,
            ipv6_address: None,
            is_active: true,
            owner_id,
            created_on: now,
            last_updated: now,
            update_count: 0,
            last_update_attempt: None,
            last_update_status: None,
            last_update_ip: None,
            notes: None,
        }
    }

    /// Relative update URL handed back to the owner
    pub fn update_url(&self) -> String {
        format!(
            "/api/dynamicdns/update?domain={}&token={}",
            self.domain_name, self.update_token
        )
    }
}

/// Normalize a domain name for storage and comparison
///
/// Lowercases and strips surrounding whitespace and a trailing root dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Derive `(zone_name, record_name)` for a normalized domain
///
/// Without an explicit zone, the zone is the last two labels (or the whole
/// name for single-label names). The record name is the domain minus the
/// zone suffix, `@` when nothing remains.
pub fn split_zone(domain: &str, zone_name: Option<&str>) -> (String, String) {
    let zone = match zone_name.map(normalize_domain) {
        Some(zone) if !zone.is_empty() => zone,
        _ => {
            let labels: Vec<&str> = domain.split('.').collect();
            if labels.len() >= 2 {
                labels[labels.len() - 2..].join(".")
            } else {
                domain.to_string()
            }
        }
    };

    let record = if domain == zone {
        String::new()
    } else {
        domain
            .strip_suffix(&format!(".{zone}"))
            .unwrap_or(domain)
            .to_string()
    };

    let record = if record.is_empty() {
        APEX_RECORD_NAME.to_string()
    } else {
        record
    };

    (zone, record)
}

/// Validate that a string is a plausible domain name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphens.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::invalid_input("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::invalid_input(format!(
            "Domain name too long: {} chars (max 253)",
            domain.len()
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_input(format!(
                "Domain name has empty label: '{domain}'"
            )));
        }

        if label.len() > 63 {
            return Err(Error::invalid_input(format!(
                "Domain label too long: {} chars (max 63). Label: '{label}'",
                label.len()
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_input(format!(
                "Domain label contains invalid characters. Label: '{label}'"
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_input(format!(
                "Domain label cannot start or end with hyphen. Label: '{label}'"
            )));
        }
    }

    Ok(())
}

/// Generate a fresh random update token
///
/// 32 random bytes, base64-encoded with `+`, `/` and `=` removed, truncated
/// to [`TOKEN_LENGTH`] characters.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);

        let token: String = STANDARD
            .encode(bytes)
            .chars()
            .filter(|c| !matches!(c, '+' | '/' | '='))
            .take(TOKEN_LENGTH)
            .collect();

        if token.len() == TOKEN_LENGTH {
            return token;
        }
    }
}
