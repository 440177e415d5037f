//! Account entitlements gating record creation
//!
//! The account layer is external. The core only needs to know how many
//! records an owner may hold; callers check `current < max_domains` before
//! calling [`RecordService::create_record`](crate::RecordService::create_record).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::record::OwnerId;

/// Subscription tier of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Pro,
}

impl std::str::FromStr for PlanTier {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "basic" => Ok(PlanTier::Basic),
            "pro" => Ok(PlanTier::Pro),
            other => Err(crate::Error::config(format!("Unknown plan tier: {}", other))),
        }
    }
}

/// Per-tier record limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLimits {
    /// When false, free accounts cannot create records
    #[serde(default = "default_free_tier_enabled")]
    pub free_tier_enabled: bool,

    #[serde(default = "default_free_max")]
    pub free_max: usize,

    #[serde(default = "default_basic_max")]
    pub basic_max: usize,

    #[serde(default = "default_pro_max")]
    pub pro_max: usize,
}

impl PlanLimits {
    /// Maximum number of records for a tier
    pub fn max_domains(&self, tier: PlanTier) -> usize {
        match tier {
            PlanTier::Free if self.free_tier_enabled => self.free_max,
            PlanTier::Free => 0,
            PlanTier::Basic => self.basic_max,
            PlanTier::Pro => self.pro_max,
        }
    }

    /// Build the entitlement of an owner on a tier
    pub fn entitlement_for(&self, owner_id: OwnerId, plan_tier: PlanTier) -> AccountEntitlement {
        AccountEntitlement {
            owner_id,
            plan_tier,
            max_domains: self.max_domains(plan_tier),
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free_tier_enabled: default_free_tier_enabled(),
            free_max: default_free_max(),
            basic_max: default_basic_max(),
            pro_max: default_pro_max(),
        }
    }
}

/// What an account is allowed to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntitlement {
    pub owner_id: OwnerId,
    pub plan_tier: PlanTier,
    pub max_domains: usize,
}

impl AccountEntitlement {
    /// Whether an owner holding `current_count` records may create another
    pub fn allows(&self, current_count: usize) -> bool {
        current_count < self.max_domains
    }
}

/// Read-only view of the external account directory
///
/// # Trust Level: Untrusted (External Collaborator)
///
/// ## Allowed Capabilities
/// - ✅ Look up plan information for an owner
///
/// ## Forbidden Capabilities
/// - ❌ Touch records or the record store
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Entitlement of an owner
    async fn entitlement(&self, owner_id: OwnerId) -> Result<AccountEntitlement, crate::Error>;
}

/// Account directory with a fixed default tier and optional overrides
#[derive(Debug)]
pub struct StaticAccountDirectory {
    limits: PlanLimits,
    default_tier: PlanTier,
    overrides: RwLock<HashMap<OwnerId, PlanTier>>,
}

impl StaticAccountDirectory {
    /// Create a directory assigning `default_tier` to every owner
    pub fn new(limits: PlanLimits, default_tier: PlanTier) -> Self {
        Self {
            limits,
            default_tier,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Assign a specific tier to one owner
    pub async fn set_tier(&self, owner_id: OwnerId, tier: PlanTier) {
        self.overrides.write().await.insert(owner_id, tier);
    }
}

#[async_trait]
impl AccountDirectory for StaticAccountDirectory {
    async fn entitlement(&self, owner_id: OwnerId) -> Result<AccountEntitlement, crate::Error> {
        let tier = self
            .overrides
            .read()
            .await
            .get(&owner_id)
            .copied()
            .unwrap_or(self.default_tier);
        Ok(self.limits.entitlement_for(owner_id, tier))
    }
}

fn default_free_tier_enabled() -> bool {
    true
}

fn default_free_max() -> usize {
    3
}

fn default_basic_max() -> usize {
    10
}

fn default_pro_max() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_limits() {
        let limits = PlanLimits::default();
        assert_eq!(limits.max_domains(PlanTier::Free), 3);
        assert_eq!(limits.max_domains(PlanTier::Basic), 10);
        assert_eq!(limits.max_domains(PlanTier::Pro), 50);

        let disabled = PlanLimits {
            free_tier_enabled: false,
            ..PlanLimits::default()
        };
        assert_eq!(disabled.max_domains(PlanTier::Free), 0);
        assert!(!disabled.entitlement_for(1, PlanTier::Free).allows(0));
    }

    #[test]
    fn test_entitlement_allows() {
        let entitlement = PlanLimits::default().entitlement_for(7, PlanTier::Free);
        assert!(entitlement.allows(2));
        assert!(!entitlement.allows(3));
    }

    #[test]
    fn test_plan_tier_from_str() {
        assert_eq!("Pro".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert!("gold".parse::<PlanTier>().is_err());
    }

    #[tokio::test]
    async fn test_static_directory_overrides() {
        let directory = StaticAccountDirectory::new(PlanLimits::default(), PlanTier::Free);
        directory.set_tier(2, PlanTier::Basic).await;

        assert_eq!(directory.entitlement(1).await.unwrap().max_domains, 3);
        assert_eq!(directory.entitlement(2).await.unwrap().max_domains, 10);
    }
}
