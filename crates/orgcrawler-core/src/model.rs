//! Organization data model.
//!
//! Source uses classical inheritance (`OrgObject` -> `Account`/
//! `OrganizationalUnit`/`Policy`). Re-architected here as three distinct
//! structs that each embed a common [`OrgObjectFields`] by value, rather than
//! a sum type with runtime dispatch — queries never need to downcast.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::credentials::Credentials;

/// Attributes shared by every node in the organization graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgObjectFields {
    pub organization_id: String,
    pub master_account_id: String,
    pub name: String,
    pub id: String,
    pub parent_id: String,
    pub attached_policy_ids: HashSet<String>,
}

/// An account in the organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(flatten)]
    pub fields: OrgObjectFields,
    pub email: String,
    pub aliases: Vec<String>,
    /// Never persisted: stripped before cache write, empty after cache read.
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl Account {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn id(&self) -> &str {
        &self.fields.id
    }

    pub fn parent_id(&self) -> &str {
        &self.fields.parent_id
    }

    pub fn attached_policy_ids(&self) -> &HashSet<String> {
        &self.fields.attached_policy_ids
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.fields.id == other.fields.id
    }
}
impl Eq for Account {}
impl std::hash::Hash for Account {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fields.id.hash(state);
    }
}

/// An organizational unit. The root itself is never represented as one of
/// these — only as `Organization::root_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationalUnit {
    #[serde(flatten)]
    pub fields: OrgObjectFields,
}

impl OrganizationalUnit {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn id(&self) -> &str {
        &self.fields.id
    }

    pub fn parent_id(&self) -> &str {
        &self.fields.parent_id
    }
}

/// The kind of node a policy target refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetType {
    Root,
    OrganizationalUnit,
    Account,
}

/// One target a policy is attached to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyTarget {
    pub target_id: String,
    pub target_type: TargetType,
    pub name: String,
    pub arn: String,
}

/// A service-control policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    #[serde(flatten)]
    pub fields: OrgObjectFields,
    pub targets: Vec<PolicyTarget>,
}

impl Policy {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn id(&self) -> &str {
        &self.fields.id
    }
}

/// Root aggregate: master account identity, discovered graph, and cache policy.
///
/// Mutated only by `load` (see [`crate::loader`]); treated as read-only by
/// every query and by the crawler, which holds only a non-owning reference.
#[derive(Debug, Clone)]
pub struct Organization {
    pub master_account_id: String,
    pub access_role: String,
    pub id: String,
    pub root_id: String,
    pub accounts: Vec<Account>,
    pub org_units: Vec<OrganizationalUnit>,
    pub policies: Vec<Policy>,
    pub cache_config: CacheConfig,
}

impl Organization {
    /// An empty, not-yet-loaded Organization for the given master account
    /// and access role. Call [`crate::loader::OrganizationLoader::load`] to
    /// populate it.
    pub fn new(master_account_id: impl Into<String>, access_role: impl Into<String>) -> Self {
        let master_account_id = master_account_id.into();
        let cache_config = CacheConfig::default_for_master_account(&master_account_id);
        Self {
            master_account_id,
            access_role: access_role.into(),
            id: String::new(),
            root_id: String::new(),
            accounts: Vec::new(),
            org_units: Vec::new(),
            policies: Vec::new(),
            cache_config,
        }
    }

    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }
}

/// Plain-data, serializable dump of an Organization, excluding credentials
/// and any transient handles. This is what gets written to the cache file
/// and is also what the `orgquery dump` command prints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationDump {
    pub master_account_id: String,
    pub access_role: String,
    pub id: String,
    pub root_id: String,
    pub accounts: Vec<Account>,
    pub org_units: Vec<OrganizationalUnit>,
    pub policies: Vec<Policy>,
}

impl From<&Organization> for OrganizationDump {
    fn from(org: &Organization) -> Self {
        Self {
            master_account_id: org.master_account_id.clone(),
            access_role: org.access_role.clone(),
            id: org.id.clone(),
            root_id: org.root_id.clone(),
            accounts: org.accounts.clone(),
            org_units: org.org_units.clone(),
            policies: org.policies.clone(),
        }
    }
}

impl OrganizationDump {
    pub fn into_organization(self, cache_config: CacheConfig) -> Organization {
        Organization {
            master_account_id: self.master_account_id,
            access_role: self.access_role,
            id: self.id,
            root_id: self.root_id,
            accounts: self.accounts,
            org_units: self.org_units,
            policies: self.policies,
            cache_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, parent_id: &str) -> Account {
        Account {
            fields: OrgObjectFields {
                organization_id: "o-test".into(),
                master_account_id: "123456789012".into(),
                name: id.to_string(),
                id: id.to_string(),
                parent_id: parent_id.to_string(),
                attached_policy_ids: HashSet::new(),
            },
            email: format!("{id}@example.com"),
            aliases: Vec::new(),
            credentials: None,
        }
    }

    #[test]
    fn account_equality_is_by_id_only() {
        let mut a = account("account01", "r-root");
        let b = account("account01", "r-root");
        a.aliases.push("prod".into());
        assert_eq!(a, b);
    }

    #[test]
    fn dump_round_trip_excludes_credentials() {
        let mut org = Organization::new("123456789012", "OrgRole");
        org.id = "o-abc123".into();
        org.root_id = "r-abc123".into();
        let mut acct = account("account01", "r-abc123");
        acct.credentials = Some(Credentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: "token".into(),
            expiration: None,
        });
        org.accounts.push(acct);

        let dump = OrganizationDump::from(&org);
        let bytes = rmp_serde::to_vec(&dump).unwrap();
        let restored: OrganizationDump = rmp_serde::from_slice(&bytes).unwrap();
        assert!(restored.accounts[0].credentials.is_none());
        assert_eq!(restored.accounts[0].fields.id, "account01");
    }
}
