//! Organization Query Surface.
//!
//! Every query is an `O(n)` scan over `Organization::accounts`/`org_units`/
//! `policies`. None of these ever panic: a miss returns an empty collection,
//! `None`, or (for `get_org_unit_id`) an empty string, matching the source
//! behavior of returning `None`/`[]` rather than raising.

use std::collections::HashSet;

use crate::identifier::{AccountIdentifier, OrgUnitIdentifier, PolicyIdentifier, TargetIdentifier};
use crate::model::{Account, Organization, OrganizationalUnit, Policy, TargetType};

/// Read-only query surface over an already-loaded [`Organization`].
pub struct OrgQuery<'a> {
    org: &'a Organization,
}

impl<'a> OrgQuery<'a> {
    pub fn new(org: &'a Organization) -> Self {
        Self { org }
    }

    /// Every account's name, in no particular order.
    pub fn list_accounts_by_name(&self) -> Vec<&'a str> {
        self.org.accounts.iter().map(Account::name).collect()
    }

    /// Every account's id, in no particular order.
    pub fn list_accounts_by_id(&self) -> Vec<&'a str> {
        self.org.accounts.iter().map(Account::id).collect()
    }

    /// Every org unit's name, in no particular order.
    pub fn list_org_units_by_name(&self) -> Vec<&'a str> {
        self.org.org_units.iter().map(OrganizationalUnit::name).collect()
    }

    /// Every org unit's id, in no particular order.
    pub fn list_org_units_by_id(&self) -> Vec<&'a str> {
        self.org.org_units.iter().map(OrganizationalUnit::id).collect()
    }

    /// Every policy's name, in no particular order.
    pub fn list_policies_by_name(&self) -> Vec<&'a str> {
        self.org.policies.iter().map(Policy::name).collect()
    }

    /// Every policy's id, in no particular order.
    pub fn list_policies_by_id(&self) -> Vec<&'a str> {
        self.org.policies.iter().map(Policy::id).collect()
    }

    /// Resolve by object (already resolved, returned as-is), id, name, or
    /// alias. Returns `None` if nothing matches, never panics.
    pub fn get_account(&self, identifier: impl Into<AccountIdentifier<'a>>) -> Option<&'a Account> {
        match identifier.into() {
            AccountIdentifier::Object(a) => Some(a),
            AccountIdentifier::Str(s) => self.org.accounts.iter().find(|a| {
                a.id() == s || a.name() == s || a.aliases.iter().any(|alias| alias == s)
            }),
        }
    }

    /// Resolve by object, id, or name. `"root"` and the organization's
    /// `root_id` have no backing `OrganizationalUnit` object and never match
    /// here — see [`OrgQuery::get_org_unit_id`] for root handling.
    pub fn get_org_unit(&self, identifier: impl Into<OrgUnitIdentifier<'a>>) -> Option<&'a OrganizationalUnit> {
        match identifier.into() {
            OrgUnitIdentifier::Object(ou) => Some(ou),
            OrgUnitIdentifier::Str(s) => self
                .org
                .org_units
                .iter()
                .find(|ou| ou.id() == s || ou.name() == s),
        }
    }

    /// Like [`OrgQuery::get_org_unit`], but resolves to an id string and
    /// special-cases `"root"` and the organization's own `root_id`, neither
    /// of which appear in `org_units`. Returns `""` on a miss.
    pub fn get_org_unit_id(&self, identifier: &str) -> String {
        if identifier == "root" || identifier == self.org.root_id {
            return self.org.root_id.clone();
        }
        self.get_org_unit(identifier)
            .map(|ou| ou.id().to_string())
            .unwrap_or_default()
    }

    pub fn get_policy(&self, identifier: impl Into<PolicyIdentifier<'a>>) -> Option<&'a Policy> {
        match identifier.into() {
            PolicyIdentifier::Object(p) => Some(p),
            PolicyIdentifier::Str(s) => self
                .org
                .policies
                .iter()
                .find(|p| p.id() == s || p.name() == s),
        }
    }

    /// Accounts whose `parent_id` is exactly `ou_id` (`"root"` resolves to
    /// the organization root).
    pub fn list_accounts_in_ou(&self, ou_id: &str) -> Vec<&'a Account> {
        let resolved = self.get_org_unit_id(ou_id);
        self.org
            .accounts
            .iter()
            .filter(|a| a.parent_id() == resolved)
            .collect()
    }

    /// Direct child org units of `ou_id`.
    pub fn list_org_units_in_ou(&self, ou_id: &str) -> Vec<&'a OrganizationalUnit> {
        let resolved = self.get_org_unit_id(ou_id);
        self.org
            .org_units
            .iter()
            .filter(|ou| ou.parent_id() == resolved)
            .collect()
    }

    /// Accounts under `ou_id` at any depth.
    pub fn list_accounts_in_ou_recursive(&self, ou_id: &str) -> Vec<&'a Account> {
        let descendant_ids = self.descendant_ou_ids(ou_id);
        self.org
            .accounts
            .iter()
            .filter(|a| descendant_ids.contains(a.parent_id()))
            .collect()
    }

    /// Org units under `ou_id` at any depth (not including `ou_id` itself).
    pub fn list_org_units_in_ou_recursive(&self, ou_id: &str) -> Vec<&'a OrganizationalUnit> {
        let root = self.get_org_unit_id(ou_id);
        self.org
            .org_units
            .iter()
            .filter(|ou| self.is_descendant_of(ou, &root))
            .collect()
    }

    fn is_descendant_of(&self, ou: &OrganizationalUnit, ancestor_id: &str) -> bool {
        let mut current = ou.parent_id().to_string();
        loop {
            if current == ancestor_id {
                return true;
            }
            match self.get_org_unit(current.as_str()) {
                Some(parent) => current = parent.parent_id().to_string(),
                None => return false,
            }
        }
    }

    fn descendant_ou_ids(&self, ou_id: &str) -> HashSet<String> {
        let root = self.get_org_unit_id(ou_id);
        let mut ids: HashSet<String> = self
            .org
            .org_units
            .iter()
            .filter(|ou| self.is_descendant_of(ou, &root))
            .map(|ou| ou.id().to_string())
            .collect();
        ids.insert(root);
        ids
    }

    /// Every policy target attached to `policy_id`.
    pub fn get_targets_for_policy(&self, policy_id: impl Into<PolicyIdentifier<'a>>) -> Vec<crate::model::PolicyTarget> {
        self.get_policy(policy_id)
            .map(|p| p.targets.clone())
            .unwrap_or_default()
    }

    /// Policies attached directly to `target_id` (an account, org unit, or
    /// `"root"`). Returns an empty vec rather than `None` on no match,
    /// unifying the source's `get_policies_for_target`/`_recursive` split
    /// return shapes.
    pub fn get_policies_for_target(&self, _target: impl Into<TargetIdentifier<'a>>) -> Vec<&'a Policy> {
        let target_id = match _target.into() {
            TargetIdentifier::Str(s) => s.to_string(),
        };
        let resolved = if target_id == "root" { self.org.root_id.clone() } else { target_id };
        self.org
            .policies
            .iter()
            .filter(|p| p.targets.iter().any(|t| t.target_id == resolved))
            .collect()
    }

    /// Every account affected by `policy_id`: accounts it is attached to
    /// directly, plus every account under any org unit (or the root) it is
    /// attached to, deduplicated by account id.
    pub fn get_accounts_for_policy_recursive(&self, policy_id: impl Into<PolicyIdentifier<'a>>) -> Vec<&'a Account> {
        let Some(policy) = self.get_policy(policy_id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for target in &policy.targets {
            match target.target_type {
                TargetType::Account => {
                    if let Some(account) = self.get_account(target.target_id.as_str()) {
                        if seen.insert(account.id().to_string()) {
                            result.push(account);
                        }
                    }
                }
                TargetType::Root | TargetType::OrganizationalUnit => {
                    for account in self.list_accounts_in_ou_recursive(&target.target_id) {
                        if seen.insert(account.id().to_string()) {
                            result.push(account);
                        }
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet as Set;

    use super::*;
    use crate::model::{OrgObjectFields, PolicyTarget};

    fn fields(id: &str, name: &str, parent_id: &str) -> OrgObjectFields {
        OrgObjectFields {
            organization_id: "o-test".into(),
            master_account_id: "111111111111".into(),
            name: name.into(),
            id: id.into(),
            parent_id: parent_id.into(),
            attached_policy_ids: Set::new(),
        }
    }

    fn sample_org() -> Organization {
        let mut org = Organization::new("111111111111", "OrgRole");
        org.id = "o-abc".into();
        org.root_id = "r-root".into();

        org.org_units.push(OrganizationalUnit {
            fields: fields("ou-prod", "Production", "r-root"),
        });
        org.org_units.push(OrganizationalUnit {
            fields: fields("ou-prod-web", "Web", "ou-prod"),
        });

        org.accounts.push(Account {
            fields: fields("111111111111", "master", "r-root"),
            email: "master@example.com".into(),
            aliases: vec!["master-alias".into()],
            credentials: None,
        });
        org.accounts.push(Account {
            fields: fields("222222222222", "web01", "ou-prod-web"),
            email: "web01@example.com".into(),
            aliases: Vec::new(),
            credentials: None,
        });

        org.policies.push(Policy {
            fields: fields("p-1", "DenyAll", ""),
            targets: vec![PolicyTarget {
                target_id: "ou-prod".into(),
                target_type: TargetType::OrganizationalUnit,
                name: "Production".into(),
                arn: "arn:aws:organizations::111111111111:ou/o-abc/ou-prod".into(),
            }],
        });

        org
    }

    #[test]
    fn get_account_resolves_by_alias() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        assert_eq!(q.get_account("master-alias").unwrap().id(), "111111111111");
    }

    #[test]
    fn get_account_miss_returns_none() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        assert!(q.get_account("does-not-exist").is_none());
    }

    #[test]
    fn list_accounts_by_name_projects_the_whole_collection() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        let mut names = q.list_accounts_by_name();
        names.sort_unstable();
        assert_eq!(names, vec!["master", "web01"]);
    }

    #[test]
    fn list_accounts_by_id_projects_the_whole_collection() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        let mut ids = q.list_accounts_by_id();
        ids.sort_unstable();
        assert_eq!(ids, vec!["111111111111", "222222222222"]);
    }

    #[test]
    fn list_org_units_by_name_projects_the_whole_collection() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        let mut names = q.list_org_units_by_name();
        names.sort_unstable();
        assert_eq!(names, vec!["Production", "Web"]);
    }

    #[test]
    fn list_policies_by_id_projects_the_whole_collection() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        assert_eq!(q.list_policies_by_id(), vec!["p-1"]);
    }

    #[test]
    fn get_org_unit_id_special_cases_root() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        assert_eq!(q.get_org_unit_id("root"), "r-root");
        assert_eq!(q.get_org_unit_id("r-root"), "r-root");
        assert_eq!(q.get_org_unit_id("ou-prod"), "ou-prod");
        assert_eq!(q.get_org_unit_id("missing"), "");
    }

    #[test]
    fn list_accounts_in_ou_recursive_descends_nested_units() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        let accounts = q.list_accounts_in_ou_recursive("ou-prod");
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id(), "222222222222");
    }

    #[test]
    fn get_accounts_for_policy_recursive_expands_ou_target() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        let accounts = q.get_accounts_for_policy_recursive("DenyAll");
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id(), "222222222222");
    }

    #[test]
    fn get_policies_for_target_returns_empty_vec_on_miss() {
        let org = sample_org();
        let q = OrgQuery::new(&org);
        assert!(q.get_policies_for_target("no-such-target").is_empty());
    }
}
