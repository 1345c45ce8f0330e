//! Provider API surface used by the loader and credential broker.
//!
//! The live discovery algorithm and the credential broker are written against
//! these traits, not directly against `aws-sdk-organizations`/`aws-sdk-sts`
//! client types. That keeps the core engine free of any real network
//! dependency in tests: [`crate::mock`] provides in-memory implementations
//! that back the Mock Organization Builder and every scenario in the test
//! suite.

use async_trait::async_trait;

use crate::error::OrgResult;
use crate::model::{PolicyTarget, TargetType};

/// One page of a paginated list call.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

/// Raw account record as returned by `list_accounts`, before parent/policy
/// enrichment. Accounts with no `name` are half-created and must be dropped
/// by the caller.
#[derive(Debug, Clone)]
pub struct RawAccount {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

/// Raw organizational unit record as returned by
/// `list_organizational_units_for_parent`.
#[derive(Debug, Clone)]
pub struct RawOrgUnit {
    pub id: String,
    pub name: String,
}

/// Raw policy record as returned by `list_policies`.
#[derive(Debug, Clone)]
pub struct RawPolicy {
    pub id: String,
    pub name: String,
}

/// `describe_organization`'s relevant fields: the organization's own id and
/// the account id of its master account.
#[derive(Debug, Clone)]
pub struct OrganizationDescriptor {
    pub id: String,
    pub master_account_id: String,
}

/// The subset of the AWS Organizations API the loader needs.
#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    async fn describe_organization(&self) -> OrgResult<OrganizationDescriptor>;
    async fn list_roots(&self) -> OrgResult<String>;
    async fn list_accounts(&self, next_token: Option<String>) -> OrgResult<Page<RawAccount>>;
    async fn list_parents(&self, child_id: &str) -> OrgResult<String>;
    async fn list_policies_for_target(
        &self,
        target_id: &str,
        next_token: Option<String>,
    ) -> OrgResult<Page<String>>;
    async fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
        next_token: Option<String>,
    ) -> OrgResult<Page<RawOrgUnit>>;
    async fn list_policies(&self, next_token: Option<String>) -> OrgResult<Page<RawPolicy>>;
    async fn list_targets_for_policy(
        &self,
        policy_id: &str,
        next_token: Option<String>,
    ) -> OrgResult<Page<PolicyTarget>>;

    // Mutating calls used only by the Mock Organization Builder (§4.H).
    async fn create_organization(&self) -> OrgResult<()> {
        Ok(())
    }
    async fn create_organizational_unit(&self, _parent_id: &str, _name: &str) -> OrgResult<String> {
        Err(crate::error::OrgError::Transport(
            "create_organizational_unit not supported by this implementation".into(),
        ))
    }
    async fn create_account(&self, _name: &str, _email: &str) -> OrgResult<String> {
        Err(crate::error::OrgError::Transport(
            "create_account not supported by this implementation".into(),
        ))
    }
    async fn move_account(&self, _account_id: &str, _source_parent_id: &str, _destination_parent_id: &str) -> OrgResult<()> {
        Ok(())
    }
    async fn create_policy(&self, _name: &str) -> OrgResult<String> {
        Err(crate::error::OrgError::Transport(
            "create_policy not supported by this implementation".into(),
        ))
    }
    async fn attach_policy(&self, _policy_id: &str, _target_id: &str, _target_type: TargetType) -> OrgResult<()> {
        Ok(())
    }
}

/// The subset of the AWS STS API the credential broker needs.
#[async_trait]
pub trait StsApi: Send + Sync {
    async fn get_caller_identity_account(&self) -> OrgResult<String>;
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> OrgResult<crate::credentials::Credentials>;
}
