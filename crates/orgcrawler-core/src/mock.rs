//! In-memory provider implementations and a declarative tree builder.
//!
//! Backs every test in this crate: [`InMemoryOrganizationsApi`] and
//! [`InMemoryStsApi`] implement the same [`OrganizationsApi`]/[`StsApi`]
//! traits the real AWS clients do, so the loader, query surface and crawler
//! are exercised with no network access and fully deterministic data.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{OrganizationDescriptor, OrganizationsApi, Page, RawAccount, RawOrgUnit, RawPolicy, StsApi};
use crate::credentials::Credentials;
use crate::error::{OrgError, OrgResult};
use crate::model::{PolicyTarget, TargetType};

struct MockAccount {
    name: Option<String>,
    email: String,
    parent_id: String,
}

struct MockOrgUnit {
    name: String,
    parent_id: String,
}

struct MockPolicy {
    name: String,
    targets: Vec<PolicyTarget>,
}

struct State {
    org_id: String,
    root_id: String,
    master_account_id: String,
    accounts: HashMap<String, MockAccount>,
    org_units: HashMap<String, MockOrgUnit>,
    policies: HashMap<String, MockPolicy>,
    next_id: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            org_id: String::new(),
            root_id: String::new(),
            master_account_id: "111111111111".to_string(),
            accounts: HashMap::new(),
            org_units: HashMap::new(),
            policies: HashMap::new(),
            next_id: 0,
        }
    }
}

/// An in-memory stand-in for `aws_sdk_organizations::Client`.
pub struct InMemoryOrganizationsApi {
    state: Mutex<State>,
}

impl InMemoryOrganizationsApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Build one whose `describe_organization` reports `master_account_id`,
    /// matching a caller identity other than the default `111111111111`.
    pub fn with_master_account_id(master_account_id: impl Into<String>) -> Self {
        let mut state = State::default();
        state.master_account_id = master_account_id.into();
        Self { state: Mutex::new(state) }
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{:08x}", state.next_id)
    }

    /// Test-only helper: create an account whose name has not yet been set,
    /// matching the half-created accounts `list_accounts` returns in AWS
    /// moments after `CreateAccount` is called. [`load_discovers...`] tests
    /// that these are filtered out.
    pub fn add_unnamed_account(&self, account_id: &str, email: &str) {
        let mut state = self.state.lock();
        let root_id = state.root_id.clone();
        state.accounts.insert(
            account_id.to_string(),
            MockAccount {
                name: None,
                email: email.to_string(),
                parent_id: root_id,
            },
        );
    }
}

impl Default for InMemoryOrganizationsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrganizationsApi for InMemoryOrganizationsApi {
    async fn describe_organization(&self) -> OrgResult<OrganizationDescriptor> {
        let state = self.state.lock();
        if state.org_id.is_empty() {
            return Err(OrgError::Transport("organization not created".into()));
        }
        Ok(OrganizationDescriptor {
            id: state.org_id.clone(),
            master_account_id: state.master_account_id.clone(),
        })
    }

    async fn list_roots(&self) -> OrgResult<String> {
        let state = self.state.lock();
        if state.root_id.is_empty() {
            return Err(OrgError::Transport("organization not created".into()));
        }
        Ok(state.root_id.clone())
    }

    async fn list_accounts(&self, _next_token: Option<String>) -> OrgResult<Page<RawAccount>> {
        let state = self.state.lock();
        let items = state
            .accounts
            .iter()
            .map(|(id, a)| RawAccount {
                id: id.clone(),
                name: a.name.clone(),
                email: a.email.clone(),
            })
            .collect();
        Ok(Page { items, next_token: None })
    }

    async fn list_parents(&self, child_id: &str) -> OrgResult<String> {
        let state = self.state.lock();
        if let Some(account) = state.accounts.get(child_id) {
            return Ok(account.parent_id.clone());
        }
        if let Some(ou) = state.org_units.get(child_id) {
            return Ok(ou.parent_id.clone());
        }
        Err(OrgError::Transport(format!("no such child {child_id}")))
    }

    async fn list_policies_for_target(
        &self,
        target_id: &str,
        _next_token: Option<String>,
    ) -> OrgResult<Page<String>> {
        let state = self.state.lock();
        let items = state
            .policies
            .iter()
            .filter(|(_, p)| p.targets.iter().any(|t| t.target_id == target_id))
            .map(|(id, _)| id.clone())
            .collect();
        Ok(Page { items, next_token: None })
    }

    async fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
        _next_token: Option<String>,
    ) -> OrgResult<Page<RawOrgUnit>> {
        let state = self.state.lock();
        let items = state
            .org_units
            .iter()
            .filter(|(_, ou)| ou.parent_id == parent_id)
            .map(|(id, ou)| RawOrgUnit {
                id: id.clone(),
                name: ou.name.clone(),
            })
            .collect();
        Ok(Page { items, next_token: None })
    }

    async fn list_policies(&self, _next_token: Option<String>) -> OrgResult<Page<RawPolicy>> {
        let state = self.state.lock();
        let items = state
            .policies
            .iter()
            .map(|(id, p)| RawPolicy {
                id: id.clone(),
                name: p.name.clone(),
            })
            .collect();
        Ok(Page { items, next_token: None })
    }

    async fn list_targets_for_policy(
        &self,
        policy_id: &str,
        _next_token: Option<String>,
    ) -> OrgResult<Page<PolicyTarget>> {
        let state = self.state.lock();
        let items = state
            .policies
            .get(policy_id)
            .map(|p| p.targets.clone())
            .unwrap_or_default();
        Ok(Page { items, next_token: None })
    }

    async fn create_organization(&self) -> OrgResult<()> {
        let mut state = self.state.lock();
        if state.org_id.is_empty() {
            state.org_id = "o-mockorg01".to_string();
            let root_id = Self::next_id(&mut state, "r");
            state.root_id = root_id;
        }
        Ok(())
    }

    async fn create_organizational_unit(&self, parent_id: &str, name: &str) -> OrgResult<String> {
        let mut state = self.state.lock();
        let id = Self::next_id(&mut state, "ou");
        state.org_units.insert(
            id.clone(),
            MockOrgUnit {
                name: name.to_string(),
                parent_id: parent_id.to_string(),
            },
        );
        Ok(id)
    }

    async fn create_account(&self, name: &str, email: &str) -> OrgResult<String> {
        let mut state = self.state.lock();
        let id = format!("{:012}", 100_000_000_000u64 + state.next_id + 1);
        state.next_id += 1;
        let root_id = state.root_id.clone();
        state.accounts.insert(
            id.clone(),
            MockAccount {
                name: Some(name.to_string()),
                email: email.to_string(),
                parent_id: root_id,
            },
        );
        Ok(id)
    }

    async fn move_account(
        &self,
        account_id: &str,
        _source_parent_id: &str,
        destination_parent_id: &str,
    ) -> OrgResult<()> {
        let mut state = self.state.lock();
        if let Some(account) = state.accounts.get_mut(account_id) {
            account.parent_id = destination_parent_id.to_string();
        }
        Ok(())
    }

    async fn create_policy(&self, name: &str) -> OrgResult<String> {
        let mut state = self.state.lock();
        let id = Self::next_id(&mut state, "p");
        state.policies.insert(
            id.clone(),
            MockPolicy {
                name: name.to_string(),
                targets: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn attach_policy(&self, policy_id: &str, target_id: &str, target_type: TargetType) -> OrgResult<()> {
        let mut state = self.state.lock();
        let target_name = if target_id == state.root_id {
            "root".to_string()
        } else {
            state
                .org_units
                .get(target_id)
                .map(|ou| ou.name.clone())
                .or_else(|| state.accounts.get(target_id).and_then(|a| a.name.clone()))
                .unwrap_or_default()
        };
        if let Some(policy) = state.policies.get_mut(policy_id) {
            policy.targets.push(PolicyTarget {
                target_id: target_id.to_string(),
                target_type,
                name: target_name,
                arn: format!("arn:aws:organizations::mock:target/{target_id}"),
            });
        }
        Ok(())
    }
}

/// An in-memory stand-in for `aws_sdk_sts::Client`: every `AssumeRole`
/// succeeds with a deterministic, distinguishable credential bundle.
pub struct InMemoryStsApi {
    caller_account_id: String,
}

impl InMemoryStsApi {
    pub fn new() -> Self {
        Self {
            caller_account_id: "111111111111".to_string(),
        }
    }

    pub fn with_caller_account_id(caller_account_id: impl Into<String>) -> Self {
        Self {
            caller_account_id: caller_account_id.into(),
        }
    }
}

impl Default for InMemoryStsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StsApi for InMemoryStsApi {
    async fn get_caller_identity_account(&self) -> OrgResult<String> {
        Ok(self.caller_account_id.clone())
    }

    async fn assume_role(&self, role_arn: &str, session_name: &str) -> OrgResult<Credentials> {
        Ok(Credentials {
            access_key_id: format!("MOCKKEY-{session_name}"),
            secret_access_key: "mock-secret".to_string(),
            session_token: format!("mock-token-for-{role_arn}"),
            expiration: None,
        })
    }
}

/// Builds declarative organization trees directly through an
/// [`OrganizationsApi`] handle, so the same code path the loader later reads
/// back is what constructs the fixture.
pub struct MockOrganizationBuilder {
    api: Arc<dyn OrganizationsApi>,
}

impl MockOrganizationBuilder {
    pub fn new(api: Arc<dyn OrganizationsApi>) -> Self {
        Self { api }
    }

    /// A master account, one nested org unit ("Production" under root), and
    /// three member accounts: one directly under root, two under Production.
    pub async fn simple_tree(self) -> OrgResult<Arc<dyn OrganizationsApi>> {
        self.api.create_organization().await?;
        let root_id = self.api.list_roots().await?;

        self.api.create_account("master", "master@example.com").await?;
        self.api.create_account("sandbox", "sandbox@example.com").await?;

        let prod_ou = self.api.create_organizational_unit(&root_id, "Production").await?;
        let web_id = self.api.create_account("web01", "web01@example.com").await?;
        let db_id = self.api.create_account("db01", "db01@example.com").await?;
        self.api.move_account(&web_id, &root_id, &prod_ou).await?;
        self.api.move_account(&db_id, &root_id, &prod_ou).await?;

        Ok(self.api)
    }

    /// A deeper tree: root -> Production -> {Web, Database}, root -> Staging,
    /// with accounts scattered across every level. Used for multi-depth
    /// recursive-query coverage.
    pub async fn complex_tree(self) -> OrgResult<Arc<dyn OrganizationsApi>> {
        self.api.create_organization().await?;
        let root_id = self.api.list_roots().await?;

        self.api.create_account("master", "master@example.com").await?;

        let prod_ou = self.api.create_organizational_unit(&root_id, "Production").await?;
        let staging_ou = self.api.create_organizational_unit(&root_id, "Staging").await?;
        let web_ou = self.api.create_organizational_unit(&prod_ou, "Web").await?;
        let db_ou = self.api.create_organizational_unit(&prod_ou, "Database").await?;

        for (name, parent) in [
            ("web01", &web_ou),
            ("web02", &web_ou),
            ("db01", &db_ou),
            ("stage01", &staging_ou),
        ] {
            let id = self
                .api
                .create_account(name, &format!("{name}@example.com"))
                .await?;
            self.api.move_account(&id, &root_id, parent).await?;
        }

        Ok(self.api)
    }

    /// A root-attached "DenyAll" policy, used to exercise
    /// `get_accounts_for_policy_recursive` across nested org units.
    pub async fn policy_on_root(self) -> OrgResult<Arc<dyn OrganizationsApi>> {
        let api = self.complex_tree().await?;
        let root_id = api.list_roots().await?;
        let policy_id = api.create_policy("DenyAll").await?;
        api.attach_policy(&policy_id, &root_id, TargetType::Root).await?;
        Ok(api)
    }
}
