//! Live discovery of an [`Organization`] from the provider API.
//!
//! Walks the AWS Organizations graph: describe the organization, list its
//! (first) root, paginate accounts, recurse into organizational units
//! depth-first, then paginate policies and their targets. Parent lookups and
//! policy-target lookups for accounts/OUs fan out concurrently; throttled
//! list calls are retried with a fixed delay up to [`RetryConfig::max_retries`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::client::{OrganizationsApi, Page, RawOrgUnit};
use crate::config::RetryConfig;
use crate::error::{OrgError, OrgResult};
use crate::model::{Account, Organization, OrgObjectFields, OrganizationalUnit, Policy};

/// Drives the discovery algorithm against an [`OrganizationsApi`] implementation.
pub struct OrganizationLoader {
    api: Arc<dyn OrganizationsApi>,
    retry: RetryConfig,
}

impl OrganizationLoader {
    pub fn new(api: Arc<dyn OrganizationsApi>) -> Self {
        Self {
            api,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Load from cache if a fresh one exists; otherwise discover live and
    /// write the result back to cache before returning it. This is the
    /// composite behavior both CLIs use (`org.load()` in the source),
    /// distinct from [`OrganizationLoader::load`], which always discovers
    /// live.
    pub async fn load_cached_or_live(
        &self,
        master_account_id: &str,
        access_role: &str,
        cache_config: crate::config::CacheConfig,
    ) -> OrgResult<Organization> {
        match crate::cache::load(&cache_config) {
            Ok(org) => Ok(org),
            Err(_) => {
                let org = self
                    .load(master_account_id, access_role)
                    .await?
                    .with_cache_config(cache_config);
                crate::cache::save(&org)?;
                Ok(org)
            }
        }
    }

    /// Discover the full organization graph and return a populated
    /// [`Organization`]. The returned value's `cache_config` is the default
    /// for `master_account_id`; callers that want a different one should
    /// call [`Organization::with_cache_config`] on the result.
    pub async fn load(&self, master_account_id: &str, access_role: &str) -> OrgResult<Organization> {
        let mut org = Organization::new(master_account_id, access_role);

        let descriptor = self.retrying(|| self.api.describe_organization()).await?;
        org.id = descriptor.id;
        org.root_id = self.retrying(|| self.api.list_roots()).await?;

        let raw_accounts = self.paginate(|token| self.api.list_accounts(token)).await?;
        let named_accounts: Vec<_> = raw_accounts
            .into_iter()
            .filter(|a| a.name.is_some())
            .collect();

        let account_futures = named_accounts.into_iter().map(|raw| async move {
            let (parent_id, policy_ids) = self.parent_and_policies(&raw.id).await?;
            Ok::<Account, OrgError>(Account {
                fields: OrgObjectFields {
                    organization_id: org.id.clone(),
                    master_account_id: master_account_id.to_string(),
                    name: raw.name.clone().unwrap_or_default(),
                    id: raw.id.clone(),
                    parent_id,
                    attached_policy_ids: policy_ids,
                },
                email: raw.email.clone(),
                aliases: Vec::new(),
                credentials: None,
            })
        });
        for result in join_all(account_futures).await {
            org.accounts.push(result?);
        }

        org.org_units = self
            .discover_org_units_recursive(&org.root_id, &org.id, master_account_id)
            .await?;

        let raw_policies = self.paginate(|token| self.api.list_policies(token)).await?;
        let policy_futures = raw_policies.into_iter().map(|raw| async move {
            let targets = self
                .paginate(|token| self.api.list_targets_for_policy(&raw.id, token))
                .await?;
            Ok::<Policy, OrgError>(Policy {
                fields: OrgObjectFields {
                    organization_id: org.id.clone(),
                    master_account_id: master_account_id.to_string(),
                    name: raw.name.clone(),
                    id: raw.id.clone(),
                    parent_id: String::new(),
                    attached_policy_ids: HashSet::new(),
                },
                targets,
            })
        });
        for result in join_all(policy_futures).await {
            org.policies.push(result?);
        }

        Ok(org)
    }

    async fn parent_and_policies(&self, object_id: &str) -> OrgResult<(String, HashSet<String>)> {
        let parent_id = self.retrying(|| self.api.list_parents(object_id)).await?;
        let policy_ids = self
            .paginate(|token| self.api.list_policies_for_target(object_id, token))
            .await?
            .into_iter()
            .collect();
        Ok((parent_id, policy_ids))
    }

    fn discover_org_units_recursive<'a>(
        &'a self,
        parent_id: &'a str,
        organization_id: &'a str,
        master_account_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = OrgResult<Vec<OrganizationalUnit>>> + 'a>> {
        Box::pin(async move {
            let raw_units = self
                .paginate(|token| self.api.list_organizational_units_for_parent(parent_id, token))
                .await?;

            let mut result = Vec::new();
            for raw in raw_units {
                let ou = self.build_org_unit(&raw, parent_id, organization_id, master_account_id).await?;
                let children = self
                    .discover_org_units_recursive(&raw.id, organization_id, master_account_id)
                    .await?;
                result.push(ou);
                result.extend(children);
            }
            Ok(result)
        })
    }

    async fn build_org_unit(
        &self,
        raw: &RawOrgUnit,
        parent_id: &str,
        organization_id: &str,
        master_account_id: &str,
    ) -> OrgResult<OrganizationalUnit> {
        let policy_ids = self
            .paginate(|token| self.api.list_policies_for_target(&raw.id, token))
            .await?
            .into_iter()
            .collect();
        Ok(OrganizationalUnit {
            fields: OrgObjectFields {
                organization_id: organization_id.to_string(),
                master_account_id: master_account_id.to_string(),
                name: raw.name.clone(),
                id: raw.id.clone(),
                parent_id: parent_id.to_string(),
                attached_policy_ids: policy_ids,
            },
        })
    }

    /// Run a single list call through to exhaustion, following `next_token`.
    async fn paginate<T, F, Fut>(&self, mut call: F) -> OrgResult<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: std::future::Future<Output = OrgResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut next_token = None;
        loop {
            let page = self.retrying(|| call(next_token.clone())).await?;
            items.extend(page.items);
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }
        Ok(items)
    }

    /// Retry a throttled call up to `retry.max_retries` times with a fixed
    /// delay between attempts.
    async fn retrying<T, F, Fut>(&self, mut call: F) -> OrgResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = OrgResult<T>>,
    {
        let mut attempts = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempts < self.retry.max_retries => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(self.retry.retry_delay_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
