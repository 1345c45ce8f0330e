//! Real AWS-backed implementations of [`crate::client::OrganizationsApi`] and
//! [`crate::client::StsApi`].

use async_trait::async_trait;

use crate::client::{OrganizationDescriptor, OrganizationsApi, Page, RawAccount, RawOrgUnit, RawPolicy, StsApi};
use crate::credentials::Credentials;
use crate::error::{OrgError, OrgResult};
use crate::model::{PolicyTarget, TargetType};

/// Wraps an `aws_sdk_organizations::Client` built from credentials obtained
/// by assuming `access_role` in the master account.
pub struct AwsOrganizationsClient {
    client: aws_sdk_organizations::Client,
}

impl AwsOrganizationsClient {
    pub fn new(client: aws_sdk_organizations::Client) -> Self {
        Self { client }
    }

    /// Build a client from an `SdkConfig` that already carries assumed-role
    /// credentials (see [`crate::broker::CredentialBroker::assume`]).
    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_organizations::Client::new(config))
    }
}

fn target_type_from_sdk(t: &aws_sdk_organizations::types::TargetType) -> TargetType {
    match t {
        aws_sdk_organizations::types::TargetType::Root => TargetType::Root,
        aws_sdk_organizations::types::TargetType::OrganizationalUnit => {
            TargetType::OrganizationalUnit
        }
        aws_sdk_organizations::types::TargetType::Account => TargetType::Account,
        _ => TargetType::Account,
    }
}

fn target_type_to_sdk(t: TargetType) -> aws_sdk_organizations::types::TargetType {
    match t {
        TargetType::Root => aws_sdk_organizations::types::TargetType::Root,
        TargetType::OrganizationalUnit => {
            aws_sdk_organizations::types::TargetType::OrganizationalUnit
        }
        TargetType::Account => aws_sdk_organizations::types::TargetType::Account,
    }
}

fn is_throttling(err: &impl std::fmt::Display) -> bool {
    let s = err.to_string();
    s.contains("TooManyRequestsException") || s.contains("Throttling")
}

#[async_trait]
impl OrganizationsApi for AwsOrganizationsClient {
    async fn describe_organization(&self) -> OrgResult<OrganizationDescriptor> {
        let resp = self
            .client
            .describe_organization()
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("describe_organization: {e}")))?;
        let org = resp
            .organization()
            .ok_or_else(|| OrgError::Transport("describe_organization returned no organization".into()))?;
        Ok(OrganizationDescriptor {
            id: org.id().unwrap_or_default().to_string(),
            master_account_id: org.master_account_id().unwrap_or_default().to_string(),
        })
    }

    async fn list_roots(&self) -> OrgResult<String> {
        let resp = self
            .client
            .list_roots()
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("list_roots: {e}")))?;
        resp.roots()
            .first()
            .and_then(|r| r.id())
            .map(|s| s.to_string())
            .ok_or_else(|| OrgError::Transport("list_roots returned no roots".into()))
    }

    async fn list_accounts(&self, next_token: Option<String>) -> OrgResult<Page<RawAccount>> {
        let mut req = self.client.list_accounts();
        if let Some(token) = next_token {
            req = req.next_token(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("list_accounts: {e}")))?;
        let items = resp
            .accounts()
            .iter()
            .map(|a| RawAccount {
                id: a.id().unwrap_or_default().to_string(),
                name: a.name().map(|s| s.to_string()),
                email: a.email().unwrap_or_default().to_string(),
            })
            .collect();
        Ok(Page {
            items,
            next_token: resp.next_token().map(|s| s.to_string()),
        })
    }

    async fn list_parents(&self, child_id: &str) -> OrgResult<String> {
        let resp = self
            .client
            .list_parents()
            .child_id(child_id)
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("list_parents({child_id}): {e}")))?;
        resp.parents()
            .first()
            .and_then(|p| p.id())
            .map(|s| s.to_string())
            .ok_or_else(|| OrgError::Transport(format!("list_parents({child_id}) returned no parent")))
    }

    async fn list_policies_for_target(
        &self,
        target_id: &str,
        next_token: Option<String>,
    ) -> OrgResult<Page<String>> {
        let mut req = self
            .client
            .list_policies_for_target()
            .target_id(target_id)
            .filter(aws_sdk_organizations::types::PolicyType::ServiceControlPolicy);
        if let Some(token) = next_token {
            req = req.next_token(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("list_policies_for_target({target_id}): {e}")))?;
        let items = resp
            .policies()
            .iter()
            .filter_map(|p| p.id().map(|s| s.to_string()))
            .collect();
        Ok(Page {
            items,
            next_token: resp.next_token().map(|s| s.to_string()),
        })
    }

    async fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
        next_token: Option<String>,
    ) -> OrgResult<Page<RawOrgUnit>> {
        let mut req = self
            .client
            .list_organizational_units_for_parent()
            .parent_id(parent_id);
        if let Some(token) = next_token {
            req = req.next_token(token);
        }
        let resp = req.send().await.map_err(|e| {
            OrgError::Transport(format!("list_organizational_units_for_parent({parent_id}): {e}"))
        })?;
        let items = resp
            .organizational_units()
            .iter()
            .map(|ou| RawOrgUnit {
                id: ou.id().unwrap_or_default().to_string(),
                name: ou.name().unwrap_or_default().to_string(),
            })
            .collect();
        Ok(Page {
            items,
            next_token: resp.next_token().map(|s| s.to_string()),
        })
    }

    async fn list_policies(&self, next_token: Option<String>) -> OrgResult<Page<RawPolicy>> {
        let mut req = self
            .client
            .list_policies()
            .filter(aws_sdk_organizations::types::PolicyType::ServiceControlPolicy);
        if let Some(token) = next_token {
            req = req.next_token(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("list_policies: {e}")))?;
        let items = resp
            .policies()
            .iter()
            .map(|p| RawPolicy {
                id: p.id().unwrap_or_default().to_string(),
                name: p.name().unwrap_or_default().to_string(),
            })
            .collect();
        Ok(Page {
            items,
            next_token: resp.next_token().map(|s| s.to_string()),
        })
    }

    async fn list_targets_for_policy(
        &self,
        policy_id: &str,
        next_token: Option<String>,
    ) -> OrgResult<Page<PolicyTarget>> {
        let mut req = self.client.list_targets_for_policy().policy_id(policy_id);
        if let Some(token) = next_token {
            req = req.next_token(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("list_targets_for_policy({policy_id}): {e}")))?;
        let items = resp
            .targets()
            .iter()
            .map(|t| PolicyTarget {
                target_id: t.target_id().unwrap_or_default().to_string(),
                target_type: t
                    .r#type()
                    .map(target_type_from_sdk)
                    .unwrap_or(TargetType::Account),
                name: t.name().unwrap_or_default().to_string(),
                arn: t.arn().unwrap_or_default().to_string(),
            })
            .collect();
        Ok(Page {
            items,
            next_token: resp.next_token().map(|s| s.to_string()),
        })
    }

    async fn create_organizational_unit(&self, parent_id: &str, name: &str) -> OrgResult<String> {
        let resp = self
            .client
            .create_organizational_unit()
            .parent_id(parent_id)
            .name(name)
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("create_organizational_unit: {e}")))?;
        resp.organizational_unit()
            .and_then(|ou| ou.id())
            .map(|s| s.to_string())
            .ok_or_else(|| OrgError::Transport("create_organizational_unit returned no id".into()))
    }

    async fn create_account(&self, name: &str, email: &str) -> OrgResult<String> {
        let resp = self
            .client
            .create_account()
            .account_name(name)
            .email(email)
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("create_account: {e}")))?;
        resp.create_account_status()
            .and_then(|s| s.account_id())
            .map(|s| s.to_string())
            .ok_or_else(|| OrgError::Transport("create_account returned no account id".into()))
    }

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> OrgResult<()> {
        self.client
            .move_account()
            .account_id(account_id)
            .source_parent_id(source_parent_id)
            .destination_parent_id(destination_parent_id)
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("move_account: {e}")))?;
        Ok(())
    }

    async fn create_policy(&self, name: &str) -> OrgResult<String> {
        const ALLOW_ALL: &str = r#"{"Version":"2012-10-17","Statement":[{"Sid":"MockPolicyStatement","Effect":"Allow","Action":"*","Resource":"*"}]}"#;
        let resp = self
            .client
            .create_policy()
            .name(name)
            .r#type(aws_sdk_organizations::types::PolicyType::ServiceControlPolicy)
            .content(ALLOW_ALL)
            .description("Mock service control policy")
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("create_policy: {e}")))?;
        resp.policy()
            .and_then(|p| p.policy_summary())
            .and_then(|s| s.id())
            .map(|s| s.to_string())
            .ok_or_else(|| OrgError::Transport("create_policy returned no id".into()))
    }

    async fn attach_policy(
        &self,
        policy_id: &str,
        target_id: &str,
        _target_type: TargetType,
    ) -> OrgResult<()> {
        self.client
            .attach_policy()
            .policy_id(policy_id)
            .target_id(target_id)
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("attach_policy: {e}")))?;
        Ok(())
    }

    async fn create_organization(&self) -> OrgResult<()> {
        self.client
            .create_organization()
            .feature_set(aws_sdk_organizations::types::OrganizationFeatureSet::All)
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("create_organization: {e}")))?;
        Ok(())
    }
}

/// Wraps an `aws_sdk_sts::Client`.
pub struct AwsStsClient {
    client: aws_sdk_sts::Client,
}

impl AwsStsClient {
    pub fn new(client: aws_sdk_sts::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_sts::Client::new(config))
    }
}

#[async_trait]
impl StsApi for AwsStsClient {
    async fn get_caller_identity_account(&self) -> OrgResult<String> {
        let resp = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| OrgError::Transport(format!("get_caller_identity: {e}")))?;
        resp.account()
            .map(|s| s.to_string())
            .ok_or_else(|| OrgError::Transport("get_caller_identity returned no account".into()))
    }

    async fn assume_role(&self, role_arn: &str, session_name: &str) -> OrgResult<Credentials> {
        let resp = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| {
                if is_throttling(&e) {
                    OrgError::Throttled {
                        operation: "sts:AssumeRole".into(),
                        attempts: 1,
                    }
                } else if e.to_string().contains("AccessDenied") {
                    OrgError::AccessDenied {
                        account_id: String::new(),
                        role: role_arn.to_string(),
                        reason: e.to_string(),
                    }
                } else {
                    OrgError::Transport(format!("sts:AssumeRole: {e}"))
                }
            })?;
        let creds = resp
            .credentials()
            .ok_or_else(|| OrgError::Transport("AssumeRole returned no credentials".into()))?;
        Ok(Credentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration: creds
                .expiration()
                .and_then(|d| chrono::DateTime::from_timestamp(d.secs(), 0)),
        })
    }
}

/// Construct the canonical role ARN form: `arn:aws:iam::<account_id>:role/<role_name>`.
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// Construct the session name `<account_id>-<basename(role_name)>`.
pub fn session_name(account_id: &str, role_name: &str) -> String {
    let basename = role_name.rsplit('/').next().unwrap_or(role_name);
    format!("{account_id}-{basename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_arn_canonical_form() {
        assert_eq!(
            role_arn("123456789012", "OrganizationAccountAccessRole"),
            "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole"
        );
    }

    #[test]
    fn session_name_uses_role_basename() {
        assert_eq!(
            session_name("123456789012", "path/to/MyRole"),
            "123456789012-MyRole"
        );
        assert_eq!(session_name("123456789012", "MyRole"), "123456789012-MyRole");
    }
}
