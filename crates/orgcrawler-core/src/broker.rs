//! Credential Broker.
//!
//! Wraps an [`StsApi`] to turn `(account_id, role_name)` pairs into
//! short-lived [`Credentials`], and to discover the master account id of
//! whatever caller identity is currently in effect.

use std::sync::Arc;

use crate::aws::{role_arn, session_name};
use crate::client::{OrganizationsApi, StsApi};
use crate::credentials::Credentials;
use crate::error::OrgResult;

/// Mints credentials by assuming `access_role` in a target account.
#[derive(Clone)]
pub struct CredentialBroker {
    sts: Arc<dyn StsApi>,
}

impl CredentialBroker {
    pub fn new(sts: Arc<dyn StsApi>) -> Self {
        Self { sts }
    }

    /// Assume `role_name` in `account_id` and return the resulting
    /// credentials. The role ARN and session name follow the canonical
    /// `arn:aws:iam::<account_id>:role/<role_name>` / `<account_id>-<basename>`
    /// forms.
    pub async fn assume(&self, account_id: &str, role_name: &str) -> OrgResult<Credentials> {
        let arn = role_arn(account_id, role_name);
        let session = session_name(account_id, role_name);
        self.sts.assume_role(&arn, &session).await
    }

    /// Learn the master account id of whatever organization the current
    /// caller identity belongs to: ask STS who the caller is, assume
    /// `role_name` in that account, then ask the organization service
    /// (through `build_org_api`, applied to the resulting credentials) for
    /// its master account id. Fails if any of the three steps errors.
    pub async fn discover_master_account_id(
        &self,
        role_name: &str,
        build_org_api: impl FnOnce(Credentials) -> Arc<dyn OrganizationsApi>,
    ) -> OrgResult<String> {
        let caller_account_id = self.sts.get_caller_identity_account().await?;
        let creds = self.assume(&caller_account_id, role_name).await?;
        let org_api = build_org_api(creds);
        let descriptor = org_api.describe_organization().await?;
        Ok(descriptor.master_account_id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::OrgError;

    struct FakeSts {
        account_id: String,
    }

    #[async_trait]
    impl StsApi for FakeSts {
        async fn get_caller_identity_account(&self) -> OrgResult<String> {
            Ok(self.account_id.clone())
        }

        async fn assume_role(&self, role_arn: &str, session_name: &str) -> OrgResult<Credentials> {
            if role_arn.contains("locked") {
                return Err(OrgError::AccessDenied {
                    account_id: "999999999999".into(),
                    role: role_arn.to_string(),
                    reason: "explicit deny".into(),
                });
            }
            Ok(Credentials {
                access_key_id: format!("AKIA-{session_name}"),
                secret_access_key: "secret".into(),
                session_token: "token".into(),
                expiration: None,
            })
        }
    }

    #[tokio::test]
    async fn assume_builds_canonical_arn_and_session_name() {
        let broker = CredentialBroker::new(Arc::new(FakeSts {
            account_id: "111111111111".into(),
        }));
        let creds = broker.assume("222222222222", "OrgRole").await.unwrap();
        assert_eq!(creds.access_key_id, "AKIA-222222222222-OrgRole");
    }

    #[tokio::test]
    async fn assume_propagates_access_denied() {
        let broker = CredentialBroker::new(Arc::new(FakeSts {
            account_id: "111111111111".into(),
        }));
        let err = broker.assume("333333333333", "locked-role").await.unwrap_err();
        assert!(matches!(err, OrgError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn discover_master_account_id_assumes_role_then_asks_the_org_service() {
        let broker = CredentialBroker::new(Arc::new(FakeSts {
            account_id: "444444444444".into(),
        }));
        let api = Arc::new(crate::mock::InMemoryOrganizationsApi::with_master_account_id("444444444444"));
        api.create_organization().await.unwrap();

        let master_account_id = broker
            .discover_master_account_id("OrgRole", |_creds| api.clone() as Arc<dyn OrganizationsApi>)
            .await
            .unwrap();
        assert_eq!(master_account_id, "444444444444");
    }

    #[tokio::test]
    async fn discover_master_account_id_propagates_assume_role_denial() {
        let broker = CredentialBroker::new(Arc::new(FakeSts {
            account_id: "999999999999".into(),
        }));
        let err = broker
            .discover_master_account_id("locked-role", |_creds| {
                Arc::new(crate::mock::InMemoryOrganizationsApi::new()) as Arc<dyn OrganizationsApi>
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrgError::AccessDenied { .. }));
    }
}
