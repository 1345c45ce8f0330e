//! Example payloads for `orgcrawler`: set/get account alias, list S3
//! buckets, list IAM users, and read the AWS Config recorder status.
//!
//! Each payload is a small [`Payload`] implementation that builds its own
//! regional SDK client from the account's already-loaded credentials. None
//! of them are wired into the crawler's fixed command set; they're resolved
//! by name through the CLI's payload registry.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials as AwsCredentials;
use orgcrawler_core::{Account, OrgError, OrgResult, Payload, PayloadArgs};

fn sdk_config(region: &str, account: &Account) -> OrgResult<aws_config::SdkConfig> {
    let creds = account
        .credentials
        .as_ref()
        .ok_or_else(|| OrgError::Transport(format!("no credentials loaded for account {}", account.id())))?;
    let expiry = creds.expiration.map(|e| {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs(e.timestamp().max(0) as u64)
    });
    let provider = AwsCredentials::new(
        creds.access_key_id.clone(),
        creds.secret_access_key.clone(),
        Some(creds.session_token.clone()),
        expiry,
        "orgcrawler-demo-payloads",
    );
    Ok(aws_config::SdkConfig::builder()
        .region(Region::new(region.to_string()))
        .credentials_provider(aws_credential_types::provider::SharedCredentialsProvider::new(provider))
        .build())
}

/// Sets an IAM account alias in the account, returning the alias set.
pub struct SetAccountAlias;

#[async_trait]
impl Payload for SetAccountAlias {
    async fn call(&self, region: &str, account: &Account, args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        let alias = args
            .named
            .get("alias")
            .or_else(|| args.positional.first())
            .ok_or_else(|| OrgError::Payload {
                account_id: account.id().to_string(),
                region: region.to_string(),
                message: "set_account_alias requires one argument: the alias, either bare or as alias=<value>".into(),
            })?;
        let client = aws_sdk_iam::Client::new(&sdk_config(region, account)?);
        client
            .create_account_alias()
            .account_alias(alias)
            .send()
            .await
            .map_err(|e| OrgError::Payload {
                account_id: account.id().to_string(),
                region: region.to_string(),
                message: e.to_string(),
            })?;
        Ok(serde_json::json!({ "alias": alias }))
    }
}

/// Lists the account's current IAM account aliases.
pub struct GetAccountAliases;

#[async_trait]
impl Payload for GetAccountAliases {
    async fn call(&self, region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        let client = aws_sdk_iam::Client::new(&sdk_config(region, account)?);
        let resp = client
            .list_account_aliases()
            .send()
            .await
            .map_err(|e| OrgError::Payload {
                account_id: account.id().to_string(),
                region: region.to_string(),
                message: e.to_string(),
            })?;
        Ok(serde_json::json!({ "aliases": resp.account_aliases() }))
    }
}

/// Lists S3 bucket names visible to the account in `region`.
pub struct ListBuckets;

#[async_trait]
impl Payload for ListBuckets {
    async fn call(&self, region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        let client = aws_sdk_s3::Client::new(&sdk_config(region, account)?);
        let resp = client.list_buckets().send().await.map_err(|e| OrgError::Payload {
            account_id: account.id().to_string(),
            region: region.to_string(),
            message: e.to_string(),
        })?;
        let names: Vec<_> = resp
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(|s| s.to_string())
            .collect();
        Ok(serde_json::json!({ "buckets": names }))
    }
}

/// Lists IAM user names in the account.
pub struct IamListUsers;

#[async_trait]
impl Payload for IamListUsers {
    async fn call(&self, region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        let client = aws_sdk_iam::Client::new(&sdk_config(region, account)?);
        let resp = client.list_users().send().await.map_err(|e| OrgError::Payload {
            account_id: account.id().to_string(),
            region: region.to_string(),
            message: e.to_string(),
        })?;
        let names: Vec<_> = resp.users().iter().map(|u| u.user_name().to_string()).collect();
        Ok(serde_json::json!({ "users": names }))
    }
}

/// Reports whether the AWS Config configuration recorder is recording in
/// `region`.
pub struct ConfigDescribeRecorderStatus;

#[async_trait]
impl Payload for ConfigDescribeRecorderStatus {
    async fn call(&self, region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        let client = aws_sdk_config::Client::new(&sdk_config(region, account)?);
        let resp = client
            .describe_configuration_recorder_status()
            .send()
            .await
            .map_err(|e| OrgError::Payload {
                account_id: account.id().to_string(),
                region: region.to_string(),
                message: e.to_string(),
            })?;
        let statuses: Vec<_> = resp
            .configuration_recorders_status()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name(),
                    "recording": s.recording(),
                })
            })
            .collect();
        Ok(serde_json::json!({ "recorders": statuses }))
    }
}

/// Name -> constructor for every payload built into this crate. The CLI's
/// registry merges this table with any `--payload-file` plugin it loads.
pub fn builtin_payloads() -> Vec<(&'static str, Arc<dyn Payload>)> {
    vec![
        ("set_account_alias", Arc::new(SetAccountAlias) as Arc<dyn Payload>),
        ("get_account_aliases", Arc::new(GetAccountAliases) as Arc<dyn Payload>),
        ("list_buckets", Arc::new(ListBuckets) as Arc<dyn Payload>),
        ("iam_list_users", Arc::new(IamListUsers) as Arc<dyn Payload>),
        (
            "config_describe_recorder_status",
            Arc::new(ConfigDescribeRecorderStatus) as Arc<dyn Payload>,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_payloads_cover_every_documented_name() {
        let names: Vec<_> = builtin_payloads().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "set_account_alias",
                "get_account_aliases",
                "list_buckets",
                "iam_list_users",
                "config_describe_recorder_status",
            ]
        );
    }
}
