//! Crawler: executes a named payload across an account x region matrix.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::broker::CredentialBroker;
use crate::error::{OrgError, OrgResult};
use crate::execution::{Execution, Response, Timer};
use crate::model::{Account, Organization};
use crate::pool::run_bounded;
use crate::query::OrgQuery;

/// Default number of (region, account) jobs run concurrently by `execute`.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Payload arguments, split the way the CLI parses its trailing positional
/// tokens: an argument of the form `key=value` becomes a named argument,
/// everything else stays positional in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadArgs {
    pub positional: Vec<String>,
    pub named: std::collections::BTreeMap<String, String>,
}

impl PayloadArgs {
    /// Split a flat CLI argument list into positional and named arguments.
    /// A token splits on its first `=`; an empty key (e.g. `=value`) is not
    /// treated as a name and the whole token is kept positional.
    pub fn parse(raw: &[String]) -> Self {
        let mut positional = Vec::new();
        let mut named = std::collections::BTreeMap::new();
        for arg in raw {
            match arg.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    named.insert(key.to_string(), value.to_string());
                }
                _ => positional.push(arg.clone()),
            }
        }
        Self { positional, named }
    }
}

/// The crawler's payload execution contract: `payload(region, account, args)`.
/// Implementations read from the account (via its loaded credentials) and
/// must not mutate it; the crawler hands out only shared references.
#[async_trait]
pub trait Payload: Send + Sync {
    async fn call(&self, region: &str, account: &Account, args: &PayloadArgs) -> OrgResult<serde_json::Value>;
}

/// Wrap a plain async closure as a [`Payload`].
pub struct FnPayload<F>(pub F);

#[async_trait]
impl<F, Fut> Payload for FnPayload<F>
where
    F: Fn(String, Account, PayloadArgs) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = OrgResult<serde_json::Value>> + Send,
{
    async fn call(&self, region: &str, account: &Account, args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        (self.0)(region.to_string(), account.clone(), args.clone()).await
    }
}

/// Executes payloads against a resolved account x region matrix.
///
/// Holds its own clones of the resolved accounts so that credentials loaded
/// by [`Crawler::load_account_credentials`] don't alias the source
/// [`Organization`], which the query surface elsewhere treats as read-only.
pub struct Crawler {
    access_role: String,
    accounts: Vec<Account>,
    regions: Vec<String>,
    concurrency: usize,
    history: Vec<Execution>,
}

impl Crawler {
    /// Resolve `account_identifiers` and `regions` against `org` and its
    /// region catalog. An empty `account_identifiers` selects every account
    /// in the organization; `regions` is validated eagerly through
    /// [`crate::regions::validate_regions`] before any API call is made: an
    /// empty list selects every region in the general compute service, the
    /// literal `GLOBAL` resolves to the single canonical default region, and
    /// anything unrecognized fails construction with
    /// [`OrgError::InvalidRegion`].
    pub fn new(
        org: &Organization,
        account_identifiers: &[String],
        regions: Vec<String>,
    ) -> OrgResult<Self> {
        let query = OrgQuery::new(org);
        let accounts = if account_identifiers.is_empty() {
            org.accounts.clone()
        } else {
            account_identifiers
                .iter()
                .map(|id| {
                    query
                        .get_account(id.as_str())
                        .cloned()
                        .ok_or_else(|| OrgError::InvalidAccount(id.clone()))
                })
                .collect::<OrgResult<Vec<_>>>()?
        };
        let regions = crate::regions::validate_regions(regions)?;

        Ok(Self {
            access_role: org.access_role.clone(),
            accounts,
            regions,
            concurrency: DEFAULT_CONCURRENCY,
            history: Vec::new(),
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Override the role assumed in child accounts. Defaults to the
    /// organization's own `access_role` (the master account role), matching
    /// `--account-role` falling back to `--master-role` in the CLI.
    pub fn with_access_role(mut self, access_role: impl Into<String>) -> Self {
        self.access_role = access_role.into();
        self
    }

    pub fn update_accounts(&mut self, accounts: Vec<Account>) {
        self.accounts = accounts;
    }

    /// Replace the selected regions, validated and expanded the same way
    /// [`Crawler::new`] validates its constructor argument.
    pub fn update_regions(&mut self, regions: Vec<String>) -> OrgResult<()> {
        self.regions = crate::regions::validate_regions(regions)?;
        Ok(())
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn history(&self) -> &[Execution] {
        &self.history
    }

    /// Assume `access_role` in every selected account, in parallel. Accounts
    /// that fail keep `credentials == None` and are skipped (with an error
    /// `Response`) by a later `execute`; the first failure's `OrgError` is
    /// returned alongside the full failure list so a caller that wants to
    /// abort immediately on any denial can do so.
    pub async fn load_account_credentials(
        &mut self,
        broker: &CredentialBroker,
    ) -> Vec<(String, OrgError)> {
        let accounts = std::mem::take(&mut self.accounts);
        let access_role = self.access_role.clone();
        let broker = broker.clone();

        let results = run_bounded(accounts, self.concurrency, move |mut account| {
            let access_role = access_role.clone();
            let broker = broker.clone();
            async move {
                match broker.assume(account.id(), &access_role).await {
                    Ok(creds) => {
                        account.credentials = Some(creds);
                        (account, None)
                    }
                    Err(err) => (account, Some(err)),
                }
            }
        })
        .await;

        let mut failures = Vec::new();
        let mut accounts = Vec::with_capacity(results.len());
        for (account, error) in results {
            if let Some(err) = error {
                failures.push((account.id().to_string(), err));
            }
            accounts.push(account);
        }
        self.accounts = accounts;
        failures
    }

    /// Run `payload` once for every (region, account) pair among accounts
    /// with loaded credentials, bounded to `concurrency` concurrent jobs.
    /// `args` is split into positional and named arguments (see
    /// [`PayloadArgs::parse`]) once, up front, and shared read-only across
    /// every job. Re-executing appends a new [`Execution`] to `history`
    /// rather than replacing the previous one.
    pub async fn execute(
        &mut self,
        payload_name: &str,
        payload: Arc<dyn Payload>,
        args: Vec<String>,
    ) -> Execution {
        let mut execution = Execution::new(payload_name);
        execution.timer.start(Utc::now());

        let mut jobs = Vec::new();
        for account in &self.accounts {
            for region in &self.regions {
                jobs.push((region.clone(), account.clone()));
            }
        }

        let args = Arc::new(PayloadArgs::parse(&args));
        let responses = run_bounded(jobs, self.concurrency, move |(region, account)| {
            let payload = Arc::clone(&payload);
            let args = Arc::clone(&args);
            async move {
                let mut timer = Timer::new();
                timer.start(Utc::now());

                let (payload_output, error) = if account.credentials.is_none() {
                    (None, Some("no credentials loaded for this account".to_string()))
                } else {
                    match payload.call(&region, &account, &args).await {
                        Ok(output) => (Some(output), None),
                        Err(err) => (None, Some(err.to_string())),
                    }
                };

                timer.stop(Utc::now());
                Response {
                    region,
                    account_id: account.id().to_string(),
                    account_name: account.name().to_string(),
                    payload_output,
                    error,
                    timer,
                }
            }
        })
        .await;

        execution.responses = responses;
        execution.timer.stop(Utc::now());
        self.history.push(execution.clone());
        execution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{InMemoryOrganizationsApi, InMemoryStsApi, MockOrganizationBuilder};
    use crate::loader::OrganizationLoader;

    struct EchoPayload;

    #[async_trait]
    impl Payload for EchoPayload {
        async fn call(&self, region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
            Ok(serde_json::json!({ "region": region, "account": account.id() }))
        }
    }

    struct DenyingStsApi {
        denied_account: String,
    }

    #[async_trait]
    impl crate::client::StsApi for DenyingStsApi {
        async fn get_caller_identity_account(&self) -> OrgResult<String> {
            Ok("111111111111".to_string())
        }
        async fn assume_role(&self, role_arn: &str, session_name: &str) -> OrgResult<crate::credentials::Credentials> {
            if role_arn.contains(&self.denied_account) {
                return Err(OrgError::AccessDenied {
                    account_id: self.denied_account.clone(),
                    role: role_arn.to_string(),
                    reason: "explicit deny".into(),
                });
            }
            Ok(crate::credentials::Credentials {
                access_key_id: format!("AKIA-{session_name}"),
                secret_access_key: "secret".into(),
                session_token: "token".into(),
                expiration: None,
            })
        }
    }

    async fn loaded_org() -> Organization {
        let api = Arc::new(InMemoryOrganizationsApi::new());
        MockOrganizationBuilder::new(api.clone()).simple_tree().await.unwrap();
        OrganizationLoader::new(api).load("111111111111", "OrgRole").await.unwrap()
    }

    #[tokio::test]
    async fn execute_produces_one_response_per_account_region_pair() {
        let org = loaded_org().await;
        let account_count = org.accounts.len();
        let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".into(), "us-west-2".into()]).unwrap();

        let sts = Arc::new(InMemoryStsApi::new());
        let broker = CredentialBroker::new(sts);
        let failures = crawler.load_account_credentials(&broker).await;
        assert!(failures.is_empty());

        let execution = crawler.execute("echo", Arc::new(EchoPayload), vec![]).await;
        assert_eq!(execution.responses.len(), account_count * 2);
        assert!(!execution.has_errors());
    }

    #[tokio::test]
    async fn denied_account_is_isolated_from_siblings() {
        let org = loaded_org().await;
        let denied_id = org.accounts[0].id().to_string();
        let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".into()]).unwrap();

        let sts = Arc::new(DenyingStsApi { denied_account: denied_id.clone() });
        let broker = CredentialBroker::new(sts);
        let failures = crawler.load_account_credentials(&broker).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, denied_id);

        let execution = crawler.execute("echo", Arc::new(EchoPayload), vec![]).await;
        assert!(execution.has_errors());
        let denied_response = execution.responses.iter().find(|r| r.account_id == denied_id).unwrap();
        assert!(denied_response.is_error());
        let healthy_responses: Vec<_> = execution.responses.iter().filter(|r| r.account_id != denied_id).collect();
        assert!(healthy_responses.iter().all(|r| !r.is_error()));
    }

    #[tokio::test]
    async fn repeated_execute_appends_to_history() {
        let org = loaded_org().await;
        let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".into()]).unwrap();
        let sts = Arc::new(InMemoryStsApi::new());
        let broker = CredentialBroker::new(sts);
        crawler.load_account_credentials(&broker).await;

        crawler.execute("echo", Arc::new(EchoPayload), vec![]).await;
        crawler.execute("echo", Arc::new(EchoPayload), vec![]).await;
        assert_eq!(crawler.history().len(), 2);
    }

    #[test]
    fn new_rejects_unknown_account_identifier() {
        let org = Organization::new("111111111111", "OrgRole");
        let err = Crawler::new(&org, &["does-not-exist".to_string()], vec!["us-east-1".into()]).unwrap_err();
        assert!(matches!(err, OrgError::InvalidAccount(_)));
    }

    #[test]
    fn new_rejects_unknown_region() {
        let org = Organization::new("111111111111", "OrgRole");
        let err = Crawler::new(&org, &[], vec!["not-a-region".to_string()]).unwrap_err();
        assert!(matches!(err, OrgError::InvalidRegion(_)));
    }

    #[test]
    fn new_expands_global_literal_to_default_region() {
        let org = Organization::new("111111111111", "OrgRole");
        let crawler = Crawler::new(&org, &[], vec!["GLOBAL".to_string()]).unwrap();
        assert_eq!(crawler.regions(), ["us-east-1"]);
    }

    #[test]
    fn new_expands_empty_regions_to_the_full_catalog() {
        let org = Organization::new("111111111111", "OrgRole");
        let crawler = Crawler::new(&org, &[], vec![]).unwrap();
        assert_eq!(crawler.regions(), crate::regions::all_regions().as_slice());
    }

    #[test]
    fn payload_args_splits_key_value_tokens_as_named() {
        let args = PayloadArgs::parse(&["alias=prod".to_string(), "bare".to_string()]);
        assert_eq!(args.positional, vec!["bare".to_string()]);
        assert_eq!(args.named.get("alias"), Some(&"prod".to_string()));
    }

    #[test]
    fn payload_args_keeps_empty_key_token_positional() {
        let args = PayloadArgs::parse(&["=prod".to_string()]);
        assert_eq!(args.positional, vec!["=prod".to_string()]);
        assert!(args.named.is_empty());
    }

    #[test]
    fn payload_args_splits_only_on_first_equals() {
        let args = PayloadArgs::parse(&["filter=region=us-east-1".to_string()]);
        assert_eq!(args.named.get("filter"), Some(&"region=us-east-1".to_string()));
    }

    #[test]
    fn update_regions_rejects_unknown_region() {
        let org = Organization::new("111111111111", "OrgRole");
        let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".to_string()]).unwrap();
        let err = crawler.update_regions(vec!["not-a-region".to_string()]).unwrap_err();
        assert!(matches!(err, OrgError::InvalidRegion(_)));
        assert_eq!(crawler.regions(), ["us-east-1"]);
    }
}
