//! `orgcrawler`: run a named payload across an AWS Organization's accounts
//! and regions.

mod plugin;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use orgcrawler_core::aws::{AwsOrganizationsClient, AwsStsClient};
use orgcrawler_core::broker::CredentialBroker;
use orgcrawler_core::client::OrganizationsApi;
use orgcrawler_core::config::CacheConfig;
use orgcrawler_core::credentials::Credentials;
use orgcrawler_core::loader::OrganizationLoader;
use orgcrawler_core::regions::{all_regions, regions_for_service};
use orgcrawler_core::{format_responses, purge_empty_responses, Crawler, Organization, Payload};

/// Run PAYLOAD in every selected account and region.
///
/// PAYLOAD is the name of a built-in payload function (see `--help` for the
/// list), or, with `--payload-file`, the symbol a plugin cdylib exports.
/// PAYLOAD_ARG may be given any number of times; a `key=value` token is
/// forwarded to the payload as a named argument, anything else as a
/// positional one (see [`orgcrawler_core::PayloadArgs`]).
#[derive(Parser)]
#[command(name = "orgcrawler", version, about, long_about = None)]
struct Cli {
    /// Name of the payload function to run in each account
    payload: String,

    /// Payload function argument(s). A `key=value` token is forwarded as a
    /// named argument; anything else is forwarded positionally.
    payload_arg: Vec<String>,

    /// IAM role to assume for accessing the AWS Organization master account
    #[arg(long, short = 'r', required = true)]
    master_role: String,

    /// IAM role to assume for accessing AWS Organization child accounts.
    /// Defaults to `--master-role`.
    #[arg(long, short = 'a')]
    account_role: Option<String>,

    /// Comma separated list of accounts to crawl (id, name, or alias).
    /// Default is every account in the organization.
    #[arg(long, value_delimiter = ',')]
    accounts: Vec<String>,

    /// Comma separated list of AWS regions to crawl. Default is every
    /// region known to the catalog.
    #[arg(long, value_delimiter = ',')]
    regions: Vec<String>,

    /// The AWS service used to select the region list.
    #[arg(long)]
    service: Option<String>,

    /// Path to a payload plugin (a cdylib exporting `orgcrawler_payload`).
    #[arg(long, short = 'f')]
    payload_file: Option<PathBuf>,
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .compact()
        .init();
}

/// Build an `SdkConfig` that authenticates with `creds` instead of the
/// ambient credential chain.
fn sdk_config_for(creds: &Credentials) -> aws_config::SdkConfig {
    aws_config::SdkConfig::builder()
        .credentials_provider(aws_credential_types::provider::SharedCredentialsProvider::new(
            aws_credential_types::Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                Some(creds.session_token.clone()),
                None,
                "orgcrawler",
            ),
        ))
        .build()
}

async fn load_organization(role: &str) -> Result<Organization> {
    let sts = Arc::new(AwsStsClient::from_config(
        &aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await,
    ));
    let broker = CredentialBroker::new(sts);
    let master_account_id = broker
        .discover_master_account_id(role, |creds| {
            Arc::new(AwsOrganizationsClient::from_config(&sdk_config_for(&creds))) as Arc<dyn OrganizationsApi>
        })
        .await
        .context("discovering master account id from caller identity")?;

    let creds = broker
        .assume(&master_account_id, role)
        .await
        .context("assuming the organization master role")?;
    let config = sdk_config_for(&creds);

    let api = Arc::new(AwsOrganizationsClient::from_config(&config));
    let loader = OrganizationLoader::new(api);
    let cache_config = CacheConfig::default_for_master_account(&master_account_id);
    loader
        .load_cached_or_live(&master_account_id, role, cache_config)
        .await
        .context("loading organization")
}

fn resolve_payload(cli: &Cli) -> Result<Arc<dyn Payload>> {
    if let Some(path) = &cli.payload_file {
        // SAFETY: the user explicitly named this plugin file on the command line.
        let plugin = unsafe { plugin::PluginPayload::load(path) }
            .with_context(|| format!("loading payload plugin {path:?}"))?;
        return Ok(Arc::new(plugin));
    }
    registry::resolve(&cli.payload).ok_or_else(|| {
        anyhow::anyhow!(
            "\"{}\" is not a known payload. Available payloads: {}",
            cli.payload,
            registry::known_names().join(", ")
        )
    })
}

fn resolve_regions(cli: &Cli) -> Result<Vec<String>> {
    if let Some(service) = &cli.service {
        return Ok(regions_for_service(service)?);
    }
    if !cli.regions.is_empty() {
        return Ok(cli.regions.clone());
    }
    Ok(all_regions())
}

/// Output plus whether any task in the execution errored — the CLI prints
/// the output regardless, but maps a non-empty error count to a non-zero
/// exit code per the "surface the first error as the process-terminal
/// outcome" contract.
struct RunOutcome {
    output: serde_json::Value,
    had_errors: bool,
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let org = load_organization(&cli.master_role).await?;
    let regions = resolve_regions(&cli)?;
    let payload = resolve_payload(&cli)?;

    let mut crawler = Crawler::new(&org, &cli.accounts, regions)?;
    if let Some(account_role) = &cli.account_role {
        crawler = crawler.with_access_role(account_role.clone());
    }

    let sts = Arc::new(AwsStsClient::from_config(
        &aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await,
    ));
    let broker = CredentialBroker::new(sts);
    let failures = crawler.load_account_credentials(&broker).await;
    for (account_id, err) in &failures {
        tracing::warn!(account_id, error = %err, "skipping account: failed to load credentials");
    }

    let execution = crawler
        .execute(&cli.payload, payload, cli.payload_arg.clone())
        .await;
    let had_errors = execution.has_errors();
    if had_errors {
        let error_count = execution.responses.iter().filter(|r| r.is_error()).count();
        eprintln!("{}: {error_count} of {} task(s) failed", cli.payload, execution.responses.len());
    }
    let responses = purge_empty_responses(execution.responses);
    Ok(RunOutcome { output: serde_json::to_value(format_responses(&responses))?, had_errors })
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.output).expect("serializing output"));
            if outcome.had_errors {
                std::process::ExitCode::FAILURE
            } else {
                std::process::ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("\nError: {err:#}\n");
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgcrawler_core::mock::{InMemoryOrganizationsApi, InMemoryStsApi, MockOrganizationBuilder};
    use orgcrawler_core::{Account, OrgResult, PayloadArgs};

    struct EchoPayload;

    #[async_trait::async_trait]
    impl Payload for EchoPayload {
        async fn call(&self, region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
            Ok(serde_json::json!({ "region": region, "account": account.id() }))
        }
    }

    async fn loaded_org() -> Organization {
        let api = Arc::new(InMemoryOrganizationsApi::new());
        MockOrganizationBuilder::new(api.clone()).simple_tree().await.unwrap();
        OrganizationLoader::new(api).load("111111111111", "OrgRole").await.unwrap()
    }

    #[tokio::test]
    async fn execution_responses_format_into_one_entry_per_account() {
        let org = loaded_org().await;
        let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".to_string()]).unwrap();
        let broker = CredentialBroker::new(Arc::new(InMemoryStsApi::new()));
        crawler.load_account_credentials(&broker).await;
        let execution = crawler.execute("echo", Arc::new(EchoPayload), vec![]).await;

        let formatted = format_responses(&execution.responses);
        assert_eq!(formatted.len(), org.accounts.len());
    }

    #[test]
    fn resolve_regions_prefers_service_over_explicit_regions() {
        let cli = Cli {
            payload: "noop".into(),
            payload_arg: vec![],
            master_role: "OrgRole".into(),
            account_role: None,
            accounts: vec![],
            regions: vec!["us-west-2".into()],
            service: Some("iam".into()),
            payload_file: None,
        };
        let regions = resolve_regions(&cli).unwrap();
        assert_eq!(regions, vec!["us-east-1".to_string()]);
    }

    #[test]
    fn resolve_payload_reports_unknown_name() {
        let cli = Cli {
            payload: "not_a_real_payload".into(),
            payload_arg: vec![],
            master_role: "OrgRole".into(),
            account_role: None,
            accounts: vec![],
            regions: vec![],
            service: None,
            payload_file: None,
        };
        assert!(resolve_payload(&cli).is_err());
    }
}
