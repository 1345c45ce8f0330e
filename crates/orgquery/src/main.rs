//! `orgquery`: read-only query tool over a cached (or freshly discovered)
//! AWS Organization.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use orgcrawler_core::aws::{AwsOrganizationsClient, AwsStsClient};
use orgcrawler_core::broker::CredentialBroker;
use orgcrawler_core::client::OrganizationsApi;
use orgcrawler_core::config::CacheConfig;
use orgcrawler_core::credentials::Credentials;
use orgcrawler_core::loader::OrganizationLoader;
use orgcrawler_core::query::OrgQuery;
use orgcrawler_core::{Organization, OrganizationDump};

const ZERO_ARG_COMMANDS: &[&str] = &[
    "dump",
    "dump_accounts",
    "dump_org_units",
    "dump_policies",
    "list_accounts_by_name",
    "list_accounts_by_id",
    "list_org_units_by_name",
    "list_org_units_by_id",
    "list_policies_by_name",
    "list_policies_by_id",
];

const ONE_ARG_COMMANDS: &[&str] = &[
    "get_account",
    "get_account_id_by_name",
    "get_account_name_by_id",
    "get_org_unit",
    "get_org_unit_id",
    "list_accounts_in_ou",
    "list_accounts_in_ou_recursive",
    "list_org_units_in_ou",
    "list_org_units_in_ou_recursive",
    "get_policy",
    "get_policy_id_by_name",
    "get_policy_name_by_id",
    "get_targets_for_policy",
    "get_policies_for_target",
    "get_accounts_for_policy_recursive",
];

/// Query AWS Organization resources: accounts, organizational units, and
/// service control policies.
///
/// Available Query Commands:
///
///   dump, dump_accounts, dump_org_units, dump_policies,
///   list_accounts_by_name, list_accounts_by_id,
///   list_org_units_by_name, list_org_units_by_id,
///   list_policies_by_name, list_policies_by_id,
///   get_account ACCOUNT_IDENTIFIER, get_account_id_by_name ACCOUNT_NAME,
///   get_account_name_by_id ACCOUNT_ID, get_org_unit OU_IDENTIFIER,
///   get_org_unit_id OU_IDENTIFIER, list_accounts_in_ou OU_IDENTIFIER,
///   list_accounts_in_ou_recursive OU_IDENTIFIER,
///   list_org_units_in_ou OU_IDENTIFIER,
///   list_org_units_in_ou_recursive OU_IDENTIFIER,
///   get_policy POLICY_IDENTIFIER, get_policy_id_by_name POLICY_NAME,
///   get_policy_name_by_id POLICY_ID, get_targets_for_policy POLICY_IDENTIFIER,
///   get_policies_for_target POLICY_IDENTIFIER,
///   get_accounts_for_policy_recursive POLICY_IDENTIFIER
#[derive(Parser)]
#[command(name = "orgquery", version, about, long_about = None)]
struct Cli {
    /// An organization query command to run
    command: String,

    /// A command argument to supply if needed
    argument: Option<String>,

    /// IAM role to assume for accessing the AWS Organization master account
    #[arg(long, short = 'r', required = true)]
    role: String,

    /// Enable debugging. Repeating the option (-dd) includes AWS API
    /// debugging output.
    #[arg(long, short = 'd', action = clap::ArgAction::Count)]
    debug: u8,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormatArg::Json)]
    format: OutputFormatArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputFormatArg {
    Json,
    Yaml,
}

fn init_logging(debug: u8) {
    let filter = match debug {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .compact()
        .init();
}

fn render(value: &serde_json::Value, format: OutputFormatArg) -> Result<String> {
    Ok(match format {
        OutputFormatArg::Json => serde_json::to_string_pretty(value)?,
        OutputFormatArg::Yaml => serde_yaml::to_string(value)?,
    })
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
                "orgquery",
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

fn run_command(org: &Organization, command: &str, argument: Option<&str>) -> Result<serde_json::Value> {
    let query = OrgQuery::new(org);
    let require_arg = || -> Result<&str> {
        argument.ok_or_else(|| anyhow::anyhow!("query command \"{command}\" requires an argument"))
    };

    Ok(match command {
        "dump" => serde_json::to_value(OrganizationDump::from(org))?,
        "dump_accounts" => serde_json::to_value(&org.accounts)?,
        "dump_org_units" => serde_json::to_value(&org.org_units)?,
        "dump_policies" => serde_json::to_value(&org.policies)?,
        "list_accounts_by_name" => serde_json::to_value(query.list_accounts_by_name())?,
        "list_accounts_by_id" => serde_json::to_value(query.list_accounts_by_id())?,
        "list_org_units_by_name" => serde_json::to_value(query.list_org_units_by_name())?,
        "list_org_units_by_id" => serde_json::to_value(query.list_org_units_by_id())?,
        "list_policies_by_name" => serde_json::to_value(query.list_policies_by_name())?,
        "list_policies_by_id" => serde_json::to_value(query.list_policies_by_id())?,
        "get_account" => serde_json::to_value(query.get_account(require_arg()?))?,
        "get_account_id_by_name" => {
            serde_json::to_value(query.get_account(require_arg()?).map(|a| a.id()))?
        }
        "get_account_name_by_id" => {
            serde_json::to_value(query.get_account(require_arg()?).map(|a| a.name()))?
        }
        "get_org_unit" => serde_json::to_value(query.get_org_unit(require_arg()?))?,
        "get_org_unit_id" => serde_json::to_value(query.get_org_unit_id(require_arg()?))?,
        "list_accounts_in_ou" => serde_json::to_value(query.list_accounts_in_ou(require_arg()?))?,
        "list_accounts_in_ou_recursive" => {
            serde_json::to_value(query.list_accounts_in_ou_recursive(require_arg()?))?
        }
        "list_org_units_in_ou" => serde_json::to_value(query.list_org_units_in_ou(require_arg()?))?,
        "list_org_units_in_ou_recursive" => {
            serde_json::to_value(query.list_org_units_in_ou_recursive(require_arg()?))?
        }
        "get_policy" => serde_json::to_value(query.get_policy(require_arg()?))?,
        "get_policy_id_by_name" => {
            serde_json::to_value(query.get_policy(require_arg()?).map(|p| p.id()))?
        }
        "get_policy_name_by_id" => {
            serde_json::to_value(query.get_policy(require_arg()?).map(|p| p.name()))?
        }
        "get_targets_for_policy" => {
            serde_json::to_value(query.get_targets_for_policy(require_arg()?))?
        }
        "get_policies_for_target" => {
            serde_json::to_value(query.get_policies_for_target(require_arg()?))?
        }
        "get_accounts_for_policy_recursive" => {
            serde_json::to_value(query.get_accounts_for_policy_recursive(require_arg()?))?
        }
        other => bail!("\"{other}\" is not a recognized query command"),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !ZERO_ARG_COMMANDS.contains(&cli.command.as_str()) && !ONE_ARG_COMMANDS.contains(&cli.command.as_str()) {
        eprintln!("\"{}\" is not a recognized query command\n", cli.command);
        std::process::exit(1);
    }
    if ONE_ARG_COMMANDS.contains(&cli.command.as_str()) && cli.argument.is_none() {
        eprintln!("query command \"{}\" requires an argument\n", cli.command);
        std::process::exit(1);
    }

    init_logging(cli.debug);

    let org = match load_organization(&cli.role).await {
        Ok(org) => org,
        Err(err) => {
            eprintln!("\nError: {err:#}\n");
            std::process::exit(1);
        }
    };

    match run_command(&org, &cli.command, cli.argument.as_deref()) {
        Ok(value) => println!("{}", render(&value, cli.format)?),
        Err(err) => {
            eprintln!("\nError: {err:#}\n");
            std::process::exit(1);
        }
    }

    Ok(())
}
