//! End-to-end scenarios exercising the public API as an external caller
//! would: build an organization, query it, crawl it, cache it.
//!
//! Requires the `mock` feature (see `[dev-dependencies]` in Cargo.toml),
//! since these tests reach `orgcrawler_core::mock` from outside the crate.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use orgcrawler_core::client::OrganizationsApi;
use orgcrawler_core::mock::{InMemoryOrganizationsApi, InMemoryStsApi, MockOrganizationBuilder};
use orgcrawler_core::model::OrgObjectFields;
use orgcrawler_core::{
    Account, CredentialBroker, Crawler, OrgError, OrgQuery, OrgResult, Organization,
    OrganizationLoader, OrganizationalUnit, Payload, PayloadArgs, Policy, PolicyTarget, TargetType,
};

fn fields(id: &str, name: &str, parent_id: &str) -> OrgObjectFields {
    OrgObjectFields {
        organization_id: "o-scenario".into(),
        master_account_id: "111111111111".into(),
        name: name.into(),
        id: id.into(),
        parent_id: parent_id.into(),
        attached_policy_ids: HashSet::new(),
    }
}

fn account(id: &str, name: &str, parent_id: &str) -> Account {
    Account {
        fields: fields(id, name, parent_id),
        email: format!("{name}@example.com"),
        aliases: Vec::new(),
        credentials: None,
    }
}

fn org_unit(id: &str, name: &str, parent_id: &str) -> OrganizationalUnit {
    OrganizationalUnit { fields: fields(id, name, parent_id) }
}

fn policy(id: &str, name: &str, targets: Vec<PolicyTarget>) -> Policy {
    Policy { fields: fields(id, name, ""), targets }
}

fn target(id: &str, target_type: TargetType, name: &str) -> PolicyTarget {
    PolicyTarget {
        target_id: id.into(),
        target_type,
        name: name.into(),
        arn: format!("arn:aws:organizations::111111111111:target/{id}"),
    }
}

/// S1: root -> [account01, account02, account03; ou01->ou01-sub0;
/// ou02->ou02-sub0; ou03->ou03-sub0], policies at root/account01/ou01.
fn scenario_s1() -> Organization {
    let mut org = Organization::new("111111111111", "OrgRole");
    org.id = "o-scenario".into();
    org.root_id = "r-root".into();

    for n in 1..=3 {
        org.accounts.push(account(&format!("acct{n:02}"), &format!("account{n:02}"), "r-root"));
    }
    for n in 1..=3 {
        org.org_units.push(org_unit(&format!("ou{n:02}"), &format!("ou{n:02}"), "r-root"));
        org.org_units.push(org_unit(&format!("ou{n:02}-sub0"), &format!("ou{n:02}-sub0"), &format!("ou{n:02}")));
    }

    org.policies.push(policy("policy01", "policy01", vec![target("r-root", TargetType::Root, "root")]));
    org.policies.push(policy(
        "policy02",
        "policy02",
        vec![target("acct01", TargetType::Account, "account01")],
    ));
    org.policies.push(policy(
        "policy03",
        "policy03",
        vec![target("ou01", TargetType::OrganizationalUnit, "ou01")],
    ));

    org
}

#[test]
fn s1_simple_tree_counts_and_names() {
    let org = scenario_s1();
    let q = OrgQuery::new(&org);

    let mut names: Vec<_> = org.accounts.iter().map(|a| a.name().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["account01", "account02", "account03"]);

    assert_eq!(org.org_units.len(), 6);
    assert_eq!(org.policies.len(), 3);

    let direct = q.get_policies_for_target("acct01");
    let ids: Vec<_> = direct.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["policy02"]);
}

/// S2: 13 accounts across ou01 (-> ou01-1, ou01-2) and ou02 (-> ou02-1,
/// ou02-2); 6 policies.
fn scenario_s2() -> Organization {
    let mut org = Organization::new("111111111111", "OrgRole");
    org.id = "o-scenario".into();
    org.root_id = "r-root".into();

    org.org_units.push(org_unit("ou01", "ou01", "r-root"));
    org.org_units.push(org_unit("ou01-1", "ou01-1", "ou01"));
    org.org_units.push(org_unit("ou01-2", "ou01-2", "ou01"));
    org.org_units.push(org_unit("ou02", "ou02", "r-root"));
    org.org_units.push(org_unit("ou02-1", "ou02-1", "ou02"));
    org.org_units.push(org_unit("ou02-2", "ou02-2", "ou02"));

    // ou02-1 gets 1 account, ou02-2 gets 4, totaling 5 under ou02.
    org.accounts.push(account("account06", "account06", "ou02-1"));
    for n in [7, 8, 9, 10] {
        org.accounts.push(account(&format!("account{n:02}"), &format!("account{n:02}"), "ou02-2"));
    }
    // remaining 8 accounts scattered elsewhere so the total is 13.
    org.accounts.push(account("account01", "account01", "ou01-1"));
    org.accounts.push(account("account02", "account02", "ou01-1"));
    org.accounts.push(account("account03", "account03", "ou01-2"));
    org.accounts.push(account("account04", "account04", "ou01-2"));
    org.accounts.push(account("account05", "account05", "ou01"));
    org.accounts.push(account("account11", "account11", "r-root"));
    org.accounts.push(account("account12", "account12", "r-root"));
    org.accounts.push(account("account13", "account13", "r-root"));

    for n in 1..=6 {
        org.policies.push(policy(&format!("policy{n:02}"), &format!("policy{n:02}"), vec![]));
    }
    assert_eq!(org.accounts.len(), 13);
    org
}

#[test]
fn s2_complex_tree_recursive_counts() {
    let org = scenario_s2();
    let q = OrgQuery::new(&org);

    assert_eq!(q.list_accounts_in_ou_recursive("ou02").len(), 5);
    assert_eq!(q.list_accounts_in_ou_recursive("ou02-1").len(), 1);
}

/// S3: policy05 targets ou01-2 and account07; expect {account07, account09,
/// account10} given S2's tree (ou01-2 contains account03/account04, so this
/// builds its own variant where ou01-2 instead contains account09/account10).
#[test]
fn s3_policy_recursive_expands_ou_and_direct_targets() {
    let mut org = scenario_s2();
    // Re-home account09/account10 under ou01-2 so the recursive expansion
    // of ou01-2 yields exactly {account09, account10}, matching the
    // expected set together with the directly targeted account07.
    for a in org.accounts.iter_mut() {
        if a.id() == "account09" || a.id() == "account10" {
            a.fields.parent_id = "ou01-2".into();
        }
    }
    org.policies.push(policy(
        "policy05b",
        "policy05b",
        vec![
            target("ou01-2", TargetType::OrganizationalUnit, "ou01-2"),
            target("account07", TargetType::Account, "account07"),
        ],
    ));

    let q = OrgQuery::new(&org);
    let mut ids: Vec<_> = q
        .get_accounts_for_policy_recursive("policy05b")
        .iter()
        .map(|a| a.id().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["account07", "account09", "account10"]);
}

struct SetAlias;

#[async_trait]
impl Payload for SetAlias {
    async fn call(&self, _region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        Ok(serde_json::json!({ "alias": format!("alias-{}", account.name()) }))
    }
}

struct GetAliases;

#[async_trait]
impl Payload for GetAliases {
    async fn call(&self, _region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        Ok(serde_json::json!({ "aliases": [format!("alias-{}", account.name())] }))
    }
}

/// S4: set-alias / get-alias round trip over S1's three accounts.
#[tokio::test]
async fn s4_crawler_set_and_get_alias_round_trip() {
    let org = scenario_s1();
    let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".to_string()]).unwrap();
    let broker = CredentialBroker::new(Arc::new(InMemoryStsApi::new()));
    let failures = crawler.load_account_credentials(&broker).await;
    assert!(failures.is_empty());

    let set_execution = crawler.execute("set_account_alias", Arc::new(SetAlias), vec![]).await;
    let get_execution = crawler.execute("get_account_aliases", Arc::new(GetAliases), vec![]).await;

    for response in &set_execution.responses {
        let alias = response.payload_output.as_ref().unwrap()["alias"].as_str().unwrap();
        assert!(alias.contains(&format!("alias-{}", response.account_name)));
    }
    assert_eq!(crawler.history().len(), 2);
    assert_eq!(get_execution.responses.len(), 3);
}

struct FailsOnOneAccount {
    target_account: String,
}

#[async_trait]
impl Payload for FailsOnOneAccount {
    async fn call(&self, _region: &str, account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        if account.id() == self.target_account {
            return Err(OrgError::Payload {
                account_id: account.id().to_string(),
                region: "us-east-1".into(),
                message: "simulated payload failure".into(),
            });
        }
        Ok(serde_json::json!({ "ok": true }))
    }
}

/// S5: a payload that fails on exactly one account does not affect its
/// siblings' responses.
#[tokio::test]
async fn s5_payload_failure_is_isolated() {
    let org = scenario_s1();
    let account_count = org.accounts.len();
    let mut crawler = Crawler::new(&org, &[], vec!["us-east-1".to_string()]).unwrap();
    let broker = CredentialBroker::new(Arc::new(InMemoryStsApi::new()));
    crawler.load_account_credentials(&broker).await;

    let payload = FailsOnOneAccount { target_account: "acct02".to_string() };
    let execution = crawler.execute("maybe_fails", Arc::new(payload), vec![]).await;

    assert!(execution.has_errors());
    assert_eq!(execution.responses.len(), account_count);
    let failing: Vec<_> = execution.responses.iter().filter(|r| r.is_error()).collect();
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].account_id, "acct02");
    let healthy: Vec<_> = execution.responses.iter().filter(|r| !r.is_error()).collect();
    assert_eq!(healthy.len(), account_count - 1);
    assert!(healthy.iter().all(|r| r.payload_output.is_some()));
}

/// S6: a second `load_cached_or_live` against a stale cache re-discovers
/// live rather than returning the stale snapshot.
#[tokio::test]
async fn s6_stale_cache_triggers_live_rediscovery() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_config = orgcrawler_core::config::CacheConfig {
        cache_dir: tmp.path().to_path_buf(),
        cache_file_name: "cache_file-111111111111".to_string(),
        cache_file_max_age_minutes: 60,
    };

    let api = Arc::new(InMemoryOrganizationsApi::new());
    MockOrganizationBuilder::new(api.clone()).simple_tree().await.unwrap();
    let loader = OrganizationLoader::new(api.clone());

    let first = loader
        .load_cached_or_live("111111111111", "OrgRole", cache_config.clone())
        .await
        .unwrap();
    assert_eq!(first.accounts.len(), 4);

    // Mutate live state, then force the cached copy to read as stale.
    api.create_account("new-member", "new-member@example.com").await.unwrap();
    let mut stale_config = cache_config.clone();
    stale_config.cache_file_max_age_minutes = -1;

    let second = loader
        .load_cached_or_live("111111111111", "OrgRole", stale_config)
        .await
        .unwrap();
    assert_eq!(second.accounts.len(), 5);
}

/// Universal invariant 1: every account's parent is the root or a known OU.
#[test]
fn invariant_every_account_parent_is_root_or_known_ou() {
    let org = scenario_s2();
    let ou_ids: HashSet<_> = org.org_units.iter().map(|u| u.id().to_string()).collect();
    for a in &org.accounts {
        assert!(a.parent_id() == org.root_id || ou_ids.contains(a.parent_id()));
    }
}

/// Universal invariant 4: serialize -> deserialize -> serialize is stable
/// (credentials excluded, which `OrganizationDump` already guarantees).
#[test]
fn invariant_dump_round_trip_is_stable() {
    use orgcrawler_core::OrganizationDump;

    let org = scenario_s1();
    let dump = OrganizationDump::from(&org);
    let bytes = rmp_serde::to_vec(&dump).unwrap();
    let restored: OrganizationDump = rmp_serde::from_slice(&bytes).unwrap();
    let bytes_again = rmp_serde::to_vec(&restored).unwrap();
    assert_eq!(bytes, bytes_again);
}

/// Query property 6: resolving by name then by the resulting id recovers
/// the same account.
#[test]
fn query_property_name_id_round_trip() {
    let org = scenario_s1();
    let q = OrgQuery::new(&org);
    for a in &org.accounts {
        let id = q.get_account(a.name()).map(|found| found.id()).unwrap();
        assert_eq!(q.get_account(id).map(|found| found.name()), Some(a.name()));
    }
}

/// Query property 9: responses = accounts selected x regions selected,
/// before purging.
#[tokio::test]
async fn query_property_response_count_matches_matrix_size() {
    let org = scenario_s2();
    let regions = vec!["us-east-1".to_string(), "us-west-2".to_string(), "eu-west-1".to_string()];
    let mut crawler = Crawler::new(&org, &[], regions.clone()).unwrap();
    let broker = CredentialBroker::new(Arc::new(InMemoryStsApi::new()));
    crawler.load_account_credentials(&broker).await;

    struct Noop;
    #[async_trait]
    impl Payload for Noop {
        async fn call(&self, _region: &str, _account: &Account, _args: &PayloadArgs) -> OrgResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    let execution = crawler.execute("noop", Arc::new(Noop), vec![]).await;
    assert_eq!(execution.responses.len(), org.accounts.len() * regions.len());
}
