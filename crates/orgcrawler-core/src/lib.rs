//! Core engine for discovering, caching and querying an AWS Organization,
//! and for crawling payloads across its accounts and regions.

pub mod aws;
pub mod broker;
pub mod cache;
pub mod client;
pub mod config;
pub mod crawler;
pub mod credentials;
pub mod error;
pub mod execution;
pub mod identifier;
pub mod loader;
pub mod model;
pub mod pool;
pub mod query;
pub mod regions;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use broker::CredentialBroker;
pub use crawler::{Crawler, FnPayload, Payload, PayloadArgs};
pub use credentials::Credentials;
pub use error::{OrgError, OrgResult};
pub use execution::{format_responses, purge_empty_responses, Execution, Response, Timer};
pub use loader::OrganizationLoader;
pub use model::{Account, Organization, OrganizationDump, OrganizationalUnit, Policy, PolicyTarget, TargetType};
pub use query::OrgQuery;
