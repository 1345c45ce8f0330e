//! Execution bookkeeping: per-payload timing and per-account/region responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock timer for a crawl run or a single response. Stopping before
/// starting, or stopping twice, is a no-op rather than a panic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timer {
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, at: DateTime<Utc>) {
        self.start = Some(at);
    }

    pub fn stop(&mut self, at: DateTime<Utc>) {
        if self.start.is_some() {
            self.stop = Some(at);
        }
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Some(stop - start),
            _ => None,
        }
    }
}

/// The outcome of running one payload against one (region, account) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub region: String,
    pub account_id: String,
    pub account_name: String,
    pub payload_output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timer: Timer,
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True if the response carries neither output nor an error — the
    /// payload ran but produced nothing worth reporting.
    pub fn is_empty(&self) -> bool {
        self.payload_output.is_none() && self.error.is_none()
    }
}

/// One full run of a named payload across a region x account matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub payload_name: String,
    pub responses: Vec<Response>,
    pub timer: Timer,
}

impl Execution {
    pub fn new(payload_name: impl Into<String>) -> Self {
        Self {
            payload_name: payload_name.into(),
            responses: Vec::new(),
            timer: Timer::new(),
        }
    }

    /// True if any response in this execution carries an error.
    pub fn has_errors(&self) -> bool {
        self.responses.iter().any(Response::is_error)
    }
}

/// Keep only responses whose payload output is a single-entry mapping whose
/// sole value is not an empty list, dropping obviously-empty results (e.g. a
/// `list_buckets` payload that found nothing renders as `{"buckets": []}`).
/// Responses with no output at all (including errored ones) are dropped too
/// — callers that care about errors read `Execution::has_errors` instead.
pub fn purge_empty_responses(responses: Vec<Response>) -> Vec<Response> {
    responses
        .into_iter()
        .filter(|r| match &r.payload_output {
            Some(serde_json::Value::Object(map)) if map.len() == 1 => {
                !matches!(map.values().next(), Some(serde_json::Value::Array(items)) if items.is_empty())
            }
            _ => false,
        })
        .collect()
}

/// One account's worth of formatted output, the shape `format_responses`
/// groups kept responses into: `{"Account": name, "Regions": [{"Region": r,
/// "Output": o}, ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedAccount {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Regions")]
    pub regions: Vec<FormattedRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedRegion {
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Output")]
    pub output: serde_json::Value,
}

/// Group `responses` by account name (sorted ascending), one entry per
/// region bearing its raw output. Intended to run over the output of
/// [`purge_empty_responses`], but makes no assumption about that — any
/// responses with no payload output are simply skipped.
pub fn format_responses(responses: &[Response]) -> Vec<FormattedAccount> {
    let mut by_account: std::collections::BTreeMap<&str, Vec<FormattedRegion>> = std::collections::BTreeMap::new();
    for response in responses {
        let Some(output) = &response.payload_output else {
            continue;
        };
        by_account.entry(response.account_name.as_str()).or_default().push(FormattedRegion {
            region: response.region.clone(),
            output: output.clone(),
        });
    }
    by_account
        .into_iter()
        .map(|(account, regions)| FormattedAccount { account: account.to_string(), regions })
        .collect()
}
