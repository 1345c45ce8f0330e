//! Unified error type for the organization model, credential broker and crawler.
//!
//! Mirrors the error taxonomy table in the specification: each variant names
//! one *kind*, not one underlying transport type. Library code never exits
//! the process on any of these; the CLI layer maps them to exit codes.

use thiserror::Error;

/// Unified error type for `orgcrawler-core` operations.
#[derive(Error, Debug)]
pub enum OrgError {
    /// Role could not be assumed in the target account.
    #[error("cannot assume role {role} in account {account_id}: {reason}")]
    AccessDenied {
        account_id: String,
        role: String,
        reason: String,
    },

    /// Caller credentials have expired.
    #[error("credentials expired: {0}")]
    ExpiredToken(String),

    /// Provider rate limit exceeded the retry budget.
    #[error("throttled after {attempts} attempts calling {operation}")]
    Throttled { operation: String, attempts: u32 },

    /// No cache file is present at the configured path.
    #[error("cache file not found at {0}")]
    CacheMissing(std::path::PathBuf),

    /// The cache file is older than the configured maximum age.
    #[error("cache file at {path} is stale (age {age_minutes}m > max {max_minutes}m)")]
    CacheStale {
        path: std::path::PathBuf,
        age_minutes: i64,
        max_minutes: i64,
    },

    /// Caller supplied an account identifier that does not resolve.
    #[error("\"{0}\" is not a valid organization account")]
    InvalidAccount(String),

    /// Caller supplied a region that the selected service does not offer.
    #[error("invalid regions: {0}")]
    InvalidRegion(String),

    /// Caller supplied a service name the region catalog does not recognize.
    #[error("\"{0}\" is not a recognized AWS service")]
    InvalidService(String),

    /// A user-supplied payload raised an error. Captured on the Response,
    /// does not halt sibling tasks.
    #[error("payload error for account {account_id} region {region}: {message}")]
    Payload {
        account_id: String,
        region: String,
        message: String,
    },

    /// Unclassified SDK/network failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Local I/O failure (cache read/write, temp-file rename).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache (de)serialization failure.
    #[error("cache (de)serialization error: {0}")]
    Serialization(String),
}

impl OrgError {
    /// Transient kinds are retryable by the caller; terminal kinds are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrgError::Throttled { .. } | OrgError::Transport(_))
    }
}

pub type OrgResult<T> = Result<T, OrgError>;
