//! Explicit, injectable configuration for the cache and pagination/retry behavior.
//!
//! Kept as plain structs with sane defaults rather than process-wide globals,
//! per the design note to isolate the cache directory behind an overridable
//! config so tests can point at a temporary directory.

use std::path::PathBuf;

/// Default subdirectory under the user's home directory for cached org dumps.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".orgcrawler-cache";

/// Default maximum age, in minutes, before a cache file is considered stale.
pub const DEFAULT_CACHE_FILE_MAX_AGE_MINUTES: i64 = 60;

/// Default region used for the `GLOBAL` region literal.
pub const DEFAULT_GLOBAL_REGION: &str = "us-east-1";

/// Default pagination retry budget for `TooManyRequests` throttling.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default sleep between pagination retries.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Cache location and freshness policy for a single Organization.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub cache_file_name: String,
    pub cache_file_max_age_minutes: i64,
}

impl CacheConfig {
    /// Build the default cache config for a given master account id:
    /// `<home>/.orgcrawler-cache/cache_file-<master_account_id>`.
    pub fn default_for_master_account(master_account_id: &str) -> Self {
        let cache_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CACHE_DIR_NAME);
        Self {
            cache_dir,
            cache_file_name: format!("cache_file-{master_account_id}"),
            cache_file_max_age_minutes: DEFAULT_CACHE_FILE_MAX_AGE_MINUTES,
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_file_name)
    }
}

/// Pagination retry policy for throttled list calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}
