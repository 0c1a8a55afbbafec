//! Run configuration.
//!
//! Everything a sync pass needs is carried in [`SyncConfig`]; nothing is read
//! from process-wide state once the config is built.

use crate::error::{Result, SyncError};
use crate::normalize::DEFAULT_SCHOLAR_URL;
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Author profile synced when none is configured
pub const DEFAULT_AUTHOR_ID: &str = "u9i3_ywAAAAJ";

/// Output file written when none is configured
pub const DEFAULT_OUTPUT_FILE: &str = "publications.json";

/// Environment variable holding the paid proxy credential
pub const SCRAPER_API_KEY_ENV: &str = "SCRAPER_API_KEY";

/// Default free proxy list (plain text, one `host:port` per line)
pub const DEFAULT_FREE_PROXY_LIST: &str =
    "https://api.proxyscrape.com/v2/?request=displayproxies&protocol=http&timeout=5000&country=all&ssl=yes&anonymity=elite";

/// Failure-handling mode for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Single attempt, every failure propagates
    Strict,
    /// Retry bulk calls, degrade per-item failures, keep prior output on failure
    #[default]
    Resilient,
}

impl FromStr for Policy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Policy::Strict),
            "resilient" => Ok(Policy::Resilient),
            other => Err(SyncError::Config(format!(
                "Unknown policy '{}', expected 'strict' or 'resilient'",
                other
            ))),
        }
    }
}

/// Concrete resilience knobs derived from a [`Policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resilience {
    pub retry: RetryPolicy,
    /// Leave an existing output file untouched when the bulk stage fails
    pub preserve_on_failure: bool,
    /// Fall back to a partial record when a detail fetch fails
    pub degrade_item_failures: bool,
}

impl Resilience {
    pub fn for_policy(policy: Policy) -> Self {
        match policy {
            Policy::Strict => Self {
                retry: RetryPolicy::new(1, Duration::from_secs(5)),
                preserve_on_failure: false,
                degrade_item_failures: false,
            },
            Policy::Resilient => Self {
                retry: RetryPolicy::default(),
                preserve_on_failure: true,
                degrade_item_failures: true,
            },
        }
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::for_policy(Policy::Resilient)
    }
}

/// Proxy provisioning settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub enabled: bool,
    /// Paid provider credential; empty counts as absent
    pub scraper_api_key: Option<String>,
    pub free_list_url: String,
    /// Candidates probed from the free list before giving up
    pub max_candidates: usize,
    pub probe_timeout: Duration,
}

impl ProxySettings {
    /// Settings with the paid credential taken from [`SCRAPER_API_KEY_ENV`].
    pub fn from_env() -> Self {
        Self {
            scraper_api_key: std::env::var(SCRAPER_API_KEY_ENV).ok(),
            ..Self::default()
        }
    }

    /// Credential, if one is actually set.
    pub fn api_key(&self) -> Option<&str> {
        self.scraper_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scraper_api_key: None,
            free_list_url: DEFAULT_FREE_PROXY_LIST.to_string(),
            max_candidates: 10,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for one synchronization pass.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub author_id: String,
    pub output_path: PathBuf,
    /// Upstream root, e.g. `https://scholar.google.com`
    pub base_url: String,
    /// Wait before every detail fetch after the first
    pub pacing_delay: Duration,
    pub request_timeout: Duration,
    pub resilience: Resilience,
    pub proxy: ProxySettings,
}

impl SyncConfig {
    pub fn new(author_id: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            author_id: author_id.into(),
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.author_id.trim().is_empty() {
            return Err(SyncError::Config("Author id must not be empty".to_string()));
        }
        if self.resilience.retry.max_attempts == 0 {
            return Err(SyncError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(SyncError::Config("Output path must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            author_id: DEFAULT_AUTHOR_ID.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            base_url: DEFAULT_SCHOLAR_URL.to_string(),
            pacing_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            resilience: Resilience::default(),
            proxy: ProxySettings::default(),
        }
    }
}
