//! Outbound proxy provisioning.
//!
//! Tries a paid rotating proxy when a credential is configured, otherwise
//! probes a free public proxy list. Failure is never fatal: the run goes
//! direct and the outcome is logged.

use crate::config::ProxySettings;
use crate::error::{Result, SyncError};
use rand::seq::SliceRandom;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ScraperAPI proxy endpoint
const SCRAPER_API_PROXY_HOST: &str = "proxy-server.scraperapi.com:8001";

/// Which route outbound traffic takes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyOutcome {
    /// Paid rotating proxy
    Paid,
    /// Free proxy at `host:port`
    Free(String),
    /// No proxy
    #[default]
    Direct,
}

impl fmt::Display for ProxyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyOutcome::Paid => write!(f, "ScraperAPI proxy"),
            ProxyOutcome::Free(addr) => write!(f, "free proxy {}", addr),
            ProxyOutcome::Direct => write!(f, "direct connection"),
        }
    }
}

/// Configures a proxy for the upstream client
pub struct ProxyProvisioner {
    settings: ProxySettings,
    /// URL probed through free proxy candidates
    probe_url: String,
    outcome: ProxyOutcome,
    proxy_url: Option<String>,
}

impl ProxyProvisioner {
    pub fn new(settings: ProxySettings, probe_url: impl Into<String>) -> Self {
        Self {
            settings,
            probe_url: probe_url.into(),
            outcome: ProxyOutcome::Direct,
            proxy_url: None,
        }
    }

    /// Attempt to configure a proxy. Returns `false` when the run must go direct.
    ///
    /// Never returns an error; every failure is logged and downgraded.
    pub async fn configure(&mut self) -> bool {
        self.outcome = ProxyOutcome::Direct;
        self.proxy_url = None;

        if !self.settings.enabled {
            info!("Proxy disabled, using direct connection");
            return false;
        }

        info!("Setting up proxy rotation...");
        match self.try_configure().await {
            Ok(Some((outcome, url))) => {
                info!(route = %outcome, "Proxy setup successful");
                self.outcome = outcome;
                self.proxy_url = Some(url);
                true
            }
            Ok(None) => {
                warn!("Could not set up free proxies, proceeding without");
                false
            }
            Err(e) => {
                warn!(error = %e, "Proxy setup failed, proceeding without proxy - may be rate limited");
                false
            }
        }
    }

    async fn try_configure(&self) -> Result<Option<(ProxyOutcome, String)>> {
        if let Some(key) = self.settings.api_key() {
            info!("Using ScraperAPI proxy");
            let url = scraper_api_proxy_url(key);
            validate_proxy_url(&url)?;
            return Ok(Some((ProxyOutcome::Paid, url)));
        }

        info!("Using free proxy rotation");
        let candidates = self.fetch_free_list().await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        for addr in candidates.iter().take(self.settings.max_candidates) {
            let url = format!("http://{}", addr);
            match self.probe(&url).await {
                Ok(()) => return Ok(Some((ProxyOutcome::Free(addr.clone()), url))),
                Err(e) => debug!(proxy = %addr, error = %e, "Proxy candidate rejected"),
            }
        }

        Ok(None)
    }

    async fn fetch_free_list(&self) -> Result<Vec<String>> {
        let client = reqwest::Client::builder()
            .timeout(self.settings.probe_timeout.max(Duration::from_secs(10)))
            .build()?;

        let response = client.get(&self.settings.free_list_url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Api {
                code: response.status().as_u16() as i32,
                message: format!("Proxy list error: {}", response.status()),
            });
        }

        let mut candidates = parse_proxy_list(&response.text().await?);
        candidates.shuffle(&mut rand::thread_rng());
        info!(count = candidates.len(), "Fetched free proxy candidates");
        Ok(candidates)
    }

    async fn probe(&self, proxy_url: &str) -> Result<()> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| SyncError::Proxy(format!("Invalid proxy '{}': {}", proxy_url, e)))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.settings.probe_timeout)
            .build()?;

        let status = client.get(&self.probe_url).send().await?.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SyncError::Proxy(format!("probe answered {}", status)))
        }
    }

    /// Route chosen by the last [`configure`](Self::configure) call
    pub fn outcome(&self) -> &ProxyOutcome {
        &self.outcome
    }

    /// Proxy URL for the HTTP client, if one was configured
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

fn scraper_api_proxy_url(key: &str) -> String {
    format!("http://scraperapi:{}@{}", key, SCRAPER_API_PROXY_HOST)
}

fn validate_proxy_url(url: &str) -> Result<()> {
    reqwest::Proxy::all(url)
        .map(|_| ())
        .map_err(|e| SyncError::Proxy(format!("Invalid proxy URL: {}", e)))
}

/// Parse a plain-text proxy list into `host:port` entries.
pub fn parse_proxy_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .map(|line| line.trim_start_matches("http://"))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| match line.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        })
        .map(str::to_string)
        .collect()
}
