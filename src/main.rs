//! rustpubsync - Google Scholar publication list sync
//!
//! Fetches an author's publication list and writes it to a JSON file,
//! fetching full details only for publications not already cached.
//!
//! ## Usage
//!
//! ```bash
//! rustpubsync sync --author-id u9i3_ywAAAAJ --output publications.json
//! rustpubsync proxy
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustpubsync::config::{Policy, ProxySettings, Resilience, SyncConfig, DEFAULT_FREE_PROXY_LIST};
use rustpubsync::normalize::DEFAULT_SCHOLAR_URL;
use rustpubsync::proxy::ProxyProvisioner;
use rustpubsync::sync::{self, SyncReport};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar publication list sync
#[derive(Parser)]
#[command(name = "rustpubsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch publications and update the output file
    Sync {
        /// Google Scholar author id
        #[arg(long, env = "SCHOLAR_ID", default_value = rustpubsync::config::DEFAULT_AUTHOR_ID)]
        author_id: String,

        /// Output JSON file (also read as cache)
        #[arg(short, long, env = "PUBLICATIONS_FILE", default_value = rustpubsync::config::DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Failure policy
        #[arg(long, env = "SYNC_POLICY", default_value = "resilient", value_parser = ["strict", "resilient"])]
        policy: String,

        /// Override attempts for bulk upstream calls
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Override base backoff delay in seconds
        #[arg(long)]
        base_delay: Option<u64>,

        /// Seconds to wait between detail fetches
        #[arg(long, default_value = "2")]
        pacing: u64,

        /// Upstream base URL
        #[arg(long, default_value = DEFAULT_SCHOLAR_URL)]
        base_url: String,

        #[command(flatten)]
        proxy: ProxyArgs,
    },

    /// Try proxy provisioning alone and report the route
    Proxy {
        /// URL probed through free proxy candidates
        #[arg(long, default_value = DEFAULT_SCHOLAR_URL)]
        base_url: String,

        #[command(flatten)]
        proxy: ProxyArgs,
    },
}

#[derive(clap::Args)]
struct ProxyArgs {
    /// Skip proxy provisioning
    #[arg(long)]
    no_proxy: bool,

    /// Free proxy list URL
    #[arg(long, default_value = DEFAULT_FREE_PROXY_LIST)]
    free_proxy_list: String,
}

impl ProxyArgs {
    fn into_settings(self) -> ProxySettings {
        ProxySettings {
            enabled: !self.no_proxy,
            free_list_url: self.free_proxy_list,
            ..ProxySettings::from_env()
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Sync {
            author_id,
            output,
            policy,
            max_attempts,
            base_delay,
            pacing,
            base_url,
            proxy,
        } => {
            let policy: Policy = policy.parse().context("Invalid --policy")?;
            let mut resilience = Resilience::for_policy(policy);
            if let Some(attempts) = max_attempts {
                resilience.retry.max_attempts = attempts;
            }
            if let Some(secs) = base_delay {
                resilience.retry.base_delay = Duration::from_secs(secs);
            }

            let config = SyncConfig {
                author_id,
                output_path: output,
                base_url,
                pacing_delay: Duration::from_secs(pacing),
                resilience,
                proxy: proxy.into_settings(),
                ..SyncConfig::default()
            };
            run_sync(config).await
        }
        Commands::Proxy { base_url, proxy } => run_proxy_check(base_url, proxy.into_settings()).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_sync(config: SyncConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let (route, report) = sync::sync_publications(&config)
        .await
        .with_context(|| format!("Sync failed for author {}", config.author_id))?;
    info!(route = %route, "Upstream route used");

    match report {
        SyncReport::Written(written) => {
            println!(
                "\nSuccessfully saved {} publications to {}",
                written.total,
                written.path.display()
            );
            println!(
                "Cached: {}, fetched: {}, degraded: {}",
                written.stats.cached, written.stats.fetched, written.stats.degraded
            );
            println!("Last updated: {}", written.last_updated);
        }
        SyncReport::PreservedCache { error } => {
            println!("\nError fetching publications: {}", error);
            println!(
                "Keeping existing {} (fetch failed but cached data exists)",
                config.output_path.display()
            );
        }
    }

    Ok(())
}

async fn run_proxy_check(base_url: String, settings: ProxySettings) -> Result<()> {
    let mut provisioner = ProxyProvisioner::new(settings, base_url);
    let ok = provisioner.configure().await;

    println!("Route: {}", provisioner.outcome());
    if !ok {
        println!("No proxy available, sync runs will go direct");
    }
    Ok(())
}
