//! One synchronization pass: load cache, fetch, reconcile, sort, write.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::proxy::{ProxyOutcome, ProxyProvisioner};
use crate::reconcile::{ReconcileStats, Reconciler};
use crate::record::{AuthorSnapshot, RunOutput};
use crate::retry::{call_with_retry, Sleeper, TokioSleeper};
use crate::scholar::{ScholarClient, ScholarSource};
use crate::sequence::sort_records;
use crate::store::{utc_timestamp, OutputStore};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// What a successful write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub total: usize,
    pub last_updated: String,
    pub stats: ReconcileStats,
}

/// How a pass ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// New output written
    Written(WrittenOutput),
    /// Upstream failed; the previous output was left untouched
    PreservedCache { error: String },
}

/// Provision a proxy, build the HTTP client and run one pass against Google Scholar.
///
/// # Arguments
///
/// * `config` - Run configuration, proxy settings included
///
/// # Returns
///
/// The route traffic took and how the pass ended
///
/// # Errors
///
/// Same as [`run`]. A client that cannot be built goes through the same
/// preserve-on-failure policy as an upstream failure.
pub async fn sync_publications(config: &SyncConfig) -> Result<(ProxyOutcome, SyncReport)> {
    config.validate()?;

    let mut provisioner = ProxyProvisioner::new(config.proxy.clone(), config.base_url.clone());
    if !provisioner.configure().await {
        info!("Continuing without proxy");
    }

    let client = ScholarClient::new(
        &config.base_url,
        provisioner.proxy_url(),
        config.request_timeout,
    );
    let report = run_with_client(config, client, &TokioSleeper).await?;
    Ok((provisioner.outcome().clone(), report))
}

/// Run against a freshly built client, or apply the failure policy if building it failed.
async fn run_with_client<S: ScholarSource>(
    config: &SyncConfig,
    client: Result<S>,
    sleeper: &dyn Sleeper,
) -> Result<SyncReport> {
    match client {
        Ok(client) => run(config, &client, sleeper).await,
        Err(e) => handle_failure(config, &OutputStore::with_path(&config.output_path), e),
    }
}

/// Run one pass against any upstream source.
///
/// Only the bulk stage (author lookup, publication list) and, in strict mode,
/// a failed detail fetch can fail the pass. With `preserve_on_failure` set and
/// a previous output on disk, such a failure is reported as
/// [`SyncReport::PreservedCache`] and nothing is written.
///
/// # Arguments
///
/// * `config` - Author, output path and failure policy
/// * `source` - Upstream publication source
/// * `sleeper` - Receives backoff and pacing delays
///
/// # Returns
///
/// Whether new output was written or the previous one was kept
///
/// # Errors
///
/// Invalid configuration, a write failure, or an upstream failure the policy
/// does not absorb
pub async fn run(
    config: &SyncConfig,
    source: &dyn ScholarSource,
    sleeper: &dyn Sleeper,
) -> Result<SyncReport> {
    config.validate()?;
    info!(author_id = %config.author_id, "Fetching publications");

    let store = OutputStore::with_path(&config.output_path);
    let reconciler = Reconciler::new(source, sleeper, &config.author_id, &config.base_url)
        .with_pacing(config.pacing_delay)
        .with_degrade_item_failures(config.resilience.degrade_item_failures);

    let existing = reconciler.index(store.load());
    info!("Found {} existing publications in cache", existing.len());

    let reconciled = match fetch_snapshot(config, source, sleeper).await {
        Ok(snapshot) => {
            reconciler
                .reconcile(&existing, &snapshot.publications)
                .await
        }
        Err(e) => Err(e),
    };

    let reconciled = match reconciled {
        Ok(reconciled) => reconciled,
        Err(e) => return handle_failure(config, &store, e),
    };

    info!(
        "Fetched details for {} new publication(s)",
        reconciled.stats.fetched
    );

    let mut records = reconciled.records;
    sort_records(&mut records);

    let output = RunOutput::new(config.author_id.clone(), utc_timestamp(), records);
    store.save(&output)?;

    Ok(SyncReport::Written(WrittenOutput {
        path: store.path().to_path_buf(),
        total: output.total_publications,
        last_updated: output.last_updated,
        stats: reconciled.stats,
    }))
}

async fn fetch_snapshot(
    config: &SyncConfig,
    source: &dyn ScholarSource,
    sleeper: &dyn Sleeper,
) -> Result<AuthorSnapshot> {
    let retry = &config.resilience.retry;

    info!("Fetching author profile...");
    let profile = call_with_retry(retry, sleeper, "fetch_author", || {
        source.fetch_author(&config.author_id)
    })
    .await?;

    info!("Fetching publication list...");
    call_with_retry(retry, sleeper, "fill_publications", || {
        source.fill_publications(&profile)
    })
    .await
}

fn handle_failure(config: &SyncConfig, store: &OutputStore, e: SyncError) -> Result<SyncReport> {
    error!(error = %e, "Error fetching publications");

    if config.resilience.preserve_on_failure && store.exists() {
        warn!(
            "Keeping existing {:?} (fetch failed but cached data exists)",
            store.path()
        );
        return Ok(SyncReport::PreservedCache {
            error: e.to_string(),
        });
    }

    error!("No cached data available - cannot recover");
    Err(e)
}
