//! Cache reconciliation.
//!
//! Walks the upstream summary list in order and, per publication, either
//! reuses the cached record (refreshing only its citation count) or issues
//! one detail fetch. A failed detail fetch yields a partial record that the
//! next run picks up again.

use crate::error::Result;
use crate::normalize::{self, pub_id_from_scholar_url};
use crate::record::{PublicationRecord, PublicationSummary};
use crate::retry::Sleeper;
use crate::scholar::ScholarSource;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Characters of a title shown in progress lines
const TITLE_PREVIEW_CHARS: usize = 60;

/// Key under which records are matched between runs.
pub trait RecordKey: Send + Sync {
    fn summary_key(&self, summary: &PublicationSummary) -> String;
    fn record_key(&self, record: &PublicationRecord) -> String;
}

/// Match by title. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleKey;

impl RecordKey for TitleKey {
    fn summary_key(&self, summary: &PublicationSummary) -> String {
        summary.title_or_untitled().to_string()
    }

    fn record_key(&self, record: &PublicationRecord) -> String {
        record.title.clone()
    }
}

/// Match by the upstream publication id, falling back to title when the id is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicationIdKey;

impl RecordKey for PublicationIdKey {
    fn summary_key(&self, summary: &PublicationSummary) -> String {
        match summary.pub_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => format!("id:{}", id),
            None => format!("title:{}", summary.title_or_untitled()),
        }
    }

    fn record_key(&self, record: &PublicationRecord) -> String {
        match pub_id_from_scholar_url(&record.scholar_url) {
            Some(id) => format!("id:{}", id),
            None => format!("title:{}", record.title),
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Reused from cache
    pub cached: usize,
    /// Detail fetches issued
    pub fetched: usize,
    /// Detail fetches that failed and fell back to summary data
    pub degraded: usize,
}

/// Records in upstream order plus counters.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub records: Vec<PublicationRecord>,
    pub stats: ReconcileStats,
}

/// Merges cached records with the current upstream summaries
pub struct Reconciler<'a> {
    source: &'a dyn ScholarSource,
    sleeper: &'a dyn Sleeper,
    key: Box<dyn RecordKey + 'a>,
    author_id: String,
    base_url: String,
    pacing_delay: Duration,
    degrade_item_failures: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        source: &'a dyn ScholarSource,
        sleeper: &'a dyn Sleeper,
        author_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            sleeper,
            key: Box::new(TitleKey),
            author_id: author_id.into(),
            base_url: base_url.into(),
            pacing_delay: Duration::from_secs(2),
            degrade_item_failures: true,
        }
    }

    /// Replace the keying function.
    pub fn with_key(mut self, key: impl RecordKey + 'a) -> Self {
        self.key = Box::new(key);
        self
    }

    /// Wait inserted before every detail fetch after the first.
    pub fn with_pacing(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    /// When false, a failed detail fetch aborts the pass instead of degrading.
    pub fn with_degrade_item_failures(mut self, degrade: bool) -> Self {
        self.degrade_item_failures = degrade;
        self
    }

    /// Index cached records by key. Later duplicates shadow earlier ones.
    pub fn index(&self, existing: Vec<PublicationRecord>) -> HashMap<String, PublicationRecord> {
        existing
            .into_iter()
            .map(|record| (self.key.record_key(&record), record))
            .collect()
    }

    /// Produce one record per upstream summary, in upstream order.
    ///
    /// # Arguments
    ///
    /// * `existing` - Cached records, as built by [`index`](Self::index)
    /// * `summaries` - Upstream summary list for this run
    ///
    /// # Returns
    ///
    /// The records plus counts of cache hits, fetches and degraded fetches
    ///
    /// # Errors
    ///
    /// A failed detail fetch, only when item failures are not degraded
    pub async fn reconcile(
        &self,
        existing: &HashMap<String, PublicationRecord>,
        summaries: &[PublicationSummary],
    ) -> Result<Reconciled> {
        let mut records = Vec::with_capacity(summaries.len());
        let mut stats = ReconcileStats::default();

        for summary in summaries {
            let title = summary.title_or_untitled();
            let key = self.key.summary_key(summary);

            if let Some(cached) = existing.get(&key).filter(|r| r.is_enriched()) {
                let fresh = summary.citation_count();
                if fresh != cached.citations {
                    info!(
                        "  [cached, citations {} -> {}] {}",
                        cached.citations,
                        fresh,
                        preview(title)
                    );
                } else {
                    info!("  [cached] {}", preview(title));
                }
                records.push(normalize::from_cache(
                    cached,
                    summary,
                    &self.base_url,
                    &self.author_id,
                ));
                stats.cached += 1;
                continue;
            }

            info!("  [fetching] {}", preview(title));
            stats.fetched += 1;
            if stats.fetched > 1 && !self.pacing_delay.is_zero() {
                self.sleeper.sleep(self.pacing_delay).await;
            }

            match self.source.fetch_detail(&self.author_id, summary).await {
                Ok(detail) => records.push(normalize::from_detail(
                    summary,
                    &detail,
                    &self.base_url,
                    &self.author_id,
                )),
                Err(e) if self.degrade_item_failures => {
                    warn!(title = %title, error = %e, "Could not fetch details, keeping basic info");
                    stats.degraded += 1;
                    records.push(normalize::from_summary(
                        summary,
                        &self.base_url,
                        &self.author_id,
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            cached = stats.cached,
            fetched = stats.fetched,
            degraded = stats.degraded,
            "Reconciliation complete"
        );
        Ok(Reconciled { records, stats })
    }
}

/// Title cut to [`TITLE_PREVIEW_CHARS`] characters, with an ellipsis when cut.
pub fn preview(title: &str) -> String {
    match title.char_indices().nth(TITLE_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &title[..idx]),
        None => title.to_string(),
    }
}
