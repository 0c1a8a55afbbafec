//! Publication data model.
//!
//! [`PublicationRecord`] is the persisted unit; [`PublicationSummary`] and
//! [`PublicationDetail`] are the two shapes the upstream source hands back.
//! Upstream shapes keep every field optional so the normalizer decides the
//! defaults in one place.

use serde::{Deserialize, Serialize};

/// Title used when the upstream summary carries none.
pub const UNTITLED: &str = "Untitled";

/// Whether a record holds full detail or only summary data.
///
/// Partial records are re-fetched on the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Enrichment {
    #[default]
    Partial,
    Enriched,
}

impl Enrichment {
    /// State implied by an author string, for records written without an explicit state.
    pub fn infer(authors: &str) -> Self {
        if authors.trim().is_empty() {
            Enrichment::Partial
        } else {
            Enrichment::Enriched
        }
    }
}

/// A single publication as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationRecord {
    pub title: String,
    /// Comma-joined author names, empty if unknown
    pub authors: String,
    /// Raw upstream year, not guaranteed numeric
    pub year: String,
    pub venue: String,
    pub citations: u64,
    pub url: String,
    pub scholar_url: String,
    pub enrichment: Enrichment,
}

impl PublicationRecord {
    /// True when the record can be reused without a detail fetch.
    ///
    /// A record without authors never counts as enriched, whatever its flag says.
    pub fn is_enriched(&self) -> bool {
        self.enrichment == Enrichment::Enriched && !self.authors.trim().is_empty()
    }
}

/// On-disk shape of a record; `enrichment` may be absent in older files.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default, deserialize_with = "lenient_string")]
    year: String,
    #[serde(default)]
    venue: String,
    #[serde(default)]
    citations: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    scholar_url: String,
    #[serde(default)]
    enrichment: Option<Enrichment>,
}

impl<'de> Deserialize<'de> for PublicationRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let stored = StoredRecord::deserialize(deserializer)?;
        // An explicit flag can only downgrade: empty authors always mean partial
        let enrichment = match stored.enrichment {
            Some(Enrichment::Enriched) | None => Enrichment::infer(&stored.authors),
            Some(Enrichment::Partial) => Enrichment::Partial,
        };
        Ok(Self {
            title: stored.title,
            authors: stored.authors,
            year: stored.year,
            venue: stored.venue,
            citations: stored.citations,
            url: stored.url,
            scholar_url: stored.scholar_url,
            enrichment,
        })
    }
}

/// Accept a year written either as a string or as a bare number.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Persisted output of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// UTC ISO-8601 timestamp with `Z` suffix
    pub last_updated: String,
    #[serde(alias = "scholar_id")]
    pub author_id: String,
    pub total_publications: usize,
    pub publications: Vec<PublicationRecord>,
}

impl RunOutput {
    /// Build an output, deriving `total_publications` from the record count.
    pub fn new(
        author_id: impl Into<String>,
        last_updated: impl Into<String>,
        publications: Vec<PublicationRecord>,
    ) -> Self {
        Self {
            last_updated: last_updated.into(),
            author_id: author_id.into(),
            total_publications: publications.len(),
            publications,
        }
    }
}

/// Author field as the upstream emits it: a list of names or one string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorField {
    List(Vec<String>),
    Text(String),
}

/// Summary record returned in bulk with the author profile. Carries no author list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSummary {
    pub title: Option<String>,
    pub year: Option<String>,
    pub venue: Option<String>,
    pub citations: Option<u64>,
    pub url: Option<String>,
    /// Upstream per-publication identifier (e.g. `USER:abcdEFGH`)
    pub pub_id: Option<String>,
}

impl PublicationSummary {
    /// Title with the [`UNTITLED`] sentinel applied.
    pub fn title_or_untitled(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
    }

    /// Citation count, 0 when the upstream left it blank.
    pub fn citation_count(&self) -> u64 {
        self.citations.unwrap_or(0)
    }
}

/// Full record returned by a per-publication detail fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationDetail {
    pub authors: Option<AuthorField>,
    pub year: Option<String>,
    pub venue: Option<String>,
    pub citations: Option<u64>,
    pub url: Option<String>,
}

/// Author profile as returned by the author lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorProfile {
    pub author_id: String,
    pub name: String,
    pub affiliation: String,
}

/// Author plus ordered publication summaries for one run. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct AuthorSnapshot {
    pub profile: AuthorProfile,
    pub publications: Vec<PublicationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_record_infers_enrichment() -> serde_json::Result<()> {
        let enriched: PublicationRecord = serde_json::from_str(
            r#"{"title":"A","authors":"X, Y","year":"2020","venue":"V","citations":3,"url":"","scholar_url":"s"}"#,
        )?;
        assert_eq!(enriched.enrichment, Enrichment::Enriched);

        let partial: PublicationRecord =
            serde_json::from_str(r#"{"title":"B","authors":"","citations":1}"#)?;
        assert_eq!(partial.enrichment, Enrichment::Partial);
        assert_eq!(partial.year, "");
        Ok(())
    }

    #[test]
    fn test_explicit_enrichment_wins() -> serde_json::Result<()> {
        let record: PublicationRecord = serde_json::from_str(
            r#"{"title":"A","authors":"X","enrichment":"partial"}"#,
        )?;
        assert!(!record.is_enriched());
        Ok(())
    }

    #[test]
    fn test_enriched_flag_without_authors_is_partial() -> serde_json::Result<()> {
        let record: PublicationRecord = serde_json::from_str(
            r#"{"title":"P","authors":"","enrichment":"enriched"}"#,
        )?;
        assert_eq!(record.enrichment, Enrichment::Partial);
        assert!(!record.is_enriched());
        Ok(())
    }

    #[test]
    fn test_numeric_year_is_accepted() -> serde_json::Result<()> {
        let record: PublicationRecord =
            serde_json::from_str(r#"{"title":"A","year":2019}"#)?;
        assert_eq!(record.year, "2019");
        Ok(())
    }

    #[test]
    fn test_run_output_reads_legacy_author_key() -> serde_json::Result<()> {
        let out: RunOutput = serde_json::from_str(
            r#"{"last_updated":"2024-01-01T00:00:00Z","scholar_id":"abc","total_publications":0,"publications":[]}"#,
        )?;
        assert_eq!(out.author_id, "abc");
        Ok(())
    }

    #[test]
    fn test_author_field_shapes() -> serde_json::Result<()> {
        let list: AuthorField = serde_json::from_str(r#"["A", "B"]"#)?;
        assert_eq!(list, AuthorField::List(vec!["A".into(), "B".into()]));
        let text: AuthorField = serde_json::from_str(r#""A and B""#)?;
        assert_eq!(text, AuthorField::Text("A and B".into()));
        Ok(())
    }

    #[test]
    fn test_untitled_sentinel() {
        let summary = PublicationSummary::default();
        assert_eq!(summary.title_or_untitled(), UNTITLED);
        assert_eq!(summary.citation_count(), 0);
    }
}
