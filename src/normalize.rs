//! Record normalization.
//!
//! Maps upstream summary/detail shapes onto [`PublicationRecord`]. The
//! `scholar_url` is always derived here from identifiers of the current run.

use crate::record::{
    AuthorField, Enrichment, PublicationDetail, PublicationRecord, PublicationSummary,
};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Fold an author field into one `", "`-joined string.
pub fn join_authors(authors: Option<&AuthorField>) -> String {
    match authors {
        Some(AuthorField::List(names)) => names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Some(AuthorField::Text(text)) => text.trim().to_string(),
        None => String::new(),
    }
}

/// Citation page URL for one publication of one author.
///
/// Deterministic in `(author_id, pub_id)`; an unknown publication id yields
/// an empty `citation_for_view` value.
pub fn scholar_url(base_url: &str, author_id: &str, pub_id: Option<&str>) -> String {
    format!(
        "{}/citations?view_op=view_citation&hl=en&user={}&citation_for_view={}",
        base_url.trim_end_matches('/'),
        author_id,
        pub_id.unwrap_or("")
    )
}

/// Extract the `citation_for_view` id back out of a scholar URL.
pub fn pub_id_from_scholar_url(scholar_url: &str) -> Option<String> {
    let url = Url::parse(scholar_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "citation_for_view")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Build a full record from a detail fetch, falling back to summary fields.
pub fn from_detail(
    summary: &PublicationSummary,
    detail: &PublicationDetail,
    base_url: &str,
    author_id: &str,
) -> PublicationRecord {
    let authors = join_authors(detail.authors.as_ref());
    let enrichment = Enrichment::infer(&authors);

    PublicationRecord {
        title: summary.title_or_untitled().to_string(),
        year: first_present(&detail.year, &summary.year),
        venue: first_present(&detail.venue, &summary.venue),
        citations: detail.citations.unwrap_or_else(|| summary.citation_count()),
        url: first_present(&detail.url, &summary.url),
        scholar_url: scholar_url(base_url, author_id, summary.pub_id.as_deref()),
        authors,
        enrichment,
    }
}

/// Build a partial record from summary fields alone.
///
/// `authors` stays empty so the record is picked up again by the next run.
pub fn from_summary(summary: &PublicationSummary, base_url: &str, author_id: &str) -> PublicationRecord {
    PublicationRecord {
        title: summary.title_or_untitled().to_string(),
        authors: String::new(),
        year: summary.year.clone().unwrap_or_default(),
        venue: summary.venue.clone().unwrap_or_default(),
        citations: summary.citation_count(),
        url: summary.url.clone().unwrap_or_default(),
        scholar_url: scholar_url(base_url, author_id, summary.pub_id.as_deref()),
        enrichment: Enrichment::Partial,
    }
}

/// Reuse a cached record, taking the fresh citation count and a recomputed scholar URL.
pub fn from_cache(
    cached: &PublicationRecord,
    summary: &PublicationSummary,
    base_url: &str,
    author_id: &str,
) -> PublicationRecord {
    PublicationRecord {
        citations: summary.citation_count(),
        scholar_url: scholar_url(base_url, author_id, summary.pub_id.as_deref()),
        ..cached.clone()
    }
}

fn first_present(preferred: &Option<String>, fallback: &Option<String>) -> String {
    preferred
        .as_ref()
        .or(fallback.as_ref())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> PublicationSummary {
        PublicationSummary {
            title: Some("Deep Nets".into()),
            year: Some("2021".into()),
            venue: Some("NeurIPS".into()),
            citations: Some(7),
            url: None,
            pub_id: Some("u9i3_ywAAAAJ:abc".into()),
        }
    }

    #[test]
    fn test_join_authors() {
        let list = AuthorField::List(vec!["Ada Lovelace".into(), " Alan Turing ".into()]);
        assert_eq!(join_authors(Some(&list)), "Ada Lovelace, Alan Turing");
        let text = AuthorField::Text("Grace Hopper".into());
        assert_eq!(join_authors(Some(&text)), "Grace Hopper");
        assert_eq!(join_authors(None), "");
    }

    #[test]
    fn test_scholar_url_is_deterministic() {
        let a = scholar_url(DEFAULT_SCHOLAR_URL, "u9i3_ywAAAAJ", Some("u9i3_ywAAAAJ:abc"));
        let b = scholar_url("https://scholar.google.com/", "u9i3_ywAAAAJ", Some("u9i3_ywAAAAJ:abc"));
        assert_eq!(a, b);
        assert_eq!(
            a,
            "https://scholar.google.com/citations?view_op=view_citation&hl=en&user=u9i3_ywAAAAJ&citation_for_view=u9i3_ywAAAAJ:abc"
        );
        assert_eq!(pub_id_from_scholar_url(&a).as_deref(), Some("u9i3_ywAAAAJ:abc"));
    }

    #[test]
    fn test_missing_pub_id() {
        let url = scholar_url(DEFAULT_SCHOLAR_URL, "xyz", None);
        assert!(url.ends_with("citation_for_view="));
        assert_eq!(pub_id_from_scholar_url(&url), None);
    }

    #[test]
    fn test_from_detail_prefers_detail_fields() {
        let detail = PublicationDetail {
            authors: Some(AuthorField::List(vec!["A Smith".into(), "B Jones".into(), "C Lee".into()])),
            year: None,
            venue: Some("Advances in NeurIPS 34".into()),
            citations: Some(9),
            url: Some("https://example.org/paper".into()),
        };
        let record = from_detail(&summary(), &detail, DEFAULT_SCHOLAR_URL, "u9i3_ywAAAAJ");
        assert_eq!(record.authors, "A Smith, B Jones, C Lee");
        assert_eq!(record.year, "2021");
        assert_eq!(record.venue, "Advances in NeurIPS 34");
        assert_eq!(record.citations, 9);
        assert_eq!(record.url, "https://example.org/paper");
        assert!(record.is_enriched());
    }

    #[test]
    fn test_from_detail_without_authors_stays_partial() {
        let record = from_detail(&summary(), &PublicationDetail::default(), DEFAULT_SCHOLAR_URL, "id");
        assert_eq!(record.authors, "");
        assert_eq!(record.enrichment, Enrichment::Partial);
        assert_eq!(record.citations, 7);
    }

    #[test]
    fn test_from_summary_drops_authors() {
        let record = from_summary(&summary(), DEFAULT_SCHOLAR_URL, "u9i3_ywAAAAJ");
        assert_eq!(record.authors, "");
        assert_eq!(record.citations, 7);
        assert_eq!(record.venue, "NeurIPS");
        assert_eq!(record.url, "");
        assert!(!record.is_enriched());
    }

    #[test]
    fn test_from_cache_refreshes_citations_only() {
        let cached = PublicationRecord {
            title: "Deep Nets".into(),
            authors: "A Smith".into(),
            year: "2021".into(),
            venue: "Old venue".into(),
            citations: 1,
            url: "u".into(),
            scholar_url: "stale".into(),
            enrichment: Enrichment::Enriched,
        };
        let record = from_cache(&cached, &summary(), DEFAULT_SCHOLAR_URL, "u9i3_ywAAAAJ");
        assert_eq!(record.citations, 7);
        assert_eq!(record.venue, "Old venue");
        assert_eq!(record.authors, "A Smith");
        assert_ne!(record.scholar_url, "stale");
    }
}
