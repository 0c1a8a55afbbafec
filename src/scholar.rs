//! Google Scholar author-profile client.
//!
//! [`ScholarSource`] is the seam the reconciler talks to; [`ScholarClient`]
//! implements it by fetching and parsing the public profile and citation
//! pages. Every call is a single request (or one request per profile page),
//! with no retry of its own. Retrying is the caller's decision.

use crate::error::{Result, SyncError};
use crate::record::{
    AuthorField, AuthorProfile, AuthorSnapshot, PublicationDetail, PublicationSummary,
};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Rows requested per profile page (upstream maximum)
const PAGE_SIZE: usize = 100;

/// Hard stop for profile pagination
const MAX_PAGES: usize = 50;

/// Detail-page fields that can hold the venue, in preference order
const VENUE_FIELDS: &[&str] = &["Journal", "Conference", "Book", "Source", "Publisher"];

/// Upstream source of author and publication data.
#[async_trait]
pub trait ScholarSource: Send + Sync {
    /// Look up an author profile by identifier.
    async fn fetch_author(&self, author_id: &str) -> Result<AuthorProfile>;

    /// Fetch the complete summary publication list of a profile, in upstream order.
    async fn fill_publications(&self, profile: &AuthorProfile) -> Result<AuthorSnapshot>;

    /// Fetch the full record of one publication.
    async fn fetch_detail(
        &self,
        author_id: &str,
        summary: &PublicationSummary,
    ) -> Result<PublicationDetail>;
}

/// HTTP client scraping Google Scholar profile pages
pub struct ScholarClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScholarClient {
    /// Create a client for `base_url`, optionally routed through `proxy`.
    pub fn new(base_url: &str, proxy: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(proxy, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn citations_url(&self, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/citations", self.base_url))
            .map_err(|e| SyncError::Config(format!("Invalid base URL: {}", e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::RateLimited(60));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(SyncError::Api {
                code: status.as_u16() as i32,
                message: format!("HTTP error: {}", status),
            });
        }

        let html = response.text().await?;
        if is_captcha_page(&html) {
            warn!(url = %url, "CAPTCHA detected");
            return Err(SyncError::Captcha);
        }
        Ok(html)
    }
}

#[async_trait]
impl ScholarSource for ScholarClient {
    async fn fetch_author(&self, author_id: &str) -> Result<AuthorProfile> {
        let url = self.citations_url(&[("user", author_id), ("hl", "en")])?;
        let html = self.fetch_page(&url).await?;
        let profile = parse_profile(&html, author_id)?;
        info!(
            author = %profile.name,
            affiliation = %profile.affiliation,
            "Fetched author profile"
        );
        Ok(profile)
    }

    async fn fill_publications(&self, profile: &AuthorProfile) -> Result<AuthorSnapshot> {
        let mut publications = Vec::new();
        let page_size = PAGE_SIZE.to_string();

        for page in 0..MAX_PAGES {
            let cstart = (page * PAGE_SIZE).to_string();
            let url = self.citations_url(&[
                ("user", profile.author_id.as_str()),
                ("hl", "en"),
                ("cstart", cstart.as_str()),
                ("pagesize", page_size.as_str()),
            ])?;
            let html = self.fetch_page(&url).await?;
            let rows = parse_publication_rows(&html, &self.base_url)?;
            let count = rows.len();
            debug!(page = page + 1, count, "Parsed publication rows");
            publications.extend(rows);

            if count < PAGE_SIZE {
                break;
            }
        }

        info!(total = publications.len(), "Fetched publication list");
        Ok(AuthorSnapshot {
            profile: profile.clone(),
            publications,
        })
    }

    async fn fetch_detail(
        &self,
        author_id: &str,
        summary: &PublicationSummary,
    ) -> Result<PublicationDetail> {
        let pub_id = summary
            .pub_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "no publication id for '{}'",
                    summary.title_or_untitled()
                ))
            })?;

        let url = self.citations_url(&[
            ("view_op", "view_citation"),
            ("hl", "en"),
            ("user", author_id),
            ("citation_for_view", pub_id),
        ])?;
        let html = self.fetch_page(&url).await?;
        parse_detail(&html)
    }
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>, timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| SyncError::Config(format!("Invalid proxy URL: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))
}

fn is_captcha_page(html: &str) -> bool {
    html.contains("Solving the above CAPTCHA")
        || html.contains("unusual traffic")
        || html.contains("id=\"gs_captcha_f\"")
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SyncError::Parse(e.to_string()))
}

fn element_text(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>().trim().to_string()
}

/// Parse the author header of a profile page.
pub fn parse_profile(html: &str, author_id: &str) -> Result<AuthorProfile> {
    let document = Html::parse_document(html);
    let name_selector = selector("#gsc_prf_in")?;
    let affiliation_selector = selector("div.gsc_prf_il")?;

    let name = document
        .select(&name_selector)
        .next()
        .map(element_text)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| SyncError::NotFound(format!("author profile {}", author_id)))?;

    let affiliation = document
        .select(&affiliation_selector)
        .next()
        .map(element_text)
        .unwrap_or_default();

    Ok(AuthorProfile {
        author_id: author_id.to_string(),
        name,
        affiliation,
    })
}

/// Parse the publication table of one profile page.
pub fn parse_publication_rows(html: &str, base_url: &str) -> Result<Vec<PublicationSummary>> {
    let document = Html::parse_document(html);

    let row_selector = selector("tr.gsc_a_tr")?;
    let title_selector = selector("a.gsc_a_at")?;
    let gray_selector = selector("div.gs_gray")?;
    let cites_selector = selector("a.gsc_a_ac")?;
    let year_selector = selector("td.gsc_a_y span")?;

    let trailing_year =
        Regex::new(r",\s*\d{4}\s*$").map_err(|e| SyncError::Parse(e.to_string()))?;
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .map_err(|e| SyncError::Config(format!("Invalid base URL: {}", e)))?;

    let mut results = Vec::new();

    for row in document.select(&row_selector) {
        let Some(link) = row.select(&title_selector).next() else {
            continue;
        };

        let title = element_text(link);
        if title.is_empty() {
            continue;
        }

        let pub_id = link
            .value()
            .attr("href")
            .or_else(|| link.value().attr("data-href"))
            .and_then(|href| base.join(href).ok())
            .and_then(|url| {
                url.query_pairs()
                    .find(|(k, _)| k == "citation_for_view")
                    .map(|(_, v)| v.into_owned())
            });

        // First gray line is the truncated author list, second is the venue
        let venue = row
            .select(&gray_selector)
            .nth(1)
            .map(element_text)
            .map(|v| trailing_year.replace(&v, "").trim().to_string())
            .filter(|v| !v.is_empty());

        let citations = row
            .select(&cites_selector)
            .next()
            .map(element_text)
            .and_then(|c| c.replace(['*', ','], "").trim().parse::<u64>().ok());

        let year = row
            .select(&year_selector)
            .next()
            .map(element_text)
            .filter(|y| !y.is_empty());

        results.push(PublicationSummary {
            title: Some(title),
            year,
            venue,
            citations,
            url: None,
            pub_id,
        });
    }

    Ok(results)
}

/// Parse a citation (detail) page.
pub fn parse_detail(html: &str) -> Result<PublicationDetail> {
    let document = Html::parse_document(html);

    let field_row_selector = selector("div.gs_scl")?;
    let field_selector = selector("div.gsc_oci_field")?;
    let value_selector = selector("div.gsc_oci_value")?;
    let link_selector = selector("a.gsc_oci_title_link")?;

    let year_regex = Regex::new(r"\b(\d{4})\b").map_err(|e| SyncError::Parse(e.to_string()))?;
    let cite_regex =
        Regex::new(r"Cited by\s*(\d+)").map_err(|e| SyncError::Parse(e.to_string()))?;

    let fields: Vec<(String, String)> = document
        .select(&field_row_selector)
        .filter_map(|row| {
            let name = row.select(&field_selector).next().map(element_text)?;
            let value = row.select(&value_selector).next().map(element_text)?;
            Some((name, value))
        })
        .collect();

    if fields.is_empty() && document.select(&link_selector).next().is_none() {
        return Err(SyncError::Parse(
            "citation page has no publication fields".to_string(),
        ));
    }

    let field = |name: &str| {
        fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    };

    let authors = field("Authors").or_else(|| field("Inventors")).map(|a| {
        AuthorField::List(
            a.split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    });

    let year = field("Publication date")
        .and_then(|d| year_regex.captures(d))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let venue = VENUE_FIELDS
        .iter()
        .find_map(|name| field(*name))
        .map(str::to_string);

    let citations = field("Total citations")
        .and_then(|c| cite_regex.captures(c))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok());

    let url = document
        .select(&link_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    Ok(PublicationDetail {
        authors,
        year,
        venue,
        citations,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROFILE_HTML: &str = r#"<html><body>
        <div id="gsc_prf_in">Ada Lovelace</div>
        <div class="gsc_prf_il">Analytical Engines Ltd</div>
        <table><tbody id="gsc_a_b">
          <tr class="gsc_a_tr">
            <td class="gsc_a_t">
              <a href="/citations?view_op=view_citation&amp;hl=en&amp;user=ADA123&amp;citation_for_view=ADA123:aaa" class="gsc_a_at">Notes on the Engine</a>
              <div class="gs_gray">A Lovelace, C Babbage</div>
              <div class="gs_gray">Scientific Memoirs 3, 1843</div>
            </td>
            <td class="gsc_a_c"><a class="gsc_a_ac gs_ibl">1,204</a></td>
            <td class="gsc_a_y"><span class="gsc_a_h gsc_a_hc gs_ibl">1843</span></td>
          </tr>
          <tr class="gsc_a_tr">
            <td class="gsc_a_t">
              <a href="/citations?view_op=view_citation&amp;hl=en&amp;user=ADA123&amp;citation_for_view=ADA123:bbb" class="gsc_a_at">Unpublished letter</a>
              <div class="gs_gray">A Lovelace</div>
              <div class="gs_gray"></div>
            </td>
            <td class="gsc_a_c"><a class="gsc_a_ac gs_ibl"></a></td>
            <td class="gsc_a_y"><span class="gsc_a_h gsc_a_hc gs_ibl"></span></td>
          </tr>
        </tbody></table>
    </body></html>"#;

    const DETAIL_HTML: &str = r#"<html><body>
        <div id="gsc_oci_title"><a class="gsc_oci_title_link" href="https://example.org/notes">Notes on the Engine</a></div>
        <div id="gsc_oci_table">
          <div class="gs_scl"><div class="gsc_oci_field">Authors</div><div class="gsc_oci_value">Ada Lovelace, Charles Babbage</div></div>
          <div class="gs_scl"><div class="gsc_oci_field">Publication date</div><div class="gsc_oci_value">1843/10/1</div></div>
          <div class="gs_scl"><div class="gsc_oci_field">Journal</div><div class="gsc_oci_value">Scientific Memoirs</div></div>
          <div class="gs_scl"><div class="gsc_oci_field">Total citations</div><div class="gsc_oci_value"><div><a href="/scholar?cites=1">Cited by 1204</a></div></div></div>
        </div>
    </body></html>"#;

    #[test]
    fn test_parse_profile() -> Result<()> {
        let profile = parse_profile(PROFILE_HTML, "ADA123")?;
        assert_eq!(profile.name, "Ada Lovelace");
        assert_eq!(profile.affiliation, "Analytical Engines Ltd");
        Ok(())
    }

    #[test]
    fn test_parse_profile_missing_name() {
        let err = parse_profile("<html><body></body></html>", "nobody");
        assert!(matches!(err, Err(SyncError::NotFound(_))));
    }

    #[test]
    fn test_parse_publication_rows() -> Result<()> {
        let rows = parse_publication_rows(PROFILE_HTML, "https://scholar.google.com")?;
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].title.as_deref(), Some("Notes on the Engine"));
        assert_eq!(rows[0].pub_id.as_deref(), Some("ADA123:aaa"));
        assert_eq!(rows[0].venue.as_deref(), Some("Scientific Memoirs 3"));
        assert_eq!(rows[0].citations, Some(1204));
        assert_eq!(rows[0].year.as_deref(), Some("1843"));

        assert_eq!(rows[1].citations, None);
        assert_eq!(rows[1].year, None);
        assert_eq!(rows[1].venue, None);
        Ok(())
    }

    #[test]
    fn test_parse_detail() -> Result<()> {
        let detail = parse_detail(DETAIL_HTML)?;
        assert_eq!(
            detail.authors,
            Some(AuthorField::List(vec![
                "Ada Lovelace".to_string(),
                "Charles Babbage".to_string()
            ]))
        );
        assert_eq!(detail.year.as_deref(), Some("1843"));
        assert_eq!(detail.venue.as_deref(), Some("Scientific Memoirs"));
        assert_eq!(detail.citations, Some(1204));
        assert_eq!(detail.url.as_deref(), Some("https://example.org/notes"));
        Ok(())
    }

    #[test]
    fn test_parse_detail_rejects_empty_page() {
        assert!(parse_detail("<html><body>nothing</body></html>").is_err());
    }

    #[test]
    fn test_captcha_detection() {
        assert!(is_captcha_page("<p>Our systems have detected unusual traffic</p>"));
        assert!(!is_captcha_page(PROFILE_HTML));
    }

    #[tokio::test]
    async fn test_client_round_trip() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("view_op", "view_citation"))
            .and(query_param("citation_for_view", "ADA123:aaa"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_HTML))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("user", "ADA123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_HTML))
            .mount(&server)
            .await;

        let client = ScholarClient::new(&server.uri(), None, Duration::from_secs(5))?;
        let profile = client.fetch_author("ADA123").await?;
        let snapshot = client.fill_publications(&profile).await?;
        assert_eq!(snapshot.publications.len(), 2);

        let detail = client
            .fetch_detail("ADA123", &snapshot.publications[0])
            .await?;
        assert_eq!(detail.citations, Some(1204));
        Ok(())
    }

    #[tokio::test]
    async fn test_client_maps_rate_limit_and_captcha() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("user", "LIMITED"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("user", "BLOCKED"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("Please complete Solving the above CAPTCHA"),
            )
            .mount(&server)
            .await;

        let client = ScholarClient::new(&server.uri(), None, Duration::from_secs(5))?;
        assert!(matches!(
            client.fetch_author("LIMITED").await,
            Err(SyncError::RateLimited(_))
        ));
        assert!(matches!(
            client.fetch_author("BLOCKED").await,
            Err(SyncError::Captcha)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_detail_without_pub_id() -> Result<()> {
        let client = ScholarClient::new("http://127.0.0.1:9", None, Duration::from_secs(1))?;
        let summary = PublicationSummary {
            title: Some("No id".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            client.fetch_detail("X", &summary).await,
            Err(SyncError::NotFound(_))
        ));
        Ok(())
    }
}
