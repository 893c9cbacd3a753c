//! Web search fallback
//!
//! Invoked once at session end to produce reference links related to the
//! discussed question. Two providers: the Serper API (keyed) and scraping
//! the public Google results page (keyless).

use async_trait::async_trait;

use crate::{Error, Result};

/// Number of reference links written at session end
pub const DEFAULT_LINK_COUNT: usize = 5;

/// Maximum words kept from the query text
pub const MAX_QUERY_WORDS: usize = 30;

/// Domains excluded from scraped results
const EXCLUDED_DOMAINS: &[&str] = &[
    "google", "facebook", "twitter", "instagram", "youtube", "tiktok", "reddit",
];

/// Search seam the orchestrator depends on
#[async_trait]
pub trait SearchLinks: Send + Sync {
    /// Return up to `limit` reference links for the query
    async fn search_links(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Search provider backend
#[derive(Debug, Clone)]
enum SearchProvider {
    /// Serper (Google) Search API
    Serper { api_key: String },
    /// Scrape the public Google results page
    GoogleScrape,
}

/// Web search client
pub struct WebSearch {
    provider: SearchProvider,
    client: reqwest::Client,
}

/// Serper API request body
#[derive(serde::Serialize)]
struct SerperRequest {
    q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    num: Option<usize>,
}

/// Serper API response
#[derive(serde::Deserialize)]
struct SerperSearchResponse {
    organic: Option<Vec<SerperResult>>,
}

#[derive(serde::Deserialize)]
struct SerperResult {
    link: String,
}

impl WebSearch {
    /// Create a search client using the Serper API
    #[must_use]
    pub fn new_serper(api_key: String) -> Self {
        Self {
            provider: SearchProvider::Serper { api_key },
            client: reqwest::Client::new(),
        }
    }

    /// Create a keyless search client scraping the Google results page
    #[must_use]
    pub fn new_google_scrape() -> Self {
        Self {
            provider: SearchProvider::GoogleScrape,
            client: reqwest::Client::new(),
        }
    }

    /// Search using the Serper API
    async fn search_serper(
        &self,
        api_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let request_body = SerperRequest {
            q: query.to_string(),
            num: Some(limit),
        };

        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;
        let serper_response: SerperSearchResponse = response.json().await?;

        let links = serper_response
            .organic
            .map(|organic| organic.into_iter().map(|r| r.link).take(limit).collect())
            .unwrap_or_default();

        Ok(links)
    }

    /// Search by scraping the public Google results page
    async fn search_google_scrape(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "https://www.google.com/search?q={}",
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)")
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;
        let body = response.text().await?;

        Ok(extract_result_links(&body, limit))
    }
}

#[async_trait]
impl SearchLinks for WebSearch {
    async fn search_links(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let query = truncate_query(query, MAX_QUERY_WORDS);
        tracing::info!(query = %query, "searching reference links");
        match &self.provider {
            SearchProvider::Serper { api_key } => {
                self.search_serper(api_key, &query, limit).await
            }
            SearchProvider::GoogleScrape => self.search_google_scrape(&query, limit).await,
        }
    }
}

/// Reduce a query to at most `max_words` words
#[must_use]
pub fn truncate_query(query: &str, max_words: usize) -> String {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() > max_words {
        words[..max_words].join(" ")
    } else {
        words.join(" ")
    }
}

/// Extract result links from a Google results page
///
/// Anchors on the results page wrap destinations as `/url?q=<target>&...`.
/// Unwraps those, drops social/search domains, and de-duplicates while
/// preserving order.
fn extract_result_links(html: &str, limit: usize) -> Vec<String> {
    let document = scraper::Html::parse_document(html);
    let Ok(selector) = scraper::Selector::parse("a") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(wrapped) = href.strip_prefix("/url?q=") else {
            continue;
        };
        let Some(raw) = wrapped.split('&').next() else {
            continue;
        };
        let Ok(decoded) = urlencoding::decode(raw) else {
            continue;
        };
        let link = decoded.into_owned();

        let Ok(parsed) = url::Url::parse(&link) else {
            continue;
        };
        let Some(host) = parsed.host_str() else {
            continue;
        };
        if EXCLUDED_DOMAINS.iter().any(|d| host.contains(d)) {
            continue;
        }
        if links.contains(&link) {
            continue;
        }

        links.push(link);
        if links.len() >= limit {
            break;
        }
    }

    links
}

/// Render links as the plain-text reference artifact
#[must_use]
pub fn format_reference_links(links: &[String]) -> String {
    let mut out = String::from("Reference links:\n");
    for (i, link) in links.iter().enumerate() {
        out.push_str(&format!("[{}] - {link}\n", i + 1));
    }
    out
}
