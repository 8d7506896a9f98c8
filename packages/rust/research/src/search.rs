//! HTTP search client: resolves search terms into candidate source URLs.
//!
//! Talks to a configurable JSON search endpoint (SearxNG-style:
//! `GET <endpoint>?q=<term>` returning `{"results": [{"url", "title"}]}`).
//! Per-term failures are isolated; a term that errors contributes no
//! candidates but never fails the batch.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use rivet_shared::{Result, RivetError, SourceKind, VendorTag};

use crate::{CandidateSource, Scraper};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Rivet/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Maximum response size we consider valid (2 MB).
const MAX_RESPONSE_SIZE: u64 = 2 * 1024 * 1024;

/// Maximum candidates taken per search term.
const MAX_RESULTS_PER_TERM: usize = 5;

/// One result row from the search endpoint.
#[derive(Debug, Deserialize)]
struct SearchRow {
    url: String,
    #[allow(dead_code)]
    #[serde(default)]
    title: Option<String>,
}

/// Response body from the search endpoint.
#[derive(Debug, Deserialize)]
struct SearchBody {
    results: Vec<SearchRow>,
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`Scraper`] implementation.
pub struct SearchClient {
    client: Client,
    endpoint: Url,
}

impl SearchClient {
    /// Build a client for the given search endpoint.
    pub fn new(endpoint: Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RivetError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Run one search term against the endpoint.
    async fn search_term(&self, term: &str) -> Result<Vec<SearchRow>> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("q", term);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| RivetError::Scrape(format!("{term:?}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RivetError::Scrape(format!("{term:?}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(RivetError::Scrape(format!(
                    "{term:?}: response too large ({len} bytes)"
                )));
            }
        }

        let body: SearchBody = response
            .json()
            .await
            .map_err(|e| RivetError::Scrape(format!("{term:?}: bad response body: {e}")))?;

        Ok(body.results)
    }
}

#[async_trait]
impl Scraper for SearchClient {
    async fn search(&self, terms: &[String]) -> Result<Vec<CandidateSource>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for term in terms {
            let rows = match self.search_term(term).await {
                Ok(rows) => rows,
                Err(e) => {
                    // One bad term must not sink the others.
                    warn!(term = %term, error = %e, "search term failed");
                    continue;
                }
            };

            for row in rows.into_iter().take(MAX_RESULTS_PER_TERM) {
                let Ok(url) = Url::parse(&row.url) else {
                    debug!(url = %row.url, "unparseable result URL, skipping");
                    continue;
                };
                if url.scheme() != "http" && url.scheme() != "https" {
                    continue;
                }
                if seen.insert(rivet_storage::normalize_url(&url)) {
                    let kind = classify_source(&url);
                    candidates.push(CandidateSource { url, kind });
                }
            }
        }

        debug!(terms = terms.len(), candidates = candidates.len(), "search resolved");
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// Source classification
// ---------------------------------------------------------------------------

/// Hosts that are community forums rather than vendor documentation.
const FORUM_HOSTS: &[&str] = &[
    "reddit.com",
    "plctalk.net",
    "practicalmachinist.com",
    "eng-tips.com",
    "stackexchange.com",
];

/// Classify a candidate URL into a [`SourceKind`] by domain and extension.
pub fn classify_source(url: &Url) -> SourceKind {
    let host = url.host_str().unwrap_or("");

    if url.path().to_lowercase().ends_with(".pdf") {
        return SourceKind::Manual;
    }
    if FORUM_HOSTS.iter().any(|h| host.ends_with(h)) || host.contains("forum") {
        return SourceKind::Forum;
    }

    let vendor_domains = [
        VendorTag::Siemens,
        VendorTag::AllenBradley,
        VendorTag::Abb,
        VendorTag::SchneiderElectric,
        VendorTag::Mitsubishi,
        VendorTag::Danfoss,
    ]
    .iter()
    .filter_map(|v| v.site_domain());
    for domain in vendor_domains {
        if host.ends_with(domain) {
            return SourceKind::VendorSite;
        }
    }

    SourceKind::KnowledgeArticle
}
