//! Page fetch client.
//!
//! [`HttpPageFetcher`] downloads a single page (following redirects), parses
//! it once, and returns the raw HTML together with its title, visible text,
//! outgoing links, and product and career mentions.

use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use duediligence_shared::{DueDiligenceError, FetchConfig, Result};

use crate::extract;

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("DueDiligence/", env!("CARGO_PKG_VERSION"));

static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fetched page with its parsed surface.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub html: String,
    /// Text of the `<title>` element.
    pub title: Option<String>,
    /// Visible text, whitespace-collapsed (not truncated).
    pub text: String,
    /// Absolute outgoing links, fragments stripped.
    pub links: Vec<String>,
    /// Product and service mentions, first-seen order, capped.
    pub products: Vec<String>,
    /// Career and job mentions, first-seen order, capped.
    pub careers: Vec<String>,
}

impl FetchedPage {
    /// Parse `html` once and collect its surface. Links resolve against
    /// `url`; an unparseable `url` yields no links.
    pub fn from_html(url: &str, status: u16, html: String) -> Self {
        let doc = Html::parse_document(&html);
        let links = Url::parse(url)
            .map(|base| extract_links(&doc, &base))
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            status,
            title: extract::page_title(&doc),
            text: extract::visible_text(&doc),
            links,
            products: extract::product_mentions(&doc),
            careers: extract::career_mentions(&doc),
            html,
        }
    }
}

/// Retrieves a page by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`. Transport errors, timeouts, non-success statuses and
    /// blocked targets are all faults.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// reqwest-backed page fetcher.
pub struct HttpPageFetcher {
    client: Client,
    allow_private_targets: bool,
}

impl HttpPageFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let allow_private = config.allow_private_targets;
        let max_redirects = config.max_redirects;

        // Redirect hops get the same target check as the initial URL.
        let redirect = Policy::custom(move |attempt| {
            if attempt.previous().len() >= max_redirects {
                attempt.error("too many redirects")
            } else if !allow_private && is_ssrf_target(attempt.url()) {
                attempt.error("redirect to a blocked target")
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DueDiligenceError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            allow_private_targets: allow_private,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url)
            .map_err(|e| DueDiligenceError::validation(format!("invalid URL '{url}': {e}")))?;

        if !self.allow_private_targets && is_ssrf_target(&parsed) {
            return Err(DueDiligenceError::Network(format!(
                "{url}: blocked target (private or non-HTTP address)"
            )));
        }

        debug!("fetching page");

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| DueDiligenceError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DueDiligenceError::Network(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| DueDiligenceError::Network(format!("{url}: body read failed: {e}")))?;

        let page = FetchedPage::from_html(final_url.as_str(), status.as_u16(), html);

        debug!(
            status = page.status,
            bytes = page.html.len(),
            links = page.links.len(),
            "page fetched"
        );

        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract all links from a document, resolved against the base URL.
pub(crate) fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        if let Some(href) = el.value().attr("href") {
            // Skip anchors, javascript:, mailto:
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                links.push(resolved.to_string());
            }
        }
    }

    links
}

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
