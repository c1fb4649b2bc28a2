//! Resolution of catalog rows to downloadable files
//!
//! Each row has a detail page listing its attachments. Candidate anchors are
//! probed with `HEAD` to learn the served filename and size; the outcome is
//! cached per normalised URL for the life of the [`LinkCache`], including the
//! negative outcome for links that turn out not to be attachments.

use crate::catalog::CatalogRow;
use crate::config::{Config, RetryPolicy};
use crate::error::{PatchError, Result};
use crate::retry::retry;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use scraper::{Html, Selector};
use std::sync::LazyLock;

pub const DETAIL_PATH: &str = "/Metadata.aspx";

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

static INSTALLER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(msu|exe|msi|msp|cab|zip|tar)\b").expect("static regex")
});

/// Probe outcome for one download URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDetail {
    Attachment {
        url: String,
        filename: String,
        size_bytes: u64,
    },
    /// The URL was probed and serves no attachment
    NoAttachment,
}

/// Process-lifetime cache of probe outcomes keyed by normalised URL.
///
/// Entries are written once and never evicted.
#[derive(Clone)]
pub struct LinkCache {
    entries: moka::future::Cache<String, LinkDetail>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self {
            entries: moka::future::Cache::builder().build(),
        }
    }

    pub async fn get(&self, url: &str) -> Option<LinkDetail> {
        self.entries.get(url).await
    }

    pub async fn insert(&self, url: String, detail: LinkDetail) {
        self.entries.insert(url, detail).await;
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves rows against the detail pages and probe endpoint of one portal.
pub struct LinkResolver<'a> {
    config: &'a Config,
    client: &'a reqwest::Client,
    cache: &'a LinkCache,
}

impl<'a> LinkResolver<'a> {
    pub fn new(config: &'a Config, client: &'a reqwest::Client, cache: &'a LinkCache) -> Self {
        Self {
            config,
            client,
            cache,
        }
    }

    fn policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    /// Resolve every attachment of `row`, in page order.
    ///
    /// An unreachable detail page is an error for the row; a failed probe
    /// only drops that link.
    pub async fn resolve(&self, row: &CatalogRow) -> Result<Vec<LinkDetail>> {
        let html = self.detail_page(&row.asset_id).await?;
        let links = extract_links(&html, &self.config.base_url);
        tracing::debug!("asset {}: {} candidate links", row.asset_id, links.len());

        let mut details = Vec::with_capacity(links.len());
        for url in links {
            match self.link_detail(&url).await {
                Ok(LinkDetail::NoAttachment) => {
                    tracing::debug!("{} has no attachment, skipping", url);
                }
                Ok(detail) => details.push(detail),
                Err(e) => tracing::warn!("Skipping link for '{}': {}", row.title, e),
            }
        }
        Ok(details)
    }

    async fn detail_page(&self, asset_id: &str) -> Result<String> {
        let url = format!("{}?id={}", self.config.url(DETAIL_PATH), asset_id);
        let label = format!("GET {url}");

        retry(self.policy(), &label, || async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.text().await
        })
        .await
        .map_err(|e| PatchError::DetailPageUnreachable {
            asset_id: asset_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Cached probe of one normalised URL.
    pub async fn link_detail(&self, url: &str) -> Result<LinkDetail> {
        if let Some(cached) = self.cache.get(url).await {
            return Ok(cached);
        }

        let detail = self.probe(url).await?;
        self.cache.insert(url.to_string(), detail.clone()).await;
        Ok(detail)
    }

    async fn probe(&self, url: &str) -> Result<LinkDetail> {
        let label = format!("HEAD {url}");
        let response = retry(self.policy(), &label, || async {
            self.client.head(url).send().await?.error_for_status()
        })
        .await
        .map_err(|e| PatchError::LinkMetadataUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let headers = response.headers();
        let Some(disposition) = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(LinkDetail::NoAttachment);
        };

        let size_bytes = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);

        Ok(LinkDetail::Attachment {
            url: url.to_string(),
            filename: attachment_filename(disposition),
            size_bytes,
        })
    }
}

/// Installer links of a detail page, normalised, in first-appearance order.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        if !INSTALLER_REGEX.is_match(&element.html()) {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let url = normalize_link(href, base_url);
        if !links.contains(&url) {
            links.push(url);
        }
    }

    links
}

/// Unescape `&amp;` and anchor service-relative paths on `base_url`.
///
/// Protocol-relative links take the scheme of `base_url`.
pub fn normalize_link(href: &str, base_url: &str) -> String {
    let href = href.trim().replace("&amp;", "&");
    if href.starts_with("http://") || href.starts_with("https://") {
        return href;
    }
    if let Some(authority) = href.strip_prefix("//") {
        let scheme = base_url.split_once("://").map_or("https", |(scheme, _)| scheme);
        return format!("{scheme}://{authority}");
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

/// Filename from a `Content-Disposition` value.
pub fn attachment_filename(disposition: &str) -> String {
    let value = disposition.trim();
    let value = value
        .strip_prefix("attachment;filename=")
        .or_else(|| value.strip_prefix("attachment; filename="))
        .unwrap_or(value);
    value.trim().trim_matches('"').to_string()
}
