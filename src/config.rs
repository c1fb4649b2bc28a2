//! Runtime configuration
//!
//! Defaults are overridden by `DISA_PATCH_*` environment variables, then by
//! command-line flags in the binary.

use crate::error::{PatchError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://patches.csd.disa.mil";

/// Which field of a catalog row keys the per-row result cache.
///
/// `Title` reproduces the portal tool's behavior: two assets sharing a title
/// share one cache entry, so the second is never resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowCacheKey {
    #[default]
    Title,
    AssetId,
}

impl FromStr for RowCacheKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "asset-id" | "assetid" | "id" => Ok(Self::AssetId),
            other => Err(other.to_string()),
        }
    }
}

/// Retry schedule shared by the detail-page fetch and the metadata probe.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Delay before the first retry, doubled for each one after
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    /// PEM bundle holding the client certificate and its private key
    pub certificate: Option<PathBuf>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub row_cache_key: RowCacheKey,
    pub max_parallel_downloads: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            certificate: None,
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            row_cache_key: RowCacheKey::Title,
            max_parallel_downloads: 4,
            user_agent: format!("disapatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Build a configuration from defaults plus `DISA_PATCH_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("DISA_PATCH_BASE_URL") {
            config.base_url = url;
        }
        if let Some(cert) = lookup("DISA_PATCH_CERT") {
            config.certificate = Some(PathBuf::from(cert));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "DISA_PATCH_TIMEOUT")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>(&lookup, "DISA_PATCH_RETRIES")? {
            config.retry.retries = retries;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "DISA_PATCH_RETRY_BACKOFF_MS")? {
            config.retry.backoff = Duration::from_millis(ms);
        }
        if let Some(key) = parse_var::<RowCacheKey>(&lookup, "DISA_PATCH_ROW_KEY")? {
            config.row_cache_key = key;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "DISA_PATCH_PARALLEL")? {
            config.max_parallel_downloads = n.max(1);
        }

        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Absolute URL for a service-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PatchError::Config { var, value }),
    }
}
