use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("No client certificate available: pass --cert or set DISA_PATCH_CERT")]
    CredentialAmbiguity,

    #[error("Login to {url} failed: {reason}")]
    Authentication { url: String, reason: String },

    #[error("Unknown repository: {name}{}", did_you_mean(.suggestion))]
    UnknownRepository {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Catalog query failed: {0}")]
    CatalogUnavailable(String),

    #[error("Failed to parse catalog response: {0}")]
    CatalogParse(String),

    #[error("Detail page for asset {asset_id} unreachable: {reason}")]
    DetailPageUnreachable { asset_id: String, reason: String },

    #[error("Metadata probe for {url} failed: {reason}")]
    LinkMetadataUnavailable { url: String, reason: String },

    #[error("Invalid client certificate: {0}")]
    Certificate(String),

    #[error("Invalid value for {var}: {value}")]
    Config { var: &'static str, value: String },

    #[error("Not connected: call connect first")]
    NotConnected,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean {s}?)"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, PatchError>;
