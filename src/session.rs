//! Authenticated portal sessions
//!
//! A [`Session`] binds one client certificate and one repository to a
//! cookie-carrying HTTP client. Sessions are created by
//! [`Portal::connect`](crate::portal::Portal::connect) and replaced
//! wholesale on re-authentication.

use crate::config::Config;
use crate::error::{PatchError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const LOGIN_PATH: &str = "/PkiLogin/Default.aspx";

const CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const CERT_END: &str = "-----END CERTIFICATE-----";

/// Repositories (collections) published by the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repository {
    MicrosoftSecurityBulletins,
    MicrosoftSecurityAdvisories,
    MicrosoftApplications,
    MicrosoftToolkits,
}

impl Repository {
    pub const ALL: [Repository; 4] = [
        Repository::MicrosoftSecurityBulletins,
        Repository::MicrosoftSecurityAdvisories,
        Repository::MicrosoftApplications,
        Repository::MicrosoftToolkits,
    ];

    /// Collection id used by the listing service
    pub fn id(self) -> u32 {
        match self {
            Repository::MicrosoftSecurityBulletins => 15,
            Repository::MicrosoftSecurityAdvisories => 734,
            Repository::MicrosoftApplications => 732,
            Repository::MicrosoftToolkits => 733,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Repository::MicrosoftSecurityBulletins => "MicrosoftSecurityBulletins",
            Repository::MicrosoftSecurityAdvisories => "MicrosoftSecurityAdvisories",
            Repository::MicrosoftApplications => "MicrosoftApplications",
            Repository::MicrosoftToolkits => "MicrosoftToolkits",
        }
    }

    /// Only bulletin titles follow the conventions the classifier understands.
    pub fn is_security_bulletins(self) -> bool {
        self == Repository::MicrosoftSecurityBulletins
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Repository {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        if let Some(repo) = Self::ALL
            .iter()
            .find(|r| r.name().eq_ignore_ascii_case(wanted))
        {
            return Ok(*repo);
        }

        let suggestion = Self::ALL
            .iter()
            .map(|r| {
                let score = strsim::jaro_winkler(&wanted.to_lowercase(), &r.name().to_lowercase());
                (score, r.name())
            })
            .filter(|(score, _)| *score > 0.85)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.to_string());

        Err(PatchError::UnknownRepository {
            name: wanted.to_string(),
            suggestion,
        })
    }
}

/// Client-certificate identity presented to the portal.
///
/// The thumbprint is the upper-case hex SHA-256 of the first certificate
/// block in the PEM bundle. Identities built with
/// [`from_thumbprint`](Self::from_thumbprint) carry no key material and
/// present no certificate, which suits TLS-terminating proxies.
#[derive(Clone)]
pub struct CertificateIdentity {
    thumbprint: String,
    pem: Option<Arc<Vec<u8>>>,
}

impl CertificateIdentity {
    pub fn from_pem(pem: Vec<u8>) -> Result<Self> {
        let text = std::str::from_utf8(&pem)
            .map_err(|_| PatchError::Certificate("PEM bundle is not UTF-8".to_string()))?;

        let start = text
            .find(CERT_BEGIN)
            .ok_or_else(|| PatchError::Certificate("no certificate block found".to_string()))?;
        let end = text[start..]
            .find(CERT_END)
            .map(|i| start + i + CERT_END.len())
            .ok_or_else(|| PatchError::Certificate("unterminated certificate block".to_string()))?;
        if !text.contains("PRIVATE KEY-----") {
            return Err(PatchError::Certificate(
                "bundle has no private key".to_string(),
            ));
        }

        let digest = Sha256::digest(text[start..end].as_bytes());
        let thumbprint = format!("{:X}", digest);

        Ok(Self {
            thumbprint,
            pem: Some(Arc::new(pem)),
        })
    }

    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            PatchError::Certificate(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_pem(pem)
    }

    pub fn from_thumbprint(thumbprint: impl Into<String>) -> Self {
        Self {
            thumbprint: thumbprint.into().to_uppercase(),
            pem: None,
        }
    }

    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    fn tls_identity(&self) -> Result<Option<reqwest::Identity>> {
        self.pem
            .as_ref()
            .map(|pem| {
                reqwest::Identity::from_pem(pem)
                    .map_err(|e| PatchError::Certificate(e.to_string()))
            })
            .transpose()
    }
}

impl fmt::Debug for CertificateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateIdentity")
            .field("thumbprint", &self.thumbprint)
            .field("has_key", &self.pem.is_some())
            .finish()
    }
}

/// An authenticated session with one repository
#[derive(Debug, Clone)]
pub struct Session {
    pub repository: Repository,
    pub identity: CertificateIdentity,
    /// Advisory row count learned at connect time. Never refreshed, so rows
    /// added to the catalog later in a long session are missed by default
    /// listing queries.
    pub total_rows: u32,
    pub(crate) client: reqwest::Client,
}

impl Session {
    pub fn thumbprint(&self) -> &str {
        self.identity.thumbprint()
    }

    pub fn repository_id(&self) -> u32 {
        self.repository.id()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Build a cookie-carrying HTTP client bound to `identity`.
pub(crate) fn build_client(
    config: &Config,
    identity: &CertificateIdentity,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(Duration::from_secs(15))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(config.user_agent.as_str())
        .cookie_store(true);

    if let Some(tls) = identity.tls_identity()? {
        builder = builder.identity(tls);
    }

    Ok(builder.build()?)
}

/// Perform the certificate login handshake; session cookies land in the
/// client's cookie store.
pub(crate) async fn login(config: &Config, client: &reqwest::Client) -> Result<()> {
    let url = config.url(LOGIN_PATH);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| PatchError::Authentication {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(PatchError::Authentication {
            url,
            reason: format!("HTTP {}", response.status()),
        });
    }

    Ok(())
}
