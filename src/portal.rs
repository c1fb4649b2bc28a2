//! Portal context: session, caches and the enumeration pipeline
//!
//! # Examples
//!
//! ```no_run
//! use disa_patch::{CatalogQuery, CertificateIdentity, Config, Portal, Repository};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let portal = Portal::new(Config::from_env()?);
//!     let identity = CertificateIdentity::from_pem_file("client.pem".as_ref())?;
//!     portal
//!         .connect(Repository::MicrosoftSecurityBulletins, Some(identity))
//!         .await?;
//!
//!     let query = CatalogQuery {
//!         search: Some("Windows 10".to_string()),
//!         ..Default::default()
//!     };
//!     let files = portal.files(&query).await?;
//!     futures::pin_mut!(files);
//!     while let Some(file) = files.next().await {
//!         println!("{} ({} MB)", file.filename, file.size_mb);
//!     }
//!     Ok(())
//! }
//! ```

use crate::cache::ResultCache;
use crate::catalog::{self, CatalogQuery, CatalogRow, ListingRequest};
use crate::config::Config;
use crate::error::{PatchError, Result};
use crate::record::FileRecord;
use crate::resolver::{LinkCache, LinkDetail, LinkResolver};
use crate::session::{self, CertificateIdentity, Repository, Session};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns everything that outlives a single enumeration: the current session,
/// the link cache and the per-row result cache.
pub struct Portal {
    config: Config,
    session: RwLock<Option<Session>>,
    links: LinkCache,
    results: ResultCache,
}

impl Portal {
    pub fn new(config: Config) -> Self {
        let results = ResultCache::new(config.row_cache_key);
        Self {
            config,
            session: RwLock::new(None),
            links: LinkCache::new(),
            results,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current session, if connected.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Authenticate and bind the portal to `repository`.
    ///
    /// Without an explicit identity the previous session's certificate is
    /// reused, then the configured PEM bundle.
    pub async fn connect(
        &self,
        repository: Repository,
        identity: Option<CertificateIdentity>,
    ) -> Result<Session> {
        let identity = self.resolve_identity(identity).await?;
        let client = session::build_client(&self.config, &identity)?;
        session::login(&self.config, &client).await?;

        let mut session = Session {
            repository,
            identity,
            total_rows: 0,
            client,
        };
        let listing = catalog::fetch_listing(
            &self.config,
            &session,
            &ListingRequest::count(repository.id()),
        )
        .await
        .map_err(|e| PatchError::CatalogUnavailable(format!("count query failed: {e}")))?;
        session.total_rows = listing.total;

        tracing::info!(
            "Connected to {} (collection {}) as {}, {} rows",
            repository,
            repository.id(),
            session.thumbprint(),
            session.total_rows
        );

        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// [`connect`](Self::connect) with the repository given by name.
    pub async fn connect_named(
        &self,
        repository: &str,
        identity: Option<CertificateIdentity>,
    ) -> Result<Session> {
        self.connect(repository.parse()?, identity).await
    }

    async fn resolve_identity(
        &self,
        supplied: Option<CertificateIdentity>,
    ) -> Result<CertificateIdentity> {
        if let Some(identity) = supplied {
            return Ok(identity);
        }
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.identity.clone());
        }
        match &self.config.certificate {
            Some(path) => CertificateIdentity::from_pem_file(path),
            None => Err(PatchError::CredentialAmbiguity),
        }
    }

    async fn current_session(&self) -> Result<Session> {
        self.session().await.ok_or(PatchError::NotConnected)
    }

    /// Query the catalog, re-authenticating once if the first attempt fails.
    pub async fn list_rows(
        &self,
        query: &CatalogQuery,
    ) -> Result<std::vec::IntoIter<CatalogRow>> {
        let session = self.current_session().await?;
        let rows = query.limit.unwrap_or(session.total_rows);
        let request = ListingRequest::new(session.repository_id(), query, rows)?;

        let listing = match catalog::fetch_listing(&self.config, &session, &request).await {
            Ok(listing) => listing,
            Err(first) => {
                tracing::warn!("Catalog query failed ({}), re-authenticating", first);
                let session = self
                    .connect(session.repository, Some(session.identity.clone()))
                    .await
                    .map_err(|e| {
                        PatchError::CatalogUnavailable(format!("re-authentication failed: {e}"))
                    })?;
                catalog::fetch_listing(&self.config, &session, &request)
                    .await
                    .map_err(unavailable)?
            }
        };

        tracing::debug!("Catalog returned {} rows", listing.rows.len());
        Ok(listing.rows.into_iter())
    }

    /// Enumerate files for `query` as a forward-only stream.
    ///
    /// Session and catalog failures are returned before any record. Rows
    /// whose detail page cannot be fetched are logged and skipped.
    pub async fn files(
        &self,
        query: &CatalogQuery,
    ) -> Result<impl Stream<Item = FileRecord> + '_> {
        let rows = self.list_rows(query).await?;
        let session = self.current_session().await?;

        Ok(stream! {
            let resolver = LinkResolver::new(&self.config, session.client(), &self.links);
            let bulletins = session.repository.is_security_bulletins();
            let (mut seen, mut yielded) = (0usize, 0usize);

            for row in rows {
                seen += 1;
                match self.row_records(&resolver, bulletins, &row).await {
                    Ok(records) if records.is_empty() => {
                        tracing::info!("No downloadable files for '{}', skipping", row.title);
                    }
                    Ok(records) => {
                        for record in records.iter() {
                            yielded += 1;
                            yield record.clone();
                        }
                    }
                    Err(e) => tracing::warn!("Skipping '{}': {}", row.title, e),
                }
            }

            tracing::info!("{} files from {} rows", yielded, seen);
        })
    }

    /// Collect [`files`](Self::files) into a vector.
    pub async fn collect_files(&self, query: &CatalogQuery) -> Result<Vec<FileRecord>> {
        Ok(self.files(query).await?.collect().await)
    }

    async fn row_records(
        &self,
        resolver: &LinkResolver<'_>,
        bulletins: bool,
        row: &CatalogRow,
    ) -> Result<Arc<Vec<FileRecord>>> {
        self.results
            .get_or_compute(row, async {
                let details = resolver.resolve(row).await?;
                let records: Vec<FileRecord> = details
                    .into_iter()
                    .filter_map(|detail| match detail {
                        LinkDetail::Attachment {
                            url,
                            filename,
                            size_bytes,
                        } if bulletins => {
                            Some(FileRecord::bulletin(row, &url, &filename, size_bytes))
                        }
                        LinkDetail::Attachment {
                            url,
                            filename,
                            size_bytes,
                        } => Some(FileRecord::plain(row, &url, &filename, size_bytes)),
                        LinkDetail::NoAttachment => None,
                    })
                    .collect();
                Ok::<_, PatchError>(records)
            })
            .await
    }
}

fn unavailable(e: PatchError) -> PatchError {
    match e {
        PatchError::CatalogUnavailable(_) => e,
        other => PatchError::CatalogUnavailable(other.to_string()),
    }
}
