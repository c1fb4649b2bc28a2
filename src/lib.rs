//! Library interface for disa-patch
//!
//! Connects to the DISA patch repository with a client certificate, walks a
//! repository's catalog and resolves each entry to its downloadable files.

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod download;
pub mod error;
pub mod portal;
pub mod record;
pub mod resolver;
pub mod retry;
pub mod session;

// Re-export commonly used types
pub use catalog::{CatalogQuery, CatalogRow, Sort, SortColumn, SortDirection};
pub use config::{Config, RowCacheKey};
pub use error::{PatchError, Result};
pub use portal::Portal;
pub use record::FileRecord;
pub use session::{CertificateIdentity, Repository, Session};
