//! Command implementations for the disapatch CLI
//!
//! - **list**: enumerate a repository's files
//! - **save**: enumerate, then download
//! - **repositories**: show the known repositories

pub mod list;
pub mod repositories;
pub mod save;

pub use list::list;
pub use repositories::repositories;
pub use save::save;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use colored::Colorize;
use disa_patch::{
    CatalogQuery, CertificateIdentity, Portal, Repository, Session, Sort, SortColumn,
    SortDirection,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortField {
    Title,
    Created,
}

/// Catalog selection shared by `list` and `save`
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Repository name (see `disapatch repositories`)
    #[arg(short, long, default_value = "MicrosoftSecurityBulletins")]
    pub repository: String,

    /// Only entries created on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Only entries whose title contains this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Sort column (service order when omitted)
    #[arg(long, value_enum)]
    pub sort: Option<SortField>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub descending: bool,

    /// Rows per page (defaults to every row in the repository)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Page number
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

impl QueryArgs {
    pub fn query(&self) -> CatalogQuery {
        CatalogQuery {
            since: self.since,
            search: self.search.clone(),
            sort: self.sort.map(|field| Sort {
                column: match field {
                    SortField::Title => SortColumn::Title,
                    SortField::Created => SortColumn::CreatedDate,
                },
                direction: if self.descending {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
            }),
            limit: self.limit,
            page: self.page,
        }
    }
}

/// Connect with a spinner on terminals.
pub(crate) async fn connect(
    portal: &Portal,
    repository: &str,
    identity: Option<CertificateIdentity>,
) -> Result<Session> {
    let repository: Repository = repository.parse()?;

    let spinner = if std::io::stderr().is_terminal() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        pb.set_message(format!("Connecting to {}...", repository));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let session = portal.connect(repository, identity).await;
    spinner.finish_and_clear();
    let session = session?;

    if std::io::stderr().is_terminal() {
        eprintln!(
            "{} Connected to {} ({} entries)",
            "✓".green(),
            repository.to_string().bold(),
            session.total_rows
        );
    }
    Ok(session)
}
