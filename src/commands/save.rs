use super::QueryArgs;
use anyhow::Result;
use colored::Colorize;
use disa_patch::{CertificateIdentity, Portal, download};
use std::io::IsTerminal;
use std::path::Path;

/// Enumerate files, then download them into `dir`.
pub async fn save(
    portal: &Portal,
    args: &QueryArgs,
    identity: Option<CertificateIdentity>,
    dir: &Path,
) -> Result<()> {
    let session = super::connect(portal, &args.repository, identity).await?;

    let records = portal.collect_files(&args.query()).await?;
    if records.is_empty() {
        println!("No files to download");
        return Ok(());
    }

    let total_mb: f64 = records.iter().map(|r| r.size_mb).sum();
    println!(
        "Downloading {} files ({:.2} MB) to {}",
        records.len().to_string().bold(),
        total_mb,
        dir.display().to_string().dimmed()
    );

    let report = download::save_files(
        session.client(),
        &records,
        dir,
        portal.config().max_parallel_downloads,
        std::io::stdout().is_terminal(),
    )
    .await?;

    println!(
        "{} Saved {}, already present {}",
        "✓".green(),
        report.saved.len().to_string().bold(),
        report.skipped.len()
    );
    for (name, err) in &report.failed {
        println!("  {} {}: {}", "✗".red(), name.bold(), err);
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} downloads failed", report.failed.len());
    }
    Ok(())
}
