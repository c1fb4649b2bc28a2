//! Parallel file downloads with progress tracking

use crate::record::FileRecord;
use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Outcome of a batch download
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(String, anyhow::Error)>,
}

/// Reject filenames that would escape the target directory.
fn target_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n == filename)
        .ok_or_else(|| anyhow!("Refusing unsafe filename: {}", filename))?;
    Ok(dir.join(name))
}

/// True when `path` exists with exactly `size` bytes.
async fn already_saved(path: &Path, size: u64) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => size > 0 && meta.len() == size,
        Err(_) => false,
    }
}

/// Download a single file with an optional progress bar.
///
/// Returns the path and whether the file was already present.
pub async fn save_file(
    client: &reqwest::Client,
    record: &FileRecord,
    dir: &Path,
    progress: Option<&MultiProgress>,
) -> Result<(PathBuf, bool)> {
    let output_path = target_path(dir, &record.filename)?;

    if already_saved(&output_path, record.size_bytes).await {
        return Ok((output_path, true));
    }

    let pb = if let Some(mp) = progress {
        let pb = mp.add(ProgressBar::new(record.size_bytes));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("⬇ {}", record.filename));
        Some(pb)
    } else {
        None
    };

    let mut response = client
        .get(&record.download_link)
        .send()
        .await
        .context("Failed to send request")?
        .error_for_status()
        .with_context(|| format!("Download of {} refused", record.filename))?;

    if let Some(pb) = &pb {
        if let Some(total) = response.content_length() {
            pb.set_length(total);
        }
    }

    // Write to a partial file so an interrupted transfer is never mistaken
    // for a finished one.
    let partial = output_path.with_file_name(format!("{}.part", record.filename));
    let mut file = fs::File::create(&partial)
        .await
        .context("Failed to create output file")?;
    let transfer = async {
        let mut downloaded: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(pb) = &pb {
                pb.set_position(downloaded);
            }
        }
        file.flush().await?;
        Ok::<_, anyhow::Error>(downloaded)
    };

    let result = transfer.await;
    drop(file);
    let downloaded = match result {
        Ok(downloaded) => downloaded,
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            return Err(e.context(format!("Transfer of {} interrupted", record.filename)));
        }
    };

    if record.size_bytes > 0 && downloaded != record.size_bytes {
        fs::remove_file(&partial).await?;
        anyhow::bail!(
            "Size mismatch for {}: expected {} bytes, got {}",
            record.filename,
            record.size_bytes,
            downloaded
        );
    }

    fs::rename(&partial, &output_path).await?;

    if let Some(pb) = &pb {
        pb.finish_with_message(format!("✓ {}", record.filename));
    }

    Ok((output_path, false))
}

/// Download `records` into `dir`, at most `parallel` at a time.
///
/// Individual failures are collected in the report; they do not stop the batch.
pub async fn save_files(
    client: &reqwest::Client,
    records: &[FileRecord],
    dir: &Path,
    parallel: usize,
    show_progress: bool,
) -> Result<SaveReport> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mp = show_progress.then(MultiProgress::new);

    let results: Vec<_> = futures::stream::iter(records)
        .map(|record| {
            let mp = mp.as_ref();
            async move {
                let result = save_file(client, record, dir, mp).await;
                (record.filename.clone(), result)
            }
        })
        .buffer_unordered(parallel.max(1))
        .collect()
        .await;

    let mut report = SaveReport::default();
    for (name, result) in results {
        match result {
            Ok((path, true)) => report.skipped.push(path),
            Ok((path, false)) => report.saved.push(path),
            Err(e) => {
                tracing::warn!("Failed to save {}: {}", name, e);
                report.failed.push((name, e));
            }
        }
    }

    Ok(report)
}
