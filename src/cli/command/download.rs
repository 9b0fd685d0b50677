//! Download the files for a range of years into a folder.

use std::path::Path;

use anyhow::{bail, Result};

use crate::{cli::Selection, fetcher::Fetcher};

pub async fn download(selection: &Selection, output: &Path) -> Result<String> {
    let fetcher = Fetcher::new(selection.config()?)?;
    let summary = fetcher
        .fetch_and_download(&selection.query(), selection.range(), output)
        .await?;

    for failed in &summary.failed {
        eprintln!("Failed to download {}: {}", failed.file_url, failed.error);
    }
    if !summary.malformed.is_empty() {
        eprintln!(
            "Skipped {} catalog entries without a year",
            summary.malformed.len()
        );
    }

    if !summary.failed.is_empty() {
        bail!(
            "{} of {} downloads failed",
            summary.failed.len(),
            summary.failed.len() + summary.downloaded.len()
        );
    }

    Ok(format!(
        "{} files ({:.1} MB) saved to `{}`",
        summary.downloaded.len(),
        summary.bytes as f64 / 1_048_576.0,
        output.display()
    ))
}
