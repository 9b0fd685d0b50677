//! HTTP transfers: the catalog document and the data files it lists.

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{FetchError, FetchResult};

/// Fetches the catalog XML. Any status other than 200 is fatal for the caller.
pub async fn fetch_catalog(client: &Client, url: &Url) -> FetchResult<String> {
    let response = client.get(url.clone()).send().await?;

    if response.status() != StatusCode::OK {
        return Err(FetchError::CatalogUnavailable {
            url: url.to_string(),
            status: response.status(),
        });
    }

    Ok(response.text().await?)
}

/// Streams `url` into `file_path`, replacing any existing file. Returns the number of bytes written.
pub async fn download_file(
    client: &Client,
    url: &Url,
    file_path: &Path,
    progress_bar: &ProgressBar,
) -> FetchResult<u64> {
    let response = client.get(url.clone()).send().await?;

    if response.status() != StatusCode::OK {
        return Err(FetchError::FileDownloadFailed {
            url: url.to_string(),
            status: response.status(),
        });
    }

    // Switch the spinner to a byte bar once the size is known
    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
            )
            .unwrap()
            .progress_chars("=> "),
        );
    }

    let mut file = File::create(file_path).map_err(|e| FetchError::filesystem(file_path, e))?;

    match write_body(response, &mut file, file_path, progress_bar).await {
        Ok(written) => Ok(written),
        Err(e) => {
            // Don't leave a truncated file that looks like a finished download
            drop(file);
            let _ = fs::remove_file(file_path);
            Err(e)
        }
    }
}

async fn write_body(
    response: reqwest::Response,
    file: &mut File,
    file_path: &Path,
    progress_bar: &ProgressBar,
) -> FetchResult<u64> {
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).map_err(|e| FetchError::filesystem(file_path, e))?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }
    file.flush().map_err(|e| FetchError::filesystem(file_path, e))?;

    Ok(downloaded)
}

// -- Tests -------------------------------------------------------------------
