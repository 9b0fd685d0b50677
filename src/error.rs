//! Errors raised while resolving a catalog or downloading its files.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to retrieve the catalog `{url}`: status {status}")]
    CatalogUnavailable { url: String, status: StatusCode },

    #[error("failed to download `{url}`: status {status}")]
    FileDownloadFailed { url: String, status: StatusCode },

    #[error("filesystem error at `{}`: {}", .path.display(), .source)]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsafe path `{0}`")]
    UnsafePath(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid catalog xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
