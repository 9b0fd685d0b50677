//! Runtime settings for talking to the THREDDS server.

use std::time::Duration;

use url::Url;

use crate::{catalog::DEFAULT_SERVER, error::FetchResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// THREDDS root, always ending in `/`. Catalog and file server paths hang off it.
    pub server: Url,
    /// Longest wait for the server between reads. A slow but steady transfer never hits it.
    pub timeout: Duration,
    /// Draw progress bars on the terminal.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: Url::parse(DEFAULT_SERVER).expect("default server url is valid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            progress: true,
        }
    }
}

impl Config {
    pub fn with_server(mut self, server: &str) -> FetchResult<Self> {
        let mut url = Url::parse(server)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.server = url;

        Ok(self)
    }

    pub fn client(&self) -> FetchResult<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(format!("cmip6/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(self.timeout)
            .build()?;

        Ok(client)
    }
}
