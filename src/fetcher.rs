//! Resolves a catalog and downloads the files for a range of years.
//!
//! Runs in two sequential phases. The catalog phase is all-or-nothing: an
//! unreachable catalog aborts before anything is written. The download phase
//! isolates failures per file so that one bad file doesn't stop the batch.

use std::{
    fs,
    path::{Path, PathBuf},
};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    catalog::{self, DatasetQuery, DownloadRequest, Plan, YearRange},
    cli::{create_progress_bar, create_spinner},
    config::Config,
    download::{download_file, fetch_catalog},
    error::{FetchError, FetchResult},
};

#[derive(Debug)]
pub struct FailedDownload {
    pub file_url: String,
    pub error: FetchError,
}

#[derive(Debug, Default)]
/// What a download run did.
pub struct Summary {
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<FailedDownload>,
    pub malformed: Vec<String>,
    pub bytes: u64,
}

pub struct Fetcher {
    client: Client,
    config: Config,
}

impl Fetcher {
    pub fn new(config: Config) -> FetchResult<Self> {
        let client = config.client()?;

        Ok(Fetcher::with_client(client, config))
    }

    pub fn with_client(client: Client, config: Config) -> Self {
        Fetcher { client, config }
    }

    /// Resolves the catalog and selects the files within `range`. Nothing is written.
    pub async fn plan(
        &self,
        query: &DatasetQuery,
        range: YearRange,
        output: &Path,
    ) -> FetchResult<Plan> {
        let url = catalog::catalog_url(&self.config.server, query)?;
        debug!(%url, "fetching catalog");

        let bar = self.spinner("Fetching catalog...");
        let xml = fetch_catalog(&self.client, &url).await;
        bar.finish_and_clear();

        let url_paths = catalog::parse_catalog(&xml?)?;
        let plan = catalog::plan_downloads(url_paths, range, &self.config.server, output);

        for url_path in &plan.malformed {
            warn!(url_path = %url_path, "skipping catalog entry without a year");
        }
        info!(
            "{} of {} catalog entries fall within {}-{}",
            plan.requests.len(),
            plan.total_entries,
            range.start,
            range.end
        );

        Ok(plan)
    }

    /// Downloads every catalog file whose year lies within `range` into `output`.
    pub async fn fetch_and_download(
        &self,
        query: &DatasetQuery,
        range: YearRange,
        output: &Path,
    ) -> FetchResult<Summary> {
        fs::create_dir_all(output).map_err(|e| FetchError::filesystem(output, e))?;

        let plan = self.plan(query, range, output).await?;
        let mut summary = Summary {
            malformed: plan.malformed,
            ..Summary::default()
        };

        // The file count and the current transfer share the terminal
        let bars = self.multi_progress();
        let pb = bars.add(create_progress_bar(
            plan.requests.len() as u64,
            "Downloading files...".to_string(),
        ));

        for request in plan.requests {
            match self.download(&request, &bars).await {
                Ok(bytes) => {
                    bars.suspend(|| info!("Downloaded {}", request.local_path.display()));
                    summary.bytes += bytes;
                    summary.downloaded.push(request.local_path);
                }
                Err(error) => {
                    bars.suspend(|| warn!("Failed to download {}: {}", request.file_url, error));
                    summary.failed.push(FailedDownload {
                        file_url: request.file_url.to_string(),
                        error,
                    });
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("Files downloaded");

        Ok(summary)
    }

    async fn download(&self, request: &DownloadRequest, bars: &MultiProgress) -> FetchResult<u64> {
        let name = request
            .local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let bar = bars.add(create_spinner(name));
        let result = download_file(&self.client, &request.file_url, &request.local_path, &bar).await;
        bar.finish_and_clear();
        bars.remove(&bar);

        result
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        if self.config.progress {
            create_spinner(message.to_string())
        } else {
            ProgressBar::hidden()
        }
    }

    fn multi_progress(&self) -> MultiProgress {
        if self.config.progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {

    use super::*;
    use crate::catalog::test::{catalog_fixture, query_fixture, url_path_fixture};
    use mockito::{Matcher, Mock, ServerGuard};
    use tempfile::TempDir;

    const CATALOG_PATH: &str =
        "/thredds/catalog/AMES/NEX/GDDP-CMIP6/ACCESS-CM2/historical/r1i1p1f1/pr/catalog.xml";

    fn fetcher(server: &ServerGuard) -> Fetcher {
        let config = Config {
            progress: false,
            ..Config::default()
        }
        .with_server(&format!("{}/thredds/", server.url()))
        .unwrap();

        Fetcher::with_client(Client::new(), config)
    }

    fn file_path(year: i32) -> String {
        format!("/thredds/fileServer/{}", url_path_fixture(year))
    }

    fn file_name(year: i32) -> String {
        format!("pr_day_ACCESS-CM2_historical_r1i1p1f1_gn_{}.nc", year)
    }

    async fn mock_catalog(server: &mut ServerGuard, years: impl Iterator<Item = i32>) -> Mock {
        let url_paths: Vec<String> = years.map(url_path_fixture).collect();
        server
            .mock("GET", CATALOG_PATH)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(catalog_fixture(&url_paths))
            .create_async()
            .await
    }

    async fn mock_file(server: &mut ServerGuard, year: i32, hits: usize) -> Mock {
        server
            .mock("GET", file_path(year).as_str())
            .with_status(200)
            .with_body(format!("netcdf {}", year))
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn should_download_only_years_in_range() {
        let mut server = mockito::Server::new_async().await;
        let catalog = mock_catalog(&mut server, 1949..=1953).await;
        let mut in_range = Vec::new();
        for year in 1950..=1952 {
            in_range.push(mock_file(&mut server, year, 1).await);
        }
        let out_of_range = vec![
            mock_file(&mut server, 1949, 0).await,
            mock_file(&mut server, 1953, 0).await,
        ];

        let temp_dir = TempDir::new().unwrap();
        let summary = fetcher(&server)
            .fetch_and_download(&query_fixture(), YearRange::new(1950, 1952), temp_dir.path())
            .await
            .unwrap();

        assert_eq!(
            summary.downloaded,
            (1950..=1952)
                .map(|y| temp_dir.path().join(file_name(y)))
                .collect::<Vec<_>>()
        );
        assert!(summary.failed.is_empty());
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(file_name(1951))).unwrap(),
            "netcdf 1951"
        );
        assert!(!temp_dir.path().join(file_name(1949)).exists());

        catalog.assert_async().await;
        for mock in in_range.iter().chain(out_of_range.iter()) {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn should_download_in_catalog_order() {
        let mut server = mockito::Server::new_async().await;
        let _catalog = mock_catalog(&mut server, [1952, 1950, 1951].into_iter()).await;
        let mut files = Vec::new();
        for year in 1950..=1952 {
            files.push(mock_file(&mut server, year, 1).await);
        }

        let temp_dir = TempDir::new().unwrap();
        let summary = fetcher(&server)
            .fetch_and_download(&query_fixture(), YearRange::new(1950, 1952), temp_dir.path())
            .await
            .unwrap();

        assert_eq!(
            summary.downloaded,
            [1952, 1950, 1951]
                .into_iter()
                .map(|y| temp_dir.path().join(file_name(y)))
                .collect::<Vec<_>>()
        );
        for mock in &files {
            mock.assert_async().await;
        }
    }

    #[test]
    fn should_hide_progress_when_disabled() {
        let config = Config {
            progress: false,
            ..Config::default()
        };
        let fetcher = Fetcher::with_client(Client::new(), config);

        assert!(fetcher.multi_progress().is_hidden());
        assert!(fetcher.spinner("x").is_hidden());
    }

    #[tokio::test]
    async fn should_download_nothing_for_inverted_range() {
        let mut server = mockito::Server::new_async().await;
        let _catalog = mock_catalog(&mut server, 1949..=1953).await;
        let files = server
            .mock("GET", Matcher::Regex("^/thredds/fileServer/".to_string()))
            .expect(0)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let summary = fetcher(&server)
            .fetch_and_download(&query_fixture(), YearRange::new(1952, 1950), temp_dir.path())
            .await
            .unwrap();

        assert!(summary.downloaded.is_empty());
        files.assert_async().await;
    }

    #[tokio::test]
    async fn should_abort_when_catalog_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _catalog = server
            .mock("GET", CATALOG_PATH)
            .with_status(503)
            .create_async()
            .await;
        let files = server
            .mock("GET", Matcher::Regex("^/thredds/fileServer/".to_string()))
            .expect(0)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let result = fetcher(&server)
            .fetch_and_download(&query_fixture(), YearRange::new(1950, 1952), &output)
            .await;

        assert!(matches!(result, Err(FetchError::CatalogUnavailable { .. })));
        assert!(output.is_dir());
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
        files.assert_async().await;
    }

    #[tokio::test]
    async fn should_create_nested_output_folder_and_accept_existing_one() {
        let mut server = mockito::Server::new_async().await;
        let _catalog = mock_catalog(&mut server, 1950..=1950).await;
        let _file = mock_file(&mut server, 1950, 2).await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("a").join("b");
        let fetcher = fetcher(&server);

        for _ in 0..2 {
            let summary = fetcher
                .fetch_and_download(&query_fixture(), YearRange::new(1950, 1950), &output)
                .await
                .unwrap();
            assert_eq!(summary.downloaded.len(), 1);
        }

        assert_eq!(
            fs::read_to_string(output.join(file_name(1950))).unwrap(),
            "netcdf 1950"
        );
    }

    #[tokio::test]
    async fn should_continue_after_failed_file() {
        let mut server = mockito::Server::new_async().await;
        let _catalog = mock_catalog(&mut server, 1950..=1952).await;
        let _first = mock_file(&mut server, 1950, 1).await;
        let failing = server
            .mock("GET", file_path(1951).as_str())
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let last = mock_file(&mut server, 1952, 1).await;

        let temp_dir = TempDir::new().unwrap();
        let summary = fetcher(&server)
            .fetch_and_download(&query_fixture(), YearRange::new(1950, 1952), temp_dir.path())
            .await
            .unwrap();

        assert_eq!(summary.downloaded.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].file_url.ends_with(&file_name(1951)));
        assert!(matches!(
            summary.failed[0].error,
            FetchError::FileDownloadFailed { .. }
        ));
        assert!(!temp_dir.path().join(file_name(1951)).exists());

        failing.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn should_skip_malformed_entries() {
        let mut server = mockito::Server::new_async().await;
        let url_paths = vec![
            "AMES/NEX/GDDP-CMIP6/ACCESS-CM2/historical/r1i1p1f1/pr/README.txt".to_string(),
            url_path_fixture(1950),
        ];
        let _catalog = server
            .mock("GET", CATALOG_PATH)
            .with_status(200)
            .with_body(catalog_fixture(&url_paths))
            .create_async()
            .await;
        let _file = mock_file(&mut server, 1950, 1).await;

        let temp_dir = TempDir::new().unwrap();
        let summary = fetcher(&server)
            .fetch_and_download(&query_fixture(), YearRange::new(1900, 2100), temp_dir.path())
            .await
            .unwrap();

        assert_eq!(summary.downloaded.len(), 1);
        assert_eq!(summary.malformed, vec![url_paths[0].clone()]);
    }

    #[tokio::test]
    async fn should_plan_without_writing() {
        let mut server = mockito::Server::new_async().await;
        let _catalog = mock_catalog(&mut server, 1949..=1953).await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("never-created");
        let plan = fetcher(&server)
            .plan(&query_fixture(), YearRange::new(1953, 1953), &output)
            .await
            .unwrap();

        assert_eq!(plan.requests.len(), 1);
        assert_eq!(
            plan.requests[0].file_url.path(),
            file_path(1953).as_str()
        );
        assert!(!output.exists());
    }
}
