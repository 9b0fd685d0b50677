//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    catalog::{DatasetQuery, YearRange, DEFAULT_SERVER},
    config::{Config, DEFAULT_TIMEOUT_SECS},
    error::FetchResult,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the files for a range of years
    Download {
        #[command(flatten)]
        selection: Selection,
        /// Folder the files are saved to, created if missing
        #[arg(short, long, default_value = "cmip6-data")]
        output: PathBuf,
    },
    /// List the files for a range of years without downloading them
    List {
        #[command(flatten)]
        selection: Selection,
    },
}

#[derive(Args, Debug, Clone)]
/// Which dataset to read and where from
pub struct Selection {
    /// Climate model, e.g. ACCESS-CM2
    #[arg(long)]
    pub model: String,
    /// Experiment, e.g. historical, ssp245
    #[arg(long)]
    pub timeframe: String,
    /// Ensemble member, e.g. r1i1p1f1
    #[arg(long)]
    pub ensemble: String,
    /// Climate variable, e.g. pr, tasmax
    #[arg(long)]
    pub variable: String,
    /// First year to fetch (inclusive)
    #[arg(long)]
    pub start_year: i32,
    /// Last year to fetch (inclusive)
    #[arg(long)]
    pub end_year: i32,
    /// THREDDS server root
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,
    /// Seconds to wait on a stalled connection before giving up
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// Don't draw progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl Selection {
    pub fn query(&self) -> DatasetQuery {
        DatasetQuery {
            model: self.model.clone(),
            timeframe: self.timeframe.clone(),
            ensemble: self.ensemble.clone(),
            variable: self.variable.clone(),
        }
    }

    pub fn range(&self) -> YearRange {
        YearRange::new(self.start_year, self.end_year)
    }

    pub fn config(&self) -> FetchResult<Config> {
        Config {
            timeout: Duration::from_secs(self.timeout),
            progress: !self.no_progress,
            ..Config::default()
        }
        .with_server(&self.server)
    }
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}
