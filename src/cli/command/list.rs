//! List the files for a range of years without downloading them.

use std::path::Path;

use anyhow::Result;

use crate::{cli::Selection, fetcher::Fetcher};

pub async fn list(selection: &Selection) -> Result<String> {
    let fetcher = Fetcher::new(selection.config()?)?;
    let plan = fetcher
        .plan(&selection.query(), selection.range(), Path::new("."))
        .await?;

    for request in &plan.requests {
        println!("{}", request.file_url);
    }
    for url_path in &plan.malformed {
        eprintln!("Skipped `{}`: no year in file name", url_path);
    }

    Ok(format!(
        "{} of {} files in range",
        plan.requests.len(),
        plan.total_entries
    ))
}
