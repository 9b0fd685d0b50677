//! THREDDS catalog resolution for the NEX-GDDP-CMIP6 collection.
//!
//! A catalog lists one `dataset` per yearly NetCDF file. The year is encoded as
//! the trailing token of the file name, e.g.
//! `pr_day_ACCESS-CM2_historical_r1i1p1f1_gn_1950.nc`.

use std::path::{Path, PathBuf};

use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use url::Url;

use crate::error::{FetchError, FetchResult};

pub const THREDDS_NS: &str = "http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0";
pub const DEFAULT_SERVER: &str = "https://ds.nccs.nasa.gov/thredds/";

const CATALOG_ROOT: [&str; 4] = ["catalog", "AMES", "NEX", "GDDP-CMIP6"];
const CATALOG_FILE: &str = "catalog.xml";
const FILE_SERVER: &str = "fileServer/";

#[derive(Debug, Clone, PartialEq)]
/// Selects one model run and variable within the collection.
pub struct DatasetQuery {
    pub model: String,
    pub timeframe: String,
    pub ensemble: String,
    pub variable: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Inclusive range of years. Empty when `start > end`.
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        YearRange { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub url_path: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq)]
/// Result of reading the year out of a catalog `urlPath`.
pub enum EntryOutcome {
    Parsed(CatalogEntry),
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
/// A file to fetch and where to put it.
pub struct DownloadRequest {
    pub file_url: Url,
    pub local_path: PathBuf,
}

impl DownloadRequest {
    /// Returns `None` when the entry does not resolve to a URL with a file name.
    pub fn new(entry: &CatalogEntry, server: &Url, output: &Path) -> Option<Self> {
        let file_url = file_url(server, &entry.url_path).ok()?;
        let file_name = entry.url_path.rsplit('/').next()?;

        Some(DownloadRequest {
            local_path: output.join(file_name),
            file_url,
        })
    }
}

#[derive(Debug, Default)]
/// Downloads selected from a catalog, in catalog order.
pub struct Plan {
    pub requests: Vec<DownloadRequest>,
    pub malformed: Vec<String>,
    pub total_entries: usize,
}

/// Builds the catalog URL with each query component as its own encoded path segment.
pub fn catalog_url(server: &Url, query: &DatasetQuery) -> FetchResult<Url> {
    for component in [
        &query.model,
        &query.timeframe,
        &query.ensemble,
        &query.variable,
    ] {
        if !is_plain_segment(component) {
            return Err(FetchError::UnsafePath(component.clone()));
        }
    }

    let mut url = server.clone();
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(CATALOG_ROOT)
        .extend([
            &query.model,
            &query.timeframe,
            &query.ensemble,
            &query.variable,
        ])
        .push(CATALOG_FILE);

    Ok(url)
}

/// Appends `url_path` below the file server. Every segment must be a plain name,
/// so the result can't leave `fileServer/` or point at another host.
pub fn file_url(server: &Url, url_path: &str) -> FetchResult<Url> {
    let segments: Vec<&str> = url_path.trim_start_matches('/').split('/').collect();
    if !segments.iter().all(|s| is_plain_segment(s)) {
        return Err(FetchError::UnsafePath(url_path.to_string()));
    }

    let mut url = server.join(FILE_SERVER)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

fn is_plain_segment(segment: &str) -> bool {
    !matches!(segment, "" | "." | "..")
}

/// Returns the `urlPath` of every THREDDS `dataset` element, in document order.
pub fn parse_catalog(xml: &str) -> FetchResult<Vec<String>> {
    let mut reader = NsReader::from_str(xml);
    let mut url_paths = Vec::new();
    let mut open: Vec<String> = Vec::new();

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) => {
                open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                if is_dataset(&ns, &e) {
                    read_url_path(&e, &mut url_paths)?;
                }
            }
            (ns, Event::Empty(e)) => {
                if is_dataset(&ns, &e) {
                    read_url_path(&e, &mut url_paths)?;
                }
            }
            (_, Event::End(_)) => {
                open.pop();
            }
            (_, Event::Eof) => {
                // Truncated documents end with elements still open
                if let Some(name) = open.pop() {
                    return Err(FetchError::Xml(IllFormedError::MissingEndTag(name).into()));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(url_paths)
}

fn is_dataset(ns: &ResolveResult<'_>, e: &BytesStart) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(ns)) if *ns == THREDDS_NS.as_bytes())
        && e.local_name().as_ref() == b"dataset"
}

fn read_url_path(e: &BytesStart, url_paths: &mut Vec<String>) -> FetchResult<()> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == b"urlPath" {
            let value = attr.unescape_value()?;
            if !value.is_empty() {
                url_paths.push(value.into_owned());
            }
        }
    }

    Ok(())
}

/// Reads the year from the last `_` token of a `urlPath`, up to its first `.`.
pub fn extract_year(url_path: &str) -> Option<i32> {
    let token = url_path.rsplit('_').next()?;
    let year = token.split('.').next()?;

    year.parse::<i32>().ok()
}

pub fn classify(url_paths: Vec<String>) -> Vec<EntryOutcome> {
    url_paths
        .into_iter()
        .map(|url_path| match extract_year(&url_path) {
            Some(year) => EntryOutcome::Parsed(CatalogEntry { url_path, year }),
            None => EntryOutcome::Malformed(url_path),
        })
        .collect()
}

/// Selects the entries within `range` and maps them to download requests.
pub fn plan_downloads(
    url_paths: Vec<String>,
    range: YearRange,
    server: &Url,
    output: &Path,
) -> Plan {
    let mut plan = Plan {
        total_entries: url_paths.len(),
        ..Plan::default()
    };

    for outcome in classify(url_paths) {
        match outcome {
            EntryOutcome::Parsed(entry) if range.contains(entry.year) => {
                match DownloadRequest::new(&entry, server, output) {
                    Some(request) => plan.requests.push(request),
                    None => plan.malformed.push(entry.url_path),
                }
            }
            EntryOutcome::Parsed(_) => {}
            EntryOutcome::Malformed(url_path) => plan.malformed.push(url_path),
        }
    }

    plan
}

// -- Tests -------------------------------------------------------------------
