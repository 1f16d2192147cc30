use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use atlas_core::{
    is_null_marker, ExperimentCategory, ExperimentRecord, FileItem, SnapshotStrategy,
};
use atlas_search::FollowOnAction;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_LENGTH;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const ATLAS_BASE: &str = "https://www.ebi.ac.uk/gxa/";
const WEB_DOWNLOAD_BASE: &str = "https://www.ebi.ac.uk/gxa/experiments-content/";
const FTP_MIRROR_BASE: &str =
    "https://ftp.ebi.ac.uk/pub/databases/microarray/data/atlas/experiments/";
const USER_AGENT: &str = concat!("atlas-finder/", env!("CARGO_PKG_VERSION"));

/// Download suppliers tried in order for the web endpoint.
const SUPPLIERS: [&str; 3] = ["RnaSeqBaseline", "RnaSeqDifferential", "ProteomicsBaseline"];

/// Pages of the experiment browser scraped before giving up.
const MAX_SCRAPE_PAGES: usize = 10;
const SCRAPE_PAGE_DELAY: Duration = Duration::from_secs(1);

static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<a href="([^"]+)">"#).unwrap());
static LIST_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<div\b[^>]*\bclass="[^"]*\bexperiment-list-item\b[^"]*"[^>]*>"#).unwrap()
});
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<tr\b[^>]*\bclass="[^"]*\bexperiment\b[^"]*"[^>]*>"#).unwrap()
});
static EXPERIMENT_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\b[^>]*\bhref="[^"]*/experiments/(E-[A-Za-z0-9-]+)[^"]*""#).unwrap()
});
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<div\b[^>]*\bclass="[^"]*\bexperiment-description\b[^"]*"[^>]*>(.*?)</div>"#)
        .unwrap()
});
static SPECIES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span\b[^>]*\bclass="[^"]*\bspecies\b[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});

pub fn http_client(timeout_secs: u64) -> Result<HttpClient> {
    Ok(HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}

pub fn experiment_page(accession: &str) -> String {
    format!("{ATLAS_BASE}experiments/{accession}")
}

pub fn mirror_dir(accession: &str) -> String {
    format!("{FTP_MIRROR_BASE}{accession}/")
}

#[derive(Deserialize)]
struct ExperimentListing {
    #[serde(default)]
    experiments: Vec<ListedExperiment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedExperiment {
    experiment_accession: Option<String>,
    species: Option<String>,
    experiment_description: Option<String>,
    last_update: Option<String>,
    #[serde(default)]
    experimental_factors: Vec<String>,
}

/// Experiment list from the Atlas JSON endpoint.
pub struct JsonEndpointSnapshot {
    client: HttpClient,
}

impl JsonEndpointSnapshot {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn request(&self, category: ExperimentCategory) -> Result<Vec<ExperimentRecord>> {
        let url = format!("{ATLAS_BASE}json/{category}/experiments");
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "experiment listing unavailable");
            return Ok(Vec::new());
        }
        let listing: ExperimentListing = response
            .json()
            .context("experiment listing is not valid json")?;
        Ok(listing_records(listing, category))
    }
}

impl SnapshotStrategy for JsonEndpointSnapshot {
    fn name(&self) -> &str {
        "json-endpoint"
    }

    fn fetch(&self, category: ExperimentCategory) -> Vec<ExperimentRecord> {
        self.request(category).unwrap_or_else(|err| {
            warn!(%category, error = %err, "experiment listing request failed");
            Vec::new()
        })
    }
}

fn listing_records(listing: ExperimentListing, category: ExperimentCategory) -> Vec<ExperimentRecord> {
    listing
        .experiments
        .into_iter()
        .filter_map(|exp| {
            let accession = present(exp.experiment_accession)?;
            let species = present(exp.species)?;
            Some(
                ExperimentRecord::new(
                    accession,
                    category,
                    species,
                    present(exp.experiment_description).unwrap_or_default(),
                    exp.experimental_factors.join(", "),
                )
                .with_last_update(present(exp.last_update).unwrap_or_default()),
            )
        })
        .collect()
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !is_null_marker(v))
}

/// Experiment list scraped page by page from the Atlas experiment browser.
pub struct HtmlScrapeSnapshot {
    client: HttpClient,
    max_pages: usize,
    page_delay: Duration,
}

impl HtmlScrapeSnapshot {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_pages: MAX_SCRAPE_PAGES,
            page_delay: SCRAPE_PAGE_DELAY,
        }
    }

    fn page(&self, category: ExperimentCategory, page: usize) -> Result<Option<String>> {
        let url = format!("{ATLAS_BASE}{category}/experiments?page={page}");
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "experiment page unavailable");
            return Ok(None);
        }
        Ok(Some(response.text()?))
    }
}

impl SnapshotStrategy for HtmlScrapeSnapshot {
    fn name(&self) -> &str {
        "html-scrape"
    }

    fn fetch(&self, category: ExperimentCategory) -> Vec<ExperimentRecord> {
        let mut records = Vec::new();
        for page in 1..=self.max_pages {
            let html = match self.page(category, page) {
                Ok(Some(html)) => html,
                Ok(None) => break,
                Err(err) => {
                    warn!(%category, page, error = %err, "experiment page request failed");
                    break;
                }
            };
            let found = parse_experiment_page(&html, category);
            if found.is_empty() {
                debug!(%category, page, "no experiments on page");
                break;
            }
            info!(%category, page, experiments = found.len(), "scraped experiment page");
            records.extend(found);
            if page < self.max_pages {
                std::thread::sleep(self.page_delay);
            }
        }
        records
    }
}

/// Experiment rows of one browser page. List items are preferred; table rows
/// are only looked at when a page has none.
fn parse_experiment_page(html: &str, category: ExperimentCategory) -> Vec<ExperimentRecord> {
    let mut starts: Vec<usize> = LIST_ITEM_RE.find_iter(html).map(|m| m.start()).collect();
    if starts.is_empty() {
        starts = TABLE_ROW_RE.find_iter(html).map(|m| m.start()).collect();
    }
    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            parse_experiment_row(&html[start..end], category)
        })
        .collect()
}

fn parse_experiment_row(row: &str, category: ExperimentCategory) -> Option<ExperimentRecord> {
    let accession = EXPERIMENT_LINK_RE.captures(row)?.get(1)?.as_str().to_uppercase();
    let species = present(Some(element_text(&SPECIES_RE, row)))?;
    Some(ExperimentRecord::new(
        accession,
        category,
        species,
        element_text(&DESCRIPTION_RE, row),
        "",
    ))
}

fn element_text(pattern: &Regex, row: &str) -> String {
    pattern
        .captures(row)
        .and_then(|cap| cap.get(1))
        .map(|inner| {
            html2text::from_read(inner.as_str().as_bytes(), 1000)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Artifact kind and file name for each file worth fetching.
pub fn artifact_patterns(accession: &str) -> Vec<(&'static str, String)> {
    vec![
        ("tpms", format!("{accession}-tpms.tsv")),
        ("fpkms", format!("{accession}-fpkms.tsv")),
        ("counts", format!("{accession}-raw-counts.tsv")),
        ("condensed-sdrf", format!("{accession}.condensed-sdrf.tsv")),
        ("design", format!("{accession}.sdrf.txt")),
    ]
}

fn web_resource(kind: &str) -> Option<&'static str> {
    match kind {
        "tpms" => Some("tpms.tsv"),
        "fpkms" => Some("fpkms.tsv"),
        "counts" => Some("raw-counts.tsv"),
        _ => None,
    }
}

/// Downloads an experiment's data files, trying the web download endpoint
/// before the FTP mirror.
pub struct HttpArtifactFetcher {
    client: HttpClient,
}

impl HttpArtifactFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn download(&self, url: &str, path: &Path) -> Result<bool> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "not available");
            return Ok(false);
        }
        let bytes = response.bytes()?;
        fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }

    fn fetch_one(&self, accession: &str, kind: &str, file_name: &str, path: &Path) -> bool {
        let mut urls = Vec::new();
        if let Some(resource) = web_resource(kind) {
            for supplier in SUPPLIERS {
                urls.push(format!(
                    "{WEB_DOWNLOAD_BASE}{accession}/resources/ExperimentDownloadSupplier.{supplier}/{resource}"
                ));
            }
        }
        urls.push(format!("{}{file_name}", mirror_dir(accession)));
        for url in urls {
            match self.download(&url, path) {
                Ok(true) => {
                    info!(%accession, kind, %url, "downloaded");
                    return true;
                }
                Ok(false) => {}
                Err(err) => debug!(%url, error = %err, "download attempt failed"),
            }
        }
        false
    }
}

impl FollowOnAction for HttpArtifactFetcher {
    fn fetch(&mut self, accession: &str, target_dir: &Path) -> BTreeMap<String, PathBuf> {
        let mut downloaded = BTreeMap::new();
        if let Err(err) = fs::create_dir_all(target_dir) {
            warn!(dir = %target_dir.display(), error = %err, "cannot create download directory");
            return downloaded;
        }
        for (kind, file_name) in artifact_patterns(accession) {
            let path = target_dir.join(&file_name);
            if self.fetch_one(accession, kind, &file_name, &path) {
                downloaded.insert(kind.to_string(), path);
            } else {
                debug!(%accession, kind, "no source had this file");
            }
        }
        if downloaded.is_empty() {
            warn!(%accession, mirror = %mirror_dir(accession), "no files downloaded");
        }
        downloaded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingMethod {
    DirectoryListing,
    PatternProbe,
}

impl ListingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingMethod::DirectoryListing => "directory-listing",
            ListingMethod::PatternProbe => "pattern-probe",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileListing {
    pub url: String,
    pub method: ListingMethod,
    pub items: Vec<FileItem>,
}

/// File names probed when the mirror directory cannot be listed.
pub fn probe_patterns(accession: &str) -> Vec<String> {
    vec![
        format!("{accession}-tpms.tsv"),
        format!("{accession}-fpkms.tsv"),
        format!("{accession}-raw-counts.tsv"),
        format!("{accession}.condensed-sdrf.tsv"),
        format!("{accession}.sdrf.txt"),
        format!("{accession}-configuration.xml"),
        format!("{accession}-analytics.tsv"),
        format!("{accession}.Rdata"),
    ]
}

/// Lists the files of an experiment on the FTP mirror. `None` when neither
/// the directory listing nor probing found anything.
pub fn list_files(client: &HttpClient, accession: &str) -> Option<FileListing> {
    let base = mirror_dir(accession);
    match client.get(&base).send() {
        Ok(response) if response.status().is_success() => match response.text() {
            Ok(html) => {
                let items: Vec<FileItem> = parse_directory_listing(&html)
                    .into_iter()
                    .map(|name| FileItem {
                        url: Some(format!("{base}{name}")),
                        ..FileItem::named(name)
                    })
                    .collect();
                if !items.is_empty() {
                    return Some(FileListing {
                        url: base,
                        method: ListingMethod::DirectoryListing,
                        items,
                    });
                }
            }
            Err(err) => debug!(error = %err, "unreadable directory listing"),
        },
        Ok(response) => debug!(status = %response.status(), "directory listing unavailable"),
        Err(err) => debug!(error = %err, "directory listing request failed"),
    }

    let mut items = Vec::new();
    for name in probe_patterns(accession) {
        let url = format!("{base}{name}");
        let Ok(response) = client.head(&url).send() else {
            continue;
        };
        if !response.status().is_success() {
            continue;
        }
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        items.push(FileItem {
            name,
            url: Some(url),
            size,
        });
    }
    if items.is_empty() {
        return None;
    }
    Some(FileListing {
        url: base,
        method: ListingMethod::PatternProbe,
        items,
    })
}

fn parse_directory_listing(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .filter(|link| !link.starts_with('?') && link != "../" && !link.starts_with('/'))
        .collect()
}
