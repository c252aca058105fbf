//! Wikipedia interlanguage-link fetcher.
//!
//! Given a brand's English article, collects the article title in every
//! language the page links to (`a.interlanguage-link-target`). The result is
//! keyed brand → language → title, the layout the JSON record source reads.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use scraper::{Html, Selector};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use brandlex_shared::{BrandlexError, LanguageTitle, LanguageTitles, Result};

/// User-Agent string for page fetches.
const USER_AGENT: &str = concat!("brandlex/", env!("CARGO_PKG_VERSION"));

/// Default timeout in seconds for one page fetch.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Separator between title and language name in an interlanguage link's
/// `title` attribute, e.g. `思科 – 中文`.
const TITLE_SEPARATOR: &str = " – ";

/// Language the source articles are written in.
const SOURCE_LANGUAGE: &str = "en";

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// Outcome of fetching a set of brands.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Brand → language code → title.
    pub names: BTreeMap<String, LanguageTitles>,
    /// (brand, error) for brands whose page could not be fetched.
    pub failures: Vec<(String, String)>,
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Concurrent fetcher for interlanguage names.
pub struct Fetcher {
    client: Client,
    concurrency: usize,
}

impl Fetcher {
    /// Create a fetcher allowing `concurrency` pages in flight.
    pub fn new(concurrency: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| BrandlexError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            concurrency: concurrency.max(1),
        })
    }

    /// Fetch one article and return its titles by language.
    pub async fn fetch_names(&self, url: &str) -> Result<LanguageTitles> {
        fetch_names(&self.client, url).await
    }

    /// Fetch every brand (name → article URL). One brand failing never
    /// stops the others.
    #[instrument(skip_all, fields(brands = brands.len()))]
    pub async fn fetch_brands(&self, brands: &BTreeMap<String, String>) -> FetchReport {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::new();

        info!(concurrency = self.concurrency, "fetching brand pages");

        for (brand, url) in brands {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let url = url.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = sem.acquire_owned().await;
                fetch_names(&client, &url).await
            });
            handles.push((brand.clone(), handle));
        }

        let mut report = gather(handles).await;
        report.duration = start.elapsed();
        info!(
            fetched = report.names.len(),
            failed = report.failures.len(),
            duration_ms = report.duration.as_millis(),
            "brand fetch completed"
        );
        report
    }
}

/// Await every brand's task, keeping the brand name next to its outcome
/// even when the task itself failed.
async fn gather(handles: Vec<(String, JoinHandle<Result<LanguageTitles>>)>) -> FetchReport {
    let mut report = FetchReport::default();
    for (brand, handle) in handles {
        match handle.await {
            Ok(Ok(names)) => {
                debug!(%brand, languages = names.len(), "brand fetched");
                report.names.insert(brand, names);
            }
            Ok(Err(e)) => {
                warn!(%brand, error = %e, "brand fetch failed");
                report.failures.push((brand, e.to_string()));
            }
            Err(e) => {
                warn!(%brand, error = %e, "fetch task panicked");
                report.failures.push((brand, format!("fetch task failed: {e}")));
            }
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

async fn fetch_names(client: &Client, url: &str) -> Result<LanguageTitles> {
    let parsed = Url::parse(url)
        .map_err(|e| BrandlexError::validation(format!("invalid URL '{url}': {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(BrandlexError::validation(format!(
            "unsupported URL scheme in '{url}'"
        )));
    }

    debug!(%parsed, "fetching article");

    let response = client
        .get(parsed.as_str())
        .send()
        .await
        .map_err(|e| BrandlexError::Network(format!("{parsed}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BrandlexError::Network(format!("{parsed}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| BrandlexError::Network(format!("{parsed}: body read failed: {e}")))?;

    let doc = Html::parse_document(&body);
    let mut names = extract_language_titles(&doc, &parsed);

    if !names.contains_key(SOURCE_LANGUAGE) {
        if let Some(title) = extract_heading(&doc) {
            names.insert(
                SOURCE_LANGUAGE.to_string(),
                LanguageTitle {
                    title,
                    url: Some(parsed.to_string()),
                },
            );
        }
    }

    Ok(names)
}

/// Collect interlanguage links, keyed by `hreflang`.
///
/// The title comes from the link's `title` attribute (the part before the
/// language name), falling back to the link text.
pub fn extract_language_titles(doc: &Html, base_url: &Url) -> LanguageTitles {
    let link_sel = Selector::parse("a.interlanguage-link-target[hreflang]").unwrap();
    let mut names = LanguageTitles::new();

    for el in doc.select(&link_sel) {
        let Some(lang) = el.value().attr("hreflang").map(str::trim) else {
            continue;
        };
        if lang.is_empty() {
            continue;
        }

        let title = el
            .value()
            .attr("title")
            .and_then(|t| t.split(TITLE_SEPARATOR).next())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .unwrap_or_else(|| el.text().collect::<String>().trim().to_string());

        if title.is_empty() {
            continue;
        }

        let url = el
            .value()
            .attr("href")
            .and_then(|href| base_url.join(href).ok())
            .map(|u| u.to_string());

        names.insert(lang.to_string(), LanguageTitle { title, url });
    }

    names
}

/// The article's own title from `h1#firstHeading`.
fn extract_heading(doc: &Html) -> Option<String> {
    let sel = Selector::parse("h1#firstHeading").unwrap();
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}
