//! Download link scraping
//!
//! Searches the content site for a title, follows the first result and picks
//! the first anchor whose visible text carries the download marker.

use crate::config::TitleMatch;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors that can occur while scraping
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Configured base URL is not a valid URL
    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Finds a download URL for a human-readable title
#[async_trait]
pub trait DownloadFinder: Send + Sync {
    /// Returns the first download URL found, or `None` if nothing matched
    async fn find_download_link(&self, title: &str) -> Result<Option<String>, ScrapeError>;
}

/// Scraper for WordPress-style content sites
pub struct SiteScraper {
    base_url: Url,
    marker: String,
    title_match: TitleMatch,
    client: reqwest::Client,
}

impl SiteScraper {
    /// Create a scraper for the site at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::BaseUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        marker: &str,
        title_match: TitleMatch,
        timeout: Duration,
    ) -> Result<Self, ScrapeError> {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(_) => reqwest::Client::new(),
        };

        Ok(Self {
            base_url: Url::parse(base_url)?,
            marker: marker.to_string(),
            title_match,
            client,
        })
    }

    /// Search page URL for a title, spaces encoded as `+`
    #[must_use]
    pub fn search_url(&self, title: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().clear().append_pair("s", title);
        url
    }

    async fn fetch(&self, url: Url) -> Result<Option<(Url, String)>, ScrapeError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Scrape target returned non-success");
            return Ok(None);
        }
        let final_url = response.url().clone();
        Ok(Some((final_url, response.text().await?)))
    }
}

#[async_trait]
impl DownloadFinder for SiteScraper {
    async fn find_download_link(&self, title: &str) -> Result<Option<String>, ScrapeError> {
        let Some((search_url, search_page)) = self.fetch(self.search_url(title)).await? else {
            return Ok(None);
        };

        let Some(first) = first_result(&search_page, &search_url) else {
            debug!(title, "No search results on content site");
            return Ok(None);
        };

        if self.title_match == TitleMatch::Strict && !heading_matches(&first.heading, title) {
            debug!(title, heading = %first.heading, "First result rejected by strict title match");
            return Ok(None);
        }

        let Some((detail_url, detail_page)) = self.fetch(first.link).await? else {
            return Ok(None);
        };

        Ok(download_link(&detail_page, &detail_url, &self.marker))
    }
}

/// First search result on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstResult {
    /// Visible heading text
    pub heading: String,
    /// Absolute link to the detail page
    pub link: Url,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn visible_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extract the first `h2.entry-title` result and its link from a search page.
#[must_use]
pub fn first_result(html: &str, page_url: &Url) -> Option<FirstResult> {
    let document = Html::parse_document(html);
    let heading_sel = selector("h2.entry-title")?;
    let anchor_sel = selector("a[href]")?;

    let heading = document.select(&heading_sel).next()?;
    let anchor = heading.select(&anchor_sel).next()?;
    let href = anchor.value().attr("href")?;

    Some(FirstResult {
        heading: visible_text(heading),
        link: page_url.join(href).ok()?,
    })
}

/// Extract the first anchor whose visible text contains `marker`.
#[must_use]
pub fn download_link(html: &str, page_url: &Url, marker: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchor_sel = selector("a[href]")?;

    document
        .select(&anchor_sel)
        .filter(|a| visible_text(*a).contains(marker))
        .find_map(|a| page_url.join(a.value().attr("href")?).ok())
        .map(String::from)
}

fn heading_matches(heading: &str, title: &str) -> bool {
    heading.to_lowercase().contains(&title.trim().to_lowercase())
}
