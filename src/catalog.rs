//! OMDb catalog client
//!
//! Title search and per-title details from the OMDb API. No retries and no
//! rate limiting; callers turn failures into user-facing messages.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Placeholder OMDb uses for absent fields
const OMDB_NONE: &str = "N/A";

/// Errors that can occur during catalog lookups
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-success HTTP status from the API
    #[error("Catalog returned HTTP {0}")]
    Status(u16),
    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The API answered `Response: False`
    #[error("Not found: {0}")]
    NotFound(String),
}

/// One entry of a title search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Catalog identifier (IMDb id)
    pub id: String,
    /// Title
    pub title: String,
    /// Release year as reported by the catalog (may be a range for series)
    pub year: String,
}

/// Full information about one title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieDetails {
    /// Catalog identifier (IMDb id)
    pub id: String,
    /// Title
    pub title: String,
    /// Release year
    pub year: String,
    /// Plot summary, if the catalog has one
    pub plot: Option<String>,
    /// Poster image URL, if the catalog has one
    pub poster_url: Option<String>,
}

/// Interface for movie metadata catalogs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search titles matching `query`; an empty list means nothing matched
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError>;
    /// Fetch details for a catalog identifier
    async fn details(&self, id: &str) -> Result<MovieDetails, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct OmdbSearchResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchItem>,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchItem {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
}

#[derive(Debug, Deserialize)]
struct OmdbMovie {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Error")]
    error: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != OMDB_NONE)
}

/// OMDb HTTP client
pub struct OmdbClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OmdbClient {
    /// Create a client against `base_url` (e.g. `http://www.omdbapi.com/`)
    #[must_use]
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(_) => reqwest::Client::new(),
        };

        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Catalog for OmdbClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError> {
        let body: OmdbSearchResponse = self.get_json(&[("s", query)]).await?;
        if body.response != "True" {
            debug!(
                query,
                error = body.error.as_deref().unwrap_or_default(),
                "OMDb search returned no results"
            );
            return Ok(Vec::new());
        }

        Ok(body
            .search
            .into_iter()
            .map(|item| SearchHit {
                id: item.imdb_id,
                title: item.title,
                year: item.year,
            })
            .collect())
    }

    async fn details(&self, id: &str) -> Result<MovieDetails, CatalogError> {
        let body: OmdbMovie = self.get_json(&[("i", id), ("plot", "full")]).await?;
        if body.response != "True" {
            return Err(CatalogError::NotFound(
                body.error.unwrap_or_else(|| id.to_string()),
            ));
        }

        Ok(MovieDetails {
            id: body.imdb_id.unwrap_or_else(|| id.to_string()),
            title: present(body.title).unwrap_or_else(|| "Unknown".to_string()),
            year: present(body.year).unwrap_or_default(),
            plot: present(body.plot),
            poster_url: present(body.poster),
        })
    }
}
