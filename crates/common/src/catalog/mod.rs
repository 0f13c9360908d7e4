//! External movie catalog client
//!
//! Talks to an OMDb-compatible lookup service: search by free-text query
//! plus page number, or fetch a single title's full metadata by item
//! identifier. The upstream signals logical failure in-band with
//! `"Response": "False"` and an `Error` message; the client treats that
//! and transport faults both as "no data available", distinguishing them
//! only so callers can choose the user-facing message. No automatic
//! retries.

use crate::config::CatalogConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Lookup service abstraction, mockable for tests
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Search the catalog; `Ok(None)` means the upstream reported no data
    async fn search(&self, query: &str, page: u64) -> Result<Option<SearchPage>>;

    /// Fetch one title's metadata; `Ok(None)` means unknown item identifier
    async fn lookup(&self, imdb_id: &str) -> Result<Option<TitleMetadata>>;
}

/// One match in a search result page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Year", default)]
    pub year: Option<String>,

    #[serde(rename = "imdbID")]
    pub imdb_id: String,

    #[serde(rename = "Type", default)]
    pub kind: Option<String>,

    #[serde(rename = "Poster", default)]
    pub poster: Option<String>,
}

/// One page of search results plus the upstream's total result count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub matches: Vec<SearchMatch>,
    pub total_results: u64,
}

/// Full metadata snapshot for a single title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleMetadata {
    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "imdbID")]
    pub imdb_id: String,

    #[serde(rename = "Year", default)]
    pub year: Option<String>,

    #[serde(rename = "Genre", default)]
    pub genre: Option<String>,

    #[serde(rename = "Director", default)]
    pub director: Option<String>,

    #[serde(rename = "Plot", default)]
    pub plot: Option<String>,

    #[serde(rename = "Poster", default)]
    pub poster: Option<String>,

    #[serde(rename = "imdbRating", default)]
    pub imdb_rating: Option<String>,
}

/// HTTP client for the OMDb-compatible service
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CatalogClient {
    /// Create a new catalog client with a bounded request timeout
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create catalog HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let mut request = self.client.get(&self.base_url).query(params);
        if let Some(ref key) = self.api_key {
            request = request.query(&[("apikey", key.as_str())]);
        }

        let response = request.send().await.map_err(|e| AppError::CatalogUnavailable {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::CatalogUnavailable {
                message: format!("Upstream returned {}", status),
            });
        }

        response.json().await.map_err(|e| AppError::CatalogUnavailable {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl CatalogLookup for CatalogClient {
    async fn search(&self, query: &str, page: u64) -> Result<Option<SearchPage>> {
        let payload = self
            .fetch(&[("s", query.to_string()), ("page", page.to_string())])
            .await?;

        Ok(parse_search_payload(payload))
    }

    async fn lookup(&self, imdb_id: &str) -> Result<Option<TitleMetadata>> {
        let payload = self
            .fetch(&[("i", imdb_id.to_string()), ("plot", "full".to_string())])
            .await?;

        Ok(parse_title_payload(payload))
    }
}

fn upstream_succeeded(payload: &serde_json::Value) -> bool {
    let succeeded = payload.get("Response").and_then(|v| v.as_str()) == Some("True");
    if !succeeded {
        let error = payload
            .get("Error")
            .and_then(|v| v.as_str())
            .unwrap_or("no error message");
        tracing::debug!(error = %error, "Catalog reported no data");
    }
    succeeded
}

fn parse_search_payload(payload: serde_json::Value) -> Option<SearchPage> {
    if !upstream_succeeded(&payload) {
        return None;
    }

    let matches = payload
        .get("Search")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    // totalResults arrives as a string; a malformed or missing count is 0
    let total_results = payload
        .get("totalResults")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    Some(SearchPage {
        matches,
        total_results,
    })
}

fn parse_title_payload(payload: serde_json::Value) -> Option<TitleMetadata> {
    if !upstream_succeeded(&payload) {
        return None;
    }

    serde_json::from_value(payload).ok()
}

/// In-memory catalog for tests
#[derive(Default)]
pub struct MockCatalog {
    titles: HashMap<String, TitleMetadata>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, metadata: TitleMetadata) -> Self {
        self.titles.insert(metadata.imdb_id.clone(), metadata);
        self
    }
}

#[async_trait]
impl CatalogLookup for MockCatalog {
    async fn search(&self, query: &str, _page: u64) -> Result<Option<SearchPage>> {
        let needle = query.to_lowercase();
        let matches: Vec<SearchMatch> = self
            .titles
            .values()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .map(|t| SearchMatch {
                title: t.title.clone(),
                year: t.year.clone(),
                imdb_id: t.imdb_id.clone(),
                kind: Some("movie".to_string()),
                poster: t.poster.clone(),
            })
            .collect();

        if matches.is_empty() {
            return Ok(None);
        }

        let total_results = matches.len() as u64;
        Ok(Some(SearchPage {
            matches,
            total_results,
        }))
    }

    async fn lookup(&self, imdb_id: &str) -> Result<Option<TitleMetadata>> {
        Ok(self.titles.get(imdb_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_success() {
        let payload = json!({
            "Response": "True",
            "totalResults": "25",
            "Search": [
                {"Title": "The Shawshank Redemption", "Year": "1994",
                 "imdbID": "tt0111161", "Type": "movie", "Poster": "N/A"},
            ],
        });

        let page = parse_search_payload(payload).unwrap();
        assert_eq!(page.total_results, 25);
        assert_eq!(page.matches.len(), 1);
        assert_eq!(page.matches[0].imdb_id, "tt0111161");
    }

    #[test]
    fn test_parse_search_response_false_is_no_data() {
        let payload = json!({"Response": "False", "Error": "Movie not found!"});
        assert!(parse_search_payload(payload).is_none());
    }

    #[test]
    fn test_parse_search_malformed_total_is_zero() {
        let payload = json!({
            "Response": "True",
            "totalResults": "lots",
            "Search": [],
        });
        assert_eq!(parse_search_payload(payload).unwrap().total_results, 0);

        let payload = json!({"Response": "True", "Search": []});
        assert_eq!(parse_search_payload(payload).unwrap().total_results, 0);
    }

    #[test]
    fn test_parse_title_success() {
        let payload = json!({
            "Response": "True",
            "Title": "The Shawshank Redemption",
            "imdbID": "tt0111161",
            "Year": "1994",
            "Genre": "Drama",
            "Director": "Frank Darabont",
            "Plot": "Two imprisoned men bond over a number of years.",
            "imdbRating": "9.3",
        });

        let metadata = parse_title_payload(payload).unwrap();
        assert_eq!(metadata.title, "The Shawshank Redemption");
        assert_eq!(metadata.imdb_rating.as_deref(), Some("9.3"));
    }

    #[test]
    fn test_parse_title_response_false_is_no_data() {
        let payload = json!({"Response": "False", "Error": "Incorrect IMDb ID."});
        assert!(parse_title_payload(payload).is_none());
    }

    #[tokio::test]
    async fn test_mock_catalog_lookup() {
        let catalog = MockCatalog::new().with_title(TitleMetadata {
            title: "Heat".to_string(),
            imdb_id: "tt0113277".to_string(),
            year: Some("1995".to_string()),
            genre: None,
            director: None,
            plot: None,
            poster: None,
            imdb_rating: None,
        });

        assert!(catalog.lookup("tt0113277").await.unwrap().is_some());
        assert!(catalog.lookup("tt0000000").await.unwrap().is_none());

        let page = catalog.search("heat", 1).await.unwrap().unwrap();
        assert_eq!(page.total_results, 1);
        assert!(catalog.search("nothing", 1).await.unwrap().is_none());
    }
}
