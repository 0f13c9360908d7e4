//! Catalog search and detail view handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::AppState;
use reelsense_common::{
    auth::AuthUser,
    cache::DetailView,
    catalog::{SearchMatch, TitleMetadata},
    db::Repository,
    errors::{AppError, Result},
    metrics,
    stats::page_count,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Free-text title query
    pub q: String,

    #[serde(default = "default_page")]
    pub page: u64,
}

fn default_page() -> u64 { 1 }

/// Search response with page controls derived from the upstream count
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub page: u64,
    pub total_results: u64,
    pub total_pages: u64,
    pub results: Vec<SearchMatch>,
}

/// Detail view response: catalog metadata plus joined reviews
#[derive(Serialize)]
pub struct DetailResponse {
    pub metadata: TitleMetadata,
    pub reviews: Vec<ReviewItem>,
}

#[derive(Serialize)]
pub struct ReviewItem {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    pub sentiment: String,
    pub confidence_percent: String,
    pub created_at: String,
}

impl DetailResponse {
    fn from_view(view: &DetailView) -> Self {
        Self {
            metadata: view.metadata.clone(),
            reviews: view
                .reviews
                .iter()
                .map(|entry| ReviewItem {
                    id: entry.review.id,
                    author: entry.author.username.clone(),
                    content: entry.review.content.clone(),
                    sentiment: entry.review.sentiment.clone(),
                    confidence_percent: entry.review.confidence_percent(),
                    created_at: entry.review.created_at.to_rfc3339(),
                })
                .collect(),
        }
    }
}

/// Search the external catalog
///
/// An upstream "no data" result is an empty page, not an error; only a
/// transport fault surfaces as a 502.
pub async fn search(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Err(AppError::MissingField {
            field: "q".to_string(),
        });
    }
    let page = params.page.max(1);

    let start = Instant::now();
    let result = state.catalog.search(&query, page).await;
    metrics::record_lookup(start.elapsed().as_secs_f64(), "search", result.is_ok());

    let (results, total_results) = match result? {
        Some(found) => (found.matches, found.total_results),
        None => (Vec::new(), 0),
    };

    let total_pages = page_count(total_results, state.config.catalog.page_size);

    tracing::info!(
        query = %query,
        page,
        total_results,
        total_pages,
        "Catalog search completed"
    );

    Ok(Json(SearchResponse {
        query,
        page,
        total_results,
        total_pages,
        results,
    }))
}

/// Fetch the enriched detail view for one title
///
/// Served from the detail cache when a live entry exists; otherwise the
/// view is rebuilt from the upstream catalog and the review store. An
/// upstream miss or failure is never cached.
pub async fn detail(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(imdb_id): Path<String>,
) -> Result<Json<DetailResponse>> {
    let catalog = Arc::clone(&state.catalog);
    let repo = Repository::new(state.db.clone());
    let item_id = imdb_id.clone();

    let view = state
        .cache
        .get_or_populate(&imdb_id, move || async move {
            let start = Instant::now();
            let result = catalog.lookup(&item_id).await;
            metrics::record_lookup(start.elapsed().as_secs_f64(), "title", result.is_ok());

            let Some(metadata) = result? else {
                return Ok(None);
            };

            let reviews = repo.list_reviews_by_item(&item_id).await?;
            Ok(Some(DetailView { metadata, reviews }))
        })
        .await?;

    match view {
        Some(view) => Ok(Json(DetailResponse::from_view(&view))),
        None => Err(AppError::TitleNotFound { id: imdb_id }),
    }
}
