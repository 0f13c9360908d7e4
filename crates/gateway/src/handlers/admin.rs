//! Moderation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use reelsense_common::{
    auth::AuthUser,
    db::Repository,
    errors::{AppError, Result},
    metrics,
};

#[derive(Serialize)]
pub struct AdminReviewsResponse {
    pub total: usize,
    pub reviews: Vec<AdminReviewItem>,
}

#[derive(Serialize)]
pub struct AdminReviewItem {
    pub id: Uuid,
    pub author: String,
    pub author_id: Uuid,
    pub content: String,
    pub sentiment: String,
    pub confidence_percent: String,
    pub imdb_id: Option<String>,
    pub created_at: String,
}

/// Every review joined with its author, most recent first
pub async fn list_reviews(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<AdminReviewsResponse>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let reviews = repo.list_all_reviews().await?;

    let reviews: Vec<AdminReviewItem> = reviews
        .into_iter()
        .map(|entry| AdminReviewItem {
            id: entry.review.id,
            author: entry.author.username,
            author_id: entry.author.id,
            confidence_percent: entry.review.confidence_percent(),
            sentiment: entry.review.sentiment.clone(),
            content: entry.review.content,
            imdb_id: entry.review.imdb_id,
            created_at: entry.review.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(AdminReviewsResponse {
        total: reviews.len(),
        reviews,
    }))
}

/// Delete a review and invalidate the affected detail cache entry
pub async fn delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(review_id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());

    let review = repo
        .find_review_by_id(review_id)
        .await?
        .ok_or_else(|| AppError::ReviewNotFound {
            id: review_id.to_string(),
        })?;

    // Commit the delete first: invalidating before the commit would let a
    // concurrent repopulation cache the row that is about to disappear.
    let deleted = repo.delete_review(review_id).await?;
    if !deleted {
        return Err(AppError::ReviewNotFound {
            id: review_id.to_string(),
        });
    }
    metrics::record_review(true);

    if let Some(ref imdb_id) = review.imdb_id {
        if let Err(e) = state.cache.invalidate(imdb_id).await {
            tracing::warn!(
                imdb_id = %imdb_id,
                review_id = %review_id,
                error = %e,
                "Cache invalidation failed; detail view may be stale until TTL expiry"
            );
        }
    }

    tracing::info!(
        review_id = %review_id,
        moderator_id = %auth.user_id,
        imdb_id = ?review.imdb_id,
        "Review deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
