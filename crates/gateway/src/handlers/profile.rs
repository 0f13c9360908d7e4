//! Profile handlers

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use reelsense_common::{
    auth::AuthUser,
    db::Repository,
    errors::Result,
    stats::ReviewStats,
};

#[derive(Serialize)]
pub struct ProfileReviewsResponse {
    pub stats: ReviewStats,
    pub reviews: Vec<ProfileReviewItem>,
}

#[derive(Serialize)]
pub struct ProfileReviewItem {
    pub id: Uuid,
    pub content: String,
    pub sentiment: String,
    pub confidence_percent: String,
    pub imdb_id: Option<String>,
    pub created_at: String,
}

/// The current user's reviews, most recent first, with sentiment stats
pub async fn reviews(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileReviewsResponse>> {
    let repo = Repository::new(state.db.clone());
    let reviews = repo.list_reviews_by_user(auth.user_id).await?;

    let stats = ReviewStats::from_sentiments(reviews.iter().map(|r| r.label()));

    let reviews = reviews
        .into_iter()
        .map(|review| ProfileReviewItem {
            id: review.id,
            confidence_percent: review.confidence_percent(),
            sentiment: review.sentiment.clone(),
            content: review.content,
            imdb_id: review.imdb_id,
            created_at: review.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(ProfileReviewsResponse { stats, reviews }))
}
