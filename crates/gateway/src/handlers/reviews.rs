//! Review submission handler
//!
//! Implements the predict-and-persist flow: classify the text, commit the
//! labeled review, then invalidate the affected detail cache entry. The
//! committed review is the point of no return; a failed invalidation is
//! logged and the submission still reports success.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use reelsense_common::{
    auth::AuthUser,
    db::Repository,
    errors::{AppError, Result},
    metrics,
};

/// Review submission request
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    #[validate(length(min = 1, max = 10000))]
    pub text: String,

    /// Catalog item the review is tied to, if any
    #[serde(default)]
    pub imdb_id: Option<String>,

    /// When false, respond with a redirect to the detail view instead of
    /// the structured payload
    #[serde(default = "default_machine_readable")]
    pub machine_readable: bool,
}

fn default_machine_readable() -> bool { true }

#[derive(Serialize)]
pub struct SubmitReviewResponse {
    pub status: String,
    pub review_id: Uuid,
    pub label: String,
    pub raw_prediction: u8,
    pub confidence_percent: String,
}

/// Submit a review: classify, persist, invalidate, report
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<Response> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    // Classified: CPU-bound, no transient failure mode once loaded
    let start = Instant::now();
    let prediction = state.model.classify(&request.text);
    let label = String::from(prediction.label);
    metrics::record_classification(start.elapsed().as_secs_f64(), &label);

    // Persisted: once this commits, the caller sees success
    let repo = Repository::new(state.db.clone());
    let review = repo
        .create_review(
            auth.user_id,
            request.text,
            prediction.label,
            prediction.confidence as f64,
            request.imdb_id,
        )
        .await?;
    metrics::record_review(false);

    // Cache invalidated: the entry must be gone before this request
    // completes; a failure is a stale-cache warning, never a rollback
    if let Some(ref imdb_id) = review.imdb_id {
        if let Err(e) = state.cache.invalidate(imdb_id).await {
            tracing::warn!(
                imdb_id = %imdb_id,
                review_id = %review.id,
                error = %e,
                "Cache invalidation failed; detail view may be stale until TTL expiry"
            );
        }
    }

    tracing::info!(
        review_id = %review.id,
        user_id = %auth.user_id,
        label = %label,
        confidence = review.confidence,
        imdb_id = ?review.imdb_id,
        "Review analyzed and saved"
    );

    if request.machine_readable {
        let body = SubmitReviewResponse {
            status: "success".to_string(),
            review_id: review.id,
            label,
            raw_prediction: prediction.label.class_index(),
            confidence_percent: prediction.confidence_percent(),
        };
        Ok((StatusCode::CREATED, Json(body)).into_response())
    } else {
        let target = match review.imdb_id {
            Some(ref imdb_id) => format!("/v1/movies/{}", imdb_id),
            None => "/v1/profile/reviews".to_string(),
        };
        Ok(Redirect::to(&target).into_response())
    }
}
