//! Registration and login handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use reelsense_common::{
    auth::{hash_password, verify_password},
    db::Repository,
    errors::{AppError, Result},
};

/// Request to register a new account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 20))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in_secs: u64,
    pub is_admin: bool,
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let email = request.email.to_lowercase();

    // Admin rights come from the configured allowlist only
    let is_admin = state.config.is_admin_email(&email);

    let password_hash = hash_password(&request.password)?;

    let repo = Repository::new(state.db.clone());
    let user = repo
        .create_user(request.username, email, password_hash, is_admin)
        .await?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        is_admin = user.is_admin,
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            username: user.username,
            is_admin: user.is_admin,
        }),
    ))
}

/// Log in with email and password, returning a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let user = repo.find_user_by_email(&request.email.to_lowercase()).await?;

    // One rejection path for unknown email and wrong password
    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => return Err(AppError::InvalidCredentials),
    };

    let token = state.jwt.generate_token(user.id, user.is_admin)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in_secs: state.config.auth.jwt_expiration_secs,
        is_admin: user.is_admin,
    }))
}
