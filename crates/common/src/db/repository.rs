//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A review joined with its author, as rendered in detail and moderation views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewWithAuthor {
    pub review: Review,
    pub author: User,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a new user
    pub async fn create_user(
        &self,
        username: String,
        email: String,
        password_hash: String,
        is_admin: bool,
    ) -> Result<User> {
        let now = chrono::Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            email: Set(email),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            created_at: Set(now.into()),
        };

        user.insert(self.write_conn()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::Duplicate {
                    message: "Username or email already registered".to_string(),
                }
            } else {
                e.into()
            }
        })
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Review Operations
    // ========================================================================

    /// Create a new review with its computed sentiment
    pub async fn create_review(
        &self,
        user_id: Uuid,
        content: String,
        sentiment: Sentiment,
        confidence: f64,
        imdb_id: Option<String>,
    ) -> Result<Review> {
        let now = chrono::Utc::now();

        let review = ReviewActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            content: Set(content),
            sentiment: Set(String::from(sentiment)),
            confidence: Set(confidence),
            imdb_id: Set(imdb_id),
            created_at: Set(now.into()),
        };

        review.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find review by ID
    pub async fn find_review_by_id(&self, id: Uuid) -> Result<Option<Review>> {
        ReviewEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete review by ID
    pub async fn delete_review(&self, id: Uuid) -> Result<bool> {
        let result = ReviewEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// List a user's reviews, most recent first
    pub async fn list_reviews_by_user(&self, user_id: Uuid) -> Result<Vec<Review>> {
        ReviewEntity::find()
            .filter(ReviewColumn::UserId.eq(user_id))
            .order_by_desc(ReviewColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List all reviews for a catalog item joined with their authors,
    /// most recent first
    pub async fn list_reviews_by_item(&self, imdb_id: &str) -> Result<Vec<ReviewWithAuthor>> {
        let rows = ReviewEntity::find()
            .filter(ReviewColumn::ImdbId.eq(imdb_id))
            .find_also_related(UserEntity)
            .order_by_desc(ReviewColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        Ok(Self::join_authors(rows))
    }

    /// List every review joined with its author, most recent first (moderation)
    pub async fn list_all_reviews(&self) -> Result<Vec<ReviewWithAuthor>> {
        let rows = ReviewEntity::find()
            .find_also_related(UserEntity)
            .order_by_desc(ReviewColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        Ok(Self::join_authors(rows))
    }

    // A review row always has an owning user; a missing join partner would
    // mean a broken foreign key, so such rows are dropped rather than served.
    fn join_authors(rows: Vec<(Review, Option<User>)>) -> Vec<ReviewWithAuthor> {
        rows.into_iter()
            .filter_map(|(review, author)| author.map(|author| ReviewWithAuthor { review, author }))
            .collect()
    }
}
