//! ReelSense Common Library
//!
//! Shared code for the ReelSense service including:
//! - Database models and repository patterns
//! - Detail view cache with TTL and explicit invalidation
//! - External movie catalog client
//! - Sentiment classifier adapter
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod sentiment;
pub mod stats;

// Re-export commonly used types
pub use cache::{DetailCache, DetailView};
pub use catalog::{CatalogClient, CatalogLookup};
pub use config::AppConfig;
pub use db::{Repository, ReviewWithAuthor};
pub use errors::{AppError, Result};
pub use sentiment::{Prediction, SentimentModel};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
