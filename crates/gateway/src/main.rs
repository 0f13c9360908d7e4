//! ReelSense API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)
//!
//! The sentiment model artifact is loaded before the listener binds; a
//! load failure aborts startup, since no review can be scored without it.

mod handlers;
mod middleware;

use axum::extract::FromRef;
use axum::{
    routing::{delete, get, post},
    Router,
};
use reelsense_common::{
    auth::JwtManager,
    cache::DetailCache,
    catalog::{CatalogClient, CatalogLookup},
    config::AppConfig,
    db::DbPool,
    errors::AppError,
    metrics,
    sentiment::SentimentModel,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub cache: Arc<DetailCache>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub model: Arc<SentimentModel>,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.jwt)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting ReelSense API Gateway v{}", reelsense_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to install Prometheus exporter");
                e
            })?;
        info!("Metrics exposed on {}", metrics_addr);
    }

    // Load the sentiment model; without it the service cannot run
    info!(path = %config.model.artifact_path, "Loading sentiment model...");
    let model = SentimentModel::load(&config.model.artifact_path).map_err(|e| {
        tracing::error!(error = %e, "Fatal: sentiment model unavailable");
        e
    })?;

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Catalog client and detail cache
    let catalog = CatalogClient::new(&config.catalog)?;
    let cache = DetailCache::new(config.detail_ttl());

    // JWT signing secret is mandatory
    let jwt_secret = config
        .auth
        .jwt_secret
        .clone()
        .ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret must be set".to_string(),
        })?;
    let jwt = JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs);

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        cache: Arc::new(cache),
        catalog: Arc::new(catalog),
        model: Arc::new(model),
        jwt: Arc::new(jwt),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        // Authentication endpoints (no token required)
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))

        // Catalog endpoints
        .route("/movies/search", get(handlers::movies::search))
        .route("/movies/{imdb_id}", get(handlers::movies::detail))

        // Review submission
        .route("/reviews", post(handlers::reviews::submit))

        // Profile endpoints
        .route("/profile/reviews", get(handlers::profile::reviews))

        // Moderation endpoints
        .route("/admin/reviews", get(handlers::admin::list_reviews))
        .route("/admin/reviews/{review_id}", delete(handlers::admin::delete_review));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes.layer(axum::middleware::from_fn(move |request, next| {
            middleware::rate_limit::rate_limit_middleware(request, next, Arc::clone(&limiter))
        }));
    }

    // Compose the app
    Router::new()
        // Health endpoints (no auth, no rate limit)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
