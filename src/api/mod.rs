//! API layer - HTTP handlers and routing
//!
//! Explicit route table for the auth surface:
//! - POST /login, /logout, /oauth-process, /check-session
//! - GET /validate, /health
//!
//! Everything else answers a 404 in the uniform envelope.

pub mod auth;
pub mod middleware;
pub mod responses;

use axum::{
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};

/// GET /health - Liveness probe
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

/// Fallback for unknown routes
async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Unknown route")
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // CORS must allow credentials for cookie-based auth
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/oauth-process", post(auth::oauth_process))
        .route("/validate", get(auth::validate))
        .route("/check-session", post(auth::check_session))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
