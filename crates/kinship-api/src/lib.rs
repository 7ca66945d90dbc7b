//! Kinship API - account and session server
//!
//! Provides HTTP endpoints for registering users, logging in with session
//! tokens, updating accounts and logging out.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::{http::HeaderValue, Router};
use kinship_core::ServerConfig;
use openapi::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);

    Router::new()
        .merge(routes::user_routes(state.clone()))
        .merge(routes::health_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS from configured origins; none configured allows no cross-origin calls
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Router over an in-memory store, for tests
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> (Router, Arc<AppState>) {
    let state = Arc::new(test_state(false));
    (create_router(state.clone()), state)
}

/// In-memory state with a fixed secret and cheap hashing parameters
#[cfg(any(test, feature = "test-utils"))]
pub fn test_state(enforce_session_check: bool) -> AppState {
    let mut config = kinship_core::AppConfig::default();
    config.auth.jwt_secret = "test-secret-for-integration".to_string();
    config.auth.enforce_session_check = enforce_session_check;
    config.auth.argon2_memory_kib = 1024;
    config.auth.argon2_iterations = 1;
    config.auth.argon2_parallelism = 1;

    match AppState::in_memory(config) {
        Ok(state) => state,
        Err(e) => panic!("test state: {e}"),
    }
}
