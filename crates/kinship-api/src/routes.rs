//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::handlers::{auth, health};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Account routes under `/user`
///
/// Logout checks its token itself and stays outside the middleware.
pub fn user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/user/register", post(auth::register_handler))
        .route("/user/login", get(auth::login_handler))
        .route("/user/logout", delete(auth::logout_handler));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/user/update", put(auth::update_handler))
        .route("/user/me", get(auth::me_handler))
        .route("/user/profile", get(auth::profile_handler))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Liveness and readiness checks
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}
