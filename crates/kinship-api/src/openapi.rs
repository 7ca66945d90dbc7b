//! OpenAPI / Swagger UI documentation
//!
//! - Swagger UI: `http://localhost:8080/swagger-ui`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::service::{LoginRequest, LoginResponse, RegisterRequest, UpdateAccountRequest};
use crate::auth::{UserPublic, UserRole};
use crate::error::ApiError;
use crate::handlers::auth::{MeResponse, MessageResponse};
use crate::handlers::health::{HealthResponse, ReadinessChecks, ReadinessResponse};

/// Bearer session token scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kinship API",
        description = "Account registration, login sessions and logout for the family tree service."
    ),
    paths(
        crate::handlers::auth::register_handler,
        crate::handlers::auth::login_handler,
        crate::handlers::auth::update_handler,
        crate::handlers::auth::logout_handler,
        crate::handlers::auth::me_handler,
        crate::handlers::auth::profile_handler,
        crate::handlers::health::health_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateAccountRequest,
            MessageResponse,
            MeResponse,
            UserPublic,
            UserRole,
            ApiError,
            HealthResponse,
            ReadinessResponse,
            ReadinessChecks,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "user", description = "Account and session endpoints"),
        (name = "health", description = "Liveness and readiness checks")
    )
)]
pub struct ApiDoc;
