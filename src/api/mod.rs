//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the Rollcall attendance
//! system:
//! - Auth endpoints (teacher login/logout)
//! - Session endpoints (create, close, list, detail)
//! - Attendance submission (public, multipart)
//! - Student roster endpoints
//! - Static serving of uploaded photos

pub mod attendance;
pub mod auth;
pub mod middleware;
pub mod responses;
pub mod sessions;
pub mod students;
pub mod upload;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedTeacher};

use responses::HealthResponse;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (teacher token required)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/sessions", sessions::protected_router())
        .nest("/students", students::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/sessions", sessions::public_router())
        .nest("/attendance", attendance::router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // CORS configuration; credentials are allowed for cookie-based auth
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    if let Ok(origin) = cors_origin.parse::<HeaderValue>() {
        cors = cors.allow_origin(origin);
    }

    // Face photos can approach the configured limit; leave headroom for the
    // other form fields.
    let body_limit = state.upload_config.max_file_size as usize + 64 * 1024;

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/health", get(health))
        .nest_service("/uploads", ServeDir::new(&state.upload_config.path))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness and database connectivity check
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!("Database ping failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    database: "unreachable".to_string(),
                }),
            )
        }
    }
}
