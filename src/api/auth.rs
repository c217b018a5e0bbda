//! Authentication API endpoints
//!
//! Handles HTTP requests for teacher authentication:
//! - POST /api/v1/auth/register - Teacher registration
//! - POST /api/v1/auth/login - Teacher login
//! - POST /api/v1/auth/logout - Teacher logout
//! - GET /api/v1/auth/me - Get current teacher

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{extract_auth_token, ApiError, AppState, AuthenticatedTeacher};
use crate::api::responses::{LoginResponse, TeacherResponse};
use crate::models::CreateTeacherInput;

/// Request body for teacher registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Request body for teacher login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_teacher))
}

/// POST /api/v1/auth/register - Teacher registration
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let teacher = state
        .auth_service
        .register(CreateTeacherInput {
            email: body.email,
            name: body.name,
            password: body.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TeacherResponse::from(teacher))))
}

/// POST /api/v1/auth/login - Teacher login
///
/// Issues an opaque bearer token and also sets it as an httpOnly session
/// cookie for browser clients.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (token, teacher) = state.auth_service.login(&body.email, &body.password).await?;

    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token.id,
        24 * 60 * 60
    );

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }

    Ok((
        headers,
        Json(LoginResponse {
            token: token.id,
            teacher: teacher.into(),
        }),
    ))
}

/// POST /api/v1/auth/logout - Teacher logout
///
/// Requires authentication. The token is deleted server-side, so it is
/// invalid immediately even if a client keeps a copy.
async fn logout(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_auth_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.auth_service.logout(&token).await?;

    // Clear the session cookie
    let clear_cookie = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, HeaderValue::from_static(clear_cookie));

    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me - Get current teacher
///
/// Requires authentication.
async fn get_current_teacher(teacher: AuthenticatedTeacher) -> Json<TeacherResponse> {
    Json(teacher.0.into())
}
