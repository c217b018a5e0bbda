//! API middleware
//!
//! Contains middleware for:
//! - Authentication (token validation)
//! - Shared application state
//! - The `ApiError` wire format used by every endpoint

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::Teacher;
use crate::services::{
    AttendanceError, AttendanceService, AuthError, AuthService, SessionService,
    SessionServiceError, StudentService, StudentServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub auth_service: Arc<AuthService>,
    pub session_service: Arc<SessionService>,
    pub attendance_service: Arc<AttendanceService>,
    pub student_service: Arc<StudentService>,
    pub upload_config: Arc<crate::config::UploadConfig>,
}

/// Authenticated teacher extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedTeacher(pub Teacher);

// Extractor for AuthenticatedTeacher from request extensions. The value is
// inserted by `require_auth`, so using this in a handler that is not behind
// the auth layer rejects with 401 instead of panicking.
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedTeacher
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedTeacher>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" | "SESSION_NOT_FOUND" | "STUDENT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "FACE_SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            "INTERNAL_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
            // Every remaining code is a client-correctable rejection
            _ => StatusCode::BAD_REQUEST,
        };

        (status, Json(self)).into_response()
    }
}

impl From<AttendanceError> for ApiError {
    fn from(err: AttendanceError) -> Self {
        let message = err.to_string();
        match err {
            AttendanceError::InvalidInput(_) => Self::new("INVALID_INPUT", message),
            AttendanceError::SessionNotFound => Self::new("SESSION_NOT_FOUND", message),
            AttendanceError::SessionClosed => Self::new("SESSION_CLOSED", message),
            AttendanceError::OutOfRange {
                distance_m,
                max_distance_m,
            } => Self::with_details(
                "OUT_OF_RANGE",
                message,
                serde_json::json!({
                    "distance": distance_m,
                    "maxDistance": max_distance_m,
                }),
            ),
            AttendanceError::FaceImageRequired => Self::new("FACE_IMAGE_REQUIRED", message),
            AttendanceError::StudentNotFound => Self::new("STUDENT_NOT_FOUND", message),
            AttendanceError::NoFaceData => Self::new("NO_FACE_DATA", message),
            AttendanceError::FaceExtractionFailed(_) => {
                Self::new("FACE_EXTRACTION_FAILED", message)
            }
            AttendanceError::FaceMismatch {
                similarity,
                threshold,
            } => Self::with_details(
                "FACE_MISMATCH",
                message,
                serde_json::json!({
                    "similarity": similarity,
                    "threshold": threshold,
                }),
            ),
            AttendanceError::FaceServiceUnavailable(_) => {
                Self::new("FACE_SERVICE_UNAVAILABLE", message)
            }
            AttendanceError::DuplicateRoll => Self::new("DUPLICATE_ROLL", message),
            AttendanceError::DuplicateDevice => Self::new("DUPLICATE_DEVICE", message),
            AttendanceError::InternalError(e) => {
                tracing::error!("Attendance error: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<SessionServiceError> for ApiError {
    fn from(err: SessionServiceError) -> Self {
        let message = err.to_string();
        match err {
            SessionServiceError::ValidationError(_) => Self::validation_error(message),
            SessionServiceError::NotFound => Self::new("SESSION_NOT_FOUND", message),
            SessionServiceError::CodeSpaceExhausted => {
                tracing::error!("Join code allocation exhausted");
                Self::internal_error("Could not allocate a session code")
            }
            SessionServiceError::InternalError(e) => {
                tracing::error!("Session error: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<StudentServiceError> for ApiError {
    fn from(err: StudentServiceError) -> Self {
        let message = err.to_string();
        match err {
            StudentServiceError::ValidationError(_) => Self::validation_error(message),
            StudentServiceError::DuplicateRoll => Self::new("DUPLICATE_ROLL", message),
            StudentServiceError::NotFound => Self::new("STUDENT_NOT_FOUND", message),
            StudentServiceError::FaceExtractionFailed(_) => {
                Self::new("FACE_EXTRACTION_FAILED", message)
            }
            StudentServiceError::FaceServiceUnavailable(_) => {
                Self::new("FACE_SERVICE_UNAVAILABLE", message)
            }
            StudentServiceError::InternalError(e) => {
                tracing::error!("Student error: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidCredentials => Self::unauthorized(message),
            AuthError::Unauthorized => Self::unauthorized(message),
            AuthError::ValidationError(_) => Self::validation_error(message),
            AuthError::EmailExists => Self::validation_error(message),
            AuthError::InternalError(e) => {
                tracing::error!("Auth error: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the auth token from the Authorization header or session cookie
pub fn extract_auth_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_auth_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let teacher = state
        .auth_service
        .validate_token(&token)
        .await
        .map_err(|err| match err {
            AuthError::Unauthorized => ApiError::unauthorized("Invalid or expired token"),
            other => ApiError::from(other),
        })?;

    request.extensions_mut().insert(AuthenticatedTeacher(teacher));
    Ok(next.run(request).await)
}
