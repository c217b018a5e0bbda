//! Session API endpoints
//!
//! Handles HTTP requests for attendance sessions:
//! - POST /api/v1/sessions - Create a session (auth)
//! - POST /api/v1/sessions/close - Close a session (auth)
//! - GET /api/v1/sessions - List the caller's sessions (auth)
//! - GET /api/v1/sessions/{code} - Session detail + attendance list (public)
//!
//! The detail endpoint is public because students poll it from the join page
//! to watch the countdown and the live attendance list.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedTeacher};
use crate::api::responses::{AttendanceRecordResponse, SessionDetailResponse, SessionResponse};
use crate::geo::GeoPoint;
use crate::models::CreateSessionInput;

/// Request body for session creation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub subject: String,
    pub course: String,
    pub year: String,
    pub division: String,
    pub room: Option<String>,
    pub geo_location: GeoPoint,
    pub max_distance: Option<f64>,
    pub duration_minutes: Option<i64>,
    #[serde(default = "default_location_required")]
    pub is_location_required: bool,
    #[serde(default)]
    pub is_face_recog_required: bool,
}

fn default_location_required() -> bool {
    true
}

/// Request body for closing a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionRequest {
    pub session_id: String,
}

/// Build public session routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/{code}", get(get_session))
}

/// Build protected session routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/close", post(close_session))
}

/// POST /api/v1/sessions - Create an attendance session
async fn create_session(
    State(state): State<AppState>,
    teacher: AuthenticatedTeacher,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateSessionInput {
        subject: body.subject,
        course: body.course,
        year: body.year,
        division: body.division,
        room: body.room,
        location: body.geo_location,
        radius_m: body.max_distance,
        duration_minutes: body.duration_minutes,
        location_required: body.is_location_required,
        face_required: body.is_face_recog_required,
    };

    let session = state.session_service.create(teacher.0.id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::from_session(session, 0)),
    ))
}

/// POST /api/v1/sessions/close - Close a session manually
///
/// Only the owning teacher may close a session. Closing an already-closed
/// session returns its current state unchanged.
async fn close_session(
    State(state): State<AppState>,
    teacher: AuthenticatedTeacher,
    Json(body): Json<CloseSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .session_service
        .close(&body.session_id, teacher.0.id)
        .await?;

    let count = state
        .attendance_service
        .count_for_session(session.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count attendance: {:#}", e);
            ApiError::internal_error("Internal server error")
        })?;

    Ok(Json(SessionResponse::from_session(session, count)))
}

/// GET /api/v1/sessions - List the caller's sessions, newest first
async fn list_sessions(
    State(state): State<AppState>,
    teacher: AuthenticatedTeacher,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = state
        .session_service
        .list_for_teacher(teacher.0.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list sessions: {:#}", e);
            ApiError::internal_error("Internal server error")
        })?;

    let mut responses = Vec::with_capacity(sessions.len());
    for session in sessions {
        let count = state
            .attendance_service
            .count_for_session(session.id)
            .await
            .unwrap_or(0);
        responses.push(SessionResponse::from_session(session, count));
    }

    Ok(Json(responses))
}

/// GET /api/v1/sessions/{code} - Session detail with attendance list
///
/// Public endpoint. Applies lazy expiry, so a session past its deadline is
/// reported closed even before the background sweep runs.
async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let session = state.session_service.load_by_code(&code).await?;

    let records = state
        .attendance_service
        .list_for_session(session.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list attendance: {:#}", e);
            ApiError::internal_error("Internal server error")
        })?;

    let attendance: Vec<AttendanceRecordResponse> =
        records.into_iter().map(Into::into).collect();
    let count = attendance.len() as i64;

    Ok(Json(SessionDetailResponse {
        session: SessionResponse::from_session(session, count),
        attendance,
    }))
}
