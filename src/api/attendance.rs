//! Attendance API endpoints
//!
//! Handles the public attendance submission:
//! - POST /api/v1/attendance - Mark attendance (multipart/form-data)
//!
//! The form carries text fields (sessionId, rollNo, name, deviceId, an
//! optional JSON-encoded geoLocation) plus an optional binary faceImage.
//! All acceptance decisions happen in the attendance service; this handler
//! only parses the form and records the client IP.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::MarkAttendanceResponse;
use crate::api::upload::validate_image;
use crate::geo::GeoPoint;
use crate::services::MarkAttendanceInput;

/// Build the attendance router (public)
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(mark_attendance))
}

/// POST /api/v1/attendance - Mark attendance for a session
async fn mark_attendance(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut session_code = String::new();
    let mut roll_no = String::new();
    let mut name = String::new();
    let mut device_id = String::new();
    let mut location: Option<GeoPoint> = None;
    let mut face_image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read form: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "sessionId" => session_code = read_text(field).await?,
            "rollNo" => roll_no = read_text(field).await?,
            "name" => name = read_text(field).await?,
            "deviceId" => device_id = read_text(field).await?,
            "geoLocation" => {
                let raw = read_text(field).await?;
                if !raw.trim().is_empty() {
                    let point: GeoPoint = serde_json::from_str(&raw).map_err(|_| {
                        ApiError::validation_error("Field 'geoLocation' is not a valid location")
                    })?;
                    location = Some(point);
                }
            }
            "faceImage" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let data = field.bytes().await.map_err(|e| {
                    ApiError::validation_error(format!("Failed to read face image: {}", e))
                })?;

                if !data.is_empty() {
                    validate_image(&state.upload_config, &content_type, data.len() as u64)?;
                    face_image = Some(data.to_vec());
                }
            }
            _ => {}
        }
    }

    let input = MarkAttendanceInput {
        session_code,
        roll_no,
        name,
        device_id,
        ip: Some(client_ip(&headers, addr)),
        location,
        face_image,
    };

    let marked = state.attendance_service.mark(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(MarkAttendanceResponse {
            message: "Attendance marked".to_string(),
            attendance_count: marked.attendance_count,
            record: marked.record.into(),
        }),
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    let name = field.name().unwrap_or("").to_string();
    field
        .text()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read field '{}': {}", name, e)))
}

/// Resolve the client IP, preferring proxy headers over the socket address
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    addr.ip().to_string()
}
