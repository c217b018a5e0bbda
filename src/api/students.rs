//! Student API endpoints
//!
//! Handles HTTP requests for the student roster (all require auth):
//! - GET /api/v1/students - List students with search + pagination
//! - POST /api/v1/students - Register a student (multipart, optional photo)
//! - GET /api/v1/students/{id} - Get a student
//! - PUT /api/v1/students/{id} - Update a student (multipart, optional photo)
//! - DELETE /api/v1/students/{id} - Delete a student
//! - GET /api/v1/students/roll/{roll} - Look up by roll number
//! - PUT /api/v1/students/{id}/embeddings - Re-enroll the face from a new photo

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedTeacher};
use crate::api::responses::{StudentListResponse, StudentResponse};
use crate::api::upload::{save_image, validate_image};
use crate::models::{CreateStudentInput, UpdateStudentInput};

/// Query parameters for the student list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStudentsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

/// Build the student router (all routes require auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route(
            "/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/roll/{roll}", get(get_student_by_roll))
        .route("/{id}/embeddings", put(update_embeddings))
}

/// Form fields parsed from a student multipart request
struct StudentForm {
    roll: Option<String>,
    name: Option<String>,
    face_image: Option<(String, Vec<u8>)>,
}

/// Parse a multipart student form (used by create and update)
async fn parse_student_form(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<StudentForm, ApiError> {
    let mut form = StudentForm {
        roll: None,
        name: None,
        face_image: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read form: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "roll" => {
                form.roll = Some(field.text().await.map_err(|e| {
                    ApiError::validation_error(format!("Failed to read field 'roll': {}", e))
                })?);
            }
            "name" => {
                form.name = Some(field.text().await.map_err(|e| {
                    ApiError::validation_error(format!("Failed to read field 'name': {}", e))
                })?);
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
                    form.face_image = Some((content_type, data.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// GET /api/v1/students - List students
async fn list_students(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    Query(query): Query<ListStudentsQuery>,
) -> Result<Json<StudentListResponse>, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);

    let (students, total) = state
        .student_service
        .list(page, per_page, query.search.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to list students: {:#}", e);
            ApiError::internal_error("Internal server error")
        })?;

    Ok(Json(StudentListResponse {
        students: students.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
    }))
}

/// POST /api/v1/students - Register a student
///
/// Accepts multipart/form-data with `roll`, `name` and an optional
/// `faceImage`. When a photo is supplied it is stored and its embedding is
/// extracted before the student is written.
async fn create_student(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = parse_student_form(&state, &mut multipart).await?;

    let roll = form
        .roll
        .ok_or_else(|| ApiError::validation_error("Field 'roll' is required"))?;
    let name = form
        .name
        .ok_or_else(|| ApiError::validation_error("Field 'name' is required"))?;

    let mut profile_image = None;
    let mut face_image = None;
    if let Some((content_type, data)) = form.face_image {
        profile_image = Some(save_image(&state.upload_config, &content_type, &data).await?);
        face_image = Some(data);
    }

    let student = state
        .student_service
        .create(
            CreateStudentInput {
                roll,
                name,
                face_image,
            },
            profile_image,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

/// GET /api/v1/students/{id} - Get a student
async fn get_student(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    Path(id): Path<i64>,
) -> Result<Json<StudentResponse>, ApiError> {
    let student = state.student_service.get(id).await?;
    Ok(Json(student.into()))
}

/// GET /api/v1/students/roll/{roll} - Look up a student by roll number
async fn get_student_by_roll(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    Path(roll): Path<String>,
) -> Result<Json<StudentResponse>, ApiError> {
    let student = state.student_service.get_by_roll(&roll).await?;
    Ok(Json(student.into()))
}

/// PUT /api/v1/students/{id} - Update a student
///
/// Multipart like create; every field is optional. A new photo replaces the
/// stored embeddings and profile image.
async fn update_student(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<StudentResponse>, ApiError> {
    let form = parse_student_form(&state, &mut multipart).await?;

    let mut profile_image = None;
    let mut face_image = None;
    if let Some((content_type, data)) = form.face_image {
        profile_image = Some(save_image(&state.upload_config, &content_type, &data).await?);
        face_image = Some(data);
    }

    let student = state
        .student_service
        .update(
            id,
            UpdateStudentInput {
                roll: form.roll,
                name: form.name,
                face_image,
            },
            profile_image,
        )
        .await?;

    Ok(Json(student.into()))
}

/// PUT /api/v1/students/{id}/embeddings - Re-enroll the student's face
///
/// Accepts multipart/form-data with a single `faceImage` field. The new
/// photo replaces the stored embeddings and profile image.
async fn update_embeddings(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<StudentResponse>, ApiError> {
    let form = parse_student_form(&state, &mut multipart).await?;

    let (content_type, data) = form
        .face_image
        .ok_or_else(|| ApiError::validation_error("Field 'faceImage' is required"))?;

    let profile_image = save_image(&state.upload_config, &content_type, &data).await?;

    let student = state
        .student_service
        .update(
            id,
            UpdateStudentInput {
                face_image: Some(data),
                ..Default::default()
            },
            Some(profile_image),
        )
        .await?;

    Ok(Json(student.into()))
}

/// DELETE /api/v1/students/{id} - Delete a student
async fn delete_student(
    State(state): State<AppState>,
    _teacher: AuthenticatedTeacher,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.student_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
