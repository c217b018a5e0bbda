//! HTTP API integration tests
//!
//! Boots the full router against an in-memory SQLite database and drives it
//! over real HTTP. The face service is configured but never reached; these
//! tests only cover sessions without face verification.

use std::net::SocketAddr;
use std::sync::Arc;

use axum_test::multipart::MultipartForm;
use axum_test::{TestServer, TestServerConfig, Transport};
use serde_json::{json, Value};

use rollcall::api::{build_router, AppState};
use rollcall::config::{FaceServiceConfig, SessionConfig, UploadConfig};
use rollcall::db::repositories::{
    SqlxAttendanceRepository, SqlxAuthTokenRepository, SqlxSessionRepository,
    SqlxStudentRepository, SqlxTeacherRepository,
};
use rollcall::db::{create_test_pool, migrations};
use rollcall::services::{
    attendance::AttendanceService, auth::AuthService, face::HttpFaceMatchClient,
    session::SessionService, student::StudentService, FaceMatchClient,
};

async fn spawn_server() -> TestServer {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let face_client: Arc<dyn FaceMatchClient> = Arc::new(
        HttpFaceMatchClient::new(&FaceServiceConfig::default())
            .expect("Failed to build face client"),
    );

    let auth_service = Arc::new(AuthService::new(
        SqlxTeacherRepository::boxed(pool.clone()),
        SqlxAuthTokenRepository::boxed(pool.clone()),
    ));
    let session_service = Arc::new(SessionService::new(
        SqlxSessionRepository::boxed(pool.clone()),
        SessionConfig::default(),
    ));
    let student_repo = SqlxStudentRepository::boxed(pool.clone());
    let attendance_service = Arc::new(AttendanceService::new(
        session_service.clone(),
        SqlxAttendanceRepository::boxed(pool.clone()),
        student_repo.clone(),
        face_client.clone(),
        0.6,
    ));
    let student_service = Arc::new(StudentService::new(student_repo, face_client));

    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
    let state = AppState {
        pool,
        auth_service,
        session_service,
        attendance_service,
        student_service,
        upload_config: Arc::new(UploadConfig {
            path: upload_dir.keep(),
            ..Default::default()
        }),
    };

    let app = build_router(state, "http://localhost:3000");

    // A real socket transport so the ConnectInfo extractor resolves
    let config = TestServerConfig {
        transport: Some(Transport::HttpRandomPort),
        ..TestServerConfig::default()
    };
    TestServer::new_with_config(
        app.into_make_service_with_connect_info::<SocketAddr>(),
        config,
    )
    .expect("Failed to start test server")
}

/// Register a teacher and return a bearer token
async fn login(server: &TestServer) -> String {
    let register = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "asha@example.com",
            "name": "Asha",
            "password": "correct-horse-battery",
        }))
        .await;
    register.assert_status(axum::http::StatusCode::CREATED);

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({
            "email": "asha@example.com",
            "password": "correct-horse-battery",
        }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    body["token"].as_str().expect("Missing token").to_string()
}

/// Create a session and return its join code
async fn create_session(server: &TestServer, token: &str, face_required: bool) -> String {
    let response = server
        .post("/api/v1/sessions")
        .authorization_bearer(token)
        .json(&json!({
            "subject": "Artificial Intelligence",
            "course": "MCA",
            "year": "FY",
            "division": "A",
            "room": "301",
            "geoLocation": { "latitude": 18.5204, "longitude": 73.8567 },
            "isLocationRequired": true,
            "isFaceRecogRequired": face_required,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    body["sessionId"]
        .as_str()
        .expect("Missing sessionId")
        .to_string()
}

fn attendance_form(code: &str, roll: &str, device: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("sessionId", code.to_string())
        .add_text("rollNo", roll.to_string())
        .add_text("name", "Asha")
        .add_text("deviceId", device.to_string())
        .add_text(
            "geoLocation",
            r#"{"latitude": 18.52053, "longitude": 73.85680}"#,
        )
}

#[tokio::test]
async fn test_health_check() {
    let server = spawn_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_auth_flow() {
    let server = spawn_server().await;
    let token = login(&server).await;

    let me = server
        .get("/api/v1/auth/me")
        .authorization_bearer(&token)
        .await;
    me.assert_status_ok();
    let body: Value = me.json();
    assert_eq!(body["email"], "asha@example.com");

    let logout = server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&token)
        .await;
    logout.assert_status(axum::http::StatusCode::NO_CONTENT);

    // The token is dead immediately after logout
    let rejected = server
        .get("/api/v1/auth/me")
        .authorization_bearer(&token)
        .await;
    rejected.assert_status_unauthorized();
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let server = spawn_server().await;

    let response = server.get("/api/v1/sessions").await;
    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_login_wrong_password_rejected() {
    let server = spawn_server().await;
    login(&server).await;

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({
            "email": "asha@example.com",
            "password": "wrong-password",
        }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_session_lifecycle() {
    let server = spawn_server().await;
    let token = login(&server).await;
    let code = create_session(&server, &token, false).await;

    // Public detail view, no auth needed
    let detail = server.get(&format!("/api/v1/sessions/{}", code)).await;
    detail.assert_status_ok();
    let body: Value = detail.json();
    assert_eq!(body["sessionId"], code.as_str());
    assert_eq!(body["isActive"], true);
    assert_eq!(body["attendanceCount"], 0);
    assert_eq!(body["attendance"], json!([]));

    // The owner's list includes it
    let list = server
        .get("/api/v1/sessions")
        .authorization_bearer(&token)
        .await;
    list.assert_status_ok();
    let sessions: Value = list.json();
    assert_eq!(sessions.as_array().unwrap().len(), 1);

    // Close it
    let close = server
        .post("/api/v1/sessions/close")
        .authorization_bearer(&token)
        .json(&json!({ "sessionId": code }))
        .await;
    close.assert_status_ok();
    let closed: Value = close.json();
    assert_eq!(closed["isActive"], false);
    assert!(closed["closedAt"].is_string());
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let server = spawn_server().await;

    let response = server.get("/api/v1/sessions/000000").await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_mark_attendance() {
    let server = spawn_server().await;
    let token = login(&server).await;
    let code = create_session(&server, &token, false).await;

    let response = server
        .post("/api/v1/attendance")
        .multipart(attendance_form(&code, "a42", "device-1"))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["attendanceCount"], 1);
    assert_eq!(body["record"]["rollNo"], "A42");
    assert_eq!(body["record"]["deviceId"], "device-1");

    // The record shows up in the public detail view
    let detail = server.get(&format!("/api/v1/sessions/{}", code)).await;
    let detail_body: Value = detail.json();
    assert_eq!(detail_body["attendanceCount"], 1);
    assert_eq!(detail_body["attendance"][0]["rollNo"], "A42");
}

#[tokio::test]
async fn test_duplicate_roll_rejected() {
    let server = spawn_server().await;
    let token = login(&server).await;
    let code = create_session(&server, &token, false).await;

    server
        .post("/api/v1/attendance")
        .multipart(attendance_form(&code, "A42", "device-1"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let response = server
        .post("/api/v1/attendance")
        .multipart(attendance_form(&code, "A42", "device-2"))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "DUPLICATE_ROLL");
}

#[tokio::test]
async fn test_out_of_range_rejected_with_distance() {
    let server = spawn_server().await;
    let token = login(&server).await;
    let code = create_session(&server, &token, false).await;

    let form = MultipartForm::new()
        .add_text("sessionId", code)
        .add_text("rollNo", "A42")
        .add_text("name", "Asha")
        .add_text("deviceId", "device-1")
        // ~1.1 km north of the session reference point
        .add_text(
            "geoLocation",
            r#"{"latitude": 18.5304, "longitude": 73.8567}"#,
        );

    let response = server.post("/api/v1/attendance").multipart(form).await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "OUT_OF_RANGE");
    assert!(body["error"]["details"]["distance"].as_f64().unwrap() > 1000.0);
    assert_eq!(body["error"]["details"]["maxDistance"], 50.0);
}

#[tokio::test]
async fn test_closed_session_rejects_attendance() {
    let server = spawn_server().await;
    let token = login(&server).await;
    let code = create_session(&server, &token, false).await;

    server
        .post("/api/v1/sessions/close")
        .authorization_bearer(&token)
        .json(&json!({ "sessionId": code }))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/v1/attendance")
        .multipart(attendance_form(&code, "A42", "device-1"))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "SESSION_CLOSED");
}

#[tokio::test]
async fn test_face_required_session_demands_image() {
    let server = spawn_server().await;
    let token = login(&server).await;
    let code = create_session(&server, &token, true).await;

    let response = server
        .post("/api/v1/attendance")
        .multipart(attendance_form(&code, "A42", "device-1"))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "FACE_IMAGE_REQUIRED");
}

#[tokio::test]
async fn test_student_crud() {
    let server = spawn_server().await;
    let token = login(&server).await;

    let create = server
        .post("/api/v1/students")
        .authorization_bearer(&token)
        .multipart(
            MultipartForm::new()
                .add_text("roll", "a42")
                .add_text("name", "Asha"),
        )
        .await;
    create.assert_status(axum::http::StatusCode::CREATED);
    let created: Value = create.json();
    assert_eq!(created["roll"], "A42");
    assert_eq!(created["hasFaceData"], false);
    let id = created["id"].as_i64().unwrap();

    // Lookup by roll is case-insensitive
    let by_roll = server
        .get("/api/v1/students/roll/a42")
        .authorization_bearer(&token)
        .await;
    by_roll.assert_status_ok();

    let list = server
        .get("/api/v1/students?search=ash")
        .authorization_bearer(&token)
        .await;
    list.assert_status_ok();
    let listed: Value = list.json();
    assert_eq!(listed["total"], 1);

    let update = server
        .put(&format!("/api/v1/students/{}", id))
        .authorization_bearer(&token)
        .multipart(MultipartForm::new().add_text("name", "Asha K"))
        .await;
    update.assert_status_ok();
    let updated: Value = update.json();
    assert_eq!(updated["name"], "Asha K");

    let delete = server
        .delete(&format!("/api/v1/students/{}", id))
        .authorization_bearer(&token)
        .await;
    delete.assert_status(axum::http::StatusCode::NO_CONTENT);

    let gone = server
        .get(&format!("/api/v1/students/{}", id))
        .authorization_bearer(&token)
        .await;
    gone.assert_status_not_found();
}
