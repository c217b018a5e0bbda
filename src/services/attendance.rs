//! Attendance service
//!
//! Implements the attendance marking pipeline. A submission passes through
//! an ordered series of gates; the first failing gate decides the error and
//! nothing is written unless every gate passes:
//!
//! 1. Required fields present
//! 2. Session exists
//! 3. Session is active (expiry applied lazily on read)
//! 4. Geofence, when the session requires location
//! 5. Face verification, when the session requires it
//! 6. No duplicate roll number, then no duplicate device
//! 7. Commit the record
//!
//! The duplicate checks in step 6 are advisory, for error ordering on the
//! common path; the commit in step 7 relies on the table's UNIQUE
//! constraints, so racing submissions cannot both land.

use crate::db::repositories::{
    AppendAttendanceError, AttendanceRepository, StudentRepository,
};
use crate::geo::{self, GeoPoint};
use crate::models::{normalize_roll, AttendanceRecord};
use crate::services::face::{FaceMatchClient, FaceServiceError};
use crate::services::session::{SessionService, SessionServiceError};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

/// Error types for attendance submissions.
///
/// Each variant corresponds to one rejection the client can present to the
/// student; the order of gates guarantees at most one applies.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// A required field is missing or blank
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No session with the given code
    #[error("Session not found")]
    SessionNotFound,

    /// The session has been closed or has expired
    #[error("Session is closed")]
    SessionClosed,

    /// The submitted location is outside the session geofence
    #[error("Out of range: {distance_m:.0}m away, maximum is {max_distance_m:.0}m")]
    OutOfRange {
        /// Measured distance, rounded to whole meters
        distance_m: f64,
        /// The session's geofence radius
        max_distance_m: f64,
    },

    /// The session requires a face photo and none was submitted
    #[error("Face image is required for this session")]
    FaceImageRequired,

    /// No registered student with the submitted roll number
    #[error("Student not found")]
    StudentNotFound,

    /// The student has no registered face data to compare against
    #[error("No face data registered for this student")]
    NoFaceData,

    /// The face service could not find a face in the submitted photo
    #[error("Face extraction failed: {0}")]
    FaceExtractionFailed(String),

    /// The submitted face does not match the registered one
    #[error("Face mismatch: similarity {similarity:.2} below threshold {threshold:.2}")]
    FaceMismatch { similarity: f64, threshold: f64 },

    /// The face service is unreachable; the submission may be retried
    #[error("Face service unavailable: {0}")]
    FaceServiceUnavailable(String),

    /// This roll number has already been marked in the session
    #[error("Attendance already marked for this roll number")]
    DuplicateRoll,

    /// This device has already marked attendance in the session
    #[error("Attendance already marked from this device")]
    DuplicateDevice,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<SessionServiceError> for AttendanceError {
    fn from(err: SessionServiceError) -> Self {
        match err {
            SessionServiceError::NotFound => AttendanceError::SessionNotFound,
            SessionServiceError::InternalError(e) => AttendanceError::InternalError(e),
            other => AttendanceError::InternalError(anyhow::Error::new(other)),
        }
    }
}

/// A committed submission together with the session's updated record count
#[derive(Debug, Clone)]
pub struct MarkedAttendance {
    pub record: AttendanceRecord,
    pub attendance_count: i64,
}

/// A single attendance submission
#[derive(Debug, Clone)]
pub struct MarkAttendanceInput {
    /// Join code of the target session
    pub session_code: String,
    /// Student roll number (normalized to uppercase before any check)
    pub roll_no: String,
    /// Student name as entered
    pub name: String,
    /// Client-generated device fingerprint
    pub device_id: String,
    /// Client IP, recorded informationally
    pub ip: Option<String>,
    /// GPS location; required when the session enforces the geofence
    pub location: Option<GeoPoint>,
    /// Face photo bytes; required when the session enforces face checks
    pub face_image: Option<Vec<u8>>,
}

/// Attendance service running the validation pipeline
pub struct AttendanceService {
    sessions: Arc<SessionService>,
    attendance_repo: Arc<dyn AttendanceRepository>,
    student_repo: Arc<dyn StudentRepository>,
    face_client: Arc<dyn FaceMatchClient>,
    similarity_threshold: f64,
}

impl AttendanceService {
    /// Create a new attendance service
    pub fn new(
        sessions: Arc<SessionService>,
        attendance_repo: Arc<dyn AttendanceRepository>,
        student_repo: Arc<dyn StudentRepository>,
        face_client: Arc<dyn FaceMatchClient>,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            sessions,
            attendance_repo,
            student_repo,
            face_client,
            similarity_threshold,
        }
    }

    /// Run a submission through the pipeline.
    ///
    /// Returns the committed record on success. On failure, no state has
    /// changed apart from lazy session expiry.
    pub async fn mark(
        &self,
        input: MarkAttendanceInput,
    ) -> Result<MarkedAttendance, AttendanceError> {
        // Gate 1: required fields
        let roll_no = normalize_roll(&input.roll_no);
        let name = input.name.trim().to_string();
        let device_id = input.device_id.trim().to_string();
        let session_code = input.session_code.trim().to_string();

        for (value, field) in [
            (&session_code, "sessionId"),
            (&roll_no, "rollNo"),
            (&name, "name"),
            (&device_id, "deviceId"),
        ] {
            if value.is_empty() {
                return Err(AttendanceError::InvalidInput(format!(
                    "Field '{}' is required",
                    field
                )));
            }
        }

        // Gates 2 + 3: session exists and is active
        let session = self.sessions.load_by_code(&session_code).await?;
        if !session.is_active {
            return Err(AttendanceError::SessionClosed);
        }

        // Gate 4: geofence
        let location = if session.location_required {
            let location = input.location.ok_or_else(|| {
                AttendanceError::InvalidInput("Field 'geoLocation' is required".to_string())
            })?;

            let distance_m = geo::distance_meters(session.location, location);
            if distance_m > session.radius_m {
                return Err(AttendanceError::OutOfRange {
                    distance_m: distance_m.round(),
                    max_distance_m: session.radius_m,
                });
            }
            Some(location)
        } else {
            input.location
        };

        // Gate 5: face verification
        if session.face_required {
            let image = input
                .face_image
                .as_deref()
                .ok_or(AttendanceError::FaceImageRequired)?;
            self.verify_face(&roll_no, image).await?;
        }

        // Gate 6: advisory duplicate checks, roll before device
        if self.attendance_repo.roll_exists(session.id, &roll_no).await? {
            return Err(AttendanceError::DuplicateRoll);
        }
        if self
            .attendance_repo
            .device_exists(session.id, &device_id)
            .await?
        {
            return Err(AttendanceError::DuplicateDevice);
        }

        // Gate 7: commit. The UNIQUE constraints re-check the duplicates
        // authoritatively, catching anything that raced past gate 6.
        let record = AttendanceRecord {
            id: 0,
            session_id: session.id,
            roll_no,
            name,
            device_id,
            ip: input.ip,
            location,
            marked_at: Utc::now(),
        };

        match self.attendance_repo.append(&record).await {
            Ok(committed) => {
                tracing::info!(
                    session_id = session.id,
                    roll_no = %committed.roll_no,
                    "Attendance marked"
                );
                let attendance_count = self.attendance_repo.count_for_session(session.id).await?;
                Ok(MarkedAttendance {
                    record: committed,
                    attendance_count,
                })
            }
            Err(AppendAttendanceError::DuplicateRoll) => Err(AttendanceError::DuplicateRoll),
            Err(AppendAttendanceError::DuplicateDevice) => Err(AttendanceError::DuplicateDevice),
            Err(AppendAttendanceError::Database(e)) => Err(AttendanceError::InternalError(e)),
        }
    }

    /// List the accepted records for a session, oldest first
    pub async fn list_for_session(&self, session_id: i64) -> Result<Vec<AttendanceRecord>> {
        self.attendance_repo.list_for_session(session_id).await
    }

    /// Count the accepted records for a session
    pub async fn count_for_session(&self, session_id: i64) -> Result<i64> {
        self.attendance_repo.count_for_session(session_id).await
    }

    async fn verify_face(&self, roll_no: &str, image: &[u8]) -> Result<(), AttendanceError> {
        let student = self
            .student_repo
            .get_by_roll(roll_no)
            .await?
            .ok_or(AttendanceError::StudentNotFound)?;

        if !student.has_face_data() {
            return Err(AttendanceError::NoFaceData);
        }

        let submitted = self
            .face_client
            .extract_embedding(image)
            .await
            .map_err(map_face_error)?;

        let similarity = self
            .face_client
            .compare(&submitted, &student.face_embeddings)
            .await
            .map_err(map_face_error)?;

        if similarity < self.similarity_threshold {
            return Err(AttendanceError::FaceMismatch {
                similarity,
                threshold: self.similarity_threshold,
            });
        }

        Ok(())
    }
}

fn map_face_error(err: FaceServiceError) -> AttendanceError {
    match err {
        FaceServiceError::NoFaceDetected(msg) => AttendanceError::FaceExtractionFailed(msg),
        FaceServiceError::InvalidResponse(msg) => AttendanceError::FaceExtractionFailed(msg),
        FaceServiceError::Unavailable(msg) => AttendanceError::FaceServiceUnavailable(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::db::repositories::{
        SessionRepository, SqlxAttendanceRepository, SqlxSessionRepository,
        SqlxStudentRepository, SqlxTeacherRepository, TeacherRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CreateSessionInput, Session, Student};
    use async_trait::async_trait;

    /// Scripted face client for tests
    struct FakeFaceClient {
        extract: Result<Vec<f64>, fn() -> FaceServiceError>,
        similarity: Result<f64, fn() -> FaceServiceError>,
    }

    impl FakeFaceClient {
        fn matching() -> Self {
            Self {
                extract: Ok(vec![0.1, 0.2, 0.3]),
                similarity: Ok(0.92),
            }
        }

        fn with_similarity(similarity: f64) -> Self {
            Self {
                extract: Ok(vec![0.1, 0.2, 0.3]),
                similarity: Ok(similarity),
            }
        }

        fn no_face() -> Self {
            Self {
                extract: Err(|| FaceServiceError::NoFaceDetected("No face detected".to_string())),
                similarity: Ok(0.0),
            }
        }

        fn unavailable() -> Self {
            Self {
                extract: Err(|| FaceServiceError::Unavailable("connection refused".to_string())),
                similarity: Ok(0.0),
            }
        }
    }

    #[async_trait]
    impl FaceMatchClient for FakeFaceClient {
        async fn extract_embedding(&self, _image: &[u8]) -> Result<Vec<f64>, FaceServiceError> {
            match &self.extract {
                Ok(v) => Ok(v.clone()),
                Err(make) => Err(make()),
            }
        }

        async fn compare(&self, _a: &[f64], _b: &[f64]) -> Result<f64, FaceServiceError> {
            match &self.similarity {
                Ok(s) => Ok(*s),
                Err(make) => Err(make()),
            }
        }
    }

    struct Fixture {
        pool: DynDatabasePool,
        teacher_id: i64,
    }

    impl Fixture {
        async fn new() -> Self {
            let pool = create_test_pool().await.expect("Failed to create test pool");
            migrations::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");

            let teachers = SqlxTeacherRepository::new(pool.clone());
            let teacher = teachers
                .create("t@example.com", "Teacher", "hash")
                .await
                .expect("Failed to create teacher");

            Self {
                pool,
                teacher_id: teacher.id,
            }
        }

        fn service_with(&self, face: FakeFaceClient) -> AttendanceService {
            let sessions = Arc::new(SessionService::new(
                SqlxSessionRepository::boxed(self.pool.clone()),
                SessionConfig::default(),
            ));
            AttendanceService::new(
                sessions,
                SqlxAttendanceRepository::boxed(self.pool.clone()),
                SqlxStudentRepository::boxed(self.pool.clone()),
                Arc::new(face),
                0.6,
            )
        }

        async fn create_session(&self, location_required: bool, face_required: bool) -> Session {
            let sessions = SessionService::new(
                SqlxSessionRepository::boxed(self.pool.clone()),
                SessionConfig::default(),
            );
            sessions
                .create(
                    self.teacher_id,
                    CreateSessionInput {
                        subject: "AI".to_string(),
                        course: "MCA".to_string(),
                        year: "FY".to_string(),
                        division: "A".to_string(),
                        room: None,
                        location: GeoPoint {
                            latitude: 18.5204,
                            longitude: 73.8567,
                        },
                        radius_m: Some(50.0),
                        duration_minutes: Some(15),
                        location_required,
                        face_required,
                    },
                )
                .await
                .expect("Failed to create session")
        }

        async fn create_expired_session(&self) -> Session {
            let repo = SqlxSessionRepository::new(self.pool.clone());
            let created_at = Utc::now() - chrono::Duration::minutes(30);
            repo.create(&Session {
                id: 0,
                code: "999999".to_string(),
                created_by: self.teacher_id,
                subject: "AI".to_string(),
                course: "MCA".to_string(),
                year: "FY".to_string(),
                division: "A".to_string(),
                room: None,
                location: GeoPoint {
                    latitude: 18.5204,
                    longitude: 73.8567,
                },
                radius_m: 50.0,
                duration_minutes: 15,
                is_active: true,
                location_required: true,
                face_required: false,
                created_at,
                expires_at: Session::expiry_deadline(created_at, 15),
                closed_at: None,
            })
            .await
            .expect("Failed to create expired session")
        }

        async fn register_student(&self, roll: &str, embeddings: Vec<f64>) {
            let repo = SqlxStudentRepository::new(self.pool.clone());
            let now = Utc::now();
            repo.create(&Student {
                id: 0,
                roll: roll.to_string(),
                name: "Asha".to_string(),
                face_embeddings: embeddings,
                profile_image: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("Failed to create student");
        }
    }

    fn submission(code: &str, roll: &str, device: &str) -> MarkAttendanceInput {
        MarkAttendanceInput {
            session_code: code.to_string(),
            roll_no: roll.to_string(),
            name: "Asha".to_string(),
            device_id: device.to_string(),
            ip: Some("10.0.0.5".to_string()),
            // ~15m from the session reference point
            location: Some(GeoPoint {
                latitude: 18.52053,
                longitude: 73.85680,
            }),
            face_image: None,
        }
    }

    #[tokio::test]
    async fn test_in_range_submission_accepted() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, false).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let marked = service
            .mark(submission(&session.code, "a42", "dev-1"))
            .await
            .expect("Submission should be accepted");

        assert_eq!(marked.record.session_id, session.id);
        assert_eq!(marked.record.roll_no, "A42", "Roll should be normalized");
        assert!(marked.record.location.is_some());
        assert_eq!(marked.attendance_count, 1);
        assert_eq!(service.count_for_session(session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_rejected_with_distance() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, false).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        // ~1.1km north of the reference point
        input.location = Some(GeoPoint {
            latitude: 18.5304,
            longitude: 73.8567,
        });

        let err = service.mark(input).await.expect_err("Should be rejected");
        match err {
            AttendanceError::OutOfRange {
                distance_m,
                max_distance_m,
            } => {
                assert!(distance_m > 1000.0 && distance_m < 1300.0, "got {}", distance_m);
                assert_eq!(max_distance_m, 50.0);
                // Rounded to whole meters
                assert_eq!(distance_m, distance_m.round());
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }

        assert_eq!(service.count_for_session(session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_location_when_required() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, false).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.location = None;

        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_location_not_required_skips_geofence() {
        let fx = Fixture::new().await;
        let session = fx.create_session(false, false).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.location = None;

        let marked = service.mark(input).await.expect("Should be accepted");
        assert!(marked.record.location.is_none());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let fx = Fixture::new().await;
        let service = fx.service_with(FakeFaceClient::matching());

        let err = service
            .mark(submission("000000", "A42", "dev-1"))
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let fx = Fixture::new().await;
        let session = fx.create_expired_session().await;
        let service = fx.service_with(FakeFaceClient::matching());

        let err = service
            .mark(submission(&session.code, "A42", "dev-1"))
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::SessionClosed));
    }

    #[tokio::test]
    async fn test_blank_fields_rejected() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, false).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.name = "   ".to_string();
        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::InvalidInput(_)));

        let mut input = submission(&session.code, "  ", "dev-1");
        input.roll_no = "  ".to_string();
        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_duplicate_roll_checked_before_device() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, false).await;
        let service = fx.service_with(FakeFaceClient::matching());

        service
            .mark(submission(&session.code, "A42", "dev-1"))
            .await
            .expect("First submission should be accepted");

        // Same roll AND same device: roll wins
        let err = service
            .mark(submission(&session.code, "A42", "dev-1"))
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::DuplicateRoll));

        // Same roll, different case, different device: still the roll
        let err = service
            .mark(submission(&session.code, "a42", "dev-2"))
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::DuplicateRoll));

        // Different roll, same device
        let err = service
            .mark(submission(&session.code, "B07", "dev-1"))
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::DuplicateDevice));

        assert_eq!(service.count_for_session(session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_face_required_without_image() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let err = service
            .mark(submission(&session.code, "A42", "dev-1"))
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::FaceImageRequired));
    }

    #[tokio::test]
    async fn test_face_unknown_student() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::StudentNotFound));
    }

    #[tokio::test]
    async fn test_face_student_without_embeddings() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        fx.register_student("A42", vec![]).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::NoFaceData));
    }

    #[tokio::test]
    async fn test_face_match_accepted() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        fx.register_student("A42", vec![0.1, 0.2, 0.3]).await;
        let service = fx.service_with(FakeFaceClient::matching());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        let marked = service.mark(input).await.expect("Should be accepted");
        assert_eq!(marked.record.roll_no, "A42");
    }

    #[tokio::test]
    async fn test_face_mismatch_below_threshold() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        fx.register_student("A42", vec![0.1, 0.2, 0.3]).await;
        let service = fx.service_with(FakeFaceClient::with_similarity(0.41));

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        let err = service.mark(input).await.expect_err("Should be rejected");
        match err {
            AttendanceError::FaceMismatch {
                similarity,
                threshold,
            } => {
                assert_eq!(similarity, 0.41);
                assert_eq!(threshold, 0.6);
            }
            other => panic!("Expected FaceMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_face_at_threshold_accepted() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        fx.register_student("A42", vec![0.1, 0.2, 0.3]).await;
        let service = fx.service_with(FakeFaceClient::with_similarity(0.6));

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        assert!(service.mark(input).await.is_ok());
    }

    #[tokio::test]
    async fn test_face_no_face_in_photo() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        fx.register_student("A42", vec![0.1, 0.2, 0.3]).await;
        let service = fx.service_with(FakeFaceClient::no_face());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::FaceExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_face_service_down_is_transient() {
        let fx = Fixture::new().await;
        let session = fx.create_session(true, true).await;
        fx.register_student("A42", vec![0.1, 0.2, 0.3]).await;
        let service = fx.service_with(FakeFaceClient::unavailable());

        let mut input = submission(&session.code, "A42", "dev-1");
        input.face_image = Some(vec![0xff, 0xd8]);

        let err = service.mark(input).await.expect_err("Should be rejected");
        assert!(matches!(err, AttendanceError::FaceServiceUnavailable(_)));

        // Nothing was committed; the student can retry
        assert_eq!(service.count_for_session(session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_same_device_single_winner() {
        let fx = Fixture::new().await;
        let session = fx.create_session(false, false).await;
        let service = Arc::new(fx.service_with(FakeFaceClient::matching()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            let code = session.code.clone();
            handles.push(tokio::spawn(async move {
                let mut input = submission(&code, &format!("R{:02}", i), "shared-device");
                input.location = None;
                service.mark(input).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.expect("Task panicked") {
                Ok(_) => accepted += 1,
                Err(AttendanceError::DuplicateDevice) => {}
                Err(other) => panic!("Unexpected error: {:?}", other),
            }
        }

        assert_eq!(accepted, 1, "Exactly one submission should win");
        assert_eq!(service.count_for_session(session.id).await.unwrap(), 1);
    }
}
