//! Session service
//!
//! Implements the attendance session lifecycle:
//! - Creation with a unique 6-digit join code
//! - Manual close by the owning teacher
//! - Expiry, both lazily on read and via the periodic background sweep
//!
//! Expiry is decided by the server clock against the precomputed
//! `expires_at` deadline. Clients display countdowns but never decide
//! expiry themselves.

use crate::config::SessionConfig;
use crate::db::repositories::{SessionInsertError, SessionRepository};
use crate::models::{CreateSessionInput, Session};
use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No session with the given code, or not owned by the acting teacher
    #[error("Session not found")]
    NotFound,

    /// Could not find a free join code after the configured attempts
    #[error("Could not allocate a unique join code")]
    CodeSpaceExhausted,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Session service
pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    config: SessionConfig,
}

impl SessionService {
    /// Create a new session service
    pub fn new(repo: Arc<dyn SessionRepository>, config: SessionConfig) -> Self {
        Self { repo, config }
    }

    /// Create a new attendance session for a teacher.
    ///
    /// Applies configured defaults for radius and duration when the input
    /// leaves them unset, and retries code generation on the (rare) collision
    /// with an existing session.
    pub async fn create(
        &self,
        teacher_id: i64,
        input: CreateSessionInput,
    ) -> Result<Session, SessionServiceError> {
        self.validate_input(&input)?;

        let radius_m = input.radius_m.unwrap_or(self.config.default_radius_m);
        let duration_minutes = input
            .duration_minutes
            .unwrap_or(self.config.default_duration_minutes);

        if radius_m <= 0.0 {
            return Err(SessionServiceError::ValidationError(
                "Radius must be positive".to_string(),
            ));
        }
        if duration_minutes <= 0 {
            return Err(SessionServiceError::ValidationError(
                "Duration must be positive".to_string(),
            ));
        }

        for _ in 0..self.config.code_attempts.max(1) {
            let created_at = Utc::now();
            let session = Session {
                id: 0,
                code: generate_join_code(),
                created_by: teacher_id,
                subject: input.subject.trim().to_string(),
                course: input.course.trim().to_string(),
                year: input.year.trim().to_string(),
                division: input.division.trim().to_string(),
                room: input
                    .room
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from),
                location: input.location,
                radius_m,
                duration_minutes,
                is_active: true,
                location_required: input.location_required,
                face_required: input.face_required,
                created_at,
                expires_at: Session::expiry_deadline(created_at, duration_minutes),
                closed_at: None,
            };

            match self.repo.create(&session).await {
                Ok(created) => {
                    tracing::info!(
                        session_id = created.id,
                        code = %created.code,
                        teacher_id,
                        "Session created"
                    );
                    return Ok(created);
                }
                Err(SessionInsertError::DuplicateCode) => continue,
                Err(SessionInsertError::Database(e)) => {
                    return Err(SessionServiceError::InternalError(e))
                }
            }
        }

        Err(SessionServiceError::CodeSpaceExhausted)
    }

    /// Load a session by join code, applying lazy expiry.
    ///
    /// A session past its deadline but still flagged active is transitioned
    /// here, so every reader observes the closed state even if the background
    /// sweep has not run yet.
    pub async fn load_by_code(&self, code: &str) -> Result<Session, SessionServiceError> {
        let session = self
            .repo
            .get_by_code(code.trim())
            .await?
            .ok_or(SessionServiceError::NotFound)?;

        let now = Utc::now();
        if session.is_active && session.is_expired(now) {
            self.repo.close(session.id, session.expires_at).await?;
            tracing::debug!(session_id = session.id, "Session lazily expired on read");
            return Ok(Session {
                is_active: false,
                closed_at: Some(session.expires_at),
                ..session
            });
        }

        Ok(session)
    }

    /// Close a session manually.
    ///
    /// Only the owning teacher may close it; another teacher's code behaves
    /// as if the session did not exist, so codes cannot be probed. Closing
    /// an already-closed session is a no-op that returns the current state.
    pub async fn close(&self, code: &str, teacher_id: i64) -> Result<Session, SessionServiceError> {
        let session = self.load_by_code(code).await?;

        if session.created_by != teacher_id {
            return Err(SessionServiceError::NotFound);
        }

        if !session.is_active {
            return Ok(session);
        }

        let closed_at = Utc::now();
        self.repo.close(session.id, closed_at).await?;
        tracing::info!(session_id = session.id, teacher_id, "Session closed");

        Ok(Session {
            is_active: false,
            closed_at: Some(closed_at),
            ..session
        })
    }

    /// List sessions created by a teacher, newest first.
    ///
    /// Expired-but-unswept sessions are transitioned first, so the list
    /// never shows a stale active flag between background sweeps.
    pub async fn list_for_teacher(&self, teacher_id: i64) -> Result<Vec<Session>> {
        self.repo.close_expired(Utc::now()).await?;
        Ok(self.repo.list_by_teacher(teacher_id).await?)
    }

    /// Close every active session past its deadline.
    ///
    /// Called from the background sweep task. Returns the number of sessions
    /// transitioned.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let transitioned = self.repo.close_expired(Utc::now()).await?;
        if transitioned > 0 {
            tracing::info!(transitioned, "Expired sessions swept");
        }
        Ok(transitioned)
    }

    fn validate_input(&self, input: &CreateSessionInput) -> Result<(), SessionServiceError> {
        for (value, field) in [
            (&input.subject, "subject"),
            (&input.course, "course"),
            (&input.year, "year"),
            (&input.division, "division"),
        ] {
            if value.trim().is_empty() {
                return Err(SessionServiceError::ValidationError(format!(
                    "Field '{}' is required",
                    field
                )));
            }
        }

        let lat = input.location.latitude;
        let lon = input.location.longitude;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(SessionServiceError::ValidationError(
                "Location is out of range".to_string(),
            ));
        }

        Ok(())
    }
}

/// Generate a random 6-digit join code (100000..=999999, never a leading zero)
fn generate_join_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}
