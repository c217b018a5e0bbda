//! Authentication service
//!
//! Implements teacher login/logout with opaque bearer tokens. Tokens are
//! random uuids stored server-side; validation is a lookup plus an expiry
//! check, so revocation (logout) is immediate.

use crate::db::repositories::{AuthTokenRepository, TeacherRepository};
use crate::models::{AuthToken, CreateTeacherInput, Teacher};
use crate::services::password::{hash_password, verify_password};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Default token lifetime in hours
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Invalid credentials or unknown account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Token missing, unknown, or expired
    #[error("Authentication required")]
    Unauthorized,

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Email already registered
    #[error("Email already registered")]
    EmailExists,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Authentication service for teacher accounts
pub struct AuthService {
    teacher_repo: Arc<dyn TeacherRepository>,
    token_repo: Arc<dyn AuthTokenRepository>,
    token_ttl_hours: i64,
}

impl AuthService {
    /// Create a new auth service with the given repositories
    pub fn new(
        teacher_repo: Arc<dyn TeacherRepository>,
        token_repo: Arc<dyn AuthTokenRepository>,
    ) -> Self {
        Self {
            teacher_repo,
            token_repo,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }

    /// Register a new teacher account.
    pub async fn register(&self, input: CreateTeacherInput) -> Result<Teacher, AuthError> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }
        if input.name.trim().is_empty() {
            return Err(AuthError::ValidationError("Name is required".to_string()));
        }
        if input.password.len() < 8 {
            return Err(AuthError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        if self.teacher_repo.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = hash_password(&input.password)?;
        let teacher = self
            .teacher_repo
            .create(&email, input.name.trim(), &password_hash)
            .await?;

        tracing::info!(teacher_id = teacher.id, "Teacher registered");
        Ok(teacher)
    }

    /// Authenticate a teacher and issue a token.
    ///
    /// Returns the token together with the authenticated teacher.
    pub async fn login(&self, email: &str, password: &str) -> Result<(AuthToken, Teacher), AuthError> {
        let email = email.trim().to_lowercase();

        let teacher = self
            .teacher_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &teacher.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let token = AuthToken {
            id: Uuid::new_v4().to_string(),
            teacher_id: teacher.id,
            expires_at: now + Duration::hours(self.token_ttl_hours),
            created_at: now,
        };
        self.token_repo.create(&token).await?;

        tracing::info!(teacher_id = teacher.id, "Teacher logged in");
        Ok((token, teacher))
    }

    /// Invalidate a token (logout). Unknown tokens are a no-op.
    pub async fn logout(&self, token_id: &str) -> Result<(), AuthError> {
        self.token_repo.delete(token_id).await?;
        Ok(())
    }

    /// Resolve a token to the authenticated teacher.
    ///
    /// Expired tokens are deleted on sight and rejected.
    pub async fn validate_token(&self, token_id: &str) -> Result<Teacher, AuthError> {
        let token = self
            .token_repo
            .get(token_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if token.is_expired() {
            self.token_repo.delete(token_id).await?;
            return Err(AuthError::Unauthorized);
        }

        self.teacher_repo
            .get_by_id(token.teacher_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    /// Remove expired tokens. Called from the background sweep.
    pub async fn sweep_expired_tokens(&self) -> Result<u64> {
        let removed = self.token_repo.delete_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "Swept expired auth tokens");
        }
        Ok(removed)
    }
}
