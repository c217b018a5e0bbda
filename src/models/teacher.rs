//! Teacher model
//!
//! Teachers own attendance sessions. Authentication uses argon2 password
//! hashes and opaque bearer tokens (see `models::auth_token`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Teacher account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, used for login)
    pub email: String,
    /// Display name
    pub name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for registering a teacher account (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateTeacherInput {
    pub email: String,
    pub name: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}
