//! Authentication token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque login token for a teacher account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    /// Token value (uuid)
    pub id: String,
    /// Associated teacher id
    pub teacher_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
