//! Student model
//!
//! Students are registered ahead of time so that face-verified sessions can
//! compare a submitted photo against stored embeddings. The roll number is
//! the natural key; it is normalized to uppercase everywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Student entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier
    pub id: i64,
    /// Roll number (unique, stored uppercase)
    pub roll: String,
    /// Full name
    pub name: String,
    /// Face embedding vector; empty when no face data has been registered
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub face_embeddings: Vec<f64>,
    /// URL of the stored profile photo, if one was uploaded
    pub profile_image: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Check whether this student has registered face data
    pub fn has_face_data(&self) -> bool {
        !self.face_embeddings.is_empty()
    }
}

/// Normalize a roll number for storage and lookup
pub fn normalize_roll(roll: &str) -> String {
    roll.trim().to_uppercase()
}

/// Input for registering a new student
#[derive(Debug, Clone)]
pub struct CreateStudentInput {
    pub roll: String,
    pub name: String,
    /// Raw face photo bytes; embeddings are extracted at registration time
    pub face_image: Option<Vec<u8>>,
}

/// Input for updating a student
#[derive(Debug, Clone, Default)]
pub struct UpdateStudentInput {
    pub roll: Option<String>,
    pub name: Option<String>,
    pub face_image: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_roll() {
        assert_eq!(normalize_roll("a42"), "A42");
        assert_eq!(normalize_roll("  mca-17 "), "MCA-17");
        assert_eq!(normalize_roll("B07"), "B07");
    }

    #[test]
    fn test_has_face_data() {
        let now = Utc::now();
        let mut student = Student {
            id: 1,
            roll: "A42".to_string(),
            name: "Asha".to_string(),
            face_embeddings: vec![],
            profile_image: None,
            created_at: now,
            updated_at: now,
        };
        assert!(!student.has_face_data());

        student.face_embeddings = vec![0.1, 0.2, 0.3];
        assert!(student.has_face_data());
    }
}
