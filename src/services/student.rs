//! Student service
//!
//! Implements student registration and face enrollment. When a photo is
//! submitted, embeddings are extracted through the face service at
//! registration time so that attendance checks only ever compare vectors.
//! File storage for profile photos happens in the API layer; this service
//! receives the already-saved URL.

use crate::db::repositories::{StudentInsertError, StudentRepository};
use crate::models::{normalize_roll, CreateStudentInput, Student, UpdateStudentInput};
use crate::services::face::{FaceMatchClient, FaceServiceError};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

/// Error types for student operations
#[derive(Debug, thiserror::Error)]
pub enum StudentServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The roll number is already registered
    #[error("Roll number already registered")]
    DuplicateRoll,

    /// No student with the given id or roll
    #[error("Student not found")]
    NotFound,

    /// The face service could not find a face in the photo
    #[error("Face extraction failed: {0}")]
    FaceExtractionFailed(String),

    /// The face service is unreachable; the request may be retried
    #[error("Face service unavailable: {0}")]
    FaceServiceUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Student service
pub struct StudentService {
    repo: Arc<dyn StudentRepository>,
    face_client: Arc<dyn FaceMatchClient>,
}

impl StudentService {
    /// Create a new student service
    pub fn new(repo: Arc<dyn StudentRepository>, face_client: Arc<dyn FaceMatchClient>) -> Self {
        Self { repo, face_client }
    }

    /// Register a new student.
    ///
    /// When a photo is supplied, its embedding is extracted before the row
    /// is written; extraction failure rejects the registration so that a
    /// face-required session never meets a student with unusable data.
    pub async fn create(
        &self,
        input: CreateStudentInput,
        profile_image: Option<String>,
    ) -> Result<Student, StudentServiceError> {
        let roll = normalize_roll(&input.roll);
        let name = input.name.trim().to_string();

        if roll.is_empty() {
            return Err(StudentServiceError::ValidationError(
                "Roll number is required".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(StudentServiceError::ValidationError(
                "Name is required".to_string(),
            ));
        }

        let face_embeddings = match &input.face_image {
            Some(image) => self.extract(image).await?,
            None => Vec::new(),
        };

        let now = Utc::now();
        let student = Student {
            id: 0,
            roll,
            name,
            face_embeddings,
            profile_image,
            created_at: now,
            updated_at: now,
        };

        match self.repo.create(&student).await {
            Ok(created) => {
                tracing::info!(student_id = created.id, roll = %created.roll, "Student registered");
                Ok(created)
            }
            Err(StudentInsertError::DuplicateRoll) => Err(StudentServiceError::DuplicateRoll),
            Err(StudentInsertError::Database(e)) => Err(StudentServiceError::InternalError(e)),
        }
    }

    /// Get a student by id
    pub async fn get(&self, id: i64) -> Result<Student, StudentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(StudentServiceError::NotFound)
    }

    /// Get a student by roll number
    pub async fn get_by_roll(&self, roll: &str) -> Result<Student, StudentServiceError> {
        self.repo
            .get_by_roll(&normalize_roll(roll))
            .await?
            .ok_or(StudentServiceError::NotFound)
    }

    /// List students with pagination and optional search
    pub async fn list(
        &self,
        page: i64,
        per_page: i64,
        search: Option<&str>,
    ) -> Result<(Vec<Student>, i64)> {
        let per_page = per_page.clamp(1, 100);
        self.repo.list(page.max(1), per_page, search).await
    }

    /// Update a student.
    ///
    /// Unset fields keep their current value. A new photo replaces both the
    /// embeddings and the profile image.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateStudentInput,
        profile_image: Option<String>,
    ) -> Result<Student, StudentServiceError> {
        let mut student = self.get(id).await?;

        if let Some(roll) = &input.roll {
            let roll = normalize_roll(roll);
            if roll.is_empty() {
                return Err(StudentServiceError::ValidationError(
                    "Roll number cannot be blank".to_string(),
                ));
            }
            student.roll = roll;
        }
        if let Some(name) = &input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StudentServiceError::ValidationError(
                    "Name cannot be blank".to_string(),
                ));
            }
            student.name = name.to_string();
        }
        if let Some(image) = &input.face_image {
            student.face_embeddings = self.extract(image).await?;
            student.profile_image = profile_image;
        }

        match self.repo.update(&student).await {
            Ok(updated) => Ok(updated),
            Err(StudentInsertError::DuplicateRoll) => Err(StudentServiceError::DuplicateRoll),
            Err(StudentInsertError::Database(e)) => Err(StudentServiceError::InternalError(e)),
        }
    }

    /// Delete a student
    pub async fn delete(&self, id: i64) -> Result<(), StudentServiceError> {
        // Surface NotFound rather than silently deleting nothing
        self.get(id).await?;
        self.repo.delete(id).await?;
        Ok(())
    }

    async fn extract(&self, image: &[u8]) -> Result<Vec<f64>, StudentServiceError> {
        self.face_client
            .extract_embedding(image)
            .await
            .map_err(|err| match err {
                FaceServiceError::NoFaceDetected(msg) => {
                    StudentServiceError::FaceExtractionFailed(msg)
                }
                FaceServiceError::InvalidResponse(msg) => {
                    StudentServiceError::FaceExtractionFailed(msg)
                }
                FaceServiceError::Unavailable(msg) => {
                    StudentServiceError::FaceServiceUnavailable(msg)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxStudentRepository;
    use crate::db::{create_test_pool, migrations};
    use async_trait::async_trait;

    struct FakeFaceClient {
        fail_extract: bool,
    }

    #[async_trait]
    impl FaceMatchClient for FakeFaceClient {
        async fn extract_embedding(&self, _image: &[u8]) -> Result<Vec<f64>, FaceServiceError> {
            if self.fail_extract {
                Err(FaceServiceError::NoFaceDetected("No face detected".to_string()))
            } else {
                Ok(vec![0.5, 0.5, 0.5])
            }
        }

        async fn compare(&self, _a: &[f64], _b: &[f64]) -> Result<f64, FaceServiceError> {
            Ok(1.0)
        }
    }

    async fn setup(fail_extract: bool) -> StudentService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        StudentService::new(
            SqlxStudentRepository::boxed(pool),
            Arc::new(FakeFaceClient { fail_extract }),
        )
    }

    fn input(roll: &str, with_image: bool) -> CreateStudentInput {
        CreateStudentInput {
            roll: roll.to_string(),
            name: "Asha".to_string(),
            face_image: with_image.then(|| vec![0xff, 0xd8]),
        }
    }

    #[tokio::test]
    async fn test_create_without_photo() {
        let service = setup(false).await;

        let student = service
            .create(input("a42", false), None)
            .await
            .expect("Create failed");
        assert_eq!(student.roll, "A42", "Roll should be normalized");
        assert!(!student.has_face_data());
        assert!(student.profile_image.is_none());
    }

    #[tokio::test]
    async fn test_create_with_photo_extracts_embeddings() {
        let service = setup(false).await;

        let student = service
            .create(input("A42", true), Some("/uploads/abc.jpg".to_string()))
            .await
            .expect("Create failed");
        assert_eq!(student.face_embeddings, vec![0.5, 0.5, 0.5]);
        assert_eq!(student.profile_image.as_deref(), Some("/uploads/abc.jpg"));
    }

    #[tokio::test]
    async fn test_create_rejected_when_no_face_in_photo() {
        let service = setup(true).await;

        let err = service
            .create(input("A42", true), None)
            .await
            .expect_err("Should be rejected");
        assert!(matches!(err, StudentServiceError::FaceExtractionFailed(_)));

        // Nothing was stored
        let result = service.get_by_roll("A42").await;
        assert!(matches!(result, Err(StudentServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_create_duplicate_roll() {
        let service = setup(false).await;
        service.create(input("A42", false), None).await.unwrap();

        let err = service
            .create(input("a42", false), None)
            .await
            .expect_err("Duplicate roll should fail");
        assert!(matches!(err, StudentServiceError::DuplicateRoll));
    }

    #[tokio::test]
    async fn test_update_name_keeps_embeddings() {
        let service = setup(false).await;
        let created = service.create(input("A42", true), None).await.unwrap();

        let updated = service
            .update(
                created.id,
                UpdateStudentInput {
                    name: Some("Asha K".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .expect("Update failed");
        assert_eq!(updated.name, "Asha K");
        assert_eq!(updated.face_embeddings, created.face_embeddings);
    }

    #[tokio::test]
    async fn test_update_missing_student() {
        let service = setup(false).await;
        let result = service.update(999, UpdateStudentInput::default(), None).await;
        assert!(matches!(result, Err(StudentServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup(false).await;
        let created = service.create(input("A42", false), None).await.unwrap();

        service.delete(created.id).await.expect("Delete failed");
        assert!(matches!(
            service.delete(created.id).await,
            Err(StudentServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_clamps_page_size() {
        let service = setup(false).await;
        for i in 0..3 {
            service
                .create(input(&format!("A{:02}", i), false), None)
                .await
                .unwrap();
        }

        let (students, total) = service.list(0, 500, None).await.expect("List failed");
        assert_eq!(total, 3);
        assert_eq!(students.len(), 3);
    }
}
