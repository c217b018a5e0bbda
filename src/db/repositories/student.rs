//! Student repository
//!
//! Database operations for registered students. Face embeddings are stored
//! as a JSON array in a text column; an empty array means the student has no
//! registered face data. Roll numbers are normalized to uppercase by the
//! service layer before they reach this module.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Student;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Error from inserting a new student
#[derive(Debug, thiserror::Error)]
pub enum StudentInsertError {
    /// The roll number is already registered
    #[error("roll number already registered")]
    DuplicateRoll,
    /// Any other database failure
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Student repository trait
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Create a new student (the `id` field of the input is ignored)
    async fn create(&self, student: &Student) -> Result<Student, StudentInsertError>;

    /// Get student by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Student>>;

    /// Get student by normalized roll number
    async fn get_by_roll(&self, roll: &str) -> Result<Option<Student>>;

    /// Update a student's fields (name, roll, embeddings, profile image)
    async fn update(&self, student: &Student) -> Result<Student, StudentInsertError>;

    /// Delete a student
    async fn delete(&self, id: i64) -> Result<()>;

    /// List students with pagination and optional name/roll search.
    ///
    /// Returns the page of students and the total match count.
    async fn list(
        &self,
        page: i64,
        per_page: i64,
        search: Option<&str>,
    ) -> Result<(Vec<Student>, i64)>;
}

/// SQLx-based student repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxStudentRepository {
    pool: DynDatabasePool,
}

impl SqlxStudentRepository {
    /// Create a new SQLx student repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StudentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StudentRepository for SqlxStudentRepository {
    async fn create(&self, student: &Student) -> Result<Student, StudentInsertError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_student_sqlite(self.pool.as_sqlite().unwrap(), student).await
            }
            DatabaseDriver::Mysql => {
                create_student_mysql(self.pool.as_mysql().unwrap(), student).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Student>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_student_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_student_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn get_by_roll(&self, roll: &str) -> Result<Option<Student>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_student_by_roll_sqlite(self.pool.as_sqlite().unwrap(), roll).await
            }
            DatabaseDriver::Mysql => {
                get_student_by_roll_mysql(self.pool.as_mysql().unwrap(), roll).await
            }
        }
    }

    async fn update(&self, student: &Student) -> Result<Student, StudentInsertError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_student_sqlite(self.pool.as_sqlite().unwrap(), student).await
            }
            DatabaseDriver::Mysql => {
                update_student_mysql(self.pool.as_mysql().unwrap(), student).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_student_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => delete_student_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(
        &self,
        page: i64,
        per_page: i64,
        search: Option<&str>,
    ) -> Result<(Vec<Student>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_students_sqlite(self.pool.as_sqlite().unwrap(), page, per_page, search).await
            }
            DatabaseDriver::Mysql => {
                list_students_mysql(self.pool.as_mysql().unwrap(), page, per_page, search).await
            }
        }
    }
}

/// Map a unique-violation on the roll column to the typed error
fn map_student_error(err: sqlx::Error) -> StudentInsertError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StudentInsertError::DuplicateRoll;
        }
    }
    StudentInsertError::Database(anyhow::Error::new(err).context("Student write failed"))
}

fn encode_embeddings(embeddings: &[f64]) -> Result<String> {
    serde_json::to_string(embeddings).context("Failed to serialize face embeddings")
}

fn decode_embeddings(json: &str) -> Result<Vec<f64>> {
    serde_json::from_str(json).context("Failed to parse face embeddings")
}

const STUDENT_COLUMNS: &str =
    "id, roll, name, face_embeddings, profile_image, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_student_sqlite(
    pool: &SqlitePool,
    student: &Student,
) -> Result<Student, StudentInsertError> {
    let now = Utc::now();
    let embeddings_json = encode_embeddings(&student.face_embeddings)?;

    let result = sqlx::query(
        r#"
        INSERT INTO students (roll, name, face_embeddings, profile_image, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&student.roll)
    .bind(&student.name)
    .bind(&embeddings_json)
    .bind(&student.profile_image)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_student_error)?;

    Ok(Student {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..student.clone()
    })
}

async fn get_student_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Student>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM students WHERE id = ?",
        STUDENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get student by ID")?;

    row.map(|row| row_to_student_sqlite(&row)).transpose()
}

async fn get_student_by_roll_sqlite(pool: &SqlitePool, roll: &str) -> Result<Option<Student>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM students WHERE roll = ?",
        STUDENT_COLUMNS
    ))
    .bind(roll)
    .fetch_optional(pool)
    .await
    .context("Failed to get student by roll")?;

    row.map(|row| row_to_student_sqlite(&row)).transpose()
}

async fn update_student_sqlite(
    pool: &SqlitePool,
    student: &Student,
) -> Result<Student, StudentInsertError> {
    let now = Utc::now();
    let embeddings_json = encode_embeddings(&student.face_embeddings)?;

    sqlx::query(
        r#"
        UPDATE students
        SET roll = ?, name = ?, face_embeddings = ?, profile_image = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&student.roll)
    .bind(&student.name)
    .bind(&embeddings_json)
    .bind(&student.profile_image)
    .bind(now)
    .bind(student.id)
    .execute(pool)
    .await
    .map_err(map_student_error)?;

    Ok(Student {
        updated_at: now,
        ..student.clone()
    })
}

async fn delete_student_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete student")?;
    Ok(())
}

async fn list_students_sqlite(
    pool: &SqlitePool,
    page: i64,
    per_page: i64,
    search: Option<&str>,
) -> Result<(Vec<Student>, i64)> {
    let offset = (page.max(1) - 1) * per_page;
    let pattern = search.map(|s| format!("%{}%", s));

    let (rows, total) = match &pattern {
        Some(pattern) => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM students WHERE roll LIKE ? OR name LIKE ? \
                 ORDER BY roll ASC LIMIT ? OFFSET ?",
                STUDENT_COLUMNS
            ))
            .bind(pattern)
            .bind(pattern)
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await
            .context("Failed to list students")?;

            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM students WHERE roll LIKE ? OR name LIKE ?",
            )
            .bind(pattern)
            .bind(pattern)
            .fetch_one(pool)
            .await
            .context("Failed to count students")?
            .get("count");

            (rows, total)
        }
        None => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM students ORDER BY roll ASC LIMIT ? OFFSET ?",
                STUDENT_COLUMNS
            ))
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await
            .context("Failed to list students")?;

            let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM students")
                .fetch_one(pool)
                .await
                .context("Failed to count students")?
                .get("count");

            (rows, total)
        }
    };

    let students = rows
        .iter()
        .map(row_to_student_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((students, total))
}

fn row_to_student_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Student> {
    let embeddings_json: String = row.try_get("face_embeddings")?;
    Ok(Student {
        id: row.try_get("id")?,
        roll: row.try_get("roll")?,
        name: row.try_get("name")?,
        face_embeddings: decode_embeddings(&embeddings_json)?,
        profile_image: row.try_get("profile_image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_student_mysql(
    pool: &MySqlPool,
    student: &Student,
) -> Result<Student, StudentInsertError> {
    let now = Utc::now();
    let embeddings_json = encode_embeddings(&student.face_embeddings)?;

    let result = sqlx::query(
        r#"
        INSERT INTO students (roll, name, face_embeddings, profile_image, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&student.roll)
    .bind(&student.name)
    .bind(&embeddings_json)
    .bind(&student.profile_image)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_student_error)?;

    Ok(Student {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..student.clone()
    })
}

async fn get_student_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Student>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM students WHERE id = ?",
        STUDENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get student by ID")?;

    row.map(|row| row_to_student_mysql(&row)).transpose()
}

async fn get_student_by_roll_mysql(pool: &MySqlPool, roll: &str) -> Result<Option<Student>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM students WHERE roll = ?",
        STUDENT_COLUMNS
    ))
    .bind(roll)
    .fetch_optional(pool)
    .await
    .context("Failed to get student by roll")?;

    row.map(|row| row_to_student_mysql(&row)).transpose()
}

async fn update_student_mysql(
    pool: &MySqlPool,
    student: &Student,
) -> Result<Student, StudentInsertError> {
    let now = Utc::now();
    let embeddings_json = encode_embeddings(&student.face_embeddings)?;

    sqlx::query(
        r#"
        UPDATE students
        SET roll = ?, name = ?, face_embeddings = ?, profile_image = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&student.roll)
    .bind(&student.name)
    .bind(&embeddings_json)
    .bind(&student.profile_image)
    .bind(now)
    .bind(student.id)
    .execute(pool)
    .await
    .map_err(map_student_error)?;

    Ok(Student {
        updated_at: now,
        ..student.clone()
    })
}

async fn delete_student_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete student")?;
    Ok(())
}

async fn list_students_mysql(
    pool: &MySqlPool,
    page: i64,
    per_page: i64,
    search: Option<&str>,
) -> Result<(Vec<Student>, i64)> {
    let offset = (page.max(1) - 1) * per_page;
    let pattern = search.map(|s| format!("%{}%", s));

    let (rows, total) = match &pattern {
        Some(pattern) => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM students WHERE roll LIKE ? OR name LIKE ? \
                 ORDER BY roll ASC LIMIT ? OFFSET ?",
                STUDENT_COLUMNS
            ))
            .bind(pattern)
            .bind(pattern)
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await
            .context("Failed to list students")?;

            let total: i64 = sqlx::query(
                "SELECT COUNT(*) as count FROM students WHERE roll LIKE ? OR name LIKE ?",
            )
            .bind(pattern)
            .bind(pattern)
            .fetch_one(pool)
            .await
            .context("Failed to count students")?
            .get("count");

            (rows, total)
        }
        None => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM students ORDER BY roll ASC LIMIT ? OFFSET ?",
                STUDENT_COLUMNS
            ))
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await
            .context("Failed to list students")?;

            let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM students")
                .fetch_one(pool)
                .await
                .context("Failed to count students")?
                .get("count");

            (rows, total)
        }
    };

    let students = rows
        .iter()
        .map(row_to_student_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((students, total))
}

fn row_to_student_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Student> {
    let embeddings_json: String = row.try_get("face_embeddings")?;
    Ok(Student {
        id: row.try_get("id")?,
        roll: row.try_get("roll")?,
        name: row.try_get("name")?,
        face_embeddings: decode_embeddings(&embeddings_json)?,
        profile_image: row.try_get("profile_image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> Arc<dyn StudentRepository> {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxStudentRepository::boxed(pool)
    }

    fn sample_student(roll: &str, name: &str) -> Student {
        let now = Utc::now();
        Student {
            id: 0,
            roll: roll.to_string(),
            name: name.to_string(),
            face_embeddings: vec![],
            profile_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_student() {
        let repo = setup().await;

        let student = repo
            .create(&sample_student("A42", "Asha"))
            .await
            .expect("Failed to create student");
        assert!(student.id > 0);

        let found = repo
            .get_by_roll("A42")
            .await
            .expect("Failed to get student")
            .expect("Student should exist");
        assert_eq!(found.name, "Asha");
        assert!(!found.has_face_data());
    }

    #[tokio::test]
    async fn test_duplicate_roll_typed_error() {
        let repo = setup().await;

        repo.create(&sample_student("A42", "Asha")).await.unwrap();

        let err = repo
            .create(&sample_student("A42", "Other"))
            .await
            .expect_err("Duplicate roll should fail");
        assert!(matches!(err, StudentInsertError::DuplicateRoll));
    }

    #[tokio::test]
    async fn test_embeddings_round_trip() {
        let repo = setup().await;

        let mut student = sample_student("A42", "Asha");
        student.face_embeddings = vec![0.12, -0.98, 0.5];
        repo.create(&student).await.unwrap();

        let found = repo.get_by_roll("A42").await.unwrap().unwrap();
        assert_eq!(found.face_embeddings, vec![0.12, -0.98, 0.5]);
        assert!(found.has_face_data());
    }

    #[tokio::test]
    async fn test_update_student() {
        let repo = setup().await;

        let created = repo.create(&sample_student("A42", "Asha")).await.unwrap();

        let mut updated = created.clone();
        updated.name = "Asha K".to_string();
        updated.face_embeddings = vec![1.0, 2.0];
        repo.update(&updated).await.expect("Update failed");

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Asha K");
        assert_eq!(found.face_embeddings, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_delete_student() {
        let repo = setup().await;

        let created = repo.create(&sample_student("A42", "Asha")).await.unwrap();
        repo.delete(created.id).await.expect("Delete failed");

        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_search_and_pagination() {
        let repo = setup().await;

        repo.create(&sample_student("A01", "Asha")).await.unwrap();
        repo.create(&sample_student("A02", "Ravi")).await.unwrap();
        repo.create(&sample_student("B01", "Meera")).await.unwrap();

        let (all, total) = repo.list(1, 10, None).await.expect("List failed");
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].roll, "A01");

        let (page, total) = repo.list(2, 2, None).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].roll, "B01");

        let (matches, total) = repo.list(1, 10, Some("A0")).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(matches.len(), 2);

        let (by_name, total) = repo.list(1, 10, Some("Meera")).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(by_name[0].roll, "B01");
    }
}
