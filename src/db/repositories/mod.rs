//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod attendance;
pub mod auth_token;
pub mod session;
pub mod student;
pub mod teacher;

pub use attendance::{AppendAttendanceError, AttendanceRepository, SqlxAttendanceRepository};
pub use auth_token::{AuthTokenRepository, SqlxAuthTokenRepository};
pub use session::{SessionInsertError, SessionRepository, SqlxSessionRepository};
pub use student::{SqlxStudentRepository, StudentInsertError, StudentRepository};
pub use teacher::{SqlxTeacherRepository, TeacherRepository};
