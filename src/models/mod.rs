//! Data models
//!
//! This module contains all data structures used throughout the Rollcall
//! attendance system. Models represent:
//! - Database entities (Session, AttendanceRecord, Student, Teacher, AuthToken)
//! - Service input types

mod auth_token;
mod session;
mod student;
mod teacher;

pub use auth_token::AuthToken;
pub use session::{AttendanceRecord, CreateSessionInput, Session};
pub use student::{normalize_roll, CreateStudentInput, Student, UpdateStudentInput};
pub use teacher::{CreateTeacherInput, Teacher};
