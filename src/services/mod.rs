//! Business logic services
//!
//! Services sit between the HTTP handlers and the repositories. Each service
//! owns one domain concern:
//! - `auth`: teacher login and token validation
//! - `session`: session lifecycle (create, close, expiry)
//! - `attendance`: the attendance validation pipeline
//! - `student`: student registration and face enrollment
//! - `face`: client for the external face matching service
//! - `password`: argon2 password hashing

pub mod attendance;
pub mod auth;
pub mod face;
pub mod password;
pub mod session;
pub mod student;

pub use attendance::{AttendanceError, AttendanceService, MarkAttendanceInput, MarkedAttendance};
pub use auth::{AuthError, AuthService};
pub use face::{FaceMatchClient, FaceServiceError, HttpFaceMatchClient};
pub use session::{SessionService, SessionServiceError};
pub use student::{StudentService, StudentServiceError};
