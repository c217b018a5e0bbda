//! Configuration management
//!
//! This module handles loading and parsing configuration for the Rollcall
//! attendance system. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Face image upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Face recognition service configuration
    #[serde(default)]
    pub face: FaceServiceConfig,
    /// Attendance session defaults
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/rollcall.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Upload configuration for face photos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path (stored student profile photos)
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Face recognition service configuration
///
/// The face service is an external HTTP dependency. Extraction runs a
/// detection + embedding model and is the slow path; comparison is a dot
/// product and should answer quickly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceServiceConfig {
    /// Base URL of the face recognition service
    #[serde(default = "default_face_url")]
    pub url: String,
    /// Timeout for embedding extraction requests, in seconds
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_secs: u64,
    /// Timeout for embedding comparison requests, in seconds
    #[serde(default = "default_compare_timeout")]
    pub compare_timeout_secs: u64,
    /// Minimum cosine similarity for a face match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for FaceServiceConfig {
    fn default() -> Self {
        Self {
            url: default_face_url(),
            extract_timeout_secs: default_extract_timeout(),
            compare_timeout_secs: default_compare_timeout(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_face_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_extract_timeout() -> u64 {
    30
}

fn default_compare_timeout() -> u64 {
    10
}

fn default_similarity_threshold() -> f64 {
    0.6
}

/// Defaults applied to newly created attendance sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default geofence radius in meters
    #[serde(default = "default_radius_m")]
    pub default_radius_m: f64,
    /// Default session duration in minutes
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
    /// How many fresh join codes to try before giving up on a collision
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
    /// Interval between expiry sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_radius_m: default_radius_m(),
            default_duration_minutes: default_duration_minutes(),
            code_attempts: default_code_attempts(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_radius_m() -> f64 {
    50.0
}

fn default_duration_minutes() -> i64 {
    15
}

fn default_code_attempts() -> u32 {
    16
}

fn default_sweep_interval() -> u64 {
    60
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - ROLLCALL_SERVER_HOST
    /// - ROLLCALL_SERVER_PORT
    /// - ROLLCALL_SERVER_CORS_ORIGIN
    /// - ROLLCALL_DATABASE_DRIVER
    /// - ROLLCALL_DATABASE_URL
    /// - ROLLCALL_FACE_URL
    /// - ROLLCALL_FACE_SIMILARITY_THRESHOLD
    /// - ROLLCALL_UPLOAD_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("ROLLCALL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ROLLCALL_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("ROLLCALL_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("ROLLCALL_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("ROLLCALL_DATABASE_URL") {
            self.database.url = url;
        }

        // Face service configuration
        if let Ok(url) = std::env::var("ROLLCALL_FACE_URL") {
            self.face.url = url;
        }
        if let Ok(threshold) = std::env::var("ROLLCALL_FACE_SIMILARITY_THRESHOLD") {
            if let Ok(threshold) = threshold.parse::<f64>() {
                if (0.0..=1.0).contains(&threshold) {
                    self.face.similarity_threshold = threshold;
                }
            }
        }

        // Upload configuration
        if let Ok(path) = std::env::var("ROLLCALL_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
