//! Face photo storage
//!
//! Validates and stores uploaded student photos under the configured upload
//! directory. Stored files get a random uuid name; the returned URL is served
//! by the `/uploads` static route.

use std::path::Path;

use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::ApiError;
use crate::config::UploadConfig;

/// Validate an uploaded image against the configured type and size limits
pub fn validate_image(config: &UploadConfig, content_type: &str, size: u64) -> Result<(), ApiError> {
    if !config.is_type_allowed(content_type) {
        return Err(ApiError::validation_error(format!(
            "Invalid file type: {}. Allowed types: {:?}",
            content_type, config.allowed_types
        )));
    }

    if size > config.max_file_size {
        return Err(ApiError::validation_error(format!(
            "File too large. Maximum size: {} bytes ({} MB)",
            config.max_file_size,
            config.max_file_size / 1024 / 1024
        )));
    }

    Ok(())
}

/// Save an already-validated image and return its public URL
pub async fn save_image(
    config: &UploadConfig,
    content_type: &str,
    data: &[u8],
) -> Result<String, ApiError> {
    ensure_upload_dir(&config.path).await?;

    let filename = format!("{}.{}", Uuid::new_v4(), config.get_extension(content_type));
    let file_path = config.path.join(&filename);

    fs::write(&file_path, data)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

    Ok(format!("/uploads/{}", filename))
}

/// Ensure the upload directory exists
async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    if !path.exists() {
        fs::create_dir_all(path)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_unknown_type() {
        let config = UploadConfig::default();
        assert!(validate_image(&config, "application/pdf", 10).is_err());
        assert!(validate_image(&config, "image/jpeg", 10).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let config = UploadConfig::default();
        assert!(validate_image(&config, "image/jpeg", config.max_file_size + 1).is_err());
        assert!(validate_image(&config, "image/jpeg", config.max_file_size).is_ok());
    }

    #[tokio::test]
    async fn test_save_image_writes_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = UploadConfig {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };

        let url = save_image(&config, "image/png", &[1, 2, 3])
            .await
            .expect("Save failed");
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        let filename = url.trim_start_matches("/uploads/");
        let saved = fs::read(dir.path().join(filename)).await.expect("File missing");
        assert_eq!(saved, vec![1, 2, 3]);
    }
}
