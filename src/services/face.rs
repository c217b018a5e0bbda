//! Face matching service client
//!
//! Rollcall delegates face recognition to an external HTTP service that
//! extracts embeddings from photos and compares embedding vectors. The
//! `FaceMatchClient` trait is the seam: the attendance pipeline only sees
//! the trait, so tests substitute a scripted client and never touch the
//! network.
//!
//! Transport failures and timeouts map to `FaceServiceError::Unavailable`,
//! which callers report as a transient condition distinct from a failed
//! match.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::FaceServiceConfig;

/// Error types for face service operations
#[derive(Debug, thiserror::Error)]
pub enum FaceServiceError {
    /// The service processed the image but found no usable face
    #[error("No face detected in image: {0}")]
    NoFaceDetected(String),

    /// The service answered with something the client cannot interpret
    #[error("Unexpected face service response: {0}")]
    InvalidResponse(String),

    /// The service is unreachable, timed out, or returned a server error
    #[error("Face service unavailable: {0}")]
    Unavailable(String),
}

/// Client for the external face matching service
#[async_trait]
pub trait FaceMatchClient: Send + Sync {
    /// Extract an embedding vector from a face photo
    async fn extract_embedding(&self, image: &[u8]) -> Result<Vec<f64>, FaceServiceError>;

    /// Compare two embedding vectors, returning a similarity score in [0, 1]
    async fn compare(&self, a: &[f64], b: &[f64]) -> Result<f64, FaceServiceError>;
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    success: bool,
    #[serde(default)]
    embeddings: Option<Vec<f64>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    success: bool,
    #[serde(default)]
    similarity: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of `FaceMatchClient` backed by reqwest
pub struct HttpFaceMatchClient {
    base_url: String,
    extract_client: reqwest::Client,
    compare_client: reqwest::Client,
}

impl HttpFaceMatchClient {
    /// Create a client from configuration.
    ///
    /// Extraction gets a longer timeout than comparison: the service runs a
    /// detection model on the photo, while comparison is a vector dot
    /// product.
    pub fn new(config: &FaceServiceConfig) -> Result<Self> {
        let extract_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.extract_timeout_secs))
            .build()?;
        let compare_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.compare_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            extract_client,
            compare_client,
        })
    }
}

fn transport_error(err: reqwest::Error) -> FaceServiceError {
    if err.is_timeout() {
        FaceServiceError::Unavailable("request timed out".to_string())
    } else {
        FaceServiceError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl FaceMatchClient for HttpFaceMatchClient {
    async fn extract_embedding(&self, image: &[u8]) -> Result<Vec<f64>, FaceServiceError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("face.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| FaceServiceError::InvalidResponse(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .extract_client
            .post(format!("{}/extract-embeddings/", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_server_error() {
            return Err(FaceServiceError::Unavailable(format!(
                "extract endpoint returned {}",
                response.status()
            )));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| FaceServiceError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(FaceServiceError::NoFaceDetected(
                body.error.unwrap_or_else(|| "no face found".to_string()),
            ));
        }

        match body.embeddings {
            Some(embeddings) if !embeddings.is_empty() => Ok(embeddings),
            _ => Err(FaceServiceError::InvalidResponse(
                "success response without embeddings".to_string(),
            )),
        }
    }

    async fn compare(&self, a: &[f64], b: &[f64]) -> Result<f64, FaceServiceError> {
        let response = self
            .compare_client
            .post(format!("{}/compare-embeddings/", self.base_url))
            .json(&json!({
                "embeddings1": a,
                "embeddings2": b,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_server_error() {
            return Err(FaceServiceError::Unavailable(format!(
                "compare endpoint returned {}",
                response.status()
            )));
        }

        let body: CompareResponse = response
            .json()
            .await
            .map_err(|e| FaceServiceError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(FaceServiceError::InvalidResponse(
                body.error.unwrap_or_else(|| "comparison failed".to_string()),
            ));
        }

        body.similarity.ok_or_else(|| {
            FaceServiceError::InvalidResponse("success response without similarity".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = FaceServiceConfig {
            url: "http://localhost:8000/".to_string(),
            ..Default::default()
        };
        let client = HttpFaceMatchClient::new(&config).expect("Failed to build client");
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_extract_response_parsing() {
        let body: ExtractResponse = serde_json::from_str(
            r#"{"success": true, "embeddings": [0.1, 0.2], "dimensions": 2}"#,
        )
        .expect("Failed to parse");
        assert!(body.success);
        assert_eq!(body.embeddings, Some(vec![0.1, 0.2]));

        let failed: ExtractResponse =
            serde_json::from_str(r#"{"success": false, "error": "No face detected"}"#)
                .expect("Failed to parse");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("No face detected"));
    }

    #[test]
    fn test_compare_response_parsing() {
        let body: CompareResponse =
            serde_json::from_str(r#"{"success": true, "similarity": 0.87, "match": true}"#)
                .expect("Failed to parse");
        assert!(body.success);
        assert_eq!(body.similarity, Some(0.87));
    }
}
