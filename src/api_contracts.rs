//! Contract types for the object-storage upload endpoint
//!
//! These types define the response bodies of
//! `POST {api_base}/v1_1/{cloud_name}/auto/upload`.
//!
//! Principles:
//! - Only `secure_url` is required on success; everything else is optional
//! - Unknown fields are ignored so endpoint additions don't break parsing
//! - Error bodies come in two shapes and both must be understood

use serde::{Deserialize, Serialize};

// =============================================================================
// Upload Endpoint
// =============================================================================

/// Multipart field carrying the payload
pub const FILE_FIELD: &str = "file";

/// Multipart field carrying the unsigned upload preset
pub const UPLOAD_PRESET_FIELD: &str = "upload_preset";

/// Success body from the upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub format: Option<String>,
}

impl UploadResponse {
    /// The uploaded asset URL, if the body carried a usable one
    pub fn secure_url(&self) -> Option<&str> {
        self.secure_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Nested error detail: `{"error": {"message": "..."}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub message: String,
}

/// Error body: either nested `error.message` or a flat `message`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .or(self.message.as_deref())
    }
}

/// Best human-readable message from a failed response body
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.message().map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Upload failed".to_string()
            } else {
                body.trim().to_string()
            }
        })
}
