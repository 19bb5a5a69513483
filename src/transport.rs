use crate::api_contracts::{extract_error_message, UploadResponse, FILE_FIELD, UPLOAD_PRESET_FIELD};
use crate::config_utils::UploaderConfig;
use crate::error::UploadError;
use crate::types::FileToUpload;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Called with `(bytes_sent, total_bytes)` as the body is handed to the connection
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Anything that can store a payload and hand back its URL.
///
/// Dropping the returned future aborts the upload.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, file: &FileToUpload, on_progress: ProgressFn) -> Result<String, UploadError>;
}

/// Multipart uploads to a Cloudinary-style `auto/upload` endpoint
pub struct CloudinaryTransport {
    config: UploaderConfig,
    client: reqwest::Client,
}

impl CloudinaryTransport {
    pub fn new(config: UploaderConfig) -> Result<Self, UploadError> {
        config.validate()?;

        let version = env!("CARGO_PKG_VERSION");
        let user_agent = format!("CatalogUploader/{}", version);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&user_agent)
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }
}

/// Chunk the payload lazily, reporting cumulative bytes as each chunk is pulled
pub(crate) fn progress_stream(
    payload: Arc<[u8]>,
    chunk_size: usize,
    on_progress: ProgressFn,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
    let chunk_size = chunk_size.max(1);
    let total = payload.len() as u64;

    futures::stream::iter((0..payload.len()).step_by(chunk_size)).map(move |start| {
        let end = (start + chunk_size).min(payload.len());
        on_progress(end as u64, total);
        Ok::<_, std::io::Error>(payload[start..end].to_vec())
    })
}

#[async_trait]
impl UploadTransport for CloudinaryTransport {
    async fn upload(&self, file: &FileToUpload, on_progress: ProgressFn) -> Result<String, UploadError> {
        let stream = progress_stream(file.payload.clone(), self.config.chunk_size, on_progress);
        let body = reqwest::Body::wrap_stream(stream);

        let part = reqwest::multipart::Part::stream_with_length(body, file.size())
            .file_name(file.filename.clone());

        let form = reqwest::multipart::Form::new()
            .part(FILE_FIELD, part)
            .text(UPLOAD_PRESET_FIELD, self.config.upload_preset.clone());

        let response = self.client
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(UploadError::Transport {
                status: status.as_u16(),
                message: extract_error_message(&error_text),
            });
        }

        let text = response.text().await?;
        let data: UploadResponse = serde_json::from_str(&text)
            .map_err(|e| UploadError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        data.secure_url()
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::MalformedResponse("Upload response did not contain a secure_url.".to_string())
            })
    }
}
