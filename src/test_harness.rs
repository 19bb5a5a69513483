//! Integration test harness for a mock upload endpoint
//!
//! Runs the real HTTP transport and coordinator against a mockito server
//! instead of the hosted object-storage API.

use crate::config_utils::UploaderConfig;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

pub const CLOUD_NAME: &str = "demo";
pub const UPLOAD_PRESET: &str = "unsigned_products";

/// A test harness that sets up a mock upload endpoint
pub struct TestHarness {
    pub server: ServerGuard,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        Self { server }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn upload_path() -> String {
        format!("/v1_1/{}/auto/upload", CLOUD_NAME)
    }

    /// Uploader config pointing at the mock server
    pub fn config(&self) -> UploaderConfig {
        let mut config = UploaderConfig::new(CLOUD_NAME, UPLOAD_PRESET).with_api_base(self.url());
        config.chunk_size = 16;
        config
    }

    /// Successful upload for requests whose body matches `body_pattern`
    pub fn mock_upload_success(&mut self, body_pattern: &str, secure_url: &str) -> Mock {
        self.server.mock("POST", Self::upload_path().as_str())
            .match_body(Matcher::Regex(body_pattern.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({
                "public_id": "products/sample",
                "secure_url": secure_url,
                "bytes": 1024,
                "format": "png"
            }).to_string())
            .create()
    }

    /// Failed upload for requests whose body matches `body_pattern`
    pub fn mock_upload_failure(&mut self, body_pattern: &str, status: usize, error_message: &str) -> Mock {
        self.server.mock("POST", Self::upload_path().as_str())
            .match_body(Matcher::Regex(body_pattern.to_string()))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({
                "error": { "message": error_message }
            }).to_string())
            .create()
    }

    /// 200 response whose body lacks `secure_url`
    pub fn mock_upload_without_url(&mut self) -> Mock {
        self.server.mock("POST", Self::upload_path().as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "public_id": "products/sample" }).to_string())
            .create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::transport::{CloudinaryTransport, ProgressFn, UploadTransport};
    use crate::types::{BatchOutcome, FileToUpload, TaskState};
    use crate::upload_coordinator::{UploadCoordinator, BATCH_FAILURE_MESSAGE};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn no_progress() -> ProgressFn {
        Arc::new(|_, _| {})
    }

    #[tokio::test]
    async fn test_upload_sends_file_and_preset() {
        let mut harness = TestHarness::new().await;
        let mock = harness.server.mock("POST", TestHarness::upload_path().as_str())
            .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="shoe.png""#.to_string()),
                Matcher::Regex(r#"name="upload_preset""#.to_string()),
                Matcher::Regex(UPLOAD_PRESET.to_string()),
                Matcher::Regex("shoe-bytes".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "secure_url": "https://res.example.com/demo/shoe.png" }).to_string())
            .create_async()
            .await;

        let transport = CloudinaryTransport::new(harness.config()).unwrap();
        let file = FileToUpload::new("img-1", "shoe.png", b"shoe-bytes".to_vec());

        let url = transport.upload(&file, no_progress()).await.unwrap();

        assert_eq!(url, "https://res.example.com/demo/shoe.png");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_reports_progress_to_completion() {
        let mut harness = TestHarness::new().await;
        let _mock = harness.mock_upload_success("payload", "https://res.example.com/demo/a.png");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let on_progress: ProgressFn = Arc::new(move |sent, total| {
            seen_clone.lock().unwrap().push((sent, total));
        });

        let transport = CloudinaryTransport::new(harness.config()).unwrap();
        let file = FileToUpload::new("a", "a.png", b"payload payload payload payload!".to_vec());

        transport.upload(&file, on_progress).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last(), Some(&(32, 32)));
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let mut harness = TestHarness::new().await;
        let _mock = harness.mock_upload_failure(".*", 500, "Internal server error");

        let transport = CloudinaryTransport::new(harness.config()).unwrap();
        let file = FileToUpload::new("a", "a.png", b"content".to_vec());

        let result = transport.upload(&file, no_progress()).await;

        match result {
            Err(UploadError::Transport { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal server error");
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_missing_secure_url() {
        let mut harness = TestHarness::new().await;
        let _mock = harness.mock_upload_without_url();

        let transport = CloudinaryTransport::new(harness.config()).unwrap();
        let file = FileToUpload::new("a", "a.png", b"content".to_vec());

        let result = transport.upload(&file, no_progress()).await;

        assert!(matches!(result, Err(UploadError::MalformedResponse(ref m)) if m.contains("secure_url")));
    }

    #[tokio::test]
    async fn test_upload_unreachable_host() {
        let config = UploaderConfig::new(CLOUD_NAME, UPLOAD_PRESET).with_api_base("http://127.0.0.1:9");
        let transport = CloudinaryTransport::new(config).unwrap();
        let file = FileToUpload::new("a", "a.png", b"content".to_vec());

        let result = transport.upload(&file, no_progress()).await;

        assert!(matches!(result, Err(UploadError::Network(_))));
    }

    #[tokio::test]
    async fn test_batch_with_one_server_error() {
        let mut harness = TestHarness::new().await;
        let _ok_mock = harness.mock_upload_success("payload-(one|three)", "https://res.example.com/demo/ok.png");
        let _fail_mock = harness.mock_upload_failure("payload-two", 500, "Internal server error");

        let successes = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let successes_clone = successes.clone();
        let errors_clone = errors.clone();

        let coordinator = UploadCoordinator::from_config(harness.config())
            .unwrap()
            .on_success(move |results| successes_clone.lock().unwrap().push(results))
            .on_error(move |message| errors_clone.lock().unwrap().push(message));

        let outcome = coordinator
            .submit_batch(vec![
                FileToUpload::new("file1", "one.png", b"payload-one".to_vec()),
                FileToUpload::new("file2", "two.png", b"payload-two".to_vec()),
                FileToUpload::new("file3", "three.png", b"payload-three".to_vec()),
            ])
            .await;

        assert_eq!(outcome, BatchOutcome::PartialFailure { succeeded: 2, failed: 1 });

        let successes = successes.lock().unwrap();
        assert_eq!(successes.len(), 1);
        let mut keys: Vec<&str> = successes[0].iter().map(|r| r.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["file1", "file3"]);

        assert_eq!(*errors.lock().unwrap(), vec![BATCH_FAILURE_MESSAGE.to_string()]);
        assert!(matches!(
            coordinator.task_state("file2"),
            Some(TaskState::Error { ref message }) if message.contains("500")
        ));
    }

    #[tokio::test]
    async fn test_batch_from_files_on_disk() {
        let mut harness = TestHarness::new().await;
        let _mock = harness.mock_upload_success("front-view", "https://res.example.com/demo/front.png");

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("front.png");
        std::fs::write(&path, b"front-view bytes").unwrap();

        let coordinator = UploadCoordinator::from_config(harness.config()).unwrap();
        let file = FileToUpload::from_path("front", &path).await.unwrap();

        let outcome = coordinator.submit_batch(vec![file]).await;

        assert_eq!(outcome, BatchOutcome::AllSucceeded);
        let results = coordinator.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "front.png");
        assert_eq!(results[0].url, "https://res.example.com/demo/front.png");
    }
}
