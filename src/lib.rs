//! Concurrent image upload coordinator for the product catalog dashboard.
//!
//! Submit a batch of files to [`UploadCoordinator::submit_batch`]; every file
//! is uploaded to the object-storage endpoint at once, progress is tracked per
//! key, and the success/error callbacks receive the batch outcome.

pub mod api_contracts;
pub mod config_utils;
pub mod error;
pub mod logging;
pub mod preview;
pub mod services;
pub mod state;
pub mod transport;
pub mod types;
pub mod upload_coordinator;

#[cfg(test)]
mod test_harness;

pub use config_utils::UploaderConfig;
pub use error::UploadError;
pub use transport::{CloudinaryTransport, ProgressFn, UploadTransport};
pub use types::{
    BatchOutcome, CoordinatorSnapshot, FileToUpload, ProgressValue, TaskState, UploadEvent,
    UploadProgress, UploadResult, UploadStatus,
};
pub use upload_coordinator::UploadCoordinator;
