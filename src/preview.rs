//! Transient preview references for payloads awaiting upload.
//!
//! A preview is a local handle to the bytes being uploaded so the caller can
//! render them before the remote URL exists. Previews are released once the
//! upload completes, when uploads are cancelled, or when the registry drops.

use crate::types::FileToUpload;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const PREVIEW_SCHEME: &str = "preview:";

/// Registry of outstanding preview references
#[derive(Default)]
pub struct PreviewRegistry {
    previews: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview reference for the file's payload
    pub fn create(&self, file: &FileToUpload) -> String {
        let reference = format!("{}{}", PREVIEW_SCHEME, uuid::Uuid::new_v4());
        let mut previews = self.previews.lock().unwrap_or_else(|e| e.into_inner());
        previews.insert(reference.clone(), file.payload.clone());
        reference
    }

    /// Payload behind a preview reference, if it hasn't been released
    pub fn resolve(&self, reference: &str) -> Option<Arc<[u8]>> {
        let previews = self.previews.lock().unwrap_or_else(|e| e.into_inner());
        previews.get(reference).cloned()
    }

    /// Release one reference. Returns false if it was already released.
    pub fn release(&self, reference: &str) -> bool {
        let mut previews = self.previews.lock().unwrap_or_else(|e| e.into_inner());
        previews.remove(reference).is_some()
    }

    /// Release every reference, returning how many were outstanding
    pub fn release_all(&self) -> usize {
        let mut previews = self.previews.lock().unwrap_or_else(|e| e.into_inner());
        let count = previews.len();
        previews.clear();
        count
    }

    pub fn pending(&self) -> usize {
        self.previews.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for PreviewRegistry {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            tracing::debug!(released, "Released outstanding previews");
        }
    }
}
