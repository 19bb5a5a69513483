//! Configuration file utilities
//!
//! Provides the uploader configuration and helper functions for reading and
//! writing config files. All config files are stored in the platform-specific
//! config directory under "catalog-uploader/".

use crate::error::UploadError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "catalog-uploader";

/// Default config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Settings for the upload endpoint and the HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Size of the body chunks progress is reported on
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl UploaderConfig {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            api_base: default_api_base(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Point the uploader at a different host (mock servers, proxies)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Full URL of the upload endpoint
    pub fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/auto/upload",
            self.api_base.trim_end_matches('/'),
            self.cloud_name
        )
    }

    /// Read configuration from the process environment.
    ///
    /// Required: `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_UPLOAD_PRESET`.
    /// Optional: `CLOUDINARY_API_BASE`, `UPLOAD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, UploadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, UploadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| UploadError::Config(format!("{} is not set", name)))
        };

        let mut config = Self::new(
            required("CLOUDINARY_CLOUD_NAME")?,
            required("CLOUDINARY_UPLOAD_PRESET")?,
        );

        if let Some(api_base) = lookup("CLOUDINARY_API_BASE") {
            config.api_base = api_base;
        }
        if let Some(timeout) = lookup("UPLOAD_TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .parse()
                .map_err(|e| UploadError::Config(format!("Invalid UPLOAD_TIMEOUT_SECS: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from the default config file, falling back to the environment
    pub fn load() -> Result<Self, UploadError> {
        match load_config_file::<Self>(CONFIG_FILE_NAME)? {
            Some(config) => {
                config.validate()?;
                Ok(config)
            }
            None => Self::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.cloud_name.trim().is_empty() {
            return Err(UploadError::Config("cloud_name must not be empty".to_string()));
        }
        if self.upload_preset.trim().is_empty() {
            return Err(UploadError::Config("upload_preset must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::Config("chunk_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Get the app's config directory path.
///
/// Returns: `~/.config/catalog-uploader` (Linux)
///          `~/Library/Application Support/catalog-uploader` (macOS)
///          `C:\Users\<User>\AppData\Roaming\catalog-uploader` (Windows)
pub fn get_config_dir() -> Result<PathBuf, UploadError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| UploadError::Config("Could not find config directory".to_string()))?;
    Ok(config_dir.join(APP_DIR_NAME))
}

/// Get the directory where rolling log files are written.
///
/// Returns: `~/.catalog-uploader/logs`
pub fn get_logs_dir() -> Result<PathBuf, UploadError> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| UploadError::Config("Could not find home directory".to_string()))?;
    Ok(home_dir.join(format!(".{}", APP_DIR_NAME)).join("logs"))
}

/// Get the full path to a config file.
pub fn config_file_path(filename: &str) -> Result<PathBuf, UploadError> {
    Ok(get_config_dir()?.join(filename))
}

/// Save data to a config file as JSON.
///
/// # Returns
/// The path where the file was saved
pub fn save_config_file<T: Serialize>(filename: &str, data: &T) -> Result<PathBuf, UploadError> {
    let config_dir = get_config_dir()?;
    fs::create_dir_all(&config_dir)?;
    let config_file = config_dir.join(filename);
    write_json(&config_file, data)?;
    Ok(config_file)
}

/// Load data from a config file.
///
/// # Returns
/// * `Ok(Some(data))` if file exists and was parsed successfully
/// * `Ok(None)` if file doesn't exist
/// * `Err(...)` if file exists but couldn't be read/parsed
pub fn load_config_file<T: DeserializeOwned>(filename: &str) -> Result<Option<T>, UploadError> {
    read_json(&config_file_path(filename)?)
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), UploadError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| UploadError::Config(format!("Failed to serialize config: {}", e)))?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, UploadError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let data = serde_json::from_str(&contents)
        .map_err(|e| UploadError::Config(format!("Failed to parse config file: {}", e)))?;

    Ok(Some(data))
}
