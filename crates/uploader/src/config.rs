use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a bulk upload run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// CSV file holding the pending (video, metadata) rows
    pub queue_path: PathBuf,
    /// Append-only run log
    pub log_path: PathBuf,
    /// External uploader executable
    pub uploader_bin: PathBuf,
    /// Flag preceding the video path argument
    pub video_flag: String,
    /// Flag preceding the metadata path argument
    pub metadata_flag: String,
    /// Text the uploader prints on stdout when an upload went through
    pub success_marker: String,
    /// Also treat a non-zero exit code as a failed upload
    pub fail_on_nonzero_exit: bool,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl UploaderConfig {
    /// Create a default configuration matching the stock youtubeuploader setup
    pub fn default_config() -> Self {
        Self {
            queue_path: PathBuf::from("list.csv"),
            log_path: PathBuf::from("BYU.log"),
            uploader_bin: PathBuf::from("youtubeuploader"),
            video_flag: "-filename".to_string(),
            metadata_flag: "-metaJSON".to_string(),
            success_marker: "Upload successful".to_string(),
            fail_on_nonzero_exit: false,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }
}
