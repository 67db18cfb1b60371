use std::path::{Path, PathBuf};

/// One pending upload: a video file and the JSON metadata describing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub video_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl Job {
    pub fn new(video_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    pub fn video(&self) -> &Path {
        &self.video_path
    }

    pub fn metadata(&self) -> &Path {
        &self.metadata_path
    }
}
