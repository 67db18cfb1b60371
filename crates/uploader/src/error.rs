//! Error types for queue processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for queue processing.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, draining or persisting the queue.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not open {}: {source}", .path.display())]
    QueueUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue file {} is corrupt at line {line}: {reason}", .path.display())]
    QueueCorrupt {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("{message}")]
    UploadFailed { video: PathBuf, message: String },

    #[error("Upload of {} failed (exit code {}), no error line found in uploader output",
        .video.display(),
        .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    UploadParseError {
        video: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("Failed to launch uploader {}: {source}", .bin.display())]
    UploaderLaunch {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save queue to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file error: {0}")]
    LogSink(#[source] std::io::Error),
}

impl Error {
    /// Errors that end the drain loop but leave the head job queued for the next run.
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self,
            Self::UploadFailed { .. } | Self::UploadParseError { .. } | Self::UploaderLaunch { .. }
        )
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}
