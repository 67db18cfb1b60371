pub mod config;
pub mod error;
pub mod job;
pub mod queue;
pub mod log_sink;
pub mod youtube_uploader;
pub mod runner;

pub use config::UploaderConfig;
pub use error::{Error, Result};
pub use job::Job;
pub use queue::UploadQueue;
pub use log_sink::LogSink;
pub use youtube_uploader::{CommandUploader, Uploader, UploaderOutput};
pub use runner::{RunSummary, Runner};
