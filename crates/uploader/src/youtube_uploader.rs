use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use log::debug;
use regex::Regex;
use tokio::process::Command;
use crate::config::UploaderConfig;
use crate::error::{Error, Result};
use crate::job::Job;

/// Uploader error lines look like `2024/05/01 12:30:45 <message>`
static ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}\s(.*)").expect("error line pattern is valid"));

/// Something that can push one job to the video host
pub trait Uploader {
    /// Resolves once the upload is confirmed, or with the reason it was not
    fn upload(&self, job: &Job) -> impl Future<Output = Result<()>> + Send;
}

/// Captured output of one uploader process
#[derive(Debug, Clone)]
pub struct UploaderOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl UploaderOutput {
    /// Decide whether the upload of `video` went through.
    ///
    /// Stdout containing `success_marker` is the success signal; the exit code
    /// only counts when `fail_on_nonzero_exit` is set. On failure the message
    /// comes from the first timestamped stderr line.
    pub fn interpret(&self, success_marker: &str, fail_on_nonzero_exit: bool, video: &Path) -> Result<()> {
        let marker_found = self.stdout.contains(success_marker);
        let exit_ok = !fail_on_nonzero_exit || self.exit_code == Some(0);
        if marker_found && exit_ok {
            return Ok(());
        }

        match extract_error_message(&self.stderr) {
            Some(message) => Err(Error::UploadFailed {
                video: video.to_path_buf(),
                message,
            }),
            None => Err(Error::UploadParseError {
                video: video.to_path_buf(),
                exit_code: self.exit_code,
            }),
        }
    }
}

/// Remainder of the first timestamp-prefixed line in `stderr`
pub fn extract_error_message(stderr: &str) -> Option<String> {
    ERROR_LINE
        .captures(stderr)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Runs the external uploader binary once per job
#[derive(Debug, Clone)]
pub struct CommandUploader {
    pub bin: PathBuf,
    pub video_flag: String,
    pub metadata_flag: String,
    pub success_marker: String,
    pub fail_on_nonzero_exit: bool,
}

impl CommandUploader {
    pub fn from_config(cfg: &UploaderConfig) -> Self {
        Self {
            bin: cfg.uploader_bin.clone(),
            video_flag: cfg.video_flag.clone(),
            metadata_flag: cfg.metadata_flag.clone(),
            success_marker: cfg.success_marker.clone(),
            fail_on_nonzero_exit: cfg.fail_on_nonzero_exit,
        }
    }

    /// Spawn the uploader for `job` and wait for it to exit.
    ///
    /// There is no timeout: a hung uploader blocks until it is killed. Dropping
    /// the returned future kills the child.
    pub async fn run(&self, job: &Job) -> Result<UploaderOutput> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg(&self.video_flag)
            .arg(job.video())
            .arg(&self.metadata_flag)
            .arg(job.metadata())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("uploader command: {} {} {} {} {}",
               self.bin.display(), self.video_flag, job.video().display(),
               self.metadata_flag, job.metadata().display());

        let output = cmd
            .output()
            .await
            .map_err(|source| Error::UploaderLaunch {
                bin: self.bin.clone(),
                source,
            })?;

        let exit_code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!("uploader exit code: {:?}, stdout length: {}, stderr length: {}",
               exit_code, stdout.len(), stderr.len());

        Ok(UploaderOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

impl Uploader for CommandUploader {
    async fn upload(&self, job: &Job) -> Result<()> {
        let output = self.run(job).await?;
        output.interpret(&self.success_marker, self.fail_on_nonzero_exit, job.video())
    }
}
