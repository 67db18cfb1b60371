use log::{debug, error, info, log, warn, Level};
use crate::config::UploaderConfig;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::log_sink::LogSink;
use crate::queue::UploadQueue;
use crate::youtube_uploader::{CommandUploader, Uploader};

/// What a finished run did
#[derive(Debug)]
pub struct RunSummary {
    /// Jobs uploaded and popped during this run
    pub uploaded: usize,
    /// Jobs still in the saved queue
    pub remaining: usize,
    /// Error that stopped the drain, if any; its job is still at the head
    pub failure: Option<Error>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drains an [`UploadQueue`] one job at a time.
///
/// The queue is saved and the log closed exactly once per run: at the end of
/// [`Runner::perform`], or from `Drop` if the run panicked or its future was
/// dropped mid-upload (which is how the binary handles SIGINT and SIGTERM).
pub struct Runner<U: Uploader> {
    queue: UploadQueue,
    log: LogSink,
    uploader: U,
    finalized: bool,
}

impl Runner<CommandUploader> {
    /// Open the queue and log named in `cfg` and drive the configured uploader binary
    pub fn from_config(cfg: &UploaderConfig) -> Result<Self> {
        let queue = UploadQueue::load(&cfg.queue_path)?;
        let log = LogSink::open(&cfg.log_path)?;
        Ok(Self::new(queue, log, CommandUploader::from_config(cfg)))
    }
}

impl<U: Uploader> Runner<U> {
    pub fn new(queue: UploadQueue, log: LogSink, uploader: U) -> Self {
        Self {
            queue,
            log,
            uploader,
            finalized: false,
        }
    }

    /// Upload every queued job in order, stopping at the first failure.
    ///
    /// Job-level errors end up in [`RunSummary::failure`]. `Err` means the
    /// queue could not be saved or the log could not be closed.
    pub async fn perform(mut self) -> Result<RunSummary> {
        info!("Starting run with {} queued job(s) from {}",
              self.queue.len(), self.queue.path().display());

        let mut uploaded = 0;
        let failure = match self.drain(&mut uploaded).await {
            Ok(()) => {
                debug!("Queue drained");
                None
            }
            Err(e) => {
                self.record_error(&e.to_string());
                Some(e)
            }
        };

        self.finalize()?;

        Ok(RunSummary {
            uploaded,
            remaining: self.queue.len(),
            failure,
        })
    }

    async fn drain(&mut self, uploaded: &mut usize) -> Result<()> {
        self.record(Level::Info, "Initialized successfully")?;

        while let Some(job) = self.queue.head().cloned() {
            self.upload(&job).await?;
            self.queue.pop();
            *uploaded += 1;
        }

        Ok(())
    }

    async fn upload(&mut self, job: &Job) -> Result<()> {
        self.record(Level::Info, &format!("Uploading {}", job.video().display()))?;
        self.uploader.upload(job).await?;
        self.record(Level::Info, &format!("Uploaded {} successfully", job.video().display()))
    }

    /// Append `message` to the run log and echo it once to the console
    fn record(&mut self, level: Level, message: &str) -> Result<()> {
        log!(level, "{}", message);
        self.log.write(message)
    }

    /// Errors reach stderr even when the run log is unwritable
    fn record_error(&mut self, message: &str) {
        let line = format!("ERROR: {}", message);
        if let Err(e) = self.record(Level::Error, &line) {
            warn!("Could not record error in {}: {}", self.log.path().display(), e);
        }
    }

    /// Save the queue, then close the log, even if saving failed
    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;

        let saved = self.queue.save();
        if let Err(e) = &saved {
            error!("{}; {} job(s) were pending", e, self.queue.len());
        }
        let closed = self.log.close();

        saved?;
        closed
    }
}

impl<U: Uploader> Drop for Runner<U> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        self.record_error(&format!("run interrupted with {} job(s) pending", self.queue.len()));
        if let Err(e) = self.finalize() {
            error!("Finalization after interrupted run failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Outcome scripted per video path; unlisted videos succeed
    #[derive(Default)]
    struct ScriptedUploader {
        outcomes: HashMap<PathBuf, Scripted>,
        calls: Arc<Mutex<Vec<Job>>>,
    }

    enum Scripted {
        Fail(&'static str),
        Unparseable,
        Panic,
        Hang,
    }

    impl ScriptedUploader {
        fn with(mut self, video: &str, outcome: Scripted) -> Self {
            self.outcomes.insert(PathBuf::from(video), outcome);
            self
        }
    }

    impl Uploader for ScriptedUploader {
        async fn upload(&self, job: &Job) -> Result<()> {
            self.calls.lock().unwrap().push(job.clone());
            match self.outcomes.get(&job.video_path) {
                None => Ok(()),
                Some(Scripted::Fail(message)) => Err(Error::UploadFailed {
                    video: job.video_path.clone(),
                    message: message.to_string(),
                }),
                Some(Scripted::Unparseable) => Err(Error::UploadParseError {
                    video: job.video_path.clone(),
                    exit_code: Some(1),
                }),
                Some(Scripted::Panic) => panic!("uploader blew up on {}", job.video_path.display()),
                Some(Scripted::Hang) => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(queue: &str) -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("list.csv"), queue).unwrap();
            Self { dir }
        }

        fn queue_path(&self) -> PathBuf {
            self.dir.path().join("list.csv")
        }

        fn log_path(&self) -> PathBuf {
            self.dir.path().join("BYU.log")
        }

        fn runner(&self, uploader: ScriptedUploader) -> Runner<ScriptedUploader> {
            Runner::new(
                UploadQueue::load(self.queue_path()).unwrap(),
                LogSink::open(self.log_path()).unwrap(),
                uploader,
            )
        }

        fn persisted(&self) -> String {
            fs::read_to_string(self.queue_path()).unwrap()
        }

        fn log_messages(&self) -> Vec<String> {
            messages(&self.log_path())
        }
    }

    fn messages(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.split_once(" | ").unwrap().1.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_all_jobs_succeed_drains_queue() {
        let fx = Fixture::new("a.mp4,a.json\nb.mp4,b.json\nc.mp4,c.json\n");

        let summary = fx.runner(ScriptedUploader::default()).perform().await.unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.uploaded, 3);
        assert_eq!(summary.remaining, 0);
        assert_eq!(fx.persisted(), "");

        let uploaded: Vec<_> = fx
            .log_messages()
            .into_iter()
            .filter(|m| m.ends_with("successfully") && m.starts_with("Uploaded "))
            .collect();
        assert_eq!(uploaded, vec![
            "Uploaded a.mp4 successfully",
            "Uploaded b.mp4 successfully",
            "Uploaded c.mp4 successfully",
        ]);
    }

    #[tokio::test]
    async fn test_failed_job_stays_at_head() {
        let fx = Fixture::new("a.mp4,a.json\nb.mp4,b.json\nc.mp4,c.json\n");
        let uploader = ScriptedUploader::default().with("b.mp4", Scripted::Fail("quota exceeded, try later"));

        let calls = uploader.calls.clone();
        let summary = fx.runner(uploader).perform().await.unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.remaining, 2);
        assert!(summary.failure.as_ref().unwrap().is_job_failure());
        assert_eq!(fx.persisted(), "b.mp4,b.json\nc.mp4,c.json\n");
        assert_eq!(*calls.lock().unwrap(), vec![Job::new("a.mp4", "a.json"), Job::new("b.mp4", "b.json")]);

        assert_eq!(fx.log_messages(), vec![
            "Initialized successfully",
            "Uploading a.mp4",
            "Uploaded a.mp4 successfully",
            "Uploading b.mp4",
            "ERROR: quota exceeded, try later",
        ]);
    }

    #[tokio::test]
    async fn test_unparseable_failure_still_stops_drain() {
        let fx = Fixture::new("a.mp4,a.json\nb.mp4,b.json\n");
        let uploader = ScriptedUploader::default().with("a.mp4", Scripted::Unparseable);

        let summary = fx.runner(uploader).perform().await.unwrap();
        assert!(matches!(summary.failure, Some(Error::UploadParseError { .. })));
        assert_eq!(summary.uploaded, 0);
        assert_eq!(fx.persisted(), "a.mp4,a.json\nb.mp4,b.json\n");
    }

    #[tokio::test]
    async fn test_empty_queue_uploads_nothing() {
        let fx = Fixture::new("");
        let runner = fx.runner(ScriptedUploader::default());

        let summary = runner.perform().await.unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.uploaded, 0);
        assert_eq!(fx.persisted(), "");
        assert_eq!(fx.log_messages(), vec!["Initialized successfully"]);
    }

    #[tokio::test]
    async fn test_panic_mid_drain_still_saves_queue() {
        let fx = Fixture::new("a.mp4,a.json\nb.mp4,b.json\nc.mp4,c.json\n");
        let uploader = ScriptedUploader::default().with("b.mp4", Scripted::Panic);
        let runner = fx.runner(uploader);

        let joined = tokio::spawn(runner.perform()).await;
        assert!(joined.unwrap_err().is_panic());

        assert_eq!(fx.persisted(), "b.mp4,b.json\nc.mp4,c.json\n");
        let messages = fx.log_messages();
        assert_eq!(&messages[messages.len() - 2..], [
            "Uploading b.mp4",
            "ERROR: run interrupted with 2 job(s) pending",
        ]);
    }

    #[tokio::test]
    async fn test_cancelled_run_saves_queue_and_log() {
        let fx = Fixture::new("a.mp4,a.json\nb.mp4,b.json\nc.mp4,c.json\n");
        let uploader = ScriptedUploader::default().with("b.mp4", Scripted::Hang);
        let runner = fx.runner(uploader);

        let cancelled = tokio::time::timeout(Duration::from_millis(100), runner.perform()).await;
        assert!(cancelled.is_err());

        assert_eq!(fx.persisted(), "b.mp4,b.json\nc.mp4,c.json\n");
        assert_eq!(fx.log_messages(), vec![
            "Initialized successfully",
            "Uploading a.mp4",
            "Uploaded a.mp4 successfully",
            "Uploading b.mp4",
            "ERROR: run interrupted with 2 job(s) pending",
        ]);
    }

    #[test]
    fn test_dropped_run_saves_queue() {
        let fx = Fixture::new("a.mp4,a.json\nb.mp4,b.json\n");
        let mut runner = fx.runner(ScriptedUploader::default());
        runner.queue.pop();
        drop(runner);

        assert_eq!(fx.persisted(), "b.mp4,b.json\n");
    }

    #[tokio::test]
    async fn test_unsaveable_queue_is_reported_as_error() {
        let fx = Fixture::new("a.mp4,a.json\n");
        let runner = fx.runner(ScriptedUploader::default());
        fs::remove_file(fx.queue_path()).unwrap();
        fs::create_dir(fx.queue_path()).unwrap();

        let err = runner.perform().await.unwrap_err();
        assert!(err.is_persistence(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_from_config_reports_missing_queue() {
        let dir = TempDir::new().unwrap();
        let cfg = UploaderConfig {
            queue_path: dir.path().join("list.csv"),
            log_path: dir.path().join("BYU.log"),
            ..UploaderConfig::default_config()
        };

        assert!(matches!(Runner::from_config(&cfg), Err(Error::QueueUnavailable { .. })));
    }
}
