use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use log::debug;
use crate::error::{Error, Result};
use crate::job::Job;

/// Ordered list of pending uploads backed by a two-column CSV file.
///
/// The file is read once by [`UploadQueue::load`] and written back only by
/// [`UploadQueue::save`]. Pops in between are in-memory only, so a crash
/// before the next save replays the popped jobs instead of losing them.
#[derive(Debug)]
pub struct UploadQueue {
    path: PathBuf,
    jobs: VecDeque<Job>,
}

impl UploadQueue {
    /// Read every row of `path` into memory
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = fs::read(&path).map_err(|source| Error::QueueUnavailable {
            path: path.clone(),
            source,
        })?;

        let jobs = parse_rows(&path, &content)?;
        debug!("Loaded {} job(s) from {}", jobs.len(), path.display());

        Ok(Self { path, jobs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First pending job, if any
    pub fn head(&self) -> Option<&Job> {
        self.jobs.front()
    }

    /// Drop the head job; only called once its upload is confirmed
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Overwrite the queue file with the current in-memory order
    ///
    /// Rows go to a sibling temp file first which is then renamed over the
    /// queue file, so a failed write leaves the previous state on disk.
    pub fn save(&self) -> Result<()> {
        let persistence = |source: std::io::Error| Error::Persistence {
            path: self.path.clone(),
            source,
        };

        let bytes = encode_rows(self.jobs.iter()).map_err(persistence)?;
        let tmp_path = temp_path(&self.path);
        write_synced(&tmp_path, &bytes)
            .and_then(|()| fs::rename(&tmp_path, &self.path))
            .map_err(|source| {
                let _ = fs::remove_file(&tmp_path);
                persistence(source)
            })?;

        debug!("Saved {} job(s) to {}", self.jobs.len(), self.path.display());
        Ok(())
    }
}

fn parse_rows(path: &Path, content: &[u8]) -> Result<VecDeque<Job>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let corrupt = |line: u64, reason: String| Error::QueueCorrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    // Blank lines carry no job and are skipped by the reader
    let mut jobs = VecDeque::new();
    for (index, record) in reader.records().enumerate() {
        let fallback_line = index as u64 + 1;
        let record = record
            .map_err(|e| corrupt(e.position().map_or(fallback_line, |p| p.line()), e.to_string()))?;
        let line = record.position().map_or(fallback_line, |p| p.line());

        if record.len() != 2 {
            return Err(corrupt(
                line,
                format!("expected 2 fields (video, metadata), found {}", record.len()),
            ));
        }
        if record.iter().any(|field| field.trim().is_empty()) {
            return Err(corrupt(line, "video and metadata paths must not be empty".to_string()));
        }

        jobs.push_back(Job::new(&record[0], &record[1]));
    }

    Ok(jobs)
}

fn encode_rows<'a>(jobs: impl Iterator<Item = &'a Job>) -> std::io::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for job in jobs {
        writer.write_record([
            job.video_path.to_string_lossy().as_ref(),
            job.metadata_path.to_string_lossy().as_ref(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
