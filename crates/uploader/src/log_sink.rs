use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::Local;
use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Append-only run log: one `<timestamp> | <message>` line per event, flushed as written
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl LogSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::LogSink)?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, message: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            Error::LogSink(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "log file already closed",
            ))
        })?;

        writeln!(writer, "{} | {}", Local::now().format(TIMESTAMP_FORMAT), message)
            .and_then(|()| writer.flush())
            .map_err(Error::LogSink)
    }

    /// Flush and release the file; later calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().map_err(Error::LogSink)?;
        writer.get_ref().sync_all().map_err(Error::LogSink)
    }
}
