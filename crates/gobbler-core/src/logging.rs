//! Per-stream log files.
//!
//! [`LogFileListener`] appends every line it sees to `{dir}/{id}.log` as a
//! timestamped record, e.g. `[2026-02-04T10:15:30.123Z] STDOUT: hello`.
//! Several listeners may share one file through a [`LogHandle`].

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use crate::listener::{ListenerResult, StreamListener};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<File>>;

/// Current UTC time as ISO 8601 with milliseconds.
fn utc_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Open (or create) `{log_dir}/{log_id}.log` for appending.
pub fn open_log_file(log_dir: &Path, log_id: &str) -> io::Result<LogHandle> {
    std::fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("{}.log", log_id)))?;
    Ok(Arc::new(Mutex::new(file)))
}

/// Write a timestamped record. Logging is best effort: failures are dropped.
pub fn log_line(handle: &LogHandle, label: &str, data: &str) {
    if let Ok(mut file) = handle.lock() {
        let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), label, data);
        let _ = file.flush();
    }
}

/// Appends each line to a log file under `label`.
#[derive(Debug, Clone)]
pub struct LogFileListener {
    handle: LogHandle,
    label: String,
}

impl LogFileListener {
    pub fn new(handle: LogHandle, label: impl Into<String>) -> Self {
        Self {
            handle,
            label: label.into(),
        }
    }
}

impl StreamListener for LogFileListener {
    fn on_line(&mut self, line: &str) -> ListenerResult {
        log_line(&self.handle, &self.label, line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn utc_timestamp_format() {
        let ts = utc_timestamp();
        // YYYY-MM-DDTHH:MM:SS.mmmZ
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn open_log_file_creates_dir_and_file() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("nested");

        open_log_file(&log_dir, "session").unwrap();
        assert!(log_dir.join("session.log").exists());
    }

    #[test]
    fn listener_writes_labelled_lines() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(dir.path(), "run").unwrap();

        let mut out = LogFileListener::new(Arc::clone(&handle), "STDOUT");
        let mut err = LogFileListener::new(handle, "STDERR");
        out.on_line("hello world").unwrap();
        err.on_line("").unwrap();
        out.on_char('x').unwrap();

        let contents = fs::read_to_string(dir.path().join("run.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] STDOUT: hello world"));
        assert!(lines[1].ends_with("] STDERR: "));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempdir().unwrap();
        log_line(&open_log_file(dir.path(), "a").unwrap(), "L", "first");
        log_line(&open_log_file(dir.path(), "a").unwrap(), "L", "second");

        let contents = fs::read_to_string(dir.path().join("a.log")).unwrap();
        assert!(contents.contains("L: first"));
        assert!(contents.contains("L: second"));
    }
}
