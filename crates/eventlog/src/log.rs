use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, warn};

use crate::RecognitionEvent;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("cannot encode recognition event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cannot append to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event log lock poisoned")]
    Poisoned,
}

/// Which log file an event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChannel {
    /// Multipart text captchas.
    Captcha,
    /// Base64 OCR requests.
    Ocr,
    /// Slider gap detection.
    Slide,
}

impl EventChannel {
    pub fn file_name(&self) -> &'static str {
        match self {
            EventChannel::Captcha => "recognition_log.jsonl",
            EventChannel::Ocr => "ocr_log.jsonl",
            EventChannel::Slide => "slide_log.jsonl",
        }
    }

    fn index(&self) -> usize {
        match self {
            EventChannel::Captcha => 0,
            EventChannel::Ocr => 1,
            EventChannel::Slide => 2,
        }
    }
}

/// Append-only NDJSON recognition log.
///
/// [`record`](Self::record) is fire-and-forget: failures go to the tracing
/// diagnostic channel and a failure counter, never back to the caller. Each
/// file has its own lock so a single event's line is never interleaved with
/// another's.
#[derive(Debug)]
pub struct EventLog {
    dir: PathBuf,
    locks: [Mutex<()>; 3],
    written: AtomicU64,
    failures: AtomicU64,
}

impl EventLog {
    /// Log into `dir`, creating it when possible. An unusable directory is
    /// reported once here and again on each failed append.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "event log directory unavailable");
        }
        Self {
            dir,
            locks: Default::default(),
            written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, channel: EventChannel) -> PathBuf {
        self.dir.join(channel.file_name())
    }

    /// Append `event`, swallowing any failure.
    pub fn record(&self, channel: EventChannel, event: &RecognitionEvent) {
        if let Err(e) = self.try_record(channel, event) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(channel = channel.file_name(), error = %e, "recognition event not logged");
        }
    }

    /// Append `event`, reporting failures.
    pub fn try_record(
        &self,
        channel: EventChannel,
        event: &RecognitionEvent,
    ) -> Result<(), EventLogError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let path = self.path_for(channel);
        let _guard = self.locks[channel.index()]
            .lock()
            .map_err(|_| EventLogError::Poisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| EventLogError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(&line)
            .map_err(|source| EventLogError::Io { path, source })?;

        self.written.fetch_add(1, Ordering::Relaxed);
        debug!(channel = channel.file_name(), bytes = line.len(), "recognition event logged");
        Ok(())
    }

    /// Events successfully appended since start.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Events dropped because of an error since start.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptchaDetail, Outcome};
    use std::sync::Arc;

    fn event(code: &str) -> RecognitionEvent {
        RecognitionEvent::new(Outcome::Code(code.into()), &CaptchaDetail::default())
    }

    #[test]
    fn appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("logs"));
        log.record(EventChannel::Captcha, &event("a1"));
        log.record(EventChannel::Captcha, &event("b2"));

        let raw = fs::read_to_string(log.path_for(EventChannel::Captcha)).unwrap();
        let codes: Vec<String> = raw
            .lines()
            .map(|l| {
                let value: serde_json::Value = serde_json::from_str(l).unwrap();
                value["code"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(codes, vec!["a1", "b2"]);
        assert_eq!(log.written(), 2);
        assert_eq!(log.failures(), 0);
    }

    #[test]
    fn channels_write_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        log.record(EventChannel::Ocr, &event("x"));
        assert!(log.path_for(EventChannel::Ocr).exists());
        assert!(!log.path_for(EventChannel::Captcha).exists());
    }

    #[test]
    fn failures_are_counted_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file-not-dir");
        fs::write(&blocker, b"").unwrap();

        let log = EventLog::new(&blocker);
        log.record(EventChannel::Slide, &event("lost"));
        assert_eq!(log.failures(), 1);
        assert!(matches!(
            log.try_record(EventChannel::Slide, &event("lost")),
            Err(EventLogError::Io { .. })
        ));
    }

    #[test]
    fn concurrent_appends_never_tear_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(EventLog::new(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.record(EventChannel::Captcha, &event(&format!("t{t}-{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let raw = fs::read_to_string(log.path_for(EventChannel::Captcha)).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            serde_json::from_str::<serde_json::Value>(line).expect("whole json line");
        }
    }
}
