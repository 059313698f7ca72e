//! JSON-lines intake of host events.
//!
//! Each line of the input is one serialized `HostEvent`. A reader thread
//! parses lines onto a bounded channel; malformed lines are skipped.

use crate::collector::types::HostEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

/// Where host events are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Stdin,
    File(PathBuf),
}

impl EventSource {
    /// `-` means stdin; anything else is a path.
    pub fn from_arg(arg: Option<&Path>) -> Self {
        match arg {
            Some(path) if path != Path::new("-") => EventSource::File(path.to_path_buf()),
            _ => EventSource::Stdin,
        }
    }
}

/// Errors that can occur while starting the event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Event stream is already running")]
    AlreadyRunning,

    #[error("Cannot open event source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads host events from a JSON-lines source on a background thread.
pub struct EventStream {
    source: EventSource,
    sender: Sender<HostEvent>,
    receiver: Receiver<HostEvent>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl EventStream {
    pub fn new(source: EventSource) -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            source,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Start reading events.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let input: Box<dyn BufRead + Send> = match &self.source {
            EventSource::Stdin => Box::new(BufReader::new(io::stdin())),
            EventSource::File(path) => {
                let file = File::open(path).map_err(|source| StreamError::Open {
                    path: path.clone(),
                    source,
                })?;
                Box::new(BufReader::new(file))
            }
        };

        self.running.store(true, Ordering::SeqCst);
        let sender = self.sender.clone();
        let running = Arc::clone(&self.running);
        self.reader = Some(std::thread::spawn(move || {
            pump_lines(input, &sender, &running);
            running.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    /// Stop reading. Events already queued stay readable.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // A reader blocked on stdin cannot be interrupted; only join finished ones.
        if let Some(handle) = self.reader.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    /// Whether the reader is still consuming input.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<HostEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<HostEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Parse one line; blank lines yield `None` without a warning.
pub fn parse_line(line: &str) -> Option<Result<HostEvent, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

fn pump_lines(
    mut input: Box<dyn BufRead + Send>,
    sender: &Sender<HostEvent>,
    running: &AtomicBool,
) {
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    while running.load(Ordering::SeqCst) {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Event input read failed: {e}");
                break;
            }
        }
        line_no += 1;

        // Lines are decoded one at a time so invalid bytes cost only their own line.
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Skipping non-UTF-8 event on line {line_no}: {e}");
                continue;
            }
        };
        match parse_line(line) {
            Some(Ok(event)) => {
                if sender.send(event).is_err() {
                    break;
                }
            }
            Some(Err(e)) => tracing::warn!("Skipping malformed event on line {line_no}: {e}"),
            None => {}
        }
    }
    tracing::debug!("Event input exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::EventKind;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_line() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("{not json").unwrap().is_err());

        let event = parse_line(r#"{"type":"touch_start"}"#).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::TouchStart);
    }

    #[test]
    fn test_event_source_from_arg() {
        assert_eq!(EventSource::from_arg(None), EventSource::Stdin);
        assert_eq!(EventSource::from_arg(Some(Path::new("-"))), EventSource::Stdin);
        assert_eq!(
            EventSource::from_arg(Some(Path::new("events.jsonl"))),
            EventSource::File(PathBuf::from("events.jsonl"))
        );
    }

    #[test]
    fn test_stream_reads_file_and_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"touch_start"}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"type":"click","app_id":"com.example"}}"#).unwrap();
        file.flush().unwrap();

        let mut stream = EventStream::new(EventSource::File(file.path().to_path_buf()));
        stream.start().unwrap();

        let first = stream.receiver().recv_timeout(Duration::from_secs(5)).unwrap();
        let second = stream.receiver().recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.kind, EventKind::TouchStart);
        assert_eq!(second.app_id.as_deref(), Some("com.example"));
        assert!(stream.receiver().recv_timeout(Duration::from_millis(200)).is_err());
        stream.stop();
    }

    #[test]
    fn test_stream_skips_non_utf8_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"touch_start"}}"#).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        writeln!(file, r#"{{"type":"touch_end"}}"#).unwrap();
        file.flush().unwrap();

        let mut stream = EventStream::new(EventSource::File(file.path().to_path_buf()));
        stream.start().unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = stream.receiver().recv_timeout(Duration::from_millis(500)) {
            kinds.push(event.kind);
        }
        stream.stop();
        assert_eq!(kinds, vec![EventKind::TouchStart, EventKind::TouchEnd]);
    }

    #[test]
    fn test_missing_file_fails_to_start() {
        let mut stream = EventStream::new(EventSource::File(PathBuf::from("/nonexistent/events")));
        assert!(matches!(stream.start(), Err(StreamError::Open { .. })));
        assert!(!stream.is_running());
    }
}
