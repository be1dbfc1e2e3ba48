use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use super::{fallback_to_console, serialize, Sink};
use crate::event::LogEvent;

/// Appends JSON lines to a file. On write failure, falls back to console
/// and never propagates the error.
pub struct FileSink {
    path: PathBuf,
    handle: Mutex<()>,
}

impl FileSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into(), handle: Mutex::new(()) }
    }
}

impl Sink for FileSink {
    fn write(&self, event: &LogEvent) {
        let _guard = self.handle.lock().expect("file sink lock poisoned");
        let line = serialize(event);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            fallback_to_console(event, &e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use std::io::Read as _;

    #[test]
    fn appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = FileSink::new(&path);
        sink.write(&LogEvent::new("svc", Severity::Info, "first"));
        sink.write(&LogEvent::new("svc", Severity::Info, "second"));
        let mut content = String::new();
        std::fs::File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn write_failure_falls_back_without_panicking() {
        let sink = FileSink::new("/nonexistent-dir-xyz/out.log");
        sink.write(&LogEvent::new("svc", Severity::Info, "first"));
    }
}
