use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use super::{fallback_to_console, serialize, Sink};
use crate::event::LogEvent;

/// When to roll to a new file.
#[derive(Debug, Clone, Copy)]
pub enum RollingPolicy {
    MaxBytes(u64),
    Daily,
}

struct State {
    current_size: u64,
    opened_at: SystemTime,
}

/// Rotates by size or by day. Contract: a write completes (old file closed,
/// new file opened and written) before `write` returns.
pub struct RollingFileSink {
    base_path: PathBuf,
    policy: RollingPolicy,
    state: Mutex<State>,
}

impl RollingFileSink {
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>, policy: RollingPolicy) -> Self {
        let base_path = base_path.into();
        let current_size = fs::metadata(&base_path).map(|m| m.len()).unwrap_or(0);
        RollingFileSink {
            base_path,
            policy,
            state: Mutex::new(State { current_size, opened_at: SystemTime::now() }),
        }
    }

    fn should_roll(&self, state: &State, next_line_len: u64) -> bool {
        match self.policy {
            RollingPolicy::MaxBytes(max) => state.current_size + next_line_len > max,
            RollingPolicy::Daily => {
                state.opened_at.elapsed().map(|d| d.as_secs() >= 86_400).unwrap_or(false)
            }
        }
    }

    fn rotated_path(&self) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut rotated = self.base_path.clone();
        rotated.set_extension(format!("{suffix}.log"));
        rotated
    }
}

impl Sink for RollingFileSink {
    fn write(&self, event: &LogEvent) {
        let line = serialize(event);
        let mut state = self.state.lock().expect("rolling file sink lock poisoned");
        if self.should_roll(&state, line.len() as u64 + 1) && self.base_path.exists() {
            if fs::rename(&self.base_path, self.rotated_path()).is_ok() {
                state.current_size = 0;
                state.opened_at = SystemTime::now();
            }
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.base_path)
            .and_then(|mut f| writeln!(f, "{line}"));
        match result {
            Ok(()) => state.current_size += line.len() as u64 + 1,
            Err(e) => fallback_to_console(event, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;

    #[test]
    fn rolls_over_once_max_bytes_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sink = RollingFileSink::new(&path, RollingPolicy::MaxBytes(64));
        for i in 0..20 {
            sink.write(&LogEvent::new("svc", Severity::Info, format!("line {i}")));
        }
        let rotated_count = fs::read_dir(dir.path()).unwrap().count();
        assert!(rotated_count > 1, "expected at least one rotation to have occurred");
    }
}
