//! Log sinks: each receives the finalized event and serializes it.
//! Matches the teacher's preference for trait objects over enums when the
//! set of implementors is open-ended (see `xchecker-utils::runner::Runner`).

mod console;
mod external;
mod file;
mod null;
mod rolling_file;

pub use console::ConsoleSink;
pub use external::ExternalSink;
pub use file::FileSink;
pub use null::NullSink;
pub use rolling_file::{RollingFileSink, RollingPolicy};

use crate::event::LogEvent;

/// A destination for finalized log events. Implementations must never
/// panic or propagate write failures to the caller — failures are logged
/// to console and swallowed, per the engine's failure model.
pub trait Sink: Send + Sync {
    fn write(&self, event: &LogEvent);
}

fn serialize(event: &LogEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!(r#"{{"message":"log serialization failed: {e}"}}"#))
}

fn fallback_to_console(event: &LogEvent, reason: &str) {
    eprintln!("{}", serialize(event));
    tracing::warn!(error = reason, "log sink write failed, fell back to console");
}
