use super::Sink;
use crate::event::LogEvent;

/// Discards every event. Useful for tests and disabled-logging configurations.
pub struct NullSink;

impl Sink for NullSink {
    fn write(&self, _event: &LogEvent) {}
}
