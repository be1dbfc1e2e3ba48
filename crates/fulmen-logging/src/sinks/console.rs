use super::{serialize, Sink};
use crate::event::LogEvent;

/// Writes JSON lines to stdout.
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn write(&self, event: &LogEvent) {
        println!("{}", serialize(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;

    #[test]
    fn writes_without_panicking() {
        ConsoleSink.write(&LogEvent::new("svc", Severity::Info, "hi"));
    }
}
