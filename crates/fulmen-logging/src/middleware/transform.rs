use super::Middleware;
use crate::event::LogEvent;

/// Applies a user-supplied `LogEvent -> LogEvent` function.
pub struct TransformMiddleware<F: Fn(LogEvent) -> LogEvent + Send + Sync> {
    transform: F,
}

impl<F: Fn(LogEvent) -> LogEvent + Send + Sync> TransformMiddleware<F> {
    #[must_use]
    pub fn new(transform: F) -> Self {
        TransformMiddleware { transform }
    }
}

impl<F: Fn(LogEvent) -> LogEvent + Send + Sync> Middleware for TransformMiddleware<F> {
    fn apply(&self, event: LogEvent) -> LogEvent {
        (self.transform)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;

    #[test]
    fn applies_user_function() {
        let mw = TransformMiddleware::new(|mut e: LogEvent| {
            e.message = format!("[wrapped] {}", e.message);
            e
        });
        let event = mw.apply(LogEvent::new("svc", Severity::Info, "hi"));
        assert_eq!(event.message, "[wrapped] hi");
    }
}
