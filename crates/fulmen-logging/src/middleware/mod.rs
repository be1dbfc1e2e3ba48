//! Middleware pipeline: a registration-ordered sequence of `LogEvent -> LogEvent`
//! transforms, invoked synchronously per emission.

mod add_fields;
mod redaction;
mod transform;

pub use add_fields::AddFieldsMiddleware;
pub use redaction::{RedactionMiddleware, DEFAULT_REDACT_FIELDS, DEFAULT_REDACT_PATTERNS};
pub use transform::TransformMiddleware;

use crate::event::LogEvent;

/// A pure transform applied to every emitted event, in registration order.
/// A middleware may drop fields but must return a well-formed event.
pub trait Middleware: Send + Sync {
    fn apply(&self, event: LogEvent) -> LogEvent;
}

/// Ordered list of middlewares, invoked synchronously.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Pipeline { stages: Vec::new() }
    }

    pub fn push(&mut self, middleware: Box<dyn Middleware>) {
        self.stages.push(middleware);
    }

    #[must_use]
    pub fn run(&self, mut event: LogEvent) -> LogEvent {
        for stage in &self.stages {
            event = stage.apply(event);
        }
        event
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;

    struct UppercaseMiddleware;
    impl Middleware for UppercaseMiddleware {
        fn apply(&self, mut event: LogEvent) -> LogEvent {
            event.message = event.message.to_uppercase();
            event
        }
    }

    #[test]
    fn pipeline_runs_in_registration_order() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(UppercaseMiddleware));
        pipeline.push(Box::new(AddFieldsMiddleware::new(
            [("tier".to_string(), serde_json::Value::from("gold"))].into_iter().collect(),
        )));
        let event = pipeline.run(LogEvent::new("svc", Severity::Info, "hi"));
        assert_eq!(event.message, "HI");
        assert_eq!(event.context["tier"], serde_json::Value::from("gold"));
    }
}
