use std::collections::BTreeMap;

use serde_json::Value;

use super::Middleware;
use crate::event::LogEvent;

/// Shallow-merges a fixed key/value map into every event; later keys
/// (i.e. the event's own pre-existing fields) are overwritten.
pub struct AddFieldsMiddleware {
    fields: BTreeMap<String, Value>,
}

impl AddFieldsMiddleware {
    #[must_use]
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        AddFieldsMiddleware { fields }
    }
}

impl Middleware for AddFieldsMiddleware {
    fn apply(&self, mut event: LogEvent) -> LogEvent {
        event.merge_context(&self.fields);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use serde_json::json;

    #[test]
    fn overwrites_existing_keys() {
        let mut event = LogEvent::new("svc", Severity::Info, "hi");
        event.context.insert("env".to_string(), json!("dev"));
        let mw = AddFieldsMiddleware::new([("env".to_string(), json!("prod"))].into_iter().collect());
        let event = mw.apply(event);
        assert_eq!(event.context["env"], json!("prod"));
    }
}
