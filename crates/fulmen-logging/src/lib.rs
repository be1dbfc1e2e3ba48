//! Progressive logging engine (C5): profiles, middleware pipeline, sinks,
//! child loggers, and YAML policy enforcement.

pub mod event;
pub mod logger;
pub mod middleware;
pub mod policy;
pub mod sinks;

pub use event::{ErrorDetail, LogEvent, Severity};
pub use logger::{Builder, Logger, Profile};
pub use middleware::{AddFieldsMiddleware, Middleware, Pipeline, RedactionMiddleware, TransformMiddleware};
pub use policy::{EnvironmentRule, PolicyDocument, PolicyError, RequiredProfileRule};
pub use sinks::{ConsoleSink, ExternalSink, FileSink, NullSink, RollingFileSink, RollingPolicy, Sink};
