//! Logger collaborators used by the request context.
//!
//! A [`RootLogger`] is spawned once per request into a [`Logger`] that
//! carries the request's trace id. The context reports telemetry attributes,
//! opens spans around outbound work and logs validation failures through it.
//!
//! - [`TracingRootLogger`] - emits through `tracing` (production)
//! - [`MemoryRootLogger`] - records every call (tests, debugging)

mod logger;
mod memory;

pub use logger::{TracingLogger, TracingRootLogger};
pub use memory::{LogLevel, LogRecord, MemoryLogger, MemoryRootLogger};

use std::sync::Arc;

use serde_json::{Map, Value};

/// Telemetry attributes (`http.status_code`, `otel.status_code`, ...).
pub type Attributes = Map<String, Value>;

/// Build an attribute map from key/value pairs.
pub fn attributes<I, K>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Options handed to [`RootLogger::spawn`].
#[derive(Clone, Debug, Default)]
pub struct SpawnOptions {
    /// Trace id for the spawned logger (the request id).
    pub trace_id: String,
    /// Environment exposed to exporters.
    pub env: Map<String, Value>,
}

/// Spawns per-request loggers.
pub trait RootLogger: Send + Sync {
    fn spawn(&self, opts: SpawnOptions) -> Arc<dyn Logger>;
}

/// Per-request logger.
pub trait Logger: Send + Sync {
    /// Trace id this logger reports under.
    fn trace_id(&self) -> &str;

    /// Merge attributes into the current span/request.
    fn set_attributes(&self, attrs: Attributes);

    /// Create a span; callers instrument futures with it.
    fn span(&self, label: &str) -> tracing::Span;

    fn error(&self, err: &dyn std::error::Error, meta: Option<Value>);

    fn warn(&self, msg: &str, meta: Option<Value>);

    fn debug(&self, msg: &str, meta: Option<Value>);
}
