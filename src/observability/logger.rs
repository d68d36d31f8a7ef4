//! `tracing` backed loggers.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{Attributes, Logger, RootLogger, SpawnOptions};

/// Root logger emitting through the global `tracing` subscriber.
#[derive(Clone, Debug)]
pub struct TracingRootLogger {
    service: Arc<str>,
}

impl TracingRootLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: Arc::from(service.into()),
        }
    }
}

impl Default for TracingRootLogger {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

impl RootLogger for TracingRootLogger {
    fn spawn(&self, opts: SpawnOptions) -> Arc<dyn Logger> {
        Arc::new(TracingLogger::new(self.service.clone(), opts.trace_id))
    }
}

/// Per-request logger. Attributes are accumulated and emitted as debug events.
#[derive(Debug)]
pub struct TracingLogger {
    service: Arc<str>,
    trace_id: String,
    attributes: Mutex<Attributes>,
}

impl TracingLogger {
    pub fn new(service: Arc<str>, trace_id: String) -> Self {
        Self {
            service,
            trace_id,
            attributes: Mutex::new(Attributes::new()),
        }
    }

    /// Snapshot of every attribute set so far.
    pub fn attributes(&self) -> Attributes {
        self.attributes.lock().clone()
    }
}

/// Render optional metadata as a log field.
#[inline]
fn meta_field(meta: &Option<Value>) -> String {
    meta.as_ref().map(Value::to_string).unwrap_or_default()
}

impl Logger for TracingLogger {
    fn trace_id(&self) -> &str {
        &self.trace_id
    }

    fn set_attributes(&self, attrs: Attributes) {
        let rendered = Value::Object(attrs.clone()).to_string();
        self.attributes.lock().extend(attrs);
        debug!(
            target: "exchange_ctx::context",
            service = %self.service,
            trace_id = %self.trace_id,
            attributes = %rendered,
            "attributes updated"
        );
    }

    fn span(&self, label: &str) -> tracing::Span {
        tracing::info_span!(
            target: "exchange_ctx::context",
            "span",
            otel.name = %label,
            trace_id = %self.trace_id
        )
    }

    fn error(&self, err: &dyn std::error::Error, meta: Option<Value>) {
        error!(
            target: "exchange_ctx::context",
            service = %self.service,
            trace_id = %self.trace_id,
            meta = %meta_field(&meta),
            "{}",
            err
        );
    }

    fn warn(&self, msg: &str, meta: Option<Value>) {
        warn!(
            target: "exchange_ctx::context",
            service = %self.service,
            trace_id = %self.trace_id,
            meta = %meta_field(&meta),
            "{}",
            msg
        );
    }

    fn debug(&self, msg: &str, meta: Option<Value>) {
        debug!(
            target: "exchange_ctx::context",
            service = %self.service,
            trace_id = %self.trace_id,
            meta = %meta_field(&meta),
            "{}",
            msg
        );
    }
}
