//! In-memory loggers that record every call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{Attributes, Logger, RootLogger, SpawnOptions};

/// Severity of a recorded entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warn,
    Error,
}

/// A recorded log call.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub meta: Option<Value>,
}

/// Logger that keeps everything it receives.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    trace_id: String,
    records: Mutex<Vec<LogRecord>>,
    attributes: Mutex<Vec<Attributes>>,
    spans: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Self::default()
        }
    }

    /// All recorded log calls, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Recorded calls of one level.
    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Messages of recorded errors.
    pub fn errors(&self) -> Vec<String> {
        self.records_at(LogLevel::Error)
            .into_iter()
            .map(|r| r.message)
            .collect()
    }

    /// Messages of recorded warnings.
    pub fn warnings(&self) -> Vec<String> {
        self.records_at(LogLevel::Warn)
            .into_iter()
            .map(|r| r.message)
            .collect()
    }

    /// Every `set_attributes` call, in order.
    pub fn attribute_calls(&self) -> Vec<Attributes> {
        self.attributes.lock().clone()
    }

    /// Labels of every span opened.
    pub fn spans(&self) -> Vec<String> {
        self.spans.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.records.lock().clear();
        self.attributes.lock().clear();
        self.spans.lock().clear();
    }

    fn record(&self, level: LogLevel, message: String, meta: Option<Value>) {
        self.records.lock().push(LogRecord {
            level,
            message,
            meta,
        });
    }
}

impl Logger for MemoryLogger {
    fn trace_id(&self) -> &str {
        &self.trace_id
    }

    fn set_attributes(&self, attrs: Attributes) {
        self.attributes.lock().push(attrs);
    }

    fn span(&self, label: &str) -> tracing::Span {
        self.spans.lock().push(label.to_string());
        tracing::Span::none()
    }

    fn error(&self, err: &dyn std::error::Error, meta: Option<Value>) {
        self.record(LogLevel::Error, err.to_string(), meta);
    }

    fn warn(&self, msg: &str, meta: Option<Value>) {
        self.record(LogLevel::Warn, msg.to_string(), meta);
    }

    fn debug(&self, msg: &str, meta: Option<Value>) {
        self.record(LogLevel::Debug, msg.to_string(), meta);
    }
}

/// Root logger handing out [`MemoryLogger`]s and keeping a handle to each.
#[derive(Debug, Default)]
pub struct MemoryRootLogger {
    spawned: Mutex<Vec<(SpawnOptions, Arc<MemoryLogger>)>>,
}

impl MemoryRootLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently spawned logger.
    pub fn last(&self) -> Option<Arc<MemoryLogger>> {
        self.spawned.lock().last().map(|(_, logger)| logger.clone())
    }

    /// Options of the most recent spawn.
    pub fn last_options(&self) -> Option<SpawnOptions> {
        self.spawned.lock().last().map(|(opts, _)| opts.clone())
    }

    /// Number of loggers spawned.
    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().len()
    }
}

impl RootLogger for MemoryRootLogger {
    fn spawn(&self, opts: SpawnOptions) -> Arc<dyn Logger> {
        let logger = Arc::new(MemoryLogger::new(opts.trace_id.clone()));
        self.spawned.lock().push((opts, logger.clone()));
        logger
    }
}
