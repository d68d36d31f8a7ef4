//! Test helpers and utilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;

use exchange_ctx::body::BodyParser;
use exchange_ctx::cache::{CacheClient, CacheFactory, MemoryCache};
use exchange_ctx::core::Renderer;
use exchange_ctx::fetch::Fetcher;
use exchange_ctx::observability::{MemoryLogger, MemoryRootLogger};
use exchange_ctx::transport::MemoryTransport;
use exchange_ctx::{ContextConfig, Error, Request, RequestContext, Result};

/// Builds contexts over in-memory collaborators.
pub struct Harness {
    pub root: MemoryRootLogger,
    pub config: ContextConfig,
    pub transport: Arc<MemoryTransport>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self {
            root: MemoryRootLogger::new(),
            config: ContextConfig::new(),
            transport: Arc::new(MemoryTransport::new()),
        }
    }

    /// Adjust the configuration.
    pub fn config(mut self, f: impl FnOnce(ContextConfig) -> ContextConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn transport(mut self, transport: MemoryTransport) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Create a context and return it with its spawned logger.
    pub fn context(&self, request: http::Request<Bytes>) -> (RequestContext, Arc<MemoryLogger>) {
        let ctx = RequestContext::new(
            Arc::new(self.config.clone()),
            &self.root,
            self.transport.clone(),
            Request::from(request),
        );
        let logger = self.root.last().expect("logger spawned");
        (ctx, logger)
    }
}

/// Build a request with headers and body.
pub fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Bytes::copy_from_slice(body.as_bytes()))
        .expect("valid request")
}

/// GET request with headers.
pub fn get(uri: &str, headers: &[(&str, &str)]) -> http::Request<Bytes> {
    request("GET", uri, headers, "")
}

/// Fetcher answering with a fixed status, or failing.
pub struct StubFetcher {
    pub status: u16,
    pub fail: bool,
    pub requests: Mutex<Vec<http::Request<Bytes>>>,
}

#[allow(dead_code)]
impl StubFetcher {
    pub fn ok(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            status: 0,
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.requests.lock().push(request);
        if self.fail {
            return Err(Error::Fetch("connection refused".to_string()));
        }
        let mut response = http::Response::new(Bytes::from_static(b"{}"));
        *response.status_mut() = http::StatusCode::from_u16(self.status).expect("valid status");
        Ok(response)
    }
}

/// Renders `{"tag": .., "text": ..}` trees.
pub struct TagRenderer;

impl Renderer for TagRenderer {
    fn render(&self, _ctx: &RequestContext, tree: &Value) -> String {
        let tag = tree["tag"].as_str().unwrap_or("div");
        let text = tree["text"].as_str().unwrap_or("");
        format!("<{tag}>{text}</{tag}>")
    }
}

/// Body parser returning a fixed outcome.
pub enum StubParser {
    TooLarge,
    Broken,
}

#[async_trait]
impl BodyParser for StubParser {
    async fn parse(&self, _ctx: &RequestContext) -> Result<Option<Value>> {
        match self {
            StubParser::TooLarge => Ok(None),
            StubParser::Broken => Err(Error::BodyParse("unexpected end of input".to_string())),
        }
    }
}

/// Cache factory counting how often it was asked for a client.
#[derive(Default)]
pub struct CountingCacheFactory {
    pub store: Arc<MemoryCache>,
    pub spawned: AtomicUsize,
}

impl CacheFactory for CountingCacheFactory {
    fn spawn(&self, _ctx: &RequestContext) -> Arc<dyn CacheClient> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.store.clone()
    }
}
