//! Per-request context.
//!
//! One [`RequestContext`] exists per in-flight request. It carries the
//! request identity, a state bag, the response being assembled and the
//! lifecycle flags. Once the context is done or aborted it is locked and
//! the response no longer changes.
//!
//! Response state sits behind a mutex shared with the context's own timeout
//! task, which only holds a weak reference.

use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::parser::{parse_query_string, ParamList};
use super::request::Request;
use super::response::{Body, Response};
use super::route::RouteKind;
use super::{Error, Result};
use crate::cache::CacheClient;
use crate::config::ContextConfig;
use crate::cookies::CookieJar;
use crate::fetch::FetchInit;
use crate::headers::mime;
use crate::observability::{attributes, Logger, RootLogger, SpawnOptions};
use crate::request_id;
use crate::status;
use crate::transport::Transport;

/// Turns a structured render tree into markup for `html()`.
pub trait Renderer: Send + Sync {
    fn render(&self, ctx: &RequestContext, tree: &Value) -> String;
}

/// Deferred work run by the dispatcher after the response is finalized.
pub type AfterHook = Box<dyn FnOnce() + Send + Sync>;

/// Mutable response half of the context.
#[derive(Debug, Default)]
pub(super) struct ResponseState {
    pub(super) status: StatusCode,
    pub(super) headers: HeaderMap,
    pub(super) body: Body,
    pub(super) done: bool,
    pub(super) aborted: bool,
    /// Armed timeout in milliseconds.
    pub(super) timeout: Option<u64>,
}

impl ResponseState {
    #[inline]
    pub(super) fn is_locked(&self) -> bool {
        self.done || self.aborted
    }

    /// Set the status; true if it changed.
    #[inline]
    pub(super) fn apply_status(&mut self, status: StatusCode) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    /// Mark done and disarm the timeout.
    #[inline]
    pub(super) fn finish(&mut self) {
        self.done = true;
        self.timeout = None;
    }
}

/// State reachable from the timeout task.
pub(super) struct Shared {
    pub(super) logger: Arc<dyn Logger>,
    pub(super) state: Mutex<ResponseState>,
}

impl Shared {
    /// Report a status change to telemetry.
    pub(super) fn report_status(&self, status: StatusCode) {
        let code = status.as_u16();
        self.logger.set_attributes(attributes([
            ("http.status_code", json!(code)),
            ("otel.status_code", json!(status::otel_status(code))),
        ]));
    }

    /// Active -> Done. False if already locked.
    pub(super) fn end(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_locked() {
            return false;
        }
        state.finish();
        true
    }

    /// Active -> Aborted. Unknown codes fall back to 500.
    pub(super) fn abort(&self, code: u16) -> bool {
        let status = status::lookup(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let changed = {
            let mut state = self.state.lock();
            if state.is_locked() {
                return false;
            }
            state.aborted = true;
            state.finish();
            state.apply_status(status)
        };
        if changed {
            self.report_status(status);
        }
        true
    }

    /// Timer expiry: abort with 408 unless already locked.
    pub(super) fn fire_timeout(&self, ms: u64) {
        if self.abort(408) {
            self.logger.error(
                &Error::TimedOut { duration_ms: ms },
                Some(json!({ "duration": ms })),
            );
        }
    }
}

/// Per-request state machine.
pub struct RequestContext {
    pub(super) config: Arc<ContextConfig>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) request: Request,
    pub(super) request_id: String,
    pub(super) query: ParamList,
    pub(super) name: String,
    pub(super) kind: RouteKind,
    pub(super) initialized: bool,
    pub(super) state: Map<String, Value>,
    pub(super) body: Value,
    pub(super) shared: Arc<Shared>,
    pub(super) timer: Option<JoinHandle<()>>,
    pub(super) after: Vec<AfterHook>,
    ip: OnceLock<Option<IpAddr>>,
    nonce: OnceLock<String>,
    cache: OnceLock<Option<Arc<dyn CacheClient>>>,
    cookies: Option<CookieJar>,
}

impl RequestContext {
    /// Create a context for one inbound request.
    ///
    /// The request id is resolved from the configured inbound headers and
    /// becomes the trace id of the logger spawned from `root`.
    pub fn new(
        config: Arc<ContextConfig>,
        root: &dyn RootLogger,
        transport: Arc<dyn Transport>,
        request: Request,
    ) -> Self {
        let request_id = request_id::resolve(
            request.headers(),
            &config.request_id.inbound,
            config.request_id.validate.as_ref(),
        );
        let logger = root.spawn(SpawnOptions {
            trace_id: request_id.clone(),
            env: config.env.clone(),
        });
        let query = request.query().map(parse_query_string).unwrap_or_default();

        Self {
            config,
            transport,
            request,
            request_id,
            query,
            name: "unknown".to_string(),
            kind: RouteKind::Std,
            initialized: false,
            state: Map::new(),
            body: Value::Object(Map::new()),
            shared: Arc::new(Shared {
                logger,
                state: Mutex::new(ResponseState::default()),
            }),
            timer: None,
            after: Vec::new(),
            ip: OnceLock::new(),
            nonce: OnceLock::new(),
            cache: OnceLock::new(),
            cookies: None,
        }
    }

    // Identity

    #[inline]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Decoded query pairs, in order.
    #[inline]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw query string, without `?`.
    #[inline]
    pub fn query_string(&self) -> Option<&str> {
        self.request.query().filter(|q| !q.is_empty())
    }

    #[inline]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Route name, `"unknown"` until `init`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Inbound request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    #[inline]
    pub fn env(&self) -> &Map<String, Value> {
        &self.config.env
    }

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Request host, else the configured host.
    pub fn host(&self) -> Option<&str> {
        self.request.host().or(self.config.host.as_deref())
    }

    #[inline]
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.shared.logger
    }

    /// Parsed request body, an empty object unless `init` parsed one.
    #[inline]
    pub fn body(&self) -> &Value {
        &self.body
    }

    // State bag

    #[inline]
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Shallow-merge entries into the state bag.
    pub fn set_state<I, K>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.state
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Remove keys from the state bag.
    pub fn del_state<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            self.state.remove(key.as_ref());
        }
        self
    }

    // Response inspection

    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.shared.state.lock().status
    }

    /// Snapshot of the response headers.
    pub fn response_headers(&self) -> HeaderMap {
        self.shared.state.lock().headers.clone()
    }

    /// Value of one response header.
    pub fn response_header(&self, name: &str) -> Option<String> {
        self.shared
            .state
            .lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Snapshot of the response body.
    pub fn response_body(&self) -> Body {
        self.shared.state.lock().body.clone()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().done
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.shared.state.lock().aborted
    }

    /// Done or aborted; the response can no longer change.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.shared.state.lock().is_locked()
    }

    // Headers and body

    /// Set a response header. Ignored once locked; invalid input is logged.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let Err(e) = self.try_set_header(name, value) {
            self.logger()
                .error(&e, Some(json!({ "key": name, "value": value })));
        }
        self
    }

    /// Set several response headers.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self.set_header(name.as_ref(), value.as_ref());
        }
        self
    }

    fn try_set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::try_from(name).map_err(http::Error::from)?;
        let value = HeaderValue::try_from(value).map_err(http::Error::from)?;
        let mut state = self.shared.state.lock();
        if !state.is_locked() {
            state.headers.insert(name, value);
        }
        Ok(())
    }

    /// Remove a response header. Ignored once locked.
    pub fn del_header(&mut self, name: &str) -> &mut Self {
        let mut state = self.shared.state.lock();
        if !state.is_locked() {
            state.headers.remove(name);
        }
        drop(state);
        self
    }

    /// Set `Content-Type` for MIME types in the extension table.
    pub fn set_type(&mut self, mime_type: &str) -> &mut Self {
        if mime::is_known(mime_type) {
            self.set_header(http::header::CONTENT_TYPE.as_str(), mime_type);
        }
        self
    }

    /// Replace the response body. Ignored once locked.
    pub fn set_body(&mut self, body: Option<String>) -> &mut Self {
        let mut state = self.shared.state.lock();
        if !state.is_locked() {
            state.body = body.map(Body::Text).unwrap_or_default();
        }
        drop(state);
        self
    }

    // Lazy resources

    /// Client address, resolved once.
    ///
    /// With `trust_proxy`, forwarding headers are consulted in ranked
    /// order first; the transport peer address is the fallback.
    pub fn ip(&self) -> Option<IpAddr> {
        *self.ip.get_or_init(|| {
            let forwarded = if self.config.trust_proxy {
                self.config.ip_headers.resolve(self.request.headers())
            } else {
                None
            };
            forwarded.or_else(|| self.transport.ip())
        })
    }

    /// Per-request nonce: `state.nonce` when set, else base64 of the request id.
    pub fn nonce(&self) -> &str {
        self.nonce.get_or_init(|| match self.state.get("nonce") {
            Some(Value::String(nonce)) if !nonce.is_empty() => nonce.clone(),
            _ => BASE64.encode(self.request_id.as_bytes()),
        })
    }

    /// Cache client, spawned once from the configured factory.
    pub fn cache(&self) -> Option<Arc<dyn CacheClient>> {
        self.cache
            .get_or_init(|| self.config.cache.as_ref().map(|factory| factory.spawn(self)))
            .clone()
    }

    /// Cookie jar, built once from the `Cookie` header.
    pub fn cookies(&mut self) -> &mut CookieJar {
        let request = &self.request;
        let defaults = &self.config.cookies;
        let logger = &self.shared.logger;
        self.cookies
            .get_or_insert_with(|| CookieJar::new(request.cookie(), defaults.clone(), logger.clone()))
    }

    // Collaborators

    /// Render a tree with the configured renderer.
    pub fn render(&self, tree: &Value) -> Option<String> {
        self.config
            .renderer
            .as_ref()
            .map(|renderer| renderer.render(self, tree))
    }

    /// Outbound HTTP call, traced under `fetch <METHOD> <url>`.
    ///
    /// The request id travels in the configured outbound header. Errors are
    /// logged and returned.
    pub async fn fetch(&self, url: &str, init: FetchInit) -> Result<http::Response<Bytes>> {
        let logger = self.logger().clone();
        let Some(fetcher) = self.config.fetcher.clone() else {
            let err = Error::Fetch("no fetcher configured".to_string());
            logger.error(&err, Some(json!({ "url": url })));
            return Err(err);
        };

        let method = init.method.clone();
        let span = logger.span(&format!("fetch {} {}", method, url));

        async move {
            logger.set_attributes(attributes([
                ("http.method", json!(method.as_str())),
                ("http.url", json!(url)),
            ]));

            let outcome = match self.outbound_request(url, init) {
                Ok(request) => fetcher.fetch(request).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) => {
                    let code = response.status().as_u16();
                    logger.set_attributes(attributes([
                        ("http.status_code", json!(code)),
                        ("span.kind", json!("client")),
                        ("otel.status_code", json!(status::otel_status(code))),
                    ]));
                    Ok(response)
                }
                Err(e) => {
                    logger.error(&e, Some(json!({ "url": url, "method": method.as_str() })));
                    logger.set_attributes(attributes([("otel.status_code", json!("ERROR"))]));
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn outbound_request(&self, url: &str, init: FetchInit) -> Result<http::Request<Bytes>> {
        let mut request = http::Request::builder()
            .method(init.method)
            .uri(url)
            .body(init.body)?;
        *request.headers_mut() = init.headers;

        if let Some(header) = &self.config.request_id.outbound {
            let value = request_id::outbound_value(header, self.logger().trace_id());
            let name = HeaderName::try_from(header.as_str()).map_err(http::Error::from)?;
            let value = HeaderValue::try_from(value).map_err(http::Error::from)?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }

    /// Consume the context into the finalized response.
    ///
    /// Pending cookie directives become `Set-Cookie` headers.
    pub fn into_response(mut self) -> Response {
        let (status, headers, body) = {
            let mut state = self.shared.state.lock();
            (
                state.status,
                std::mem::take(&mut state.headers),
                std::mem::take(&mut state.body),
            )
        };

        let mut response = Response::new(status, headers, body);
        if let Some(jar) = self.cookies.take() {
            for directive in jar.into_outgoing() {
                if !response.append_cookie(&directive) {
                    self.logger().error(
                        &Error::InvalidPayload,
                        Some(json!({ "set-cookie": directive })),
                    );
                }
            }
        }
        response
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("response", &*self.shared.state.lock())
            .finish_non_exhaustive()
    }
}
