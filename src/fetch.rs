//! Outbound HTTP capability.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response};

use crate::core::Result;

/// Performs outbound HTTP requests for [`RequestContext::fetch`].
///
/// [`RequestContext::fetch`]: crate::core::RequestContext::fetch
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: Request<Bytes>) -> Result<Response<Bytes>>;
}

/// Options for an outbound fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchInit {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}
