//! Finalized response produced by a context.

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

/// Common header name constants for fast lookup.
mod header_names {
    use super::*;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
    pub static SET_COOKIE: HeaderName = header::SET_COOKIE;
}

/// Response body as assembled by the context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Body {
    /// No body (`status()`, `redirect()`, or nothing emitted).
    #[default]
    Empty,
    /// Serialized body from `json()`, `text()`, `html()` or `set_body()`.
    Text(String),
    /// Bytes were handed to the transport by `file()`.
    Streamed { size: Option<u64> },
}

impl Body {
    /// Text of the body, if any.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

/// HTTP response.
///
/// Note: Clone is intentionally not derived to prevent expensive copies.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Create a new response.
    #[inline]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response body.
    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Content-Type header (fast path).
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(&header_names::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Every `Set-Cookie` value, in order.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(&header_names::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Append one `Set-Cookie` header; invalid values are skipped.
    pub(crate) fn append_cookie(&mut self, directive: &str) -> bool {
        match HeaderValue::try_from(directive) {
            Ok(value) => {
                self.headers.append(header_names::SET_COOKIE.clone(), value);
                true
            }
            Err(_) => false,
        }
    }

    /// Check if this is an error response (4xx or 5xx).
    #[inline]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }
}

/// Streamed bodies were already delivered; they convert to an empty body.
impl From<Response> for http::Response<Bytes> {
    fn from(res: Response) -> Self {
        let body = match res.body {
            Body::Text(text) => Bytes::from(text),
            Body::Empty | Body::Streamed { .. } => Bytes::new(),
        };

        let mut out = http::Response::new(body);
        *out.status_mut() = res.status;
        *out.headers_mut() = res.headers;
        out
    }
}
