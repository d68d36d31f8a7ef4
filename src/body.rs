//! Request body parsing.
//!
//! A [`BodyParser`] is handed to [`RequestContext::init`]. It returns
//! `Ok(None)` when the body is too large (the context answers 413) and
//! `Err` when the body cannot be parsed (the context answers 400).

use async_trait::async_trait;
use http::header;
use serde_json::{Map, Value};

use crate::core::parser::parse_query_string;
use crate::core::{Error, RequestContext, Result};

/// Default body size limit (4 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Parses the raw request body into a JSON value.
#[async_trait]
pub trait BodyParser: Send + Sync {
    async fn parse(&self, ctx: &RequestContext) -> Result<Option<Value>>;
}

/// Content-type driven parser for JSON, urlencoded forms and text.
///
/// Other content types parse to an empty object.
#[derive(Clone, Debug)]
pub struct DefaultBodyParser {
    limit: usize,
}

impl DefaultBodyParser {
    #[inline]
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for DefaultBodyParser {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

/// Content type essence, lowercased, without parameters.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Urlencoded form into an object; repeated keys collect into an array.
fn form_to_value(body: &str) -> Value {
    let mut map = Map::new();
    for (key, value) in parse_query_string(body) {
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    Value::Object(map)
}

#[async_trait]
impl BodyParser for DefaultBodyParser {
    async fn parse(&self, ctx: &RequestContext) -> Result<Option<Value>> {
        let body = ctx.request().body();
        if body.len() > self.limit {
            return Ok(None);
        }
        if body.is_empty() {
            return Ok(Some(Value::Object(Map::new())));
        }

        let content_type = ctx
            .request()
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(essence)
            .unwrap_or_default();

        let value = match content_type.as_str() {
            ct if ct == "application/json" || ct.ends_with("+json") => {
                serde_json::from_slice(body)?
            }
            "application/x-www-form-urlencoded" => {
                let text = std::str::from_utf8(body)
                    .map_err(|e| Error::BodyParse(e.to_string()))?;
                form_to_value(text)
            }
            ct if ct.starts_with("text/") => {
                let text = std::str::from_utf8(body)
                    .map_err(|e| Error::BodyParse(e.to_string()))?;
                Value::String(text.to_string())
            }
            _ => Value::Object(Map::new()),
        };

        Ok(Some(value))
    }
}
