//! Response emitters.
//!
//! Every emitter validates first and only then mutates, finishing the
//! context in the same critical section. Failures are logged through the
//! context logger and leave the response untouched.

use http::header::{self, HeaderName};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use super::context::{RequestContext, ResponseState};
use super::response::Body;
use super::{Error, Result};
use crate::headers::{content_types, mime, CacheControl, Download};
use crate::status;
use crate::transport::FileStream;

/// Response header names set by the emitters.
mod header_names {
    use super::*;

    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
    pub static CACHE_CONTROL: HeaderName = header::CACHE_CONTROL;
    pub static CONTENT_DISPOSITION: HeaderName = header::CONTENT_DISPOSITION;
    pub static LOCATION: HeaderName = header::LOCATION;
}

const DOCTYPE: &str = "<!DOCTYPE html>";

/// Options for `json()`, `text()` and `html()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseOptions {
    /// Status to respond with; the current status is kept when unset.
    pub status: Option<u16>,
    /// Overwrites any existing `Cache-Control`.
    pub cache_control: Option<CacheControl>,
}

impl ResponseOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, code: u16) -> Self {
        self.status = Some(code);
        self
    }

    pub fn cache_control(mut self, cache: CacheControl) -> Self {
        self.cache_control = Some(cache);
        self
    }

    fn meta(&self) -> Value {
        json!({
            "status": self.status,
            "cacheControl": self.cache_control.as_ref().map(CacheControl::to_header_value),
        })
    }
}

/// Options for `redirect()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectOptions {
    /// One of the allowed redirect codes; 303 by default.
    pub status: u16,
    /// Carry the inbound query string over to the target.
    pub keep_query: bool,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            status: status::DEFAULT_REDIRECT,
            keep_query: true,
        }
    }
}

impl RedirectOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    pub fn keep_query(mut self, keep: bool) -> Self {
        self.keep_query = keep;
        self
    }
}

/// Options for `file()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileOptions {
    pub cache_control: Option<CacheControl>,
    /// Offer the file as a download.
    pub download: Option<Download>,
}

impl FileOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_control(mut self, cache: CacheControl) -> Self {
        self.cache_control = Some(cache);
        self
    }

    pub fn download(mut self, download: impl Into<Download>) -> Self {
        self.download = Some(download.into());
        self
    }

    /// Plain `attachment` when `enabled`, no `Content-Disposition` otherwise.
    pub fn attachment(mut self, enabled: bool) -> Self {
        self.download = enabled.then_some(Download::Attachment);
        self
    }

    fn meta(&self) -> Value {
        json!({
            "cacheControl": self.cache_control.as_ref().map(CacheControl::to_header_value),
            "download": self.download.as_ref().map(Download::to_header_value),
        })
    }
}

/// Payload for `html()`: ready markup or a tree for the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum HtmlBody {
    Markup(String),
    Tree(Value),
}

impl From<&str> for HtmlBody {
    fn from(markup: &str) -> Self {
        HtmlBody::Markup(markup.to_string())
    }
}

impl From<String> for HtmlBody {
    fn from(markup: String) -> Self {
        HtmlBody::Markup(markup)
    }
}

impl From<Value> for HtmlBody {
    fn from(tree: Value) -> Self {
        HtmlBody::Tree(tree)
    }
}

fn header_value(value: impl AsRef<str>) -> Result<HeaderValue> {
    HeaderValue::try_from(value.as_ref()).map_err(|e| Error::Http(e.into()))
}

fn cache_header(cache: Option<&CacheControl>) -> Result<Option<HeaderValue>> {
    cache.map(|c| header_value(c.to_header_value())).transpose()
}

impl RequestContext {
    /// Respond with a JSON object or array. Keys are serialized sorted.
    pub fn json<T>(&mut self, body: &T, opts: ResponseOptions)
    where
        T: Serialize + ?Sized,
    {
        let result = self.try_json(body, &opts);
        self.report(result, || json!({ "opts": opts.meta() }));
    }

    /// Respond with plain text.
    pub fn text(&mut self, body: impl Into<String>, opts: ResponseOptions) {
        let result = self.try_write(&content_types::TEXT_PLAIN, &opts, Body::Text(body.into()));
        self.report(result, || json!({ "opts": opts.meta() }));
    }

    /// Respond with HTML markup, or a tree rendered by the configured renderer.
    ///
    /// Markup starting with `<html` gets a doctype prefix.
    pub fn html(&mut self, body: impl Into<HtmlBody>, opts: ResponseOptions) {
        let result = self.try_html(body.into(), &opts);
        self.report(result, || json!({ "opts": opts.meta() }));
    }

    /// Respond with a bare status: the body is cleared and the context ends.
    pub fn status(&mut self, code: u16) {
        let result = status::lookup(code).and_then(|status| {
            self.finish_with(Some(status), |state| state.body = Body::Empty)
        });
        self.report(result, || json!({ "status": code }));
    }

    /// Redirect to `to`.
    ///
    /// Absolute (`scheme://`) and protocol-relative (`//`) targets are used
    /// verbatim. Paths stay on the current host and carry the inbound query
    /// when `keep_query` is set. Bare relative targets are resolved against
    /// the request or configured host over https.
    pub fn redirect(&mut self, to: &str, opts: RedirectOptions) {
        let result = self.try_redirect(to, &opts);
        self.report(result, || {
            json!({ "to": to, "status": opts.status, "keepQuery": opts.keep_query })
        });
    }

    /// Stream a file through the transport.
    ///
    /// A missing file yields 404. Retrieval errors are logged and leave the
    /// response untouched.
    pub async fn file(&mut self, path: &str, opts: FileOptions) {
        let result = self.try_file(path, &opts).await;
        self.report(result, || json!({ "file": path, "opts": opts.meta() }));
    }

    fn report<F>(&self, result: Result<()>, meta: F)
    where
        F: FnOnce() -> Value,
    {
        if let Err(e) = result {
            self.logger().error(&e, Some(meta()));
        }
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            return Err(Error::Locked);
        }
        Ok(())
    }

    /// Apply `mutate`, optionally set `status` and end, atomically.
    fn finish_with<F>(&mut self, status: Option<StatusCode>, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut ResponseState),
    {
        let changed = {
            let mut state = self.shared.state.lock();
            if state.is_locked() {
                return Err(Error::Locked);
            }
            mutate(&mut state);
            let changed = status.filter(|s| state.apply_status(*s));
            state.finish();
            changed
        };
        if let Some(status) = changed {
            self.shared.report_status(status);
        }
        self.cancel_timer();
        Ok(())
    }

    fn try_write(
        &mut self,
        content_type: &HeaderValue,
        opts: &ResponseOptions,
        body: Body,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        let status = opts.status.map(status::lookup).transpose()?;
        let cache = cache_header(opts.cache_control.as_ref())?;

        self.finish_with(status, |state| {
            if !state.headers.contains_key(&header_names::CONTENT_TYPE) {
                state
                    .headers
                    .insert(header_names::CONTENT_TYPE.clone(), content_type.clone());
            }
            if let Some(cache) = cache {
                state
                    .headers
                    .insert(header_names::CACHE_CONTROL.clone(), cache);
            }
            state.body = body;
        })
    }

    fn try_json<T>(&mut self, body: &T, opts: &ResponseOptions) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_unlocked()?;
        let value = serde_json::to_value(body).map_err(|_| Error::InvalidPayload)?;
        if !(value.is_object() || value.is_array()) {
            return Err(Error::InvalidPayload);
        }
        let text = serde_json::to_string(&value).map_err(|_| Error::InvalidPayload)?;
        self.try_write(&content_types::APPLICATION_JSON, opts, Body::Text(text))
    }

    fn try_html(&mut self, body: HtmlBody, opts: &ResponseOptions) -> Result<()> {
        self.ensure_unlocked()?;
        let markup = match body {
            HtmlBody::Markup(markup) => markup,
            HtmlBody::Tree(tree) => self.render(&tree).ok_or(Error::InvalidPayload)?,
        };
        let markup = if markup.starts_with("<html") {
            format!("{}{}", DOCTYPE, markup)
        } else {
            markup
        };
        self.try_write(&content_types::TEXT_HTML, opts, Body::Text(markup))
    }

    fn try_redirect(&mut self, to: &str, opts: &RedirectOptions) -> Result<()> {
        self.ensure_unlocked()?;
        if !status::is_redirect(opts.status) {
            return Err(Error::InvalidStatusCode(opts.status));
        }
        let status = status::lookup(opts.status)?;
        let location = header_value(self.resolve_location(to, opts.keep_query)?)?;

        self.finish_with(Some(status), |state| {
            state
                .headers
                .insert(header_names::LOCATION.clone(), location);
            state.body = Body::Empty;
        })
    }

    fn resolve_location(&self, to: &str, keep_query: bool) -> Result<String> {
        if to.starts_with("//") || to.contains("://") {
            return Ok(to.to_string());
        }

        if to.starts_with('/') {
            let mut target = to.to_string();
            if keep_query {
                if let Some(query) = self.query_string() {
                    target.push(if target.contains('?') { '&' } else { '?' });
                    target.push_str(query);
                }
            }
            return Ok(target);
        }

        let host = self.host().ok_or(Error::UnknownHost)?;
        let host = host.trim_end_matches('/');
        let base = match host.strip_prefix("http://") {
            Some(rest) => format!("https://{}", rest),
            None if host.starts_with("https://") => host.to_string(),
            None => format!("https://{}", host),
        };
        Ok(format!("{}/{}", base, to))
    }

    async fn try_file(&mut self, path: &str, opts: &FileOptions) -> Result<()> {
        self.ensure_unlocked()?;

        let transport = self.transport.clone();
        let Some(FileStream { stream, size }) = transport.get_stream(path).await? else {
            self.status(404);
            return Ok(());
        };

        let cache = cache_header(opts.cache_control.as_ref())?;
        let content_type = mime::from_path(path).map(header_value).transpose()?;
        let disposition = opts
            .download
            .as_ref()
            .map(|d| header_value(d.to_header_value()))
            .transpose()?;

        self.finish_with(None, |state| {
            if let Some(cache) = cache {
                state
                    .headers
                    .insert(header_names::CACHE_CONTROL.clone(), cache);
            }
            if let Some(content_type) = content_type {
                if !state.headers.contains_key(&header_names::CONTENT_TYPE) {
                    state
                        .headers
                        .insert(header_names::CONTENT_TYPE.clone(), content_type);
                }
            }
            if let Some(disposition) = disposition {
                state
                    .headers
                    .insert(header_names::CONTENT_DISPOSITION.clone(), disposition);
            }
            state.body = Body::Streamed { size };
        })?;

        transport.stream(stream, size);
        Ok(())
    }
}
