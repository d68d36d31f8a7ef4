//! Lifecycle transitions: init, status, timeout, end, abort, after-hooks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::runtime::Handle;

use super::context::{AfterHook, RequestContext};
use super::route::RouteMeta;
use super::{Error, Result};
use crate::body::BodyParser;
use crate::status;

impl RequestContext {
    /// Bind the matched route and parse the body. Runs at most once.
    ///
    /// Route params merge into the state bag. The route timeout, else the
    /// configured one, is armed. Bodies are only parsed for POST, PUT,
    /// PATCH and DELETE: a parser answering `None` sets 413, a parser
    /// error is logged and sets 400. The context stays open either way.
    pub async fn init(&mut self, route: RouteMeta, parser: Option<&dyn BodyParser>) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        self.name = route.name;
        self.kind = route.kind;
        self.state.extend(
            route
                .params
                .into_iter()
                .map(|(k, v)| (k, Value::String(v))),
        );

        if let Some(ms) = route.timeout.or(self.config.timeout) {
            self.set_timeout(Some(ms));
        }

        if !self.request.has_body_method() {
            return;
        }
        let Some(parser) = parser else {
            return;
        };

        match parser.parse(self).await {
            Ok(Some(body)) => self.body = body,
            // Locked only if the timeout fired while parsing.
            Ok(None) => {
                let _ = self.set_status(413);
            }
            Err(e) => {
                self.logger().error(
                    &e,
                    Some(json!({
                        "method": self.request.method().as_str(),
                        "path": self.request.path(),
                    })),
                );
                let _ = self.set_status(400);
            }
        }
    }

    /// Set the response status.
    ///
    /// Fails on codes outside the registry and on a locked context.
    /// Telemetry is only updated when the status actually changes.
    pub fn set_status(&mut self, code: u16) -> Result<()> {
        let status = status::lookup(code)?;
        let changed = {
            let mut state = self.shared.state.lock();
            if state.is_locked() {
                return Err(Error::Locked);
            }
            state.apply_status(status)
        };
        if changed {
            self.shared.report_status(status);
        }
        Ok(())
    }

    /// Armed timeout in milliseconds.
    #[inline]
    pub fn timeout(&self) -> Option<u64> {
        self.shared.state.lock().timeout
    }

    /// Arm (or with `None`, clear) the request timeout.
    ///
    /// A new value replaces the running timer. When it fires on an unlocked
    /// context the context aborts with 408. Needs a tokio runtime.
    pub fn set_timeout(&mut self, ms: Option<u64>) {
        let Some(ms) = ms else {
            self.clear_timeout();
            return;
        };
        if ms == 0 {
            self.logger()
                .error(&Error::InvalidTimeout(ms), Some(json!({ "val": ms })));
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                self.logger().error(&e, Some(json!({ "val": ms })));
                return;
            }
        };

        self.cancel_timer();
        self.shared.state.lock().timeout = Some(ms);

        let shared = Arc::downgrade(&self.shared);
        self.timer = Some(handle.spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if let Some(shared) = shared.upgrade() {
                shared.fire_timeout(ms);
            }
        }));
    }

    /// Cancel the running timer, if any.
    pub fn clear_timeout(&mut self) {
        self.cancel_timer();
        self.shared.state.lock().timeout = None;
    }

    pub(super) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Register work to run after the response is finalized.
    pub fn add_after<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.after.push(Box::new(hook));
        self
    }

    /// Number of registered after-hooks.
    #[inline]
    pub fn after_hooks(&self) -> usize {
        self.after.len()
    }

    /// Drain after-hooks in registration order.
    pub fn take_after_hooks(&mut self) -> Vec<AfterHook> {
        std::mem::take(&mut self.after)
    }

    /// Mark the response complete. No-op once locked.
    pub fn end(&mut self) {
        if self.shared.end() {
            self.cancel_timer();
        }
    }

    /// Abort with `code`; unknown codes become 500. No-op once locked.
    pub fn abort(&mut self, code: u16) {
        if self.shared.abort(code) {
            self.cancel_timer();
        }
    }

    /// Abort with 500.
    #[inline]
    pub fn abort_default(&mut self) {
        self.abort(500);
    }
}
