//! Per-request cookie engine.
//!
//! A [`CookieJar`] is built once from the inbound `Cookie` header. Reads go
//! through a combined view (incoming values overridden by this exchange's
//! `set`/`del` calls). Writes produce serialized `Set-Cookie` directives,
//! at most one per name, kept in first-insertion order.

mod options;

pub use options::{CookieOptions, CookieValue, SameSite};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use percent_encoding::utf8_percent_encode;
use serde_json::json;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::core::parser::{parse_cookies, ParamList};
use crate::core::{Error, Result};
use crate::headers::URI_COMPONENT;
use crate::observability::Logger;

/// Source of "now" for Expires/Max-Age arithmetic.
pub type Clock = fn() -> OffsetDateTime;

const SAMESITE_NONE_WARNING: &str =
    "SameSite=None requires Secure=true; overriding to ensure security";

/// RFC 6265 separators, never valid in a cookie name.
const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";

/// Cookie name must be a non-empty token.
#[inline]
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| (0x21..=0x7e).contains(&b) && !SEPARATORS.contains(&b))
}

/// Cookie value must be printable ASCII before encoding.
#[inline]
fn is_valid_value(value: &str) -> bool {
    value.chars().all(|c| (' '..='~').contains(&c))
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(at: OffsetDateTime) -> Result<String> {
    at.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .map_err(|e| Error::Custom(format!("cannot format cookie date: {}", e)))
}

/// Parsed inbound cookies plus pending `Set-Cookie` directives.
pub struct CookieJar {
    logger: Arc<dyn Logger>,
    defaults: CookieOptions,
    clock: Clock,
    /// Snapshot taken at construction, never modified.
    incoming: ParamList,
    combined: HashMap<String, String>,
    /// (name, directive) in first-insertion order.
    outgoing: Vec<(String, String)>,
}

impl CookieJar {
    /// Create a jar from an optional `Cookie` header value.
    pub fn new(header: Option<&str>, defaults: CookieOptions, logger: Arc<dyn Logger>) -> Self {
        let incoming = header.map(parse_cookies).unwrap_or_default();
        let combined = incoming.iter().cloned().collect();

        Self {
            logger,
            defaults,
            clock: OffsetDateTime::now_utc,
            incoming,
            combined,
            outgoing: Vec::new(),
        }
    }

    /// Replace the clock used for date arithmetic.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Jar-wide default options.
    #[inline]
    pub fn defaults(&self) -> &CookieOptions {
        &self.defaults
    }

    /// Current value of a cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        self.combined.get(name).map(String::as_str)
    }

    /// Owned copy of every visible cookie.
    pub fn all(&self) -> HashMap<String, String> {
        self.combined.clone()
    }

    /// Serialized `Set-Cookie` directives.
    pub fn outgoing(&self) -> Vec<&str> {
        self.outgoing.iter().map(|(_, d)| d.as_str()).collect()
    }

    /// Consume the jar into its directives.
    pub fn into_outgoing(self) -> Vec<String> {
        self.outgoing.into_iter().map(|(_, d)| d).collect()
    }

    /// Set a cookie with the jar defaults.
    pub fn set(&mut self, name: &str, value: impl Into<CookieValue>) {
        self.set_with(name, value, CookieOptions::default());
    }

    /// Set a cookie, `opts` overriding the jar defaults.
    ///
    /// Invalid names or values are logged and ignored.
    pub fn set_with(&mut self, name: &str, value: impl Into<CookieValue>, opts: CookieOptions) {
        let value = value.into();
        if let Err(e) = self.try_set(name, &value, opts) {
            self.logger.error(
                &e,
                Some(json!({ "name": name, "value": value.as_str() })),
            );
        }
    }

    fn try_set(&mut self, name: &str, value: &CookieValue, opts: CookieOptions) -> Result<()> {
        if !is_valid_name(name) {
            return Err(Error::InvalidCookie {
                name: name.to_string(),
                reason: "invalid name",
            });
        }
        let value = match value.as_str() {
            Some(v) if is_valid_value(v) => v,
            _ => {
                return Err(Error::InvalidCookie {
                    name: name.to_string(),
                    reason: "invalid value",
                })
            }
        };

        let opts = opts.merged_over(&self.defaults);
        let directive = self.directive(name, value, &opts)?;
        self.combined.insert(name.to_string(), value.to_string());
        self.upsert(name, directive);
        Ok(())
    }

    /// Delete a cookie with the jar defaults.
    pub fn del(&mut self, name: &str) {
        self.del_with(name, CookieOptions::default());
    }

    /// Delete a cookie.
    ///
    /// Incoming cookies get an expiring directive. Cookies only set during
    /// this exchange have their pending directive dropped instead.
    pub fn del_with(&mut self, name: &str, opts: CookieOptions) {
        if !is_valid_name(name) {
            return;
        }

        if self.incoming.iter().any(|(n, _)| n == name) {
            let mut opts = opts.merged_over(&self.defaults);
            opts.expires = None;
            opts.maxage = Some(0);

            match self.directive(name, "", &opts) {
                Ok(directive) => {
                    self.upsert(name, directive);
                    self.combined.remove(name);
                }
                Err(e) => self.logger.error(&e, Some(json!({ "name": name }))),
            }
        } else if let Some(pos) = self.outgoing.iter().position(|(n, _)| n == name) {
            self.outgoing.remove(pos);
            self.combined.remove(name);
        }
    }

    /// Delete every cookie received with the request.
    pub fn del_all(&mut self) {
        self.del_all_with(CookieOptions::default());
    }

    /// Delete every cookie received with the request, with options.
    ///
    /// Cookies set during this exchange are left alone.
    pub fn del_all_with(&mut self, opts: CookieOptions) {
        let names: Vec<String> = self.incoming.iter().map(|(n, _)| n.clone()).collect();
        for name in names {
            self.del_with(&name, opts.clone());
        }
    }

    fn upsert(&mut self, name: &str, directive: String) {
        match self.outgoing.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = directive,
            None => self.outgoing.push((name.to_string(), directive)),
        }
    }

    /// Serialize one `Set-Cookie` directive from effective options.
    fn directive(&self, name: &str, value: &str, opts: &CookieOptions) -> Result<String> {
        let now = (self.clock)();
        let mut parts = vec![format!(
            "{}={}",
            name,
            utf8_percent_encode(value, URI_COMPONENT)
        )];

        match (opts.expires, opts.maxage) {
            (Some(expires), Some(_)) => {
                parts.push(format!("Expires={}", http_date(expires)?));
            }
            (Some(expires), None) => {
                let secs = (expires - now).as_seconds_f64().round() as i64;
                parts.push(format!("Expires={}", http_date(expires)?));
                parts.push(format!("Max-Age={}", secs));
            }
            (None, Some(maxage)) => {
                let expires = now
                    .checked_add(Duration::seconds(maxage))
                    .ok_or_else(|| Error::InvalidCookie {
                        name: name.to_string(),
                        reason: "max-age out of range",
                    })?;
                parts.push(format!("Expires={}", http_date(expires)?));
                parts.push(format!("Max-Age={}", maxage));
            }
            (None, None) => {}
        }

        if let Some(path) = &opts.path {
            parts.push(format!("Path={}", path));
        }
        if let Some(domain) = &opts.domain {
            parts.push(format!("Domain={}", domain));
        }

        let secure = opts.secure.unwrap_or(true);
        if secure {
            parts.push("Secure".to_string());
        }
        if opts.httponly.unwrap_or(false) {
            parts.push("HttpOnly".to_string());
        }
        if let Some(samesite) = opts.samesite {
            parts.push(format!("SameSite={}", samesite));
            if samesite == SameSite::None && !secure {
                self.logger
                    .warn(SAMESITE_NONE_WARNING, Some(json!({ "name": name })));
                parts.push("Secure".to_string());
            }
        }

        Ok(parts.join("; "))
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("defaults", &self.defaults)
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .finish_non_exhaustive()
    }
}
