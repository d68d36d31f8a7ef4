//! HTTP status code registry.
//!
//! The registry is the set of codes `http` knows a canonical reason phrase
//! for. Anything else (e.g. `999`) is rejected by the context.

use http::StatusCode;

use crate::core::{Error, Result};

/// Status codes accepted by `redirect()`.
pub const REDIRECT_CODES: &[u16] = &[300, 301, 302, 303, 304, 307, 308];

/// Default redirect status (See Other).
pub const DEFAULT_REDIRECT: u16 = 303;

/// Resolve a numeric code against the registry.
#[inline]
pub fn lookup(code: u16) -> Result<StatusCode> {
    StatusCode::from_u16(code)
        .ok()
        .filter(|status| status.canonical_reason().is_some())
        .ok_or(Error::InvalidStatusCode(code))
}

/// Check whether a code is a known status.
#[inline]
pub fn is_known(code: u16) -> bool {
    lookup(code).is_ok()
}

/// Check whether a code may be used for redirects.
#[inline]
pub fn is_redirect(code: u16) -> bool {
    REDIRECT_CODES.contains(&code)
}

/// Telemetry status derived from an HTTP status: `ERROR` for 5xx, `OK` otherwise.
#[inline]
pub fn otel_status(code: u16) -> &'static str {
    if code >= 500 {
        "ERROR"
    } else {
        "OK"
    }
}
