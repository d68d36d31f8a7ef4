//! Response header helpers: cache directives, downloads and MIME lookup.

mod cache_control;
mod disposition;
pub mod mime;

pub use cache_control::{CacheControl, Cacheability};
pub use disposition::{ascii_fallback, attachment, encode_extended, Download};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped by `encodeURIComponent`: everything except
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub(crate) const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Pre-allocated static header values for the emitters.
pub(crate) mod content_types {
    use http::HeaderValue;

    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain");
    pub static TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html");
    pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
}
