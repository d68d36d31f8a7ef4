//! Request id resolution and propagation.
//!
//! The request id doubles as the trace id of the per-request logger. It is
//! taken from the first configured inbound header that yields an accepted
//! value, else generated. W3C `traceparent` headers contribute their
//! trace-id field:
//! `traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`

use std::sync::Arc;

use http::HeaderMap;
use uuid::Uuid;

/// W3C Trace Context version.
const TRACE_VERSION: &str = "00";

/// Sampled trace flag.
const FLAG_SAMPLED: u8 = 0x01;

/// Header carrying W3C trace context.
pub const TRACEPARENT: &str = "traceparent";

/// Accepts or rejects an inbound request id.
pub type RequestIdValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Generate a 32-character lowercase hex request id.
#[inline]
pub fn generate_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate a 16-character hex span id.
#[inline]
fn generate_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

/// Extract the trace id from a `traceparent` value.
///
/// Format: `{version}-{trace-id}-{parent-id}-{trace-flags}`
pub fn parse_traceparent(header: &str) -> Option<String> {
    let parts: Vec<&str> = header.trim().split('-').collect();
    if parts.len() != 4 {
        return None;
    }

    let (version, trace_id, parent_id, flags) = (parts[0], parts[1], parts[2], parts[3]);

    if version != TRACE_VERSION {
        return None;
    }

    // trace-id: 32 hex chars, not all zeros
    if trace_id.len() != 32 || !is_valid_hex(trace_id) || is_all_zeros(trace_id) {
        return None;
    }

    // parent-id: 16 hex chars, not all zeros
    if parent_id.len() != 16 || !is_valid_hex(parent_id) || is_all_zeros(parent_id) {
        return None;
    }

    if flags.len() != 2 || !is_valid_hex(flags) {
        return None;
    }

    Some(trace_id.to_ascii_lowercase())
}

/// Resolve the request id from inbound headers, in configured order.
pub fn resolve(
    headers: &HeaderMap,
    inbound: &[String],
    validate: Option<&RequestIdValidator>,
) -> String {
    for name in inbound {
        let Some(raw) = headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };

        let candidate = if name.eq_ignore_ascii_case(TRACEPARENT) {
            match parse_traceparent(raw) {
                Some(id) => id,
                None => continue,
            }
        } else {
            raw.to_string()
        };

        if validate.map_or(true, |accept| accept(&candidate)) {
            return candidate;
        }
    }

    generate_request_id()
}

/// Value to send under `header` on outbound requests.
///
/// A `traceparent` header gets a fresh child span of the request's trace.
/// Ids that are not a valid trace id start a new trace instead.
pub fn outbound_value(header: &str, request_id: &str) -> String {
    if header.eq_ignore_ascii_case(TRACEPARENT) {
        let trace_id = if request_id.len() == 32
            && is_valid_hex(request_id)
            && !is_all_zeros(request_id)
        {
            request_id.to_string()
        } else {
            generate_request_id()
        };
        format!(
            "{}-{}-{}-{:02x}",
            TRACE_VERSION,
            trace_id,
            generate_span_id(),
            FLAG_SAMPLED
        )
    } else {
        request_id.to_string()
    }
}

/// Check if string contains only valid hex characters.
#[inline]
fn is_valid_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Check if string is all zeros.
#[inline]
fn is_all_zeros(s: &str) -> bool {
    s.chars().all(|c| c == '0')
}
