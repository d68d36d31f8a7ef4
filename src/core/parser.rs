//! Query string and cookie header parsing.

use std::borrow::Cow;

/// Ordered list of decoded name/value pairs.
pub type ParamList = Vec<(String, String)>;

/// Percent decode, borrowing when there is nothing to decode.
///
/// Invalid UTF-8 after decoding is replaced lossily.
#[inline]
pub fn percent_decode(s: &str) -> Cow<'_, str> {
    if s.contains('%') {
        percent_encoding::percent_decode_str(s).decode_utf8_lossy()
    } else {
        Cow::Borrowed(s)
    }
}

/// Query component decode: `+` is a space, then percent decoding.
#[inline]
fn query_decode(s: &str) -> String {
    if s.contains('+') {
        percent_decode(&s.replace('+', " ")).into_owned()
    } else {
        percent_decode(s).into_owned()
    }
}

/// Parse a query string into ordered key-value pairs.
///
/// Repeated keys are kept in order; keys without `=` get an empty value.
#[inline]
pub fn parse_query_string(query: &str) -> ParamList {
    let query = query.strip_prefix('?').unwrap_or(query);
    let pair_count = query.matches('&').count() + 1;
    let mut params = Vec::with_capacity(pair_count.min(16));

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        if !key.is_empty() {
            params.push((query_decode(key), query_decode(value)));
        }
    }

    params
}

/// Parse a `Cookie` header into name-value pairs.
///
/// Pairs without `=`, with an empty name or with an empty value are
/// skipped. Only the first `=` separates, so `x=1=2` yields `("x", "1=2")`.
/// A duplicate name replaces the earlier value but keeps its position.
/// Values that do not decode to UTF-8 are kept raw.
#[inline]
pub fn parse_cookies(cookie_header: &str) -> ParamList {
    let cookie_count = cookie_header.matches(';').count() + 1;
    let mut cookies: ParamList = Vec::with_capacity(cookie_count.min(16));

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            continue;
        }

        let (name, value) = match cookie.find('=') {
            Some(pos) => (cookie[..pos].trim(), cookie[pos + 1..].trim()),
            None => continue,
        };

        if name.is_empty() || value.is_empty() {
            continue;
        }

        let value = match percent_encoding::percent_decode_str(value).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => value.to_string(),
        };
        match cookies.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value,
            None => cookies.push((name.to_string(), value)),
        }
    }

    cookies
}
