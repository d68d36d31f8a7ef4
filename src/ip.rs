//! Client IP resolution from forwarding headers.
//!
//! Candidate headers are kept in a ranked list. The header that last
//! produced a valid address moves to the front so the next lookup finds it
//! first. The ranking only changes lookup order, never the outcome of a
//! single resolution, so concurrent reordering is harmless.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, LazyLock};

use http::HeaderMap;
use parking_lot::RwLock;

/// Default candidate order.
pub const DEFAULT_IP_HEADERS: &[&str] = &[
    "x-client-ip",
    "x-forwarded-for",
    "cf-connecting-ip",
    "fastly-client-ip",
    "true-client-ip",
    "x-real-ip",
    "x-cluster-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
    "x-appengine-user-ip",
];

static GLOBAL_RANKING: LazyLock<Arc<IpHeaderRanking>> =
    LazyLock::new(|| Arc::new(IpHeaderRanking::new()));

/// Ranked list of forwarding headers.
#[derive(Debug)]
pub struct IpHeaderRanking {
    order: RwLock<Vec<&'static str>>,
}

impl IpHeaderRanking {
    /// Create a ranking in the default order.
    pub fn new() -> Self {
        Self {
            order: RwLock::new(DEFAULT_IP_HEADERS.to_vec()),
        }
    }

    /// The process-wide ranking shared by contexts without their own.
    pub fn global() -> Arc<IpHeaderRanking> {
        GLOBAL_RANKING.clone()
    }

    /// Current candidate order.
    pub fn order(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }

    /// Restore the default order.
    pub fn reset(&self) {
        *self.order.write() = DEFAULT_IP_HEADERS.to_vec();
    }

    /// Scan headers in ranked order and return the first valid address.
    ///
    /// The winning header is promoted to the front of the ranking.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let order = self.order();
        for (idx, name) in order.iter().enumerate() {
            let Some(value) = headers.get(*name).and_then(|v| v.to_str().ok()) else {
                continue;
            };

            let found = if *name == "forwarded" {
                parse_forwarded(value)
            } else {
                parse_first(value)
            };

            if let Some(ip) = found {
                if idx > 0 {
                    self.promote(name);
                }
                return Some(ip);
            }
        }
        None
    }

    fn promote(&self, name: &'static str) {
        let mut order = self.order.write();
        if let Some(pos) = order.iter().position(|n| *n == name) {
            let winner = order.remove(pos);
            order.insert(0, winner);
        }
    }
}

impl Default for IpHeaderRanking {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one address, tolerating a port and IPv6 brackets.
fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim().trim_matches('"');
    if raw.is_empty() {
        return None;
    }
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    raw.strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .and_then(|r| r.parse::<IpAddr>().ok())
}

/// First element of a comma-separated list (`client, proxy1, proxy2`).
fn parse_first(value: &str) -> Option<IpAddr> {
    value.split(',').next().and_then(parse_ip)
}

/// `for=` parameter of an RFC 7239 `Forwarded` header.
fn parse_forwarded(value: &str) -> Option<IpAddr> {
    value
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.split_once('=')?;
            key.trim().eq_ignore_ascii_case("for").then_some(val)
        })
        .find_map(parse_ip)
}
