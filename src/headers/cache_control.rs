//! `Cache-Control` directive descriptor.

use std::fmt;
use std::time::Duration;

/// Cacheability of a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cacheability {
    Public,
    Private,
    NoCache,
    NoStore,
}

impl Cacheability {
    /// Directive token.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Cacheability::Public => "public",
            Cacheability::Private => "private",
            Cacheability::NoCache => "no-cache",
            Cacheability::NoStore => "no-store",
        }
    }
}

/// Descriptor rendered into a `Cache-Control` header value.
///
/// Tokens are emitted in a fixed order:
/// `type, max-age, s-maxage, immutable, must-revalidate, proxy-revalidate`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub kind: Option<Cacheability>,
    pub max_age: Option<u64>,
    pub proxy_max_age: Option<u64>,
    pub immutable: bool,
    pub must_revalidate: bool,
    pub proxy_revalidate: bool,
}

impl CacheControl {
    /// Start from a cacheability type.
    #[inline]
    pub fn new(kind: Cacheability) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn public() -> Self {
        Self::new(Cacheability::Public)
    }

    pub fn private() -> Self {
        Self::new(Cacheability::Private)
    }

    pub fn no_cache() -> Self {
        Self::new(Cacheability::NoCache)
    }

    pub fn no_store() -> Self {
        Self::new(Cacheability::NoStore)
    }

    /// Set `max-age` in seconds.
    #[inline]
    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age = Some(secs);
        self
    }

    /// Set `max-age` from a duration (whole seconds).
    #[inline]
    pub fn max_age_duration(self, ttl: Duration) -> Self {
        self.max_age(ttl.as_secs())
    }

    /// Set `s-maxage` in seconds.
    #[inline]
    pub fn proxy_max_age(mut self, secs: u64) -> Self {
        self.proxy_max_age = Some(secs);
        self
    }

    #[inline]
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    #[inline]
    pub fn must_revalidate(mut self) -> Self {
        self.must_revalidate = true;
        self
    }

    #[inline]
    pub fn proxy_revalidate(mut self) -> Self {
        self.proxy_revalidate = true;
        self
    }

    /// Render the header value. Empty when no directive is set.
    pub fn to_header_value(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(6);

        if let Some(kind) = self.kind {
            parts.push(kind.as_str().to_string());
        }
        if let Some(secs) = self.max_age {
            parts.push(format!("max-age={}", secs));
        }
        if let Some(secs) = self.proxy_max_age {
            parts.push(format!("s-maxage={}", secs));
        }
        if self.immutable {
            parts.push("immutable".to_string());
        }
        if self.must_revalidate {
            parts.push("must-revalidate".to_string());
        }
        if self.proxy_revalidate {
            parts.push("proxy-revalidate".to_string());
        }

        parts.join(", ")
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}
