//! Cookie attributes and value coercion.

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

/// `SameSite` attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(format!("unknown SameSite value: {}", other)),
        }
    }
}

/// Cookie attributes.
///
/// Used both as jar-wide defaults and as per-call overrides: every field
/// set on the per-call options wins over the default. `secure` falls back
/// to `true` when neither side sets it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: Option<bool>,
    pub httponly: Option<bool>,
    pub samesite: Option<SameSite>,
    pub expires: Option<OffsetDateTime>,
    /// Lifetime in seconds.
    pub maxage: Option<i64>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn httponly(mut self, httponly: bool) -> Self {
        self.httponly = Some(httponly);
        self
    }

    pub fn samesite(mut self, samesite: SameSite) -> Self {
        self.samesite = Some(samesite);
        self
    }

    pub fn expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn maxage(mut self, secs: i64) -> Self {
        self.maxage = Some(secs);
        self
    }

    /// Per-call options layered over defaults.
    pub(crate) fn merged_over(&self, defaults: &CookieOptions) -> CookieOptions {
        CookieOptions {
            path: self.path.clone().or_else(|| defaults.path.clone()),
            domain: self.domain.clone().or_else(|| defaults.domain.clone()),
            secure: self.secure.or(defaults.secure),
            httponly: self.httponly.or(defaults.httponly),
            samesite: self.samesite.or(defaults.samesite),
            expires: self.expires.or(defaults.expires),
            maxage: self.maxage.or(defaults.maxage),
        }
    }
}

/// A value accepted by `CookieJar::set`.
///
/// Strings pass through, numbers and booleans use their string form.
/// Non-finite floats have no cookie representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieValue(Option<String>);

impl CookieValue {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<&str> for CookieValue {
    fn from(v: &str) -> Self {
        CookieValue(Some(v.to_string()))
    }
}

impl From<String> for CookieValue {
    fn from(v: String) -> Self {
        CookieValue(Some(v))
    }
}

impl From<&String> for CookieValue {
    fn from(v: &String) -> Self {
        CookieValue(Some(v.clone()))
    }
}

impl From<bool> for CookieValue {
    fn from(v: bool) -> Self {
        CookieValue(Some(v.to_string()))
    }
}

impl From<f64> for CookieValue {
    fn from(v: f64) -> Self {
        CookieValue(v.is_finite().then(|| v.to_string()))
    }
}

macro_rules! cookie_value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CookieValue {
                fn from(v: $t) -> Self {
                    CookieValue(Some(v.to_string()))
                }
            }
        )*
    };
}

cookie_value_from_int!(i32, i64, u32, u64, usize);
