//! Route metadata handed to `RequestContext::init`.

use std::fmt;

use super::parser::ParamList;

/// Kind of route that matched the request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteKind {
    #[default]
    Std,
    Health,
    NotFound,
    Options,
}

impl RouteKind {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Std => "std",
            RouteKind::Health => "health",
            RouteKind::NotFound => "notfound",
            RouteKind::Options => "options",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the router knows about the matched route.
#[derive(Clone, Debug, Default)]
pub struct RouteMeta {
    pub name: String,
    pub kind: RouteKind,
    /// Path parameters, merged into the context state.
    pub params: ParamList,
    /// Route timeout in milliseconds, overriding the configured default.
    pub timeout: Option<u64>,
}

impl RouteMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: RouteKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }
}
