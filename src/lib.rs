//! exchange_ctx - per-request context and cookie engine for async HTTP services.
//!
//! One [`RequestContext`] is built for every inbound request. It owns the
//! request identity, a state bag, the response being assembled and the
//! done/aborted lifecycle, and lazily provides the client IP, a nonce, a
//! cache client and a [`CookieJar`].
//!
//! # Features
//!
//! - **Lifecycle**: `init`, status, timeout-driven abort, after-hooks
//! - **Emitters**: JSON (sorted keys), text, HTML, status, redirect, file streaming
//! - **Cookies**: RFC 6265 parsing and `Set-Cookie` serialization with secure defaults
//! - **Observability**: per-request loggers over `tracing`, JSON log lines
//!
//! # Collaborators
//!
//! The context performs no I/O itself. Everything runtime-specific is injected:
//!
//! - [`transport::Transport`] - peer address and file streaming
//! - [`body::BodyParser`] - request body parsing
//! - [`fetch::Fetcher`] - outbound HTTP
//! - [`cache::CacheFactory`] - per-request cache clients
//! - [`observability::RootLogger`] - per-request loggers
//! - [`core::Renderer`] - render trees for `html()`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use exchange_ctx::{ContextConfig, RequestContext, RouteMeta};
//! use exchange_ctx::core::ResponseOptions;
//! use exchange_ctx::observability::TracingRootLogger;
//!
//! let config = Arc::new(ContextConfig::from_env()?);
//! let root = TracingRootLogger::new("api");
//! let mut ctx = RequestContext::new(config, &root, transport, request);
//! ctx.init(RouteMeta::new("health"), None).await;
//! ctx.text("ok", ResponseOptions::new());
//! let response = ctx.into_response();
//! ```

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod body;
pub mod cache;
pub mod config;
pub mod cookies;
pub mod core;
pub mod fetch;
pub mod headers;
pub mod ip;
pub mod logging;
pub mod observability;
pub mod request_id;
pub mod status;
pub mod transport;

// Re-exports for convenience
pub use config::ContextConfig;
pub use cookies::{CookieJar, CookieOptions, SameSite};
pub use core::{Error, Request, RequestContext, Response, Result, RouteKind, RouteMeta};
