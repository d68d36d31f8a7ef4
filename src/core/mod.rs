//! Request context core.
//!
//! - [`RequestContext`] - per-request state machine and response emitters
//! - [`Request`] / [`Response`] - inbound request and finalized response
//! - [`RouteMeta`] - what the router hands to `init`
//! - [`Error`] - core error type
//!
//! # Example
//!
//! ```rust,ignore
//! use exchange_ctx::core::{RequestContext, ResponseOptions, RouteMeta};
//!
//! async fn handle(mut ctx: RequestContext) -> exchange_ctx::core::Response {
//!     ctx.init(RouteMeta::new("users.show").param("id", "42"), None).await;
//!     ctx.json(&serde_json::json!({ "id": 42 }), ResponseOptions::new());
//!     for hook in ctx.take_after_hooks() {
//!         hook();
//!     }
//!     ctx.into_response()
//! }
//! ```

mod context;
mod emit;
mod error;
mod lifecycle;
pub mod parser;
mod request;
mod response;
mod route;

pub use context::{AfterHook, Renderer, RequestContext};
pub use emit::{FileOptions, HtmlBody, RedirectOptions, ResponseOptions};
pub use error::{Error, Result};
pub use request::Request;
pub use response::{Body, Response};
pub use route::{RouteKind, RouteMeta};
