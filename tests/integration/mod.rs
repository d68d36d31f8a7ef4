//! Integration tests for exchange_ctx
//!
//! These drive `RequestContext` through its public API with in-memory
//! collaborators (logger, transport, fetcher, renderer, cache).
//! Run with: cargo test --test integration

mod helpers;

mod collaborators;
mod cookies;
mod lifecycle;
