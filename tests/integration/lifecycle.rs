//! Lifecycle tests: init, status, timeouts, locking, identity.

use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use exchange_ctx::body::DefaultBodyParser;
use exchange_ctx::config::RequestIdConfig;
use exchange_ctx::core::{ResponseOptions, RouteKind, RouteMeta};
use exchange_ctx::observability::Logger;
use exchange_ctx::Error;

use crate::helpers::*;

fn assert_lock_invariant(ctx: &exchange_ctx::RequestContext) {
    assert_eq!(ctx.is_locked(), ctx.is_done() || ctx.is_aborted());
}

#[tokio::test]
async fn test_locked_is_done_or_aborted() {
    let harness = Harness::new();

    let (mut ctx, _) = harness.context(get("/", &[]));
    assert_lock_invariant(&ctx);
    ctx.end();
    assert_lock_invariant(&ctx);
    assert!(!ctx.is_aborted());

    let (mut ctx, _) = harness.context(get("/", &[]));
    ctx.abort(502);
    assert_lock_invariant(&ctx);
    assert!(ctx.is_done());

    let (mut ctx, _) = harness.context(get("/", &[]));
    ctx.text("hi", ResponseOptions::new());
    assert_lock_invariant(&ctx);
}

#[tokio::test]
async fn test_mutations_ignored_once_locked() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get("/", &[]));

    ctx.set_header("x-before", "1");
    ctx.abort(503);
    ctx.set_header("x-after", "1")
        .set_body(Some("late".to_string()))
        .del_header("x-before");
    ctx.abort(400);
    ctx.end();

    assert_eq!(ctx.status_code().as_u16(), 503);
    assert_eq!(ctx.response_header("x-before").as_deref(), Some("1"));
    assert_eq!(ctx.response_header("x-after"), None);
    assert!(ctx.response_body().is_empty());
    assert!(matches!(ctx.set_status(200), Err(Error::Locked)));
}

#[tokio::test]
async fn test_set_status_validates() {
    let harness = Harness::new();
    let (mut ctx, logger) = harness.context(get("/", &[]));

    assert_ok!(ctx.set_status(201));
    assert_ok!(ctx.set_status(201));
    assert_err!(ctx.set_status(1000));

    assert_eq!(ctx.status_code().as_u16(), 201);
    let calls = logger.attribute_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["otel.status_code"], json!("OK"));
}

#[tokio::test]
async fn test_init_parses_json_body() {
    let harness = Harness::new();
    let (mut ctx, logger) = harness.context(request(
        "POST",
        "/users",
        &[("content-type", "application/json; charset=utf-8")],
        r#"{"name":"ada","tags":["x"]}"#,
    ));

    ctx.init(RouteMeta::new("users.create"), Some(&DefaultBodyParser::default()))
        .await;

    assert_eq!(ctx.body(), &json!({ "name": "ada", "tags": ["x"] }));
    assert!(!ctx.is_locked());
    assert!(logger.errors().is_empty());
}

#[tokio::test]
async fn test_init_parses_form_body() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(request(
        "PUT",
        "/profile",
        &[("content-type", "application/x-www-form-urlencoded")],
        "name=Ada+Lovelace&lang=en&lang=fr",
    ));

    ctx.init(RouteMeta::new("profile.update"), Some(&DefaultBodyParser::default()))
        .await;

    assert_eq!(
        ctx.body(),
        &json!({ "name": "Ada Lovelace", "lang": ["en", "fr"] })
    );
}

#[tokio::test]
async fn test_init_oversized_body_is_413_without_log() {
    let harness = Harness::new();
    let (mut ctx, logger) = harness.context(request("POST", "/upload", &[], "data"));

    ctx.init(RouteMeta::new("upload"), Some(&StubParser::TooLarge)).await;

    assert_eq!(ctx.status_code().as_u16(), 413);
    assert!(!ctx.is_locked());
    assert!(logger.errors().is_empty());

    // handlers can still answer with their own body
    ctx.json(&json!({ "error": "too large" }), ResponseOptions::new());
    assert!(ctx.is_done());
    assert_eq!(ctx.status_code().as_u16(), 413);
    assert!(logger.errors().is_empty());
}

#[tokio::test]
async fn test_init_limit_of_default_parser() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(request(
        "POST",
        "/upload",
        &[("content-type", "text/plain")],
        "0123456789",
    ));

    ctx.init(RouteMeta::new("upload"), Some(&DefaultBodyParser::new(4)))
        .await;

    assert_eq!(ctx.status_code().as_u16(), 413);
}

#[tokio::test]
async fn test_init_broken_body_is_400_and_logged() {
    let harness = Harness::new();
    let (mut ctx, logger) = harness.context(request("PATCH", "/users/1", &[], "{"));

    ctx.init(RouteMeta::new("users.patch"), Some(&StubParser::Broken)).await;

    assert_eq!(ctx.status_code().as_u16(), 400);
    assert!(!ctx.is_locked());
    assert_eq!(
        logger.errors(),
        vec!["body parse error: unexpected end of input"]
    );

    assert_ok!(ctx.set_status(422));
    ctx.text("invalid body", ResponseOptions::new());
    assert!(ctx.is_done());
    assert_eq!(ctx.status_code().as_u16(), 422);
    assert_eq!(logger.errors().len(), 1);
}

#[tokio::test]
async fn test_init_skips_parser_for_get() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get("/health", &[]));

    ctx.init(
        RouteMeta::new("health").kind(RouteKind::Health),
        Some(&StubParser::Broken),
    )
    .await;

    assert_eq!(ctx.kind(), RouteKind::Health);
    assert!(!ctx.is_locked());
    assert_eq!(ctx.body(), &json!({}));
}

#[tokio::test(start_paused = true)]
async fn test_init_arms_route_timeout() {
    let harness = Harness::new().config(|c| c.with_timeout(1_000));
    let (mut ctx, logger) = harness.context(get("/slow", &[]));

    ctx.init(RouteMeta::new("slow").timeout(100), None).await;
    assert_eq!(ctx.timeout(), Some(100));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(ctx.is_aborted());
    assert_eq!(ctx.status_code().as_u16(), 408);
    assert_eq!(logger.errors(), vec!["Request timed out"]);
    let meta = logger.records().pop().and_then(|r| r.meta).unwrap();
    assert_eq!(meta["duration"], json!(100));
}

#[tokio::test(start_paused = true)]
async fn test_init_arms_configured_timeout() {
    let harness = Harness::new().config(|c| c.with_timeout(200));
    let (mut ctx, _) = harness.context(get("/", &[]));

    ctx.init(RouteMeta::new("index"), None).await;
    assert_eq!(ctx.timeout(), Some(200));

    ctx.text("fast", ResponseOptions::new());
    assert_eq!(ctx.timeout(), None);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!ctx.is_aborted());
    assert_eq!(ctx.status_code().as_u16(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_context_cancels_timer() {
    let harness = Harness::new();
    let (mut ctx, logger) = harness.context(get("/", &[]));
    ctx.set_timeout(Some(50));
    drop(ctx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(logger.errors().is_empty());
}

#[tokio::test]
async fn test_state_bag() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get("/users/7", &[]));

    ctx.init(RouteMeta::new("users.show").param("id", "7"), None)
        .await;
    ctx.set_state([("user", json!({ "id": 7 })), ("role", json!("admin"))])
        .del_state(["role"]);

    assert_eq!(ctx.state().get("id"), Some(&json!("7")));
    assert_eq!(ctx.state().get("user"), Some(&json!({ "id": 7 })));
    assert_eq!(ctx.state().get("role"), None);
}

#[tokio::test]
async fn test_identity_and_query() {
    let harness = Harness::new();
    let (ctx, _) = harness.context(get("/search?q=rust+lang&tag=a&tag=b&flag", &[]));

    assert_eq!(ctx.method(), http::Method::GET);
    assert_eq!(ctx.path(), "/search");
    assert_eq!(ctx.name(), "unknown");
    assert_eq!(ctx.query_param("q"), Some("rust lang"));
    assert_eq!(ctx.query_param("flag"), Some(""));
    assert_eq!(ctx.query().len(), 4);
    assert_eq!(ctx.query_string(), Some("q=rust+lang&tag=a&tag=b&flag"));
}

#[tokio::test]
async fn test_request_id_from_inbound_header() {
    let harness = Harness::new();
    let (ctx, _) = harness.context(get("/", &[("x-request-id", "req-123")]));

    assert_eq!(ctx.request_id(), "req-123");
    assert_eq!(ctx.logger().trace_id(), "req-123");
    assert_eq!(harness.root.last_options().unwrap().trace_id, "req-123");
}

#[tokio::test]
async fn test_request_id_validator_and_generation() {
    let harness = Harness::new().config(|c| {
        c.with_request_id(RequestIdConfig {
            validate: Some(std::sync::Arc::new(|id: &str| id.len() >= 8)),
            ..RequestIdConfig::default()
        })
    });

    let (ctx, _) = harness.context(get("/", &[("x-request-id", "short")]));
    assert_eq!(ctx.request_id().len(), 32);
    assert!(ctx.request_id().chars().all(|c| c.is_ascii_hexdigit()));

    let (ctx, _) = harness.context(get("/", &[("cf-ray", "8f2a1b3c4d5e6f70-AMS")]));
    assert_eq!(ctx.request_id(), "8f2a1b3c4d5e6f70-AMS");
}

#[tokio::test]
async fn test_after_hooks_drained_by_dispatcher() {
    use std::sync::Arc;

    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get("/", &[]));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let first = seen.clone();
    let second = seen.clone();
    ctx.add_after(move || first.lock().push("flush"))
        .add_after(move || second.lock().push("audit"));

    ctx.text("ok", ResponseOptions::new());
    let hooks = ctx.take_after_hooks();
    let response = ctx.into_response();
    for hook in hooks {
        hook();
    }

    assert_eq!(response.body().as_text(), Some("ok"));
    assert_eq!(*seen.lock(), vec!["flush", "audit"]);
}
