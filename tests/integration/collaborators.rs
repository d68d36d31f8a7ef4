//! Lazy resources and injected collaborators: ip, nonce, cache, fetch.

use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use exchange_ctx::cache::CacheClient;
use exchange_ctx::fetch::FetchInit;
use exchange_ctx::ip::IpHeaderRanking;
use exchange_ctx::transport::MemoryTransport;
use exchange_ctx::Error;

use crate::helpers::*;

fn peer() -> IpAddr {
    "10.0.0.1".parse().unwrap()
}

fn isolated(harness: Harness) -> Harness {
    harness
        .transport(MemoryTransport::new().with_ip(peer()))
        .config(|c| c.with_ip_headers(Arc::new(IpHeaderRanking::new())))
}

#[tokio::test]
async fn test_ip_from_forwarding_header() {
    let harness = isolated(Harness::new());
    let (ctx, _) = harness.context(get(
        "/",
        &[("x-forwarded-for", "203.0.113.7, 10.0.0.2")],
    ));

    assert_eq!(ctx.ip(), Some("203.0.113.7".parse().unwrap()));
    assert_eq!(harness.config.ip_headers.order()[0], "x-forwarded-for");
}

#[tokio::test]
async fn test_ip_from_forwarded_for_param() {
    let harness = isolated(Harness::new());
    let (ctx, _) = harness.context(get(
        "/",
        &[("forwarded", "for=\"[2001:db8::1]:4711\";proto=https")],
    ));

    assert_eq!(ctx.ip(), Some("2001:db8::1".parse().unwrap()));
}

#[tokio::test]
async fn test_ip_ignores_headers_without_trust_proxy() {
    let harness = isolated(Harness::new()).config(|c| c.with_trust_proxy(false));
    let (ctx, _) = harness.context(get("/", &[("x-real-ip", "198.51.100.4")]));

    assert_eq!(ctx.ip(), Some(peer()));
    assert_eq!(harness.config.ip_headers.order()[0], "x-client-ip");
}

#[tokio::test]
async fn test_ip_falls_back_to_transport() {
    let harness = isolated(Harness::new());
    let (ctx, _) = harness.context(get("/", &[("x-forwarded-for", "not-an-ip")]));

    assert_eq!(ctx.ip(), Some(peer()));
    assert_eq!(ctx.ip(), Some(peer()));
}

#[tokio::test]
async fn test_nonce_from_request_id() {
    let harness = Harness::new();
    let (ctx, _) = harness.context(get("/", &[("x-request-id", "abc")]));

    assert_eq!(ctx.nonce(), STANDARD.encode("abc"));
    assert_eq!(ctx.nonce(), "YWJj");
}

#[tokio::test]
async fn test_nonce_from_state() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get("/", &[]));

    ctx.set_state([("nonce", json!("n0nc3"))]);
    assert_eq!(ctx.nonce(), "n0nc3");

    // memoized
    ctx.set_state([("nonce", json!("changed"))]);
    assert_eq!(ctx.nonce(), "n0nc3");
}

#[tokio::test]
async fn test_cache_spawned_once() {
    let factory = Arc::new(CountingCacheFactory::default());
    let harness = Harness::new().config(|c| c.with_cache(factory.clone()));
    let (ctx, _) = harness.context(get("/", &[]));

    let first = ctx.cache().unwrap();
    let second = ctx.cache().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.spawned.load(Ordering::SeqCst), 1);

    first.set("k", json!({ "v": 1 }), None).await.unwrap();
    assert_eq!(second.get("k").await.unwrap(), Some(json!({ "v": 1 })));
}

#[tokio::test]
async fn test_no_cache_configured() {
    let harness = Harness::new();
    let (ctx, _) = harness.context(get("/", &[]));
    assert!(ctx.cache().is_none());
}

#[tokio::test]
async fn test_fetch_instruments_and_injects_request_id() {
    let fetcher = StubFetcher::ok(201);
    let harness = Harness::new().config(|c| c.with_fetcher(fetcher.clone()));
    let (ctx, logger) = harness.context(get("/", &[("x-request-id", "req-9")]));

    let response = ctx
        .fetch(
            "https://api.example.org/items",
            FetchInit::new().method(http::Method::POST).body("{}"),
        )
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(logger.spans(), vec!["fetch POST https://api.example.org/items"]);

    let calls = logger.attribute_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["http.method"], json!("POST"));
    assert_eq!(calls[0]["http.url"], json!("https://api.example.org/items"));
    assert_eq!(calls[1]["http.status_code"], json!(201));
    assert_eq!(calls[1]["span.kind"], json!("client"));
    assert_eq!(calls[1]["otel.status_code"], json!("OK"));

    let sent = fetcher.requests.lock();
    assert_eq!(sent[0].headers().get("x-request-id").unwrap(), "req-9");
    assert_eq!(sent[0].body().as_ref(), b"{}");
}

#[tokio::test]
async fn test_fetch_server_error_marks_span() {
    let fetcher = StubFetcher::ok(503);
    let harness = Harness::new().config(|c| c.with_fetcher(fetcher));
    let (ctx, _) = harness.context(get("/", &[]));

    let logger = harness.root.last().unwrap();
    let response = ctx.fetch("https://api.example.org", FetchInit::new()).await;

    assert_eq!(response.unwrap().status().as_u16(), 503);
    assert_eq!(logger.spans(), vec!["fetch GET https://api.example.org"]);
    assert_eq!(logger.attribute_calls()[1]["otel.status_code"], json!("ERROR"));
}

#[tokio::test]
async fn test_fetch_error_is_logged_and_returned() {
    let harness = Harness::new().config(|c| c.with_fetcher(StubFetcher::failing()));
    let (ctx, logger) = harness.context(get("/", &[]));

    let err = ctx
        .fetch("https://down.example.org", FetchInit::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fetch(_)));
    assert_eq!(logger.errors(), vec!["fetch error: connection refused"]);
    let calls = logger.attribute_calls();
    assert_eq!(calls.last().unwrap()["otel.status_code"], json!("ERROR"));
    let meta = logger.records()[0].meta.clone().unwrap();
    assert_eq!(meta["url"], json!("https://down.example.org"));
    assert_eq!(meta["method"], json!("GET"));
}

#[tokio::test]
async fn test_fetch_without_fetcher() {
    let harness = Harness::new();
    let (ctx, logger) = harness.context(get("/", &[]));

    let result = ctx.fetch("https://api.example.org", FetchInit::new()).await;

    assert!(matches!(result, Err(Error::Fetch(_))));
    assert_eq!(logger.errors().len(), 1);
}
