//! Cookie tests through the context and the jar directly.

use std::sync::Arc;

use time::macros::datetime;
use time::OffsetDateTime;

use exchange_ctx::cookies::{CookieJar, CookieOptions, SameSite};
use exchange_ctx::observability::MemoryLogger;

use crate::helpers::*;

fn fixed_now() -> OffsetDateTime {
    datetime!(2025-01-01 00:00:00 UTC)
}

fn jar(header: &str) -> (CookieJar, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::new("trace"));
    let jar = CookieJar::new(Some(header), CookieOptions::default(), logger.clone())
        .with_clock(fixed_now);
    (jar, logger)
}

#[tokio::test]
async fn test_incoming_cookies_from_request() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get(
        "/",
        &[("cookie", "a=1; b=2; c=3; token=a%20b%20c; badcookie; badcookie2=")],
    ));

    let jar = ctx.cookies();
    assert_eq!(jar.get("a"), Some("1"));
    assert_eq!(jar.get("b"), Some("2"));
    assert_eq!(jar.get("c"), Some("3"));
    assert_eq!(jar.get("token"), Some("a b c"));
    assert_eq!(jar.get("badcookie"), None);
    assert_eq!(jar.get("badcookie2"), None);
    assert_eq!(jar.all().len(), 4);
}

#[tokio::test]
async fn test_jar_is_built_once() {
    let harness = Harness::new();
    let (mut ctx, _) = harness.context(get("/", &[("cookie", "a=1")]));

    ctx.cookies().set("session", "abc");
    assert_eq!(ctx.cookies().get("session"), Some("abc"));
    assert_eq!(ctx.cookies().outgoing().len(), 1);
}

#[tokio::test]
async fn test_set_cookie_headers_on_response() {
    let harness = Harness::new().config(|c| {
        c.with_cookies(CookieOptions::new().path("/").httponly(true))
    });
    let (mut ctx, _) = harness.context(get("/", &[]));

    ctx.cookies().set("theme", "dark");
    ctx.cookies().set("visits", 3);
    ctx.end();

    let response = ctx.into_response();
    assert_eq!(
        response.set_cookies(),
        vec![
            "theme=dark; Path=/; Secure; HttpOnly",
            "visits=3; Path=/; Secure; HttpOnly"
        ]
    );
}

#[test]
fn test_samesite_none_forces_secure() {
    let (mut jar, logger) = jar("");
    jar.set_with(
        "cross",
        "1",
        CookieOptions::new().samesite(SameSite::None).secure(false),
    );

    let directive = jar.outgoing()[0];
    assert!(directive.contains("SameSite=None"));
    assert!(directive.contains("Secure"));
    assert_eq!(directive, "cross=1; SameSite=None; Secure");
    assert_eq!(
        logger.warnings(),
        vec!["SameSite=None requires Secure=true; overriding to ensure security"]
    );
}

#[test]
fn test_expires_wins_over_maxage() {
    let (mut jar, _) = jar("");
    jar.set_with(
        "promo",
        "on",
        CookieOptions::new()
            .expires(datetime!(2025-01-02 00:00:00 UTC))
            .maxage(60),
    );

    let directive = jar.outgoing()[0];
    assert!(directive.contains("Expires=Thu, 02 Jan 2025 00:00:00 GMT"));
    assert!(!directive.contains("Max-Age"));
}

#[test]
fn test_maxage_derives_expires() {
    let (mut jar, _) = jar("");
    jar.set_with("short", "1", CookieOptions::new().maxage(3600));
    assert_eq!(
        jar.outgoing(),
        vec!["short=1; Expires=Wed, 01 Jan 2025 01:00:00 GMT; Max-Age=3600; Secure"]
    );

    jar.set_with(
        "long",
        "1",
        CookieOptions::new().expires(datetime!(2025-01-01 00:10:00 UTC)),
    );
    assert_eq!(
        jar.outgoing()[1],
        "long=1; Expires=Wed, 01 Jan 2025 00:10:00 GMT; Max-Age=600; Secure"
    );
}

#[test]
fn test_same_name_replaces_in_place() {
    let (mut jar, _) = jar("");
    jar.set("a", "1");
    jar.set("b", "2");
    jar.set("a", "3");

    assert_eq!(jar.outgoing(), vec!["a=3; Secure", "b=2; Secure"]);
    assert_eq!(jar.get("a"), Some("3"));
}

#[test]
fn test_del_all_targets_incoming_only() {
    let (mut jar, _) = jar("a=1; b=2");
    jar.set("fresh", "x");
    jar.del_all();

    assert_eq!(
        jar.outgoing(),
        vec![
            "fresh=x; Secure",
            "a=; Expires=Wed, 01 Jan 2025 00:00:00 GMT; Max-Age=0; Secure",
            "b=; Expires=Wed, 01 Jan 2025 00:00:00 GMT; Max-Age=0; Secure",
        ]
    );
    assert_eq!(jar.get("a"), None);
    assert_eq!(jar.get("fresh"), Some("x"));
}

#[test]
fn test_del_of_set_only_cookie_drops_directive() {
    let (mut jar, _) = jar("a=1");
    jar.set("temp", "1");
    jar.del("temp");
    jar.del("missing");
    jar.del("bad name");

    assert!(jar.outgoing().is_empty());
    assert_eq!(jar.get("temp"), None);
    assert_eq!(jar.get("a"), Some("1"));
}

#[test]
fn test_invalid_input_is_logged() {
    let (mut jar, logger) = jar("");
    jar.set("bad;name", "1");
    jar.set("ok", "caf\u{e9}");
    jar.set("nan", f64::NAN);

    assert!(jar.outgoing().is_empty());
    assert_eq!(logger.errors().len(), 3);
}

#[test]
fn test_values_are_uri_component_encoded() {
    let (mut jar, _) = jar("");
    jar.set_with("q", "a b&c=d", CookieOptions::new().secure(true).domain("example.org"));
    assert_eq!(
        jar.outgoing(),
        vec!["q=a%20b%26c%3Dd; Domain=example.org; Secure"]
    );
}
