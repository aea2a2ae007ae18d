use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use fanfeed_gateway::app;
use fanfeed_gateway::clock::ManualClock;
use fanfeed_gateway::rate_limit::RateLimiter;
use fanfeed_gateway::state::AppState;

fn test_app() -> (Router, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let state = Arc::new(AppState {
        limiter: RateLimiter::local(Arc::new(clock.clone())),
        max_feed_items: 100,
    });
    (app(state), clock)
}

fn post_json(uri: &str, ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_local_store() {
    let (app, _) = test_app();
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "local");
}

#[tokio::test]
async fn login_policy_returns_429_with_retry_after() {
    let (app, clock) = test_app();

    for i in 0..5 {
        let res = app
            .clone()
            .oneshot(post_json("/api/limits/login", "198.51.100.4", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "attempt {i}");
        let body = body_json(res).await;
        assert_eq!(body["remaining"], 4 - i);
    }

    clock.advance(Duration::seconds(20));
    let res = app
        .clone()
        .oneshot(post_json("/api/limits/login", "198.51.100.4", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()[header::RETRY_AFTER], "40");
    let body = body_json(res).await;
    assert_eq!(body["retryAfter"], 40);

    // another client is unaffected
    let res = app
        .clone()
        .oneshot(post_json("/api/limits/login", "198.51.100.5", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // and the window eventually reopens
    clock.advance(Duration::seconds(40));
    let res = app
        .oneshot(post_json("/api/limits/login", "198.51.100.4", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn email_policies_need_an_identity() {
    let (app, _) = test_app();

    let res = app
        .clone()
        .oneshot(post_json("/api/limits/password-reset", "10.0.0.1", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    for _ in 0..3 {
        let res = app
            .clone()
            .oneshot(post_json(
                "/api/limits/password-reset",
                "10.0.0.1",
                json!({ "identity": "fan@example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app
        .oneshot(post_json(
            "/api/limits/password-reset",
            "10.0.0.9",
            json!({ "identity": "FAN@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unknown_policy_is_404() {
    let (app, _) = test_app();
    let res = app
        .oneshot(post_json("/api/limits/comments", "10.0.0.1", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn visibility_endpoint_fails_closed() {
    let (app, _) = test_app();

    let res = app
        .clone()
        .oneshot(post_json(
            "/api/visibility",
            "10.0.0.1",
            json!({ "content_tier": "premium", "viewer_tier": "vip" }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["allowed"], true);

    let res = app
        .oneshot(post_json(
            "/api/visibility",
            "10.0.0.1",
            json!({ "content_tier": "members-only", "viewer_tier": "vip" }),
        ))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["allowed"], false);
    assert!(body["reason"].as_str().unwrap().contains("members-only"));
}

fn posts(n: usize) -> Vec<Value> {
    let base = Utc::now();
    (0..n)
        .map(|i| {
            json!({
                "id": format!("post-{i}"),
                "created_at": (base - Duration::minutes(i as i64)).to_rfc3339(),
                "visibility": if i % 5 == 4 { "vip" } else { "all" },
                "like_count": i % 3,
                "comment_count": i % 4,
            })
        })
        .collect()
}

#[tokio::test]
async fn feed_filters_sorts_and_pages() {
    let (app, _) = test_app();

    // 25 posts, every fifth is vip-only
    let res = app
        .clone()
        .oneshot(post_json(
            "/api/feed",
            "10.0.0.1",
            json!({ "items": posts(25), "liked_ids": ["post-0"], "viewer_tier": "vip" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 20);
    assert_eq!(body["items"][0]["id"], "post-0");
    assert_eq!(body["items"][0]["viewer_has_liked"], true);
    assert_eq!(body["has_next"], true);
    assert_eq!(body["has_previous"], false);

    let res = app
        .oneshot(post_json(
            "/api/feed",
            "10.0.0.1",
            json!({ "items": posts(25), "page": 2 }),
        ))
        .await
        .unwrap();
    let body = body_json(res).await;
    // basic viewer: 20 public posts fit on page one
    assert_eq!(body["total"], 20);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["has_previous"], true);
}

#[tokio::test]
async fn feed_rejects_bad_parameters() {
    let (app, _) = test_app();

    let res = app
        .clone()
        .oneshot(post_json(
            "/api/feed",
            "10.0.0.1",
            json!({ "items": posts(3), "page_size": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(post_json("/api/feed", "10.0.0.1", json!({ "items": posts(101) })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feed_is_rate_limited_per_ip() {
    let (app, _) = test_app();

    for _ in 0..60 {
        let res = app
            .clone()
            .oneshot(post_json("/api/feed", "10.1.1.1", json!({ "items": [] })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app
        .oneshot(post_json("/api/feed", "10.1.1.1", json!({ "items": [] })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}
