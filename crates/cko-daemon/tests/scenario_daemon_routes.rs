//! In-process scenario tests for cko-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; the backend is a scripted double.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use cko_cache::{MemoryOrderCache, OrderCacheExt};
use cko_config::CheckoutSettings;
use cko_daemon::{routes, state};
use cko_reconcile::{Navigation, RetriggerLatch};
use cko_runtime::Environment;
use cko_testkit::{sample_draft, settled_status, transport_error, ApiCall, ScriptedApi};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state(api: ScriptedApi) -> (Arc<state::AppState>, Arc<ScriptedApi>) {
    let api = Arc::new(api);
    let st = Arc::new(state::AppState::with_latch(
        CheckoutSettings::default(),
        api.clone(),
        Box::new(MemoryOrderCache::new()),
        RetriggerLatch::new(),
    ));
    (st, api)
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (st, _api) = make_state(ScriptedApi::new());
    let (status, body) = call(routes::build_router(st), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "cko-daemon");
    // No check has run yet.
    assert_eq!(json["backend_healthy"], false);
}

// ---------------------------------------------------------------------------
// POST /v1/checkout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checkout_caches_order_and_returns_gateway_redirect() {
    let (st, api) = make_state(ScriptedApi::new());
    let draft = serde_json::to_value(sample_draft("AS_1")).unwrap();

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        post_json("/v1/checkout", &draft),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["order_id"], "AS_1");
    let redirect = json["redirect_url"].as_str().unwrap();
    assert!(redirect.starts_with("https://payments.example/form/test?"));
    assert!(redirect.contains("order_id=AS_1"));
    assert!(redirect.contains("amount=156.00"));

    let cached = st.env.cache().get_order("AS_1").unwrap().unwrap();
    assert_eq!(cached.amount, 15_600);
    assert_eq!(
        st.env.cache().current_order_id().unwrap().as_deref(),
        Some("AS_1")
    );
    assert_eq!(
        api.calls(),
        vec![
            ApiCall::PrepareOrder("AS_1".to_string()),
            ApiCall::PaymentForm(15_600)
        ]
    );
}

#[tokio::test]
async fn checkout_with_blank_order_id_mints_one() {
    let (st, _api) = make_state(ScriptedApi::new());
    let draft = serde_json::to_value(sample_draft("  ")).unwrap();

    let (status, body) = call(routes::build_router(st), post_json("/v1/checkout", &draft)).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert!(json["order_id"].as_str().unwrap().starts_with("AS_"));
}

#[tokio::test]
async fn checkout_with_empty_cart_is_400() {
    let (st, api) = make_state(ScriptedApi::new());
    let mut draft = sample_draft("AS_2");
    draft.order_details.items.clear();

    let (status, body) = call(
        routes::build_router(st),
        post_json("/v1/checkout", &serde_json::to_value(draft).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("no items"));
    assert!(api.calls().is_empty(), "invalid drafts never reach the backend");
}

#[tokio::test]
async fn checkout_prepare_failure_is_502_with_stage() {
    let (st, api) = make_state(
        ScriptedApi::new().prepare_fallback(Err(transport_error("payment/prepare-order"))),
    );
    let draft = serde_json::to_value(sample_draft("AS_3")).unwrap();

    let (status, body) = call(routes::build_router(st), post_json("/v1/checkout", &draft)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json = parse_json(body);
    assert_eq!(json["stage"], "prepare-order");
    // No payment form is requested after a hard failure.
    assert_eq!(api.calls(), vec![ApiCall::PrepareOrder("AS_3".to_string())]);
}

// ---------------------------------------------------------------------------
// Payment return routes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn return_without_order_id_is_200_with_advisory() {
    let (st, api) = make_state(ScriptedApi::new());

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        get("/payment-success"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["status"], "no_order_id");
    assert_eq!(json["advisory"]["level"], "error");
    assert!(st.sessions.read().await.is_empty());
    assert_eq!(api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn bare_return_ignores_another_customers_checkout() {
    let (st, api) = make_state(ScriptedApi::new());
    let draft = serde_json::to_value(sample_draft("AS_other")).unwrap();
    let (status, _) = call(
        routes::build_router(Arc::clone(&st)),
        post_json("/v1/checkout", &draft),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        st.env.cache().current_order_id().unwrap().as_deref(),
        Some("AS_other")
    );

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        get("/payment-success"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "no_order_id");
    assert!(st.sessions.read().await.is_empty());
    assert_eq!(api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_cached_order_never_borrows_another() {
    let (st, _api) = make_state(ScriptedApi::new().status_fallback(Ok(settled_status())));
    let draft = serde_json::to_value(sample_draft("AS_other")).unwrap();
    let (status, _) = call(
        routes::build_router(Arc::clone(&st)),
        post_json("/v1/checkout", &draft),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        routes::build_router(Arc::clone(&st)),
        get("/payment-success?order_id=AS_mine"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let nav = {
        let sessions = st.sessions.read().await;
        let held = sessions.get("AS_mine").expect("session held");
        held.session.outcome().await.expect("navigated")
    };
    match nav {
        Navigation::Receipt(r) => {
            assert_eq!(r.order_id, "AS_mine");
            assert!(r.order_data.is_none(), "another customer's order leaked");
        }
        other => panic!("expected receipt, got {other:?}"),
    }
    assert!(st.env.cache().get_order("AS_other").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn return_with_route_token_starts_session() {
    let (st, _api) = make_state(ScriptedApi::new());

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        get("/forms/response/AS_9"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let json = parse_json(body);
    assert_eq!(json["order_id"], "AS_9");
    assert_eq!(json["source"], "route_param");
    assert_eq!(json["status_url"], "/v1/receipt/AS_9");
    assert!(st.sessions.read().await.contains_key("AS_9"));
}

#[tokio::test(start_paused = true)]
async fn query_order_id_beats_route_token() {
    let (st, _api) = make_state(ScriptedApi::new());

    let (status, body) = call(
        routes::build_router(st),
        get("/forms/response/AS_token?orderId=AS_query"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let json = parse_json(body);
    assert_eq!(json["order_id"], "AS_query");
    assert_eq!(json["source"], "query_order_id_camel");
}

#[tokio::test(start_paused = true)]
async fn repeated_return_replaces_session() {
    let (st, _api) = make_state(ScriptedApi::new());

    for _ in 0..2 {
        let (status, _) = call(
            routes::build_router(Arc::clone(&st)),
            get("/order-confirmation?order_id=AS_5&source=cashfree"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    assert_eq!(st.sessions.read().await.len(), 1);
}

// ---------------------------------------------------------------------------
// GET /v1/receipt/:order_id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receipt_for_unknown_order_is_404() {
    let (st, _api) = make_state(ScriptedApi::new());
    let (status, _) = call(routes::build_router(st), get("/v1/receipt/AS_nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn receipt_is_pending_while_reconciling() {
    let (st, _api) = make_state(ScriptedApi::new());
    let (status, _) = call(
        routes::build_router(Arc::clone(&st)),
        get("/cashfree-response?order_id=AS_6"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = call(routes::build_router(st), get("/v1/receipt/AS_6")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["state"], "pending");
}
