//! Scenario: two transport failures, then a settled response.
//!
//! Three status calls, spaced by the slower error backoff.

use std::sync::Arc;
use std::time::Duration;

use cko_reconcile::{Disposition, Navigation, RetriggerLatch, ReturnRequest};
use cko_runtime::{ReconcileSession, SessionConfig};
use cko_testkit::{settled_status, transport_error, RecordingEnv, ScriptedApi};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn scenario_recovers_after_two_failures() {
    let env = Arc::new(RecordingEnv::new());
    let api = Arc::new(
        ScriptedApi::new()
            .push_status(Err(transport_error("payment/order-status")))
            .push_status(Err(transport_error("payment/order-status")))
            .push_status(Ok(settled_status())),
    );

    let started = Instant::now();
    let req = ReturnRequest::from_url("/forms/response/AS_FLAKY").unwrap();
    let session = ReconcileSession::spawn(
        env.clone(),
        api.clone(),
        SessionConfig::default(),
        RetriggerLatch::new(),
        &req,
    );

    let nav = session.outcome().await.unwrap();
    assert!(matches!(nav, Navigation::Receipt(ref r) if r.payment_success && !r.has_error));
    assert_eq!(api.status_calls(), 3);
    assert_eq!(session.disposition(), Some(Disposition::Success));
    // 2 s splash + 2 x 2 s error backoff.
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn scenario_failures_exhaust_budget_into_error_receipt() {
    let env = Arc::new(RecordingEnv::new());
    let api = Arc::new(
        ScriptedApi::new().status_fallback(Err(transport_error("payment/order-status"))),
    );

    let mut cfg = SessionConfig::default();
    cfg.reconcile.max_attempts = 4;

    let req = ReturnRequest::from_url("/payment-success?order_id=AS_DOWN").unwrap();
    let session = ReconcileSession::spawn(env.clone(), api.clone(), cfg, RetriggerLatch::new(), &req);

    let nav = session.outcome().await.unwrap();
    let Navigation::Receipt(r) = nav else {
        panic!("expected receipt, got {nav:?}");
    };
    assert!(r.has_error);
    assert!(!r.payment_success);
    assert_eq!(api.status_calls(), 4);
    assert!(api.notifications().is_empty());
}
