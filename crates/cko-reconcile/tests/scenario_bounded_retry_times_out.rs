//! Scenario: a permanently pending order stops polling after the budget.
//!
//! 30 pending responses yield exactly 30 status fetches, a notification,
//! and a delayed receipt flagged `needs_verification`.

use std::time::Duration;

use cko_reconcile::*;
use cko_schemas::{OrderStatusResponse, RemoteOrderStatus};

fn pending() -> Event {
    Event::StatusReceived(OrderStatusResponse::with_status(RemoteOrderStatus::Pending))
}

#[test]
fn scenario_thirty_pending_responses_time_out() {
    let mut m = Reconciler::new(ReconcileConfig::default(), Some("AS_1".to_string()));
    m.handle(Event::Start);

    let mut fetches = 0;
    let mut fx = m.handle(Event::TimerFired(Timer::ProcessingSplash));
    loop {
        fetches += fx
            .iter()
            .filter(|e| matches!(e, Effect::FetchStatus { .. }))
            .count();
        if m.is_settled() {
            break;
        }
        let after_status = m.handle(pending());
        if m.is_settled() {
            fx = after_status;
            break;
        }
        fx = m.handle(Event::TimerFired(Timer::NextCheck));
        assert!(fetches <= 30, "poller exceeded its budget");
    }

    assert_eq!(fetches, 30);
    assert_eq!(m.pending_attempts(), 30);
    assert_eq!(m.disposition(), Some(&Disposition::TimedOut));

    assert!(matches!(fx[0], Effect::DispatchNotification(ref n) if n.payment_success));
    assert_eq!(
        fx[1],
        Effect::Schedule {
            timer: Timer::Navigate,
            after: Duration::from_secs(2)
        }
    );

    let nav = m.handle(Event::TimerFired(Timer::Navigate));
    let [Effect::Navigate(Navigation::Receipt(r))] = nav.as_slice() else {
        panic!("expected a single receipt navigation, got {nav:?}");
    };
    assert!(r.payment_success);
    assert!(r.needs_verification);
    assert!(!r.has_error);
}

#[test]
fn scenario_transport_failures_have_their_own_budget() {
    let cfg = ReconcileConfig {
        max_attempts: 3,
        ..ReconcileConfig::default()
    };
    let mut m = Reconciler::new(cfg, Some("AS_2".to_string()));
    m.handle(Event::Start);
    m.handle(Event::TimerFired(Timer::ProcessingSplash));

    // Two pending responses do not eat into the failure budget.
    m.handle(pending());
    m.handle(Event::TimerFired(Timer::NextCheck));
    m.handle(pending());
    m.handle(Event::TimerFired(Timer::NextCheck));

    for _ in 0..2 {
        let fx = m.handle(Event::TransportFailed("timeout".to_string()));
        assert_eq!(
            fx,
            vec![Effect::Schedule {
                timer: Timer::NextCheck,
                after: Duration::from_secs(2)
            }]
        );
        m.handle(Event::TimerFired(Timer::NextCheck));
    }
    assert!(!m.is_settled());

    m.handle(Event::TransportFailed("timeout".to_string()));
    assert_eq!(
        m.disposition(),
        Some(&Disposition::Failed {
            message: "timeout".to_string()
        })
    );

    let nav = m.handle(Event::TimerFired(Timer::Navigate));
    let [Effect::Navigate(Navigation::Receipt(r))] = nav.as_slice() else {
        panic!("expected receipt, got {nav:?}");
    };
    assert!(r.has_error);
    assert!(!r.payment_success);
    assert_eq!(r.error_message.as_deref(), Some("timeout"));
}
