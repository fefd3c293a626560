//! Scenario: a zero email count re-triggers the notification exactly once
//! per latch, even across watches.

use cko_reconcile::*;
use cko_schemas::EmailStatusResponse;

fn zero_sent() -> EmailStatusResponse {
    EmailStatusResponse {
        emails_sent: Some(0),
        ..EmailStatusResponse::default()
    }
}

#[test]
fn scenario_retrigger_fires_once_across_watches() {
    let latch = RetriggerLatch::new();
    let mut first = EmailWatch::new("AS_1", latch.clone());
    let mut second = EmailWatch::new("AS_2", latch.clone());

    let fired: Vec<_> = (0..5)
        .flat_map(|_| [first.on_email_status(&zero_sent()), second.on_email_status(&zero_sent())])
        .flatten()
        .collect();

    assert_eq!(
        fired,
        vec![Retrigger {
            order_id: "AS_1".to_string()
        }]
    );
    assert_eq!(second.emails_sent(), Some(0));
}

#[test]
fn scenario_independent_latches_fire_independently() {
    let mut a = EmailWatch::new("AS_1", RetriggerLatch::new());
    let mut b = EmailWatch::new("AS_2", RetriggerLatch::new());
    assert!(a.on_email_status(&zero_sent()).is_some());
    assert!(b.on_email_status(&zero_sent()).is_some());
}

#[test]
fn scenario_snapshot_merges_email_watch() {
    let mut m = Reconciler::new(ReconcileConfig::default(), Some("AS_1".to_string()));
    m.handle(Event::Start);
    m.handle(Event::TimerFired(Timer::ProcessingSplash));

    let mut w = EmailWatch::new("AS_1", RetriggerLatch::new());
    w.on_email_status(&EmailStatusResponse {
        emails_sent: Some(2),
        ..EmailStatusResponse::default()
    });

    let s = m.snapshot(Some(&w)).unwrap();
    assert_eq!(s.status, ReconcileStatus::Checking);
    assert_eq!(s.emails_sent, Some(2));
    assert_eq!(s.attempts, 0);
}
