//! Scenario: once settled, nothing restarts polling and nothing navigates
//! twice.

use cko_reconcile::*;
use cko_schemas::{OrderStatusResponse, RemoteOrderStatus};

fn settled() -> OrderStatusResponse {
    OrderStatusResponse {
        status: Some(RemoteOrderStatus::Success),
        processed: true,
        ..OrderStatusResponse::default()
    }
}

fn checking(id: &str) -> Reconciler {
    let mut m = Reconciler::new(ReconcileConfig::default(), Some(id.to_string()));
    m.handle(Event::Start);
    m.handle(Event::TimerFired(Timer::ProcessingSplash));
    m
}

#[test]
fn scenario_success_navigates_immediately_and_once() {
    let mut m = checking("AS_OK");
    let fx = m.handle(Event::StatusReceived(settled()));

    assert_eq!(fx.len(), 3);
    assert_eq!(fx[0], Effect::PurgeCurrentOrderMarker);
    assert!(matches!(&fx[1], Effect::DispatchNotification(n) if n.status == "SUCCESS"));
    assert!(matches!(
        &fx[2],
        Effect::Navigate(Navigation::Receipt(r)) if r.payment_success && !r.needs_verification
    ));
    assert!(m.has_navigated());

    // Everything after the terminal transition is inert.
    for ev in [
        Event::TimerFired(Timer::NextCheck),
        Event::TimerFired(Timer::Navigate),
        Event::TimerFired(Timer::ProcessingSplash),
        Event::StatusReceived(OrderStatusResponse::with_status(RemoteOrderStatus::Pending)),
        Event::TransportFailed("late".to_string()),
        Event::Start,
    ] {
        assert!(m.handle(ev).is_empty());
    }
    assert_eq!(m.disposition(), Some(&Disposition::Success));
}

#[test]
fn scenario_not_found_goes_home_after_delay() {
    let mut m = checking("AS_GONE");
    let fx = m.handle(Event::StatusReceived(OrderStatusResponse::with_status(
        RemoteOrderStatus::NotFound,
    )));
    assert_eq!(
        fx,
        vec![Effect::Schedule {
            timer: Timer::Navigate,
            after: std::time::Duration::from_secs(3)
        }]
    );
    assert!(!m.has_navigated());

    let nav = m.handle(Event::TimerFired(Timer::Navigate));
    let [Effect::Navigate(Navigation::Home { advisory })] = nav.as_slice() else {
        panic!("expected home navigation, got {nav:?}");
    };
    assert_eq!(advisory.level, AdvisoryLevel::Error);

    assert!(m.handle(Event::TimerFired(Timer::Navigate)).is_empty());
    assert!(m.handle(Event::TimerFired(Timer::NextCheck)).is_empty());
}

#[test]
fn scenario_no_order_id_never_polls() {
    let mut m = Reconciler::new(ReconcileConfig::default(), None);
    let fx = m.handle(Event::Start);
    assert!(fx.iter().all(|e| !matches!(e, Effect::FetchStatus { .. })));
    assert_eq!(m.disposition(), Some(&Disposition::NoOrderId));

    assert!(m.handle(Event::TimerFired(Timer::ProcessingSplash)).is_empty());
    let nav = m.handle(Event::TimerFired(Timer::Navigate));
    assert!(matches!(
        nav.as_slice(),
        [Effect::Navigate(Navigation::Home { .. })]
    ));
}
