//! Status reconciliation state machine.
//!
//! ```text
//! Init ──Start──▶ Processing ──splash──▶ Checking ⇄ AwaitingRetry
//!                                           │
//!               ┌──────────────┬────────────┼──────────────┐
//!               ▼              ▼            ▼              ▼
//!           Success        NotFound     TimedOut        Failed
//! ```
//!
//! # Invariants
//!
//! - **Bounded**: at most `max_attempts` pending responses and at most
//!   `max_attempts` transport failures. The two counters are independent.
//! - **Terminal precedence**: once settled, no further `FetchStatus` is
//!   emitted, whatever events arrive.
//! - **Single navigation**: exactly one `Effect::Navigate` per machine.
//!   A second `Navigate` timer firing is ignored.
//! - **No-order-id never polls**: a machine built without an order id goes
//!   straight to a delayed home navigation.
//!
//! All logic is pure and deterministic: no IO, no clock, no randomness.

use std::time::Duration;

use cko_schemas::{
    NotifyRequest, OrderRecord, OrderStatusResponse, PaymentStatus, MissedCallStatus,
};
use serde::{Deserialize, Serialize};

use crate::email::EmailWatch;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub max_attempts: u32,
    /// Delay after a not-yet-settled status response.
    pub pending_interval: Duration,
    /// Delay after a transport failure. Slower than `pending_interval`.
    pub error_backoff: Duration,
    /// Cosmetic "processing payment" pause before the first check.
    pub processing_splash: Duration,
    pub home_redirect_delay: Duration,
    pub receipt_redirect_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            pending_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(2),
            processing_splash: Duration::from_secs(2),
            home_redirect_delay: Duration::from_secs(3),
            receipt_redirect_delay: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Timer {
    ProcessingSplash,
    NextCheck,
    Navigate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Start,
    TimerFired(Timer),
    StatusReceived(OrderStatusResponse),
    /// The status request failed before producing a usable response.
    TransportFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Schedule { timer: Timer, after: Duration },
    /// `attempt` is 1-based across pending and failed checks.
    FetchStatus { order_id: String, attempt: u32 },
    BeginEmailWatch { order_id: String },
    PurgeCurrentOrderMarker,
    DispatchNotification(NotifyRequest),
    Navigate(Navigation),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub level: AdvisoryLevel,
    pub message: String,
}

/// Shown when a return visit carries no resolvable order id.
pub const NO_ORDER_ID_MESSAGE: &str =
    "We could not find your order. Please check your order history or contact support.";

impl Advisory {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: AdvisoryLevel::Error,
            message: message.into(),
        }
    }
}

/// Input contract of the receipt view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptParams {
    pub order_id: String,
    pub payment_success: bool,
    pub from_cashfree: bool,
    pub needs_verification: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
    pub order_data: Option<OrderRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", rename_all = "snake_case")]
pub enum Navigation {
    Home { advisory: Advisory },
    Receipt(ReceiptParams),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    Success,
    NotFound,
    /// Budget exhausted while still pending. Optimistically confirmed.
    TimedOut,
    /// Transport failures exhausted the budget.
    Failed { message: String },
    NoOrderId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Init,
    Processing,
    Checking,
    AwaitingRetry,
    Settled(Disposition),
}

// ---------------------------------------------------------------------------
// Display state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Checking,
    Success,
    NotFound,
    TimedOut,
    Error,
}

/// What the receipt page shows while and after polling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationState {
    pub order_id: String,
    pub attempts: u32,
    pub status: ReconcileStatus,
    pub emails_sent: Option<u32>,
    pub missed_call_status: Option<MissedCallStatus>,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Reconciler {
    cfg: ReconcileConfig,
    order_id: Option<String>,
    payment_id: Option<String>,
    cached: Option<OrderRecord>,
    phase: Phase,
    pending_attempts: u32,
    error_attempts: u32,
    last_error: Option<String>,
    pending_navigation: Option<Navigation>,
    navigated: bool,
}

impl Reconciler {
    /// `order_id == None` is the resolver's no-order-id outcome.
    pub fn new(cfg: ReconcileConfig, order_id: Option<String>) -> Self {
        Self {
            cfg,
            order_id,
            payment_id: None,
            cached: None,
            phase: Phase::Init,
            pending_attempts: 0,
            error_attempts: 0,
            last_error: None,
            pending_navigation: None,
            navigated: false,
        }
    }

    /// Record read back from the local cache; attached to the receipt.
    pub fn with_cached_order(mut self, record: Option<OrderRecord>) -> Self {
        self.cached = record;
        self
    }

    pub fn with_payment_id(mut self, payment_id: Option<String>) -> Self {
        self.payment_id = payment_id;
        self
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn disposition(&self) -> Option<&Disposition> {
        match &self.phase {
            Phase::Settled(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, Phase::Settled(_))
    }

    pub fn is_processing_payment(&self) -> bool {
        matches!(self.phase, Phase::Init | Phase::Processing)
    }

    pub fn has_navigated(&self) -> bool {
        self.navigated
    }

    pub fn pending_attempts(&self) -> u32 {
        self.pending_attempts
    }

    pub fn error_attempts(&self) -> u32 {
        self.error_attempts
    }

    /// Display snapshot, merged with the email watch when one is running.
    /// `None` when there is no order id to show.
    pub fn snapshot(&self, email: Option<&EmailWatch>) -> Option<ReconciliationState> {
        let order_id = self.order_id.clone()?;
        let status = match &self.phase {
            Phase::Settled(Disposition::Success) => ReconcileStatus::Success,
            Phase::Settled(Disposition::NotFound) => ReconcileStatus::NotFound,
            Phase::Settled(Disposition::TimedOut) => ReconcileStatus::TimedOut,
            Phase::Settled(Disposition::Failed { .. } | Disposition::NoOrderId) => {
                ReconcileStatus::Error
            }
            _ => ReconcileStatus::Checking,
        };
        Some(ReconciliationState {
            order_id,
            attempts: self.pending_attempts,
            status,
            emails_sent: email.and_then(|e| e.emails_sent()),
            missed_call_status: email.and_then(|e| e.missed_call_status().cloned()),
        })
    }

    /// Feed one event; returns the effects the runtime must execute in order.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match (self.phase.clone(), event) {
            (Phase::Init, Event::Start) => self.start(),

            (Phase::Processing, Event::TimerFired(Timer::ProcessingSplash)) => {
                let Some(order_id) = self.order_id.clone() else {
                    return Vec::new();
                };
                self.phase = Phase::Checking;
                vec![
                    Effect::BeginEmailWatch {
                        order_id: order_id.clone(),
                    },
                    Effect::FetchStatus {
                        order_id,
                        attempt: self.next_attempt_number(),
                    },
                ]
            }

            (Phase::AwaitingRetry, Event::TimerFired(Timer::NextCheck)) => {
                let Some(order_id) = self.order_id.clone() else {
                    return Vec::new();
                };
                self.phase = Phase::Checking;
                vec![Effect::FetchStatus {
                    order_id,
                    attempt: self.next_attempt_number(),
                }]
            }

            (Phase::Checking, Event::StatusReceived(resp)) => self.on_status(resp),

            (Phase::Checking, Event::TransportFailed(message)) => self.on_transport_failure(message),

            (Phase::Settled(_), Event::TimerFired(Timer::Navigate)) => {
                if self.navigated {
                    return Vec::new();
                }
                match self.pending_navigation.take() {
                    Some(nav) => {
                        self.navigated = true;
                        vec![Effect::Navigate(nav)]
                    }
                    None => Vec::new(),
                }
            }

            // Late responses, duplicate timers, restarts: ignored.
            _ => Vec::new(),
        }
    }

    fn next_attempt_number(&self) -> u32 {
        self.pending_attempts + self.error_attempts + 1
    }

    fn start(&mut self) -> Vec<Effect> {
        if self.order_id.is_none() {
            return self.settle_delayed(
                Disposition::NoOrderId,
                Navigation::Home {
                    advisory: Advisory::error(NO_ORDER_ID_MESSAGE),
                },
                self.cfg.home_redirect_delay,
            );
        }
        self.phase = Phase::Processing;
        vec![Effect::Schedule {
            timer: Timer::ProcessingSplash,
            after: self.cfg.processing_splash,
        }]
    }

    fn on_status(&mut self, resp: OrderStatusResponse) -> Vec<Effect> {
        if resp.is_settled() {
            return self.settle_success();
        }

        if resp.is_not_found() {
            return self.settle_delayed(
                Disposition::NotFound,
                Navigation::Home {
                    advisory: Advisory::error(
                        "Order not found. If you were charged, please contact support with your payment reference.",
                    ),
                },
                self.cfg.home_redirect_delay,
            );
        }

        self.pending_attempts += 1;
        if self.pending_attempts >= self.cfg.max_attempts {
            return self.settle_timed_out();
        }

        self.phase = Phase::AwaitingRetry;
        vec![Effect::Schedule {
            timer: Timer::NextCheck,
            after: self.cfg.pending_interval,
        }]
    }

    fn on_transport_failure(&mut self, message: String) -> Vec<Effect> {
        self.error_attempts += 1;
        self.last_error = Some(message.clone());

        if self.error_attempts >= self.cfg.max_attempts {
            let receipt = self.receipt(false, false, Some(message.clone()));
            return self.settle_delayed(
                Disposition::Failed { message },
                Navigation::Receipt(receipt),
                self.cfg.receipt_redirect_delay,
            );
        }

        self.phase = Phase::AwaitingRetry;
        vec![Effect::Schedule {
            timer: Timer::NextCheck,
            after: self.cfg.error_backoff,
        }]
    }

    fn settle_success(&mut self) -> Vec<Effect> {
        if let Some(rec) = self.cached.as_mut() {
            rec.payment_status = PaymentStatus::Success;
        }
        self.phase = Phase::Settled(Disposition::Success);
        self.navigated = true;

        let receipt = self.receipt(true, false, None);
        vec![
            Effect::PurgeCurrentOrderMarker,
            Effect::DispatchNotification(self.notification(true)),
            Effect::Navigate(Navigation::Receipt(receipt)),
        ]
    }

    fn settle_timed_out(&mut self) -> Vec<Effect> {
        let receipt = self.receipt(true, true, None);
        let mut effects = vec![Effect::DispatchNotification(self.notification(true))];
        effects.extend(self.settle_delayed(
            Disposition::TimedOut,
            Navigation::Receipt(receipt),
            self.cfg.receipt_redirect_delay,
        ));
        effects
    }

    fn settle_delayed(
        &mut self,
        disposition: Disposition,
        nav: Navigation,
        after: Duration,
    ) -> Vec<Effect> {
        self.phase = Phase::Settled(disposition);
        self.pending_navigation = Some(nav);
        vec![Effect::Schedule {
            timer: Timer::Navigate,
            after,
        }]
    }

    fn receipt(
        &self,
        payment_success: bool,
        needs_verification: bool,
        error_message: Option<String>,
    ) -> ReceiptParams {
        ReceiptParams {
            order_id: self.order_id.clone().unwrap_or_default(),
            payment_success,
            from_cashfree: true,
            needs_verification,
            has_error: error_message.is_some(),
            error_message,
            order_data: self.cached.clone(),
        }
    }

    fn notification(&self, payment_success: bool) -> NotifyRequest {
        notify_request(
            self.order_id.as_deref().unwrap_or_default(),
            self.payment_id.clone(),
            self.cached.clone(),
            payment_success,
        )
    }
}

/// Body for the notification endpoint.
pub fn notify_request(
    order_id: &str,
    payment_id: Option<String>,
    order_data: Option<OrderRecord>,
    payment_success: bool,
) -> NotifyRequest {
    NotifyRequest {
        order_id: order_id.to_string(),
        payment_id,
        status: if payment_success { "SUCCESS" } else { "PENDING" }.to_string(),
        payment_success,
        order_data,
    }
}
