//! cko-reconcile
//!
//! Payment reconciliation after the gateway redirect.
//!
//! - [`return_path`]: which URL shapes the gateway may land on and how the
//!   order id is extracted from them (query > route > cached marker).
//! - [`machine`]: the status-polling state machine. Bounded attempts, slower
//!   backoff on transport failure, four terminal dispositions, exactly one
//!   navigation.
//! - [`email`]: the secondary email-status watch and its one-shot safety
//!   re-trigger.
//!
//! Deterministic, pure logic. No IO, no clock, no timers. The runtime feeds
//! events in and executes the returned effects.

pub mod email;
pub mod machine;
pub mod return_path;

pub use email::{EmailWatch, Retrigger, RetriggerLatch};
pub use machine::{
    notify_request, Advisory, AdvisoryLevel, Disposition, Effect, Event, Navigation, Phase,
    ReceiptParams, ReconcileConfig, ReconcileStatus, ReconciliationState, Reconciler, Timer,
    NO_ORDER_ID_MESSAGE,
};
pub use return_path::{
    resolve_order_id, Resolution, ResolutionSource, ReturnRequest, ReturnRoute, ReturnUrlError,
};
