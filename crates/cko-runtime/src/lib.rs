//! cko-runtime
//!
//! Async wiring between the pure reconciliation logic and the outside world.
//!
//! - [`submit_checkout`]: cache the order, prepare it, fetch the gateway form
//!   and build the redirect. Any failure is fatal and produces no redirect.
//! - [`ReconcileSession`]: drives one return visit on tokio tasks. The
//!   primary task runs the [`cko_reconcile::Reconciler`]; a second task runs
//!   the email watch. Both are aborted on shutdown or drop.
//! - [`wait_for_backend`]: health polling before the storefront accepts
//!   orders.
//!
//! All time is tokio time, so tests pause the clock and fast-forward.

mod checkout;
mod health;
mod session;

pub use checkout::{build_payment_redirect, return_url, submit_checkout, PaymentRedirect};
pub use health::{wait_for_backend, BackendWaitError};
pub use session::{Environment, ReconcileSession, SessionConfig};

use std::fmt;

use cko_cache::CacheError;
use cko_client::ApiError;

/// Checkout submission failures.
#[derive(Debug)]
pub enum CheckoutError {
    /// The local cache could not store the order.
    Cache(CacheError),
    /// `prepare-order` or `payment-form` failed. Fatal; the customer must
    /// resubmit.
    HardApi {
        stage: &'static str,
        source: ApiError,
    },
    /// The configured return base cannot carry a path.
    InvalidReturnBase(String),
}

impl fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutError::Cache(e) => write!(f, "order cache write failed: {e}"),
            CheckoutError::HardApi { stage, source } => {
                write!(f, "checkout failed at {stage}: {source}")
            }
            CheckoutError::InvalidReturnBase(msg) => write!(f, "invalid return base: {msg}"),
        }
    }
}

impl std::error::Error for CheckoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckoutError::Cache(e) => Some(e),
            CheckoutError::HardApi { source, .. } => Some(source),
            CheckoutError::InvalidReturnBase(_) => None,
        }
    }
}

impl From<CacheError> for CheckoutError {
    fn from(e: CacheError) -> Self {
        CheckoutError::Cache(e)
    }
}
