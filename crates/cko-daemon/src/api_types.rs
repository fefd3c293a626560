//! Request and response types for all cko-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use cko_reconcile::{Advisory, Navigation, ReconciliationState, ResolutionSource};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// Result of the most recent backend `/health` check.
    pub backend_healthy: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Failing stage or endpoint, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /v1/checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub redirect_url: String,
}

// ---------------------------------------------------------------------------
// Payment return routes
// ---------------------------------------------------------------------------

/// 202: a reconciliation session was started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnAccepted {
    pub order_id: String,
    pub source: ResolutionSource,
    /// Where to poll for the outcome.
    pub status_url: String,
}

/// 200: no order id could be resolved; the customer goes home.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRejected {
    pub status: String,
    pub advisory: Advisory,
}

// ---------------------------------------------------------------------------
// GET /v1/receipt/:order_id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReceiptResponse {
    Settled { navigation: Navigation },
    Pending { reconcile: Option<ReconciliationState> },
}
