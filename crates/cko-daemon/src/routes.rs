//! Axum router and all HTTP handlers for cko-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` compose the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use cko_reconcile::{Advisory, ReturnRequest, NO_ORDER_ID_MESSAGE};
use cko_runtime::{submit_checkout, CheckoutError, Environment, ReconcileSession};
use cko_schemas::{new_order_id, CheckoutDraft, OrderRecord};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use url::Url;

use crate::{
    api_types::{
        CheckoutResponse, ErrorResponse, HealthResponse, ReceiptResponse, ReturnAccepted,
        ReturnRejected,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
///
/// `/forms/response/:token` is served by the wildcard route; the return-path
/// parser tells the two shapes apart.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/checkout", post(checkout))
        .route("/v1/receipt/:order_id", get(receipt))
        .route("/forms/response/*rest", get(payment_return))
        .route("/cashfree-response", get(payment_return))
        .route("/payment-success", get(payment_return))
        .route("/order-confirmation", get(payment_return))
        .with_state(state)
}

fn error_response(code: StatusCode, error: String, stage: Option<String>) -> Response {
    (code, Json(ErrorResponse { error, stage })).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            backend_healthy: st.is_backend_healthy(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/checkout
// ---------------------------------------------------------------------------

/// Prepare the draft, persist it, and hand back the gateway redirect.
///
/// A blank `orderId` gets a fresh one. 400 on an invalid draft, 502 when
/// `prepare-order` or `payment-form` fails.
pub(crate) async fn checkout(
    State(st): State<Arc<AppState>>,
    Json(mut draft): Json<CheckoutDraft>,
) -> Response {
    let now_ms = chrono::Utc::now().timestamp_millis();
    if draft.order_id.trim().is_empty() {
        draft.order_id = new_order_id(now_ms);
    }

    let record = match OrderRecord::prepare(draft, now_ms) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string(), None),
    };

    let return_base = match Url::parse(&st.settings.gateway.return_base_url) {
        Ok(u) => u,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("gateway.return_base_url: {e}"),
                None,
            )
        }
    };

    match submit_checkout(st.api.as_ref(), st.env.cache(), &record, &return_base).await {
        Ok(redirect) => {
            info!(order_id = %redirect.order_id, "checkout/redirect");
            (
                StatusCode::OK,
                Json(CheckoutResponse {
                    order_id: redirect.order_id,
                    redirect_url: redirect.url.to_string(),
                }),
            )
                .into_response()
        }
        Err(CheckoutError::HardApi { stage, source }) => {
            warn!(order_id = %record.order_id, stage, error = %source, "checkout failed");
            error_response(
                StatusCode::BAD_GATEWAY,
                source.to_string(),
                Some(stage.to_string()),
            )
        }
        Err(e) => {
            warn!(order_id = %record.order_id, error = %e, "checkout failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
        }
    }
}

// ---------------------------------------------------------------------------
// GET <payment return routes>
// ---------------------------------------------------------------------------

/// Gateway landing: resolve the order and start a reconciliation session.
pub(crate) async fn payment_return(State(st): State<Arc<AppState>>, uri: Uri) -> Response {
    let request = ReturnRequest::from_parts(uri.path(), uri.query());
    let env: Arc<dyn Environment> = st.env.clone();
    let session = ReconcileSession::spawn(
        env,
        Arc::clone(&st.api),
        st.session_config(),
        st.latch.clone(),
        &request,
    );

    let Some(resolution) = session.resolution().cloned() else {
        // Nothing to reconcile; the caller goes home straight away.
        drop(session);
        return (
            StatusCode::OK,
            Json(ReturnRejected {
                status: "no_order_id".to_string(),
                advisory: Advisory::error(NO_ORDER_ID_MESSAGE),
            }),
        )
            .into_response();
    };

    let status_url = format!("/v1/receipt/{}", resolution.order_id);
    st.insert_session(resolution.order_id.clone(), session).await;

    (
        StatusCode::ACCEPTED,
        Json(ReturnAccepted {
            order_id: resolution.order_id,
            source: resolution.source,
            status_url,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/receipt/:order_id
// ---------------------------------------------------------------------------

pub(crate) async fn receipt(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Response {
    if let Some(navigation) = st.env.navigation_for(&order_id) {
        return (StatusCode::OK, Json(ReceiptResponse::Settled { navigation })).into_response();
    }

    let sessions = st.sessions.read().await;
    match sessions.get(&order_id) {
        Some(held) => (
            StatusCode::OK,
            Json(ReceiptResponse::Pending {
                reconcile: held.session.snapshot(),
            }),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("no reconciliation for order {order_id}"),
            None,
        ),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
