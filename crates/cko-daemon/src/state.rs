//! Shared runtime state for cko-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Reconciliation sessions
//! live in `sessions`, keyed by order id; replacing or removing an entry shuts
//! the old session down. A session that has navigated is retired
//! `reconcile.email_watch_ttl_ms` later, which also stops its email watch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use cko_cache::{OrderCache, OrderReadback};
use cko_client::CheckoutApi;
use cko_config::CheckoutSettings;
use cko_reconcile::{Navigation, ReconciliationState, RetriggerLatch};
use cko_runtime::{Environment, ReconcileSession, SessionConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    /// A session reached its terminal navigation.
    Navigation {
        order_id: Option<String>,
        navigation: Navigation,
    },
    ReconcileState(ReconciliationState),
    Backend {
        healthy: bool,
        detail: Option<String>,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Navigation { .. } => "navigation",
            BusMsg::ReconcileState(_) => "reconcile_state",
            BusMsg::Backend { .. } => "backend",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// DaemonEnv
// ---------------------------------------------------------------------------

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Session host: the order cache, read-once bookkeeping, and the record of
/// terminal navigations that `GET /v1/receipt/:order_id` serves.
///
/// One cache serves every customer, so a return is matched to an order only
/// by the id it carries: the `current_order_id` marker and the
/// first-available fallback are both off.
pub struct DaemonEnv {
    cache: Box<dyn OrderCache>,
    readback: OrderReadback,
    bus: broadcast::Sender<BusMsg>,
    navigations: Mutex<BTreeMap<String, Navigation>>,
}

impl DaemonEnv {
    pub fn new(cache: Box<dyn OrderCache>, bus: broadcast::Sender<BusMsg>) -> Self {
        Self {
            cache,
            readback: OrderReadback::exact_only(),
            bus,
            navigations: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn navigation_for(&self, order_id: &str) -> Option<Navigation> {
        lock(&self.navigations).get(order_id).cloned()
    }

    fn forget_navigation(&self, order_id: &str) {
        lock(&self.navigations).remove(order_id);
    }
}

impl Environment for DaemonEnv {
    fn cache(&self) -> &dyn OrderCache {
        self.cache.as_ref()
    }

    fn readback(&self) -> &OrderReadback {
        &self.readback
    }

    fn uses_order_marker(&self) -> bool {
        false
    }

    fn navigate(&self, order_id: Option<&str>, nav: &Navigation) {
        if let Some(id) = order_id {
            lock(&self.navigations).insert(id.to_string(), nav.clone());
        }
        let _ = self.bus.send(BusMsg::Navigation {
            order_id: order_id.map(str::to_string),
            navigation: nav.clone(),
        });
    }

    fn observe(&self, state: &ReconciliationState) {
        let _ = self.bus.send(BusMsg::ReconcileState(state.clone()));
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// A session plus the insertion stamp its retirement timer checks against.
pub struct HeldSession {
    pub generation: u64,
    pub session: ReconcileSession,
}

/// Shared handle across all Axum handlers.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub settings: CheckoutSettings,
    pub api: Arc<dyn CheckoutApi>,
    pub env: Arc<DaemonEnv>,
    /// Safety re-trigger latch shared by every session of this daemon.
    pub latch: RetriggerLatch,
    /// Live and recently settled sessions, keyed by order id.
    pub sessions: RwLock<BTreeMap<String, HeldSession>>,
    next_generation: AtomicU64,
    /// Last `/health` check result; false until the first success.
    pub backend_healthy: AtomicBool,
}

impl AppState {
    pub fn new(
        settings: CheckoutSettings,
        api: Arc<dyn CheckoutApi>,
        cache: Box<dyn OrderCache>,
    ) -> Self {
        Self::with_latch(settings, api, cache, RetriggerLatch::process_wide())
    }

    /// As [`AppState::new`] with an explicit latch (tests use a fresh one).
    pub fn with_latch(
        settings: CheckoutSettings,
        api: Arc<dyn CheckoutApi>,
        cache: Box<dyn OrderCache>,
        latch: RetriggerLatch,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let env = Arc::new(DaemonEnv::new(cache, bus.clone()));
        Self {
            bus,
            build: BuildInfo {
                service: "cko-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            settings,
            api,
            env,
            latch,
            sessions: RwLock::new(BTreeMap::new()),
            next_generation: AtomicU64::new(0),
            backend_healthy: AtomicBool::new(false),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from(&self.settings.reconcile)
    }

    pub fn is_backend_healthy(&self) -> bool {
        self.backend_healthy.load(Ordering::SeqCst)
    }

    pub fn email_watch_ttl(&self) -> Duration {
        Duration::from_millis(self.settings.reconcile.email_watch_ttl_ms)
    }

    /// Store a session; any session already held for the same order is
    /// shut down by the replacement. Once the session navigates it is
    /// retired after [`AppState::email_watch_ttl`].
    pub async fn insert_session(self: &Arc<Self>, order_id: String, session: ReconcileSession) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let settled = session.outcome_future();

        let old = self
            .sessions
            .write()
            .await
            .insert(order_id.clone(), HeldSession { generation, session });
        if let Some(old) = old {
            info!(order_id = %order_id, "replacing reconcile session");
            old.session.shutdown();
        }

        let ttl = self.email_watch_ttl();
        let state: Weak<AppState> = Arc::downgrade(self);
        tokio::spawn(async move {
            // None: shut down before navigating; whoever did that owns cleanup.
            if settled.await.is_none() {
                return;
            }
            tokio::time::sleep(ttl).await;
            if let Some(state) = state.upgrade() {
                state.retire_session(&order_id, generation).await;
            }
        });
    }

    /// Drop the session for `order_id` if it is still the one stamped
    /// `generation`, along with its recorded navigation.
    pub async fn retire_session(&self, order_id: &str, generation: u64) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(order_id) {
            Some(held) if held.generation == generation => {}
            _ => {
                debug!(order_id, generation, "session already replaced; nothing to retire");
                return false;
            }
        }
        if let Some(held) = sessions.remove(order_id) {
            held.session.shutdown();
        }
        self.env.forget_navigation(order_id);
        drop(sessions);
        info!(order_id, "reconcile session retired");
        true
    }

    /// Shut down and drop every session.
    pub async fn shutdown_sessions(&self) {
        let drained = std::mem::take(&mut *self.sessions.write().await);
        for held in drained.values() {
            held.session.shutdown();
        }
        info!(count = drained.len(), "reconcile sessions shut down");
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that checks the backend `/health` every
/// `interval` and broadcasts transitions.
pub fn spawn_backend_health(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let (healthy, detail) = match state.api.health().await {
                Ok(h) => (true, h.status),
                Err(e) => (false, Some(e.to_string())),
            };
            let was = state.backend_healthy.swap(healthy, Ordering::SeqCst);
            if was != healthy {
                if healthy {
                    info!("backend healthy");
                } else {
                    warn!(detail = ?detail, "backend unhealthy");
                }
                let _ = state.bus.send(BusMsg::Backend { healthy, detail });
            }
        }
    });
}
