//! One return visit, driven on tokio tasks.
//!
//! ```text
//! spawn ─▶ resolve id ─▶ read back cached order ─▶ primary task
//!                                                     │ Reconciler effects
//!                                                     ├─ FetchStatus      → order-status
//!                                                     ├─ BeginEmailWatch  → email task (interval)
//!                                                     ├─ DispatchNotify   → notify task (1 retry)
//!                                                     └─ Navigate         → Environment + outcome
//! ```
//!
//! Shared state sits behind short `std::sync::Mutex` sections that are never
//! held across an await.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cko_cache::{OrderCache, OrderCacheExt, OrderReadback};
use cko_client::CheckoutApi;
use cko_config::ReconcileSettings;
use cko_reconcile::{
    notify_request, resolve_order_id, Disposition, Effect, EmailWatch, Event, Navigation, Phase,
    ReconcileConfig, ReconciliationState, Reconciler, Resolution, RetriggerLatch, ReturnRequest,
    Timer,
};
use cko_schemas::NotifyRequest;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Notification attempts: the first dispatch plus one retry.
const NOTIFY_ATTEMPTS: u32 = 2;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Host of a session: storage, navigation and display.
pub trait Environment: Send + Sync {
    fn cache(&self) -> &dyn OrderCache;

    /// Read-once bookkeeping; must outlive individual sessions.
    fn readback(&self) -> &OrderReadback;

    /// Whether a return without an id may resolve through the cache's
    /// `current_order_id` marker. Hosts whose cache is shared between
    /// customers must answer `false`.
    fn uses_order_marker(&self) -> bool {
        true
    }

    /// Called exactly once per session. `order_id` is `None` for the
    /// no-order-id outcome.
    fn navigate(&self, order_id: Option<&str>, nav: &Navigation);

    /// Display state changed.
    fn observe(&self, _state: &ReconciliationState) {}
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub reconcile: ReconcileConfig,
    pub email_poll_interval: Duration,
    pub notify_retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconcile: ReconcileConfig::default(),
            email_poll_interval: Duration::from_secs(2),
            notify_retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&ReconcileSettings> for SessionConfig {
    fn from(s: &ReconcileSettings) -> Self {
        Self {
            reconcile: ReconcileConfig {
                max_attempts: s.max_attempts,
                pending_interval: Duration::from_millis(s.pending_interval_ms),
                error_backoff: Duration::from_millis(s.error_backoff_ms),
                processing_splash: Duration::from_millis(s.processing_splash_ms),
                home_redirect_delay: Duration::from_millis(s.home_redirect_delay_ms),
                receipt_redirect_delay: Duration::from_millis(s.receipt_redirect_delay_ms),
            },
            email_poll_interval: Duration::from_millis(s.email_poll_interval_ms),
            notify_retry_delay: Duration::from_millis(s.notify_retry_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

struct Ctx {
    env: Arc<dyn Environment>,
    api: Arc<dyn CheckoutApi>,
    cfg: SessionConfig,
    latch: RetriggerLatch,
    order_id: Option<String>,
    machine: Mutex<Reconciler>,
    email: Mutex<Option<EmailWatch>>,
    /// Body used by the safety re-trigger; last dispatched, else the template.
    notification: Mutex<Option<NotifyRequest>>,
    email_task: Mutex<Option<JoinHandle<()>>>,
    notify_tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl Ctx {
    fn snapshot(&self) -> Option<ReconciliationState> {
        let machine = lock(&self.machine);
        let email = lock(&self.email);
        machine.snapshot(email.as_ref())
    }

    fn publish_state(&self) {
        if let Some(s) = self.snapshot() {
            self.env.observe(&s);
        }
    }

    fn spawn_notification(self: &Arc<Self>, req: NotifyRequest) {
        *lock(&self.notification) = Some(req.clone());
        let ctx = Arc::clone(self);
        let handle = tokio::spawn(async move { ctx.notify(req).await });
        lock(&self.notify_tasks).push(handle);
    }

    /// POST the notification, retrying once after `notify_retry_delay`.
    async fn notify(&self, req: NotifyRequest) {
        let order_id = req.order_id.as_str();
        let mut attempt = 1;
        loop {
            let failure = match self.api.notify_success(&req).await {
                Ok(resp) if resp.success => {
                    info!(order_id, attempt, emails_sent = ?resp.emails_sent, "notification accepted");
                    if let Some(w) = lock(&self.email).as_mut() {
                        w.on_notify_response(&resp);
                    }
                    self.publish_state();
                    return;
                }
                Ok(_) => "backend answered success=false".to_string(),
                Err(e) => e.to_string(),
            };

            if attempt >= NOTIFY_ATTEMPTS {
                warn!(order_id, attempt, error = %failure, "notification failed; giving up");
                return;
            }
            warn!(order_id, attempt, error = %failure, "notification failed; retrying");
            attempt += 1;
            tokio::time::sleep(self.cfg.notify_retry_delay).await;
        }
    }

    fn begin_email_watch(self: &Arc<Self>, order_id: String) {
        *lock(&self.email) = Some(EmailWatch::new(order_id.clone(), self.latch.clone()));
        let ctx = Arc::clone(self);
        let handle = tokio::spawn(async move { ctx.watch_email(order_id).await });
        if let Some(prev) = lock(&self.email_task).replace(handle) {
            prev.abort();
        }
    }

    /// Runs until aborted. Poll failures are logged and skipped.
    async fn watch_email(&self, order_id: String) {
        let period = self.cfg.email_poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let resp = match self.api.email_status(&order_id).await {
                Ok(r) => r,
                Err(e) => {
                    debug!(order_id = %order_id, error = %e, "email status poll failed");
                    continue;
                }
            };

            let retrigger = lock(&self.email)
                .as_mut()
                .and_then(|w| w.on_email_status(&resp));
            self.publish_state();

            if let Some(r) = retrigger {
                warn!(order_id = %r.order_id, "no notification emails recorded; re-sending once");
                let req = lock(&self.notification).clone().unwrap_or_else(|| {
                    notify_request(&r.order_id, None, None, true)
                });
                match self.api.notify_success(&req).await {
                    Ok(resp) => {
                        if let Some(w) = lock(&self.email).as_mut() {
                            w.on_notify_response(&resp);
                        }
                        self.publish_state();
                    }
                    Err(e) => warn!(order_id = %r.order_id, error = %e, "safety re-send failed"),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Primary driver
// ---------------------------------------------------------------------------

/// Feed events into the machine and execute its effects until nothing is
/// left: no queued event and no scheduled timer.
async fn drive(ctx: Arc<Ctx>, outcome: watch::Sender<Option<Navigation>>) {
    let order_id = ctx.order_id.as_deref();
    let mut queue = VecDeque::from([Event::Start]);
    let mut timer: Option<(Timer, Duration)> = None;

    loop {
        let event = match queue.pop_front() {
            Some(ev) => ev,
            None => match timer.take() {
                Some((t, after)) => {
                    tokio::time::sleep(after).await;
                    Event::TimerFired(t)
                }
                None => break,
            },
        };

        let (before, effects, after) = {
            let mut m = lock(&ctx.machine);
            let before = m.phase().clone();
            let effects = m.handle(event);
            (before, effects, m.phase().clone())
        };
        if before != after {
            log_transition(order_id, &after);
        }

        for effect in effects {
            match effect {
                Effect::Schedule { timer: t, after } => timer = Some((t, after)),
                Effect::FetchStatus { order_id, attempt } => {
                    debug!(order_id = %order_id, attempt, "checking order status");
                    let ev = match ctx.api.order_status(&order_id).await {
                        Ok(resp) => Event::StatusReceived(resp),
                        Err(e) => {
                            warn!(order_id = %order_id, attempt, error = %e, "status check failed");
                            Event::TransportFailed(e.to_string())
                        }
                    };
                    queue.push_back(ev);
                }
                Effect::BeginEmailWatch { order_id } => ctx.begin_email_watch(order_id),
                Effect::PurgeCurrentOrderMarker => {
                    if let Err(e) = ctx.env.cache().clear_current_order_id() {
                        warn!(error = %e, "could not clear current-order marker");
                    }
                }
                Effect::DispatchNotification(req) => ctx.spawn_notification(req),
                Effect::Navigate(nav) => {
                    info!(order_id = ?order_id, navigation = ?nav_kind(&nav), "navigating");
                    ctx.env.navigate(order_id, &nav);
                    outcome.send_replace(Some(nav));
                }
            }
        }
        ctx.publish_state();
    }
}

fn nav_kind(nav: &Navigation) -> &'static str {
    match nav {
        Navigation::Home { .. } => "home",
        Navigation::Receipt(_) => "receipt",
    }
}

fn log_transition(order_id: Option<&str>, phase: &Phase) {
    match phase {
        Phase::Settled(Disposition::TimedOut) => {
            warn!(order_id = ?order_id, "attempt budget exhausted; confirming optimistically")
        }
        Phase::Settled(Disposition::Failed { message }) => {
            warn!(order_id = ?order_id, error = %message, "status checks kept failing")
        }
        Phase::Settled(Disposition::NoOrderId) => {
            warn!("no order id on return; sending customer home")
        }
        other => info!(order_id = ?order_id, phase = ?other, "reconcile transition"),
    }
}

// ---------------------------------------------------------------------------
// Session handle
// ---------------------------------------------------------------------------

/// Handle to a running reconciliation. Dropping it tears everything down.
pub struct ReconcileSession {
    resolution: Option<Resolution>,
    ctx: Arc<Ctx>,
    primary: JoinHandle<()>,
    outcome: watch::Receiver<Option<Navigation>>,
}

impl ReconcileSession {
    /// Resolve the order id, take the cached record, and start driving.
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        env: Arc<dyn Environment>,
        api: Arc<dyn CheckoutApi>,
        cfg: SessionConfig,
        latch: RetriggerLatch,
        request: &ReturnRequest,
    ) -> Self {
        let marker = if env.uses_order_marker() {
            env.cache().current_order_id().unwrap_or_else(|e| {
                warn!(error = %e, "current-order marker unreadable");
                None
            })
        } else {
            None
        };

        let resolution = resolve_order_id(request, marker.as_deref());
        let order_id = resolution.as_ref().map(|r| r.order_id.clone());

        let cached = match &order_id {
            Some(id) => match env.readback().take(env.cache(), id) {
                Ok(rb) => rb.map(|rb| rb.record),
                Err(e) => {
                    warn!(order_id = %id, error = %e, "cached order unreadable");
                    None
                }
            },
            None => None,
        };

        match &resolution {
            Some(r) => info!(
                order_id = %r.order_id,
                source = ?r.source,
                cached = cached.is_some(),
                "payment return resolved"
            ),
            None => warn!(route = ?request.route.as_ref().map(|r| r.pattern()), "payment return without order id"),
        }

        let payment_id = request.payment_id().map(str::to_string);
        let template = order_id
            .as_deref()
            .map(|id| notify_request(id, payment_id.clone(), cached.clone(), true));

        let machine = Reconciler::new(cfg.reconcile.clone(), order_id.clone())
            .with_cached_order(cached)
            .with_payment_id(payment_id);

        let ctx = Arc::new(Ctx {
            env,
            api,
            cfg,
            latch,
            order_id,
            machine: Mutex::new(machine),
            email: Mutex::new(None),
            notification: Mutex::new(template),
            email_task: Mutex::new(None),
            notify_tasks: Mutex::new(Vec::new()),
        });

        let (tx, rx) = watch::channel(None);
        let primary = tokio::spawn(drive(Arc::clone(&ctx), tx));

        Self {
            resolution,
            ctx,
            primary,
            outcome: rx,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        self.ctx.order_id.as_deref()
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn snapshot(&self) -> Option<ReconciliationState> {
        self.ctx.snapshot()
    }

    pub fn disposition(&self) -> Option<Disposition> {
        lock(&self.ctx.machine).disposition().cloned()
    }

    /// The navigation, once emitted.
    pub fn navigation(&self) -> Option<Navigation> {
        self.outcome.borrow().clone()
    }

    /// Wait for the navigation. `None` if the session was shut down first.
    pub async fn outcome(&self) -> Option<Navigation> {
        wait_for_navigation(self.outcome.clone()).await
    }

    /// As [`ReconcileSession::outcome`], detached from the handle so it can
    /// be moved into another task.
    pub fn outcome_future(&self) -> impl Future<Output = Option<Navigation>> + Send + 'static {
        wait_for_navigation(self.outcome.clone())
    }

    /// Wait for every notification dispatched so far, retries included.
    pub async fn flush_notifications(&self) {
        let pending: Vec<JoinHandle<()>> = lock(&self.ctx.notify_tasks).drain(..).collect();
        for handle in pending {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.primary.is_finished()
    }

    /// Abort the primary task, the email watch and any notification in
    /// flight. Idempotent.
    pub fn shutdown(&self) {
        self.primary.abort();
        if let Some(h) = lock(&self.ctx.email_task).take() {
            h.abort();
        }
        for h in lock(&self.ctx.notify_tasks).drain(..) {
            h.abort();
        }
    }
}

async fn wait_for_navigation(mut rx: watch::Receiver<Option<Navigation>>) -> Option<Navigation> {
    loop {
        if let Some(nav) = rx.borrow_and_update().clone() {
            return Some(nav);
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

impl Drop for ReconcileSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
