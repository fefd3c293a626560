//! Backend readiness wait.

use std::fmt;
use std::time::Duration;

use cko_client::{ApiError, CheckoutApi};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendWaitError {
    pub waited: Duration,
    pub checks: u32,
    pub last_error: Option<ApiError>,
}

impl fmt::Display for BackendWaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backend not healthy after {:?} ({} checks)",
            self.waited, self.checks
        )?;
        if let Some(e) = &self.last_error {
            write!(f, ": {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendWaitError {}

/// Check `/health` every `every` until it answers 2xx or `max_wait` elapses.
///
/// The first check is immediate. Returns the number of checks used.
pub async fn wait_for_backend(
    api: &dyn CheckoutApi,
    every: Duration,
    max_wait: Duration,
) -> Result<u32, BackendWaitError> {
    let started = Instant::now();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut checks = 0u32;
    let mut last_error = None;
    loop {
        ticker.tick().await;
        let waited = started.elapsed();
        if checks > 0 && waited > max_wait {
            return Err(BackendWaitError {
                waited,
                checks,
                last_error,
            });
        }

        checks += 1;
        match api.health().await {
            Ok(h) => {
                info!(checks, status = ?h.status, "backend healthy");
                return Ok(checks);
            }
            Err(e) => {
                debug!(checks, error = %e, "backend not ready");
                last_error = Some(e);
            }
        }
    }
}
