//! Offline stand-in for the return page: one session, printed outcome.

use std::sync::Arc;

use anyhow::{Context, Result};
use cko_cache::{FileOrderCache, OrderCache, OrderReadback};
use cko_reconcile::{Navigation, ReconciliationState, RetriggerLatch, ReturnRequest};
use cko_runtime::{Environment, ReconcileSession, SessionConfig};
use tracing::{debug, info};

struct CliEnv {
    cache: FileOrderCache,
    readback: OrderReadback,
}

impl Environment for CliEnv {
    fn cache(&self) -> &dyn OrderCache {
        &self.cache
    }

    fn readback(&self) -> &OrderReadback {
        &self.readback
    }

    fn navigate(&self, order_id: Option<&str>, nav: &Navigation) {
        info!(order_id = ?order_id, "navigation emitted");
        debug!(?nav);
    }

    fn observe(&self, state: &ReconciliationState) {
        debug!(
            attempts = state.attempts,
            status = ?state.status,
            emails_sent = ?state.emails_sent,
            "reconcile state"
        );
    }
}

pub async fn run(return_url: &str, config_paths: &[String]) -> Result<()> {
    let settings = super::load_settings(config_paths)?;
    let api = super::http_api(&settings)?;
    let request = ReturnRequest::from_url(return_url)?;

    let env = CliEnv {
        cache: super::open_cache()?,
        readback: OrderReadback::new(),
    };

    let session = ReconcileSession::spawn(
        Arc::new(env),
        Arc::new(api),
        SessionConfig::from(&settings.reconcile),
        RetriggerLatch::process_wide(),
        &request,
    );

    let navigation = session
        .outcome()
        .await
        .context("reconciliation ended without a navigation")?;
    session.flush_notifications().await;

    let out = serde_json::json!({
        "order_id": session.order_id(),
        "resolution": session.resolution(),
        "disposition": session.disposition(),
        "navigation": navigation,
    });
    session.shutdown();

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
