use std::time::Duration;

use anyhow::Result;
use cko_runtime::wait_for_backend;

pub async fn wait(max_wait_secs: u64, config_paths: &[String]) -> Result<()> {
    let settings = super::load_settings(config_paths)?;
    let api = super::http_api(&settings)?;

    let checks = wait_for_backend(
        &api,
        Duration::from_millis(settings.health.poll_interval_ms),
        Duration::from_secs(max_wait_secs),
    )
    .await?;

    println!("backend_ready=true checks={}", checks);
    Ok(())
}
