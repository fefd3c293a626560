//! Command handler modules for cko-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod backend;
pub mod checkout;
pub mod reconcile;

use anyhow::{Context, Result};
use cko_cache::FileOrderCache;
use cko_client::HttpCheckoutApi;
use cko_config::CheckoutSettings;
use serde::de::DeserializeOwned;
use std::fs;

/// Order cache file used when `CKO_CACHE_PATH` is unset. Shared with the
/// daemon so a checkout and its return see the same records.
pub const DEFAULT_CACHE_PATH: &str = "cko-order-cache.json";

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Log to stderr so stdout carries only command output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Typed settings from layered YAML (defaults when no paths are given),
/// with `CKO_BACKEND_URL` applied.
pub fn load_settings(config_paths: &[String]) -> Result<CheckoutSettings> {
    let settings = if config_paths.is_empty() {
        CheckoutSettings::default()
    } else {
        let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
        let loaded = cko_config::load_layered_yaml(&path_refs)?;
        tracing::info!(config_hash = %loaded.config_hash, "config loaded");
        let unused = loaded.unused_keys();
        if !unused.is_empty() {
            tracing::warn!(keys = ?unused, "config keys not read by any setting");
        }
        loaded.settings()?
    };
    let settings = settings.with_env_overrides();
    settings.validate()?;
    Ok(settings)
}

pub fn http_api(settings: &CheckoutSettings) -> Result<HttpCheckoutApi> {
    HttpCheckoutApi::new(&settings.backend.base_url)
        .with_context(|| format!("backend.base_url '{}'", settings.backend.base_url))
}

pub fn open_cache() -> Result<FileOrderCache> {
    cko_cache::open_from_env(DEFAULT_CACHE_PATH).context("order cache open failed")
}

/// Read a JSON file, tolerating a UTF-8 BOM.
pub fn read_json_file<T: DeserializeOwned>(path: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    serde_json::from_slice(bytes).with_context(|| format!("{} must contain valid JSON", path))
}
