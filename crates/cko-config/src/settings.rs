//! Typed checkout settings.
//!
//! Every key is optional. Defaults reproduce the storefront's fixed cadence:
//! 30 status checks at 1 s, transport retries at 2 s, a 2 s processing
//! splash, the email-status poll every 2 s and the health poll every 5 s.
//! A settled daemon session is retired after a minute.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overrides `backend.base_url` when set.
pub const ENV_BACKEND_URL: &str = "CKO_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Public base the payment gateway redirects back to.
    pub return_base_url: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            return_base_url: "http://127.0.0.1:8898".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub max_attempts: u32,
    pub pending_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub processing_splash_ms: u64,
    pub home_redirect_delay_ms: u64,
    pub receipt_redirect_delay_ms: u64,
    pub email_poll_interval_ms: u64,
    pub notify_retry_delay_ms: u64,
    /// How long the daemon keeps a settled session (and its email watch)
    /// before retiring it.
    pub email_watch_ttl_ms: u64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            pending_interval_ms: 1_000,
            error_backoff_ms: 2_000,
            processing_splash_ms: 2_000,
            home_redirect_delay_ms: 3_000,
            receipt_redirect_delay_ms: 2_000,
            email_poll_interval_ms: 2_000,
            notify_retry_delay_ms: 2_000,
            email_watch_ttl_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub poll_interval_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSettings {
    pub backend: BackendSettings,
    pub gateway: GatewaySettings,
    pub reconcile: ReconcileSettings,
    pub health: HealthSettings,
}

impl CheckoutSettings {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let s: CheckoutSettings =
            serde_json::from_value(v.clone()).context("checkout settings decode failed")?;
        s.validate()?;
        Ok(s)
    }

    /// Apply `CKO_BACKEND_URL` if present and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_BACKEND_URL) {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().to_string();
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("backend.base_url", &self.backend.base_url),
            ("gateway.return_base_url", &self.gateway.return_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("CONFIG_INVALID {name}: expected http(s) url, got '{url}'");
            }
        }

        let r = &self.reconcile;
        if r.max_attempts == 0 {
            bail!("CONFIG_INVALID reconcile.max_attempts must be >= 1");
        }
        for (name, ms) in [
            ("reconcile.pending_interval_ms", r.pending_interval_ms),
            ("reconcile.error_backoff_ms", r.error_backoff_ms),
            ("reconcile.email_poll_interval_ms", r.email_poll_interval_ms),
            ("reconcile.email_watch_ttl_ms", r.email_watch_ttl_ms),
            ("health.poll_interval_ms", self.health.poll_interval_ms),
        ] {
            if ms == 0 {
                bail!("CONFIG_INVALID {name} must be > 0");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_yields_defaults() {
        let s = CheckoutSettings::from_config_json(&json!({})).unwrap();
        assert_eq!(s, CheckoutSettings::default());
        assert_eq!(s.reconcile.max_attempts, 30);
        assert_eq!(s.health.poll_interval_ms, 5_000);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let s = CheckoutSettings::from_config_json(&json!({
            "reconcile": { "max_attempts": 5 }
        }))
        .unwrap();
        assert_eq!(s.reconcile.max_attempts, 5);
        assert_eq!(s.reconcile.pending_interval_ms, 1_000);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = CheckoutSettings::from_config_json(&json!({
            "reconcile": { "max_attempts": 0 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn non_http_backend_is_rejected() {
        let err = CheckoutSettings::from_config_json(&json!({
            "backend": { "base_url": "ftp://x" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("backend.base_url"));
    }
}
