//! cko-config
//!
//! Layered YAML configuration for the checkout tools.
//!
//! - Documents merge in order: earlier docs are base, later docs override.
//! - Literal secrets are rejected (`CONFIG_SECRET_DETECTED`).
//! - The merged document is canonicalized and hashed (SHA-256) so a run can
//!   log exactly which configuration it used.
//! - [`CheckoutSettings`] is the typed view every binary consumes.

mod settings;

pub use settings::{
    BackendSettings, CheckoutSettings, GatewaySettings, HealthSettings, ReconcileSettings,
    ENV_BACKEND_URL,
};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Leaf string values starting with any of these abort the load.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "cfsk_",      // Cashfree secret key
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "xoxb-",      // Slack bot token
];

/// Every leaf [`CheckoutSettings`] reads, as JSON pointers.
///
/// Keep in sync with `settings.rs`; anything else in operator config is a
/// typo or a leftover and gets reported by [`unused_keys`].
pub const CONSUMED_POINTERS: &[&str] = &[
    "/backend/base_url",
    "/gateway/return_base_url",
    "/reconcile/max_attempts",
    "/reconcile/pending_interval_ms",
    "/reconcile/error_backoff_ms",
    "/reconcile/processing_splash_ms",
    "/reconcile/home_redirect_delay_ms",
    "/reconcile/receipt_redirect_delay_ms",
    "/reconcile/email_poll_interval_ms",
    "/reconcile/notify_retry_delay_ms",
    "/reconcile/email_watch_ttl_ms",
    "/health/poll_interval_ms",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed settings from the merged document.
    pub fn settings(&self) -> Result<CheckoutSettings> {
        CheckoutSettings::from_config_json(&self.config_json)
    }

    pub fn unused_keys(&self) -> Vec<String> {
        unused_keys(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null; it overrides nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    for (ptr, leaf) in leaves(&merged) {
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }

    // serde_json's default Map is ordered by key, so compact output is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Leaf pointers of `config_json` that no setting reads, sorted.
pub fn unused_keys(config_json: &Value) -> Vec<String> {
    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !CONSUMED_POINTERS.contains(&ptr.as_str()))
        .collect();
    unused.sort();
    unused
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Scalar and null leaves with their JSON pointers. Object keys are escaped
/// per RFC 6901; arrays contribute their indices.
fn leaves(v: &Value) -> Vec<(String, &Value)> {
    fn walk<'a>(v: &'a Value, ptr: String, out: &mut Vec<(String, &'a Value)>) {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    walk(child, format!("{ptr}/{token}"), out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    walk(child, format!("{ptr}/{i}"), out);
                }
            }
            _ => out.push((ptr, v)),
        }
    }

    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
