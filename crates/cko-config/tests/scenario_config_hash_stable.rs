//! Scenario: config hash stability
//!
//! GREEN when:
//! - the same inputs hash identically
//! - reordering keys within YAML does not change the hash
//! - a different value changes the hash
//! - overlays override base values

use cko_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
backend:
  base_url: "http://127.0.0.1:5000"
reconcile:
  max_attempts: 30
  pending_interval_ms: 1000
"#;

const BASE_YAML_REORDERED: &str = r#"
reconcile:
  pending_interval_ms: 1000
  max_attempts: 30
backend:
  base_url: "http://127.0.0.1:5000"
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  max_attempts: 10
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn overlay_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);

    let s = layered.settings().unwrap();
    assert_eq!(s.reconcile.max_attempts, 10, "later layer overrides");
    assert_eq!(s.reconcile.pending_interval_ms, 1000, "untouched keys survive");
    assert_eq!(s.backend.base_url, "http://127.0.0.1:5000");
}

#[test]
fn hash_is_sha256_hex() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash.len(), 64);
    assert!(a.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
