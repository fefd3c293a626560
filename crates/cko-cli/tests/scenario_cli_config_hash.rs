use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;

/// `cko-cli config-hash` prints a stable hash followed by canonical JSON, and
/// later layers override earlier ones.
#[test]
fn cli_config_hash_merges_layers_and_is_stable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    let local = dir.path().join("local.yaml");
    fs::write(
        &base,
        "backend:\n  base_url: http://127.0.0.1:5000\nreconcile:\n  max_attempts: 30\n",
    )?;
    fs::write(&local, "reconcile:\n  max_attempts: 5\n")?;

    let base_s = base.to_string_lossy().to_string();
    let local_s = local.to_string_lossy().to_string();

    let first = assert_cmd::Command::cargo_bin("cko-cli")?
        .args(["config-hash", &base_s, &local_s])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("config_hash="))
        .stdout(predicate::str::contains("\"max_attempts\":5"))
        .get_output()
        .stdout
        .clone();

    let second = assert_cmd::Command::cargo_bin("cko-cli")?
        .args(["config-hash", &base_s, &local_s])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(first, second, "hash must be deterministic");
    Ok(())
}

#[test]
fn cli_config_hash_requires_paths() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("cko-cli")?
        .arg("config-hash")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
    Ok(())
}

#[test]
fn cli_config_hash_refuses_secret_literals() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let p = dir.path().join("bad.yaml");
    fs::write(&p, "backend:\n  api_key: sk_live_abcdef\n")?;
    let p_s = p.to_string_lossy().to_string();

    assert_cmd::Command::cargo_bin("cko-cli")?
        .args(["config-hash", &p_s])
        .assert()
        .failure();
    Ok(())
}
