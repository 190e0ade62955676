use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

fn smx(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("smx").unwrap();
    // Keep any developer .env.local out of the picture.
    cmd.current_dir(dir);
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn config_hash_is_independent_of_key_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    fs::write(&a, "reconcile:\n  reference_lag_hours: 24\nlotus:\n  timeout_secs: 10\n")?;
    fs::write(&b, "lotus:\n  timeout_secs: 10\nreconcile:\n  reference_lag_hours: 24\n")?;

    let out_a = smx(dir.path()).arg("config-hash").arg(&a).output()?;
    let out_b = smx(dir.path()).arg("config-hash").arg(&b).output()?;
    assert!(out_a.status.success());
    assert_eq!(out_a.stdout, out_b.stdout);

    let stdout = String::from_utf8(out_a.stdout)?;
    let first = stdout.lines().next().unwrap_or_default();
    let hash = first.strip_prefix("config_hash=").unwrap_or_default();
    assert_eq!(hash.len(), 64, "{stdout}");
    Ok(())
}

#[test]
fn config_hash_refuses_secret_literals() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let p = dir.path().join("bad.yaml");
    fs::write(
        &p,
        "lotus:\n  token_env: \"eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.payload\"\n",
    )?;

    smx(dir.path())
        .arg("config-hash")
        .arg(&p)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("eyJhbGci").not());
    Ok(())
}

#[test]
fn epoch_of_genesis_is_zero() {
    let dir = tempfile::tempdir().unwrap();
    smx(dir.path())
        .args(["epoch", "--at", "2020-08-24T22:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("epoch=0"));
}

#[test]
fn epoch_converts_back_to_a_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    smx(dir.path())
        .args(["epoch", "--from", "2880"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timestamp=2020-08-25T22:00:00+00:00"));
}

#[test]
fn reconcile_without_database_url_fails_after_loading_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let p = dir.path().join("cfg.yaml");
    fs::write(&p, "reconcile:\n  proposal_max_age_days: 30\n")?;

    smx(dir.path())
        .env_remove("SMX_DATABASE_URL")
        .arg("reconcile")
        .arg("--config")
        .arg(&p)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SMX_DATABASE_URL"));
    Ok(())
}

#[test]
fn invalid_config_values_are_rejected_before_connecting() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let p = dir.path().join("cfg.yaml");
    fs::write(&p, "reconcile:\n  proposal_max_age_days: 0\n")?;

    smx(dir.path())
        .env_remove("SMX_DATABASE_URL")
        .arg("reconcile")
        .arg("--config")
        .arg(&p)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_INVALID"));
    Ok(())
}

#[test]
fn oversized_reference_lag_is_rejected_before_connecting() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let p = dir.path().join("cfg.yaml");
    fs::write(&p, "reconcile:\n  reference_lag_hours: 1000000000000000\n")?;

    smx(dir.path())
        .env_remove("SMX_DATABASE_URL")
        .arg("reconcile")
        .arg("--config")
        .arg(&p)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_INVALID"))
        .stderr(predicate::str::contains("reference_lag_hours"));
    Ok(())
}

#[test]
fn epoch_from_out_of_range_fails_cleanly() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    smx(dir.path())
        .arg("epoch")
        .arg("--from")
        .arg(i64::MAX.to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of timestamp range"));
    Ok(())
}
