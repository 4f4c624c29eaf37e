//! End-to-end CLI tests: each spins up an isolated `APM_STATE_DIR` so
//! runs never touch the real platform state directory.

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn apm(state_dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(cargo_bin!("apm"));
    cmd.env("APM_STATE_DIR", state_dir);
    cmd
}

fn seed_catalog(state_dir: &std::path::Path) {
    std::fs::create_dir_all(state_dir).unwrap();
    std::fs::write(
        state_dir.join("catalog.json"),
        r#"{"packages":[
            {"name":"vim","essential":false,"auto_installed":false,"installed_version":null,
             "versions":[{"version":"9.0","download_size":1024,"installed_size":2048,
                          "architecture":"x86_64","downloadable":true,"provides":[],
                          "depends":[],"section":"editors","priority":0}]}
        ]}"#,
    )
    .unwrap();
}

#[test]
fn help_lists_every_subcommand() {
    let temp = TempDir::new().unwrap();
    apm(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("upgrade"))
        .stdout(predicate::str::contains("autoremove"))
        .stdout(predicate::str::contains("image"))
        .stdout(predicate::str::contains("lock"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn version_flag_succeeds() {
    let temp = TempDir::new().unwrap();
    apm(temp.path()).arg("--version").assert().success();
}

#[test]
fn show_reports_package_not_found() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    apm(temp.path())
        .args(["show", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E-PKG-NOTFOUND"));
}

#[test]
fn show_json_error_carries_the_stable_code() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    apm(temp.path())
        .args(["--format", "json", "show", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"code\""))
        .stderr(predicate::str::contains("E-PKG-NOTFOUND"));
}

#[test]
fn show_prints_known_package_versions() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    apm(temp.path())
        .args(["show", "vim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vim"))
        .stdout(predicate::str::contains("9.0"));
}

#[test]
fn install_dry_run_does_not_touch_the_catalog() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    apm(temp.path())
        .args(["install", "vim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vim"));

    let catalog = std::fs::read_to_string(temp.path().join("catalog.json")).unwrap();
    assert!(catalog.contains("\"installed_version\":null"));
}

#[test]
fn install_apply_records_the_new_install() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    apm(temp.path())
        .args(["install", "vim", "--apply", "--yes"])
        .assert()
        .success();

    apm(temp.path())
        .args(["show", "vim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed version: 9.0"));
}

#[test]
fn lock_status_reports_free_on_a_fresh_state_dir() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    apm(temp.path())
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("free"));
}

#[test]
fn image_apply_then_rollback_replays_the_earlier_desired_state() {
    let temp = TempDir::new().unwrap();
    seed_catalog(temp.path());
    let images_dir = temp.path().join("images");

    let desired_v1 = temp.path().join("desired-v1.json");
    std::fs::write(&desired_v1, r#"{"packages":[]}"#).unwrap();
    let desired_v2 = temp.path().join("desired-v2.json");
    std::fs::write(&desired_v2, r#"{"packages":[{"name":"vim"}]}"#).unwrap();

    let mut cmd = apm(temp.path());
    cmd.env("APM_IMAGE_HISTORY_DIR", &images_dir);
    cmd.args(["image", "apply", "web", desired_v1.to_str().unwrap()])
        .assert()
        .success();

    let mut cmd = apm(temp.path());
    cmd.env("APM_IMAGE_HISTORY_DIR", &images_dir);
    cmd.args(["image", "apply", "web", desired_v2.to_str().unwrap()])
        .assert()
        .success();

    let mut cmd = apm(temp.path());
    cmd.env("APM_IMAGE_HISTORY_DIR", &images_dir);
    cmd.args(["image", "history", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Apply"))
        .stdout(predicate::str::contains("Install"));

    let mut cmd = apm(temp.path());
    cmd.env("APM_IMAGE_HISTORY_DIR", &images_dir);
    cmd.args(["image", "rollback", "web", "0"])
        .assert()
        .success();

    let mut cmd = apm(temp.path());
    cmd.env("APM_IMAGE_HISTORY_DIR", &images_dir);
    cmd.args(["image", "history", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rollback"))
        .stdout(predicate::str::contains("(3 total)"));
}

#[test]
fn invalid_subcommand_is_a_usage_error() {
    let temp = TempDir::new().unwrap();
    apm(temp.path())
        .arg("not-a-real-command")
        .assert()
        .failure()
        .code(2);
}
