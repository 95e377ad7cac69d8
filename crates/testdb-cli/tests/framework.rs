#![cfg(unix)]

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;

mod common;

use common::{
    fake_generate_fixtures, fake_manage, fake_psql, parse_json, prepare_project, write_executable,
};

const APPLIED: &str = "app\n [X] 0001_initial\n";

#[test]
fn migrate_runs_manage_and_records_status() {
    let project = prepare_project();
    let root = project.path();
    fake_manage(root, APPLIED);
    let psql = fake_psql(root, &["app"], false);

    let assert = cargo_bin_cmd!("testdb")
        .args([
            "--root",
            root.to_str().unwrap(),
            "--json",
            "migrate",
            "--platform",
            "dev",
        ])
        .env("TESTDB_PSQL", &psql)
        .assert()
        .success();
    let payload = parse_json(&assert);

    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["details"]["database"], "app");
    assert_eq!(payload["details"]["platform"], "dev");

    let log = fs::read_to_string(root.join("manage.log")).expect("manage log");
    let calls: Vec<&str> = log.lines().collect();
    assert_eq!(calls.len(), 2, "{log}");
    assert!(calls[0].starts_with("migrate --no-input "), "{log}");
    assert!(calls[1].starts_with("showmigrations --list "), "{log}");
    for call in &calls {
        assert!(call.contains("DJANGO_SETTINGS_MODULE=project.settings"), "{call}");
        assert!(call.ends_with("TESTDB_DB_NAME=app"), "{call}");
    }
    let recorded = fs::read_to_string(root.join("var/migration_status_dev")).expect("status file");
    assert_eq!(recorded, APPLIED);
}

#[test]
fn failed_migration_is_reported() {
    let project = prepare_project();
    let root = project.path();
    write_executable(
        &root.join("manage.py"),
        "#!/bin/sh\necho 'no such table: django_migrations' >&2\nexit 1\n",
    );

    let assert = cargo_bin_cmd!("testdb")
        .args(["--root", root.to_str().unwrap(), "--json", "migrate"])
        .assert()
        .code(2);
    let payload = parse_json(&assert);

    assert_eq!(payload["status"], "error");
    assert_eq!(payload["message"], "failed to migrate app_test_template");
    let issues = payload["details"]["issues"].to_string();
    assert!(issues.contains("no such table"), "{issues}");
    assert!(!root.join("var/migration_status_test").exists());
}

#[test]
fn forced_update_regenerates_fixtures() {
    let project = prepare_project();
    let root = project.path();
    fake_manage(root, APPLIED);
    fake_generate_fixtures(root);
    let psql = fake_psql(root, &[], false);

    let assert = cargo_bin_cmd!("testdb")
        .args(["--root", root.to_str().unwrap(), "--json", "update", "--force"])
        .env("TESTDB_PSQL", &psql)
        .assert()
        .success();
    let payload = parse_json(&assert);

    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["details"]["action"], "rebuilt");
    assert_eq!(payload["details"]["forced"], true);
    assert_eq!(payload["details"]["template"]["status"], "needs_rebuild");

    let log = fs::read_to_string(root.join("generate.log")).expect("generate log");
    assert_eq!(log, "generate --force\n");
}
