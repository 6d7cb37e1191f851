use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

fn bin() -> Command {
    cargo_bin_cmd!("corral")
}

#[test]
fn help_lists_core_commands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("outdated"))
        .stdout(predicate::str::contains("lint"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn version_is_reported() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn init_creates_project_toml_with_directory_name() {
    let temp = tempdir().unwrap();
    let project_dir = temp.path().join("my-app");
    fs::create_dir(&project_dir).unwrap();

    bin().current_dir(&project_dir).args(["init"]).assert().success();

    let project_toml = project_dir.join("project.toml");
    assert!(project_toml.exists());
    let content = fs::read_to_string(&project_toml).unwrap();
    assert!(content.contains("[project]"));
    assert!(content.contains("my-app"));
}

#[test]
fn init_fails_if_project_toml_already_exists() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("project.toml"), "[project]\nname = \"existing\"\n").unwrap();

    bin()
        .current_dir(temp.path())
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn info_reports_project_metadata_as_json() {
    let temp = tempdir().unwrap();
    bin().current_dir(temp.path()).args(["init", "--name", "widgets"]).assert().success();

    let output = bin()
        .current_dir(temp.path())
        .args(["--format", "json", "info"])
        .output()
        .expect("command runs");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: Value = serde_json::from_str(&stdout).expect("valid JSON output");
    assert_eq!(json["name"], "widgets");
    assert_eq!(json["requirements"], 0);
    assert!(json["locked_packages"].is_null());
}

#[test]
fn list_without_lockfile_fails_with_a_clear_message() {
    let temp = tempdir().unwrap();
    bin().current_dir(temp.path()).args(["init"]).assert().success();

    bin()
        .current_dir(temp.path())
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no lockfile"));
}
