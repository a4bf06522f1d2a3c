//! Integration tests for the `eclipse` binary

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::{TempDir, tempdir};

const MATH: &str = r#"
#{
    Metadata: #{ Name: "math", Version: "1.0.0", Author: "eclipse" },
    Events: #{},
    Commands: #{
        add: #{
            Description: "Adds two numbers",
            Use: "add <a> [b]",
            Return: true,
            Export: true,
            Args: [ #{ Name: "a" }, #{ Name: "b", Optional: true, Default: 0 } ],
            Run: |ctx, args| args[0] + args[1],
        },
        shout: #{
            Args: [ #{ Name: "text" } ],
            Run: |ctx, args| print(args[0]),
        },
    },
    Imports: [],
}
"#;

const APP: &str = r#"
#{
    Metadata: #{ Name: "app", Version: "0.2.0" },
    Events: #{},
    Commands: #{
        twice: #{
            Return: true,
            Args: [ #{ Name: "n" } ],
            Run: |ctx, args| invoke_import("math", "add", [args[0], args[0]]),
        },
    },
    Imports: [
        #{ Plugin: "math", Procedure: "add" },
        #{ Plugin: "math", Procedure: "missing" },
    ],
}
"#;

const BROKEN: &str = r#"throw "broken plugin";"#;

fn fixture(with_broken: bool) -> TempDir {
    let dir = tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("nested")).expect("create nested dir");
    fs::write(dir.path().join("app.rhai"), APP).expect("write app");
    fs::write(dir.path().join("nested/math.rhai"), MATH).expect("write math");
    fs::write(dir.path().join("README.md"), "not a plugin").expect("write readme");
    if with_broken {
        fs::write(dir.path().join("broken.rhai"), BROKEN).expect("write broken");
    }
    dir
}

fn eclipse() -> Command {
    let mut cmd = Command::cargo_bin("eclipse").expect("binary exists");
    cmd.env("NO_COLOR", "1")
        .env_remove("ECLIPSE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("valid json on stdout")
}

#[test]
fn load_reports_every_plugin() {
    let dir = fixture(false);

    eclipse()
        .args(["load"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("✓ app"))
        .stdout(contains("✓ math"))
        .stdout(contains("app imports math.missing (unresolved)"))
        .stdout(contains("2 loaded, 0 failed, 1 unresolved import(s)"));
}

#[test]
fn load_fail_fast_exits_non_zero() {
    let dir = fixture(true);

    eclipse()
        .args(["load"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("broken plugin"));
}

#[test]
fn load_best_effort_skips_broken_plugin() {
    let dir = fixture(true);

    let output = eclipse()
        .args(["-o", "json", "load", "--mode", "best-effort"])
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary = stdout_json(&output);
    assert_eq!(summary["loaded"], serde_json::json!(["app", "math"]));
    assert_eq!(summary["failed"].as_array().map(Vec::len), Some(1));
    assert!(
        summary["failed"][0]["origin"]
            .as_str()
            .is_some_and(|origin| origin.contains("broken.rhai"))
    );
}

#[test]
fn load_mode_from_environment() {
    let dir = fixture(true);

    eclipse()
        .env("ECLIPSE_PLUGINS__LOAD_MODE", "best_effort")
        .args(["load"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("2 loaded, 1 failed"));
}

#[test]
fn strict_imports_from_config_file() {
    let dir = fixture(false);
    let config = dir.path().join("eclipse.toml");
    fs::write(&config, "[manager]\nstrict_imports = true\n").expect("write config");

    eclipse()
        .arg("--config")
        .arg(&config)
        .args(["load"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("missing"));
}

#[test]
fn list_as_json() {
    let dir = fixture(false);

    let output = eclipse()
        .args(["list", "-o", "json"])
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rows = stdout_json(&output);
    let rows = rows.as_array().expect("array of plugins");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "app");
    assert_eq!(rows[0]["imports_resolved"], 1);
    assert_eq!(rows[0]["imports_declared"], 2);
    assert_eq!(rows[1]["name"], "math");
    assert_eq!(rows[1]["version"], "1.0.0");
    assert_eq!(rows[1]["commands"], serde_json::json!(["add", "shout"]));
    assert_eq!(rows[1]["exports"], serde_json::json!(["add"]));
}

#[test]
fn list_as_table() {
    let dir = fixture(false);

    eclipse()
        .args(["list"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("Name"))
        .stdout(contains("math"))
        .stdout(contains("1/2"));
}

#[test]
fn info_shows_command_help() {
    let dir = fixture(false);

    eclipse()
        .args(["info"])
        .arg(dir.path())
        .arg("math")
        .assert()
        .success()
        .stdout(contains("Version:     1.0.0"))
        .stdout(contains("Description: Adds two numbers"))
        .stdout(contains("Usage:       add <a> [b]"))
        .stdout(contains("(Optional) Default: 0"))
        .stdout(contains("Description: N/A"));
}

#[test]
fn info_unknown_plugin_fails() {
    let dir = fixture(false);

    eclipse()
        .args(["info"])
        .arg(dir.path())
        .arg("ghost")
        .assert()
        .failure()
        .stderr(contains("ghost"));
}

#[test]
fn invoke_returns_value() {
    let dir = fixture(false);

    eclipse()
        .args(["invoke"])
        .arg(dir.path())
        .args(["math", "add", "5", "3"])
        .assert()
        .success()
        .stdout("8\n");

    eclipse()
        .args(["invoke"])
        .arg(dir.path())
        .args(["math", "add", "-5"])
        .assert()
        .success()
        .stdout("-5\n");
}

#[test]
fn invoke_through_import() {
    let dir = fixture(false);

    let output = eclipse()
        .args(["-o", "json", "invoke"])
        .arg(dir.path())
        .args(["app", "twice", "21"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result = stdout_json(&output);
    assert_eq!(result["plugin"], "app");
    assert_eq!(result["result"], 42);
}

#[test]
fn invoke_without_return_prints_placeholder() {
    let dir = fixture(false);

    eclipse()
        .args(["invoke"])
        .arg(dir.path())
        .args(["math", "shout", "hi"])
        .assert()
        .success()
        .stdout(contains("(no result)"));
}

#[test]
fn invoke_arity_errors() {
    let dir = fixture(false);

    eclipse()
        .args(["invoke"])
        .arg(dir.path())
        .args(["math", "add"])
        .assert()
        .failure();

    eclipse()
        .args(["invoke"])
        .arg(dir.path())
        .args(["math", "add", "nil"])
        .assert()
        .failure();
}

#[test]
fn missing_directory_fails() {
    eclipse()
        .args(["list", "/definitely/not/a/plugin/dir"])
        .assert()
        .failure()
        .stderr(contains("Not a plugin directory"));
}
