//! Smoke tests for the `deck` binary's non-interactive subcommands.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn deck_binary() -> String {
    env!("CARGO_BIN_EXE_deck").to_string()
}

/// Config with one unpinned custom widget in dev mode.
fn create_test_config(temp_dir: &TempDir) -> PathBuf {
    let widgets = temp_dir.path().join("widgets");
    std::fs::create_dir_all(&widgets).unwrap();
    let script = widgets.join("hello.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\necho 'title: Hello'\necho \"row: [status:ok] args=$*\"\necho 'action: Wave:echo hi'\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let broken = widgets.join("broken.sh");
    std::fs::write(&broken, "#!/bin/sh\necho 'disk gone' >&2\nexit 2\n").unwrap();
    std::fs::set_permissions(&broken, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config_path = temp_dir.path().join("widget-deck.yaml");
    std::fs::write(
        &config_path,
        r#"
settings:
  dev_mode: true
  bundled_root: bundled
  custom_roots: [widgets]
widgets:
  hello:
    path: hello.sh
  broken:
    path: broken.sh
"#,
    )
    .unwrap();
    config_path
}

fn deck(temp_dir: &TempDir, args: &[&str]) -> std::process::Output {
    Command::new(deck_binary())
        .args(args)
        .current_dir(temp_dir.path())
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to run deck")
}

#[test]
fn test_help_lists_subcommands() {
    let temp_dir = TempDir::new().unwrap();
    let output = deck(&temp_dir, &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["run", "validate", "checksum", "list", "completions"] {
        assert!(stdout.contains(sub), "help should mention '{}'", sub);
    }
}

#[test]
fn test_run_prints_document() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["run", "hello", "--extended"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("== Hello =="));
    assert!(stdout.contains("[ok] args=--extended"));
    assert!(stdout.contains("action: Wave -> echo hi"));
}

#[test]
fn test_run_json_output() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["run", "hello", "--json"]);
    assert!(output.status.success());
    let doc: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(doc["title"], "Hello");
    assert_eq!(doc["rows"][0]["status"], "ok");
    assert_eq!(doc["actions"][0]["label"], "Wave");
}

#[test]
fn test_run_failing_widget_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["run", "broken"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[error]"));
    assert!(stdout.contains("disk gone"));
}

#[test]
fn test_run_unknown_widget_gives_hint() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["run", "nope"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("Hint:"));
}

#[test]
fn test_checksum_prints_pin_snippet() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["checksum", "widgets/hello.sh"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let digest = stdout.split_whitespace().next().unwrap();
    assert_eq!(digest.len(), 64);
    assert!(stdout.contains(&format!("sha256: \"{}\"", digest)));
}

#[test]
fn test_validate_uses_config_roots() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["validate", "hello.sh"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("origin: custom"));

    let outside = temp_dir.path().join("outside.sh");
    std::fs::write(&outside, "#!/bin/sh\n").unwrap();
    std::fs::set_permissions(&outside, std::fs::Permissions::from_mode(0o755)).unwrap();
    let output = deck(&temp_dir, &["validate", outside.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("outside the allowed widget directories"));
}

#[test]
fn test_list_json() {
    let temp_dir = TempDir::new().unwrap();
    create_test_config(&temp_dir);

    let output = deck(&temp_dir, &["list", "--json"]);
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["broken", "hello"]);
    assert_eq!(listing[1]["allowed"], true);
    assert_eq!(listing[1]["origin"], "custom");
}

#[test]
fn test_completions_need_no_config() {
    let temp_dir = TempDir::new().unwrap();
    let output = deck(&temp_dir, &["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("deck"));
}
