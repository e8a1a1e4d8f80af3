// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests driving the `trellis` binary.
//!
//! Each test writes its own config into a temp directory and runs the
//! binary there. Tests are independent and order-insensitive.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn trellis(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_trellis"))
        .current_dir(dir)
        .arg("--config")
        .arg(dir.join("trellis.toml"))
        .arg("--plain")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("trellis binary runs")
}

fn workspace(config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("trellis.toml"), config).unwrap();
    dir
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

/// The echo server is built alongside this binary by workspace test runs.
fn echo_server() -> Option<PathBuf> {
    let path = Path::new(env!("CARGO_BIN_EXE_trellis"))
        .with_file_name(format!("trellis-echo-server{}", std::env::consts::EXE_SUFFIX));
    path.exists().then_some(path)
}

// ---- config ----

#[test]
fn config_check_accepts_a_valid_file() {
    let dir = workspace("[agent]\nname = \"tester\"\nmax_turns = 3\n");
    let output = trellis(dir.path(), &["config", "check"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[OK] configuration is valid"), "{stdout}");
    assert!(stdout.contains("tester (max 3 turns)"), "{stdout}");
}

#[test]
fn config_check_rejects_unknown_keys() {
    let dir = workspace("[agent]\nnmae = \"typo\"\n");
    let output = trellis(dir.path(), &["config", "check"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn config_show_prints_effective_toml() {
    let dir = workspace("[state]\nformat = \"yaml\"\n");
    let output = trellis(dir.path(), &["config", "show"]);
    assert!(output.status.success());
    let shown: toml::Value = toml::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(shown["state"]["format"].as_str(), Some("yaml"));
    assert_eq!(shown["agent"]["name"].as_str(), Some("trellis"));
}

// ---- call ----

#[test]
fn call_rejects_malformed_arguments() {
    let dir = workspace("");
    let output = trellis(dir.path(), &["call", "echo", "--args", "{not json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--args is not valid JSON"));
}

#[test]
fn call_to_unknown_capability_prints_failure_envelope() {
    let dir = workspace("");
    let output = trellis(dir.path(), &["call", "missing"]);
    assert!(!output.status.success());
    let envelope = stdout_json(&output);
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"], "unknown capability");
}

#[test]
fn unreachable_server_is_reported_by_tools() {
    let dir = workspace(
        "[[mcp.servers]]\nid = \"ghost\"\ntransport = \"stdio\"\ncommand = \"/nonexistent/mcp-server\"\n",
    );
    let output = trellis(dir.path(), &["tools", "--json"]);
    assert!(!output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["tools"], serde_json::json!([]));
    assert!(report["failures"]["ghost"].is_string());
}

// ---- remote round trip ----

#[test]
fn remote_call_and_state_persistence() {
    let Some(server) = echo_server() else {
        eprintln!("trellis-echo-server not built; skipping");
        return;
    };
    let config = format!(
        "[state]\ndirectory = \"state\"\nformat = \"json\"\n\n\
         [[mcp.servers]]\nid = \"echo\"\ntransport = \"stdio\"\ncommand = {:?}\ntool_prefix = \"e\"\n",
        server.display().to_string()
    );
    let dir = workspace(&config);

    let listed = trellis(dir.path(), &["tools", "--json"]);
    assert!(listed.status.success(), "{}", String::from_utf8_lossy(&listed.stderr));
    let names: Vec<String> = stdout_json(&listed)["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["e_add", "e_echo", "e_fail", "e_slow_echo"]);

    let args = ["call", "e_echo", "--args", r#"{"text":"hi"}"#, "--save-state"];
    let first = trellis(dir.path(), &args);
    assert!(first.status.success());
    assert_eq!(stdout_json(&first)["result"], "hi");

    let second = trellis(
        dir.path(),
        &["call", "e_echo", "--args", r#"{"text":"again"}"#, "--restore-state", "--save-state"],
    );
    assert!(second.status.success());
    assert_eq!(stdout_json(&second)["status"]["call_count"], 2);

    let saved: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("state/registry.json")).unwrap()).unwrap();
    assert_eq!(saved["metadata"]["container_type"], "ToolRegistry");
}
