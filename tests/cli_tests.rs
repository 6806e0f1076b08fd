// nixtalk_core/tests/cli_tests.rs
// CLI behaviour and snapshot tests for canonical JSON output

use std::io::Write;

use assert_cmd::Command;
use insta::assert_json_snapshot;
use serde_json::Value;

fn nixtalk() -> Command {
    let mut cmd = Command::cargo_bin("nixtalk").expect("nixtalk binary must be built");
    cmd.env_remove("NIXTALK_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn stderr_text(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn version() {
    let output = nixtalk().arg("version").assert().success().get_output().clone();
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("nixtalk v"));
}

#[test]
fn golden_search_json() {
    let output = nixtalk()
        .args(["--mock", "ask", "--json", "search", "firefox"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert_json_snapshot!(stdout_json(&output), {
        ".requestId" => "[request_id]",
        ".timestamp" => "[timestamp]"
    }, @r###"
    {
      "command": "nix search nixpkgs firefox --json",
      "data": {
        "count": 5,
        "kind": "search",
        "packages": [
          "firefox",
          "firefox-esr",
          "firefox-beta",
          "firefox-devedition",
          "firefox-wayland"
        ]
      },
      "intent": "search",
      "message": "I found 5 packages matching \"firefox\".",
      "requestId": "[request_id]",
      "retryable": false,
      "success": true,
      "timestamp": "[timestamp]"
    }
    "###);
}

#[test]
fn golden_install_dry_run_json() {
    let output = nixtalk()
        .args(["--mock", "ask", "--json", "install", "firefox"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert_json_snapshot!(stdout_json(&output), {
        ".requestId" => "[request_id]",
        ".timestamp" => "[timestamp]"
    }, @r###"
    {
      "command": "nix-env -iA nixpkgs firefox --dry-run",
      "data": {
        "dryRun": true,
        "kind": "install",
        "message": "This would install the package (dry-run mode)",
        "packages": "firefox-2.0.0"
      },
      "intent": "install",
      "message": "I would install firefox for you. (This is a simulation; nothing was changed.)",
      "requestId": "[request_id]",
      "retryable": false,
      "success": true,
      "timestamp": "[timestamp]"
    }
    "###);
}

#[test]
fn unknown_request_exits_nonzero_with_suggestions() {
    let output = nixtalk()
        .args(["--mock", "ask", "do", "something", "with", "stuff"])
        .assert()
        .code(1)
        .get_output()
        .clone();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Try:"));
    assert!(stdout.contains("search [package name]"));
}

#[test]
fn explain_shows_command_without_running_it() {
    // No --mock: explain must never execute anything
    let output = nixtalk()
        .args(["explain", "isntall", "vim"])
        .assert()
        .success()
        .get_output()
        .clone();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("intent:     install (0.95)"));
    assert!(stdout.contains("package:    vim"));
    assert!(stdout.contains("command:    nix-env -iA nixpkgs vim --dry-run"));
}

#[test]
fn explain_json_for_unknown_has_no_command() {
    let output = nixtalk()
        .args(["explain", "--json", "do", "something"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["intent"]["type"], "unknown");
    assert_eq!(json["command"], Value::Null);
}

#[test]
fn explain_missing_argument_fails() {
    let output = nixtalk()
        .args(["explain", "install"])
        .assert()
        .code(1)
        .get_output()
        .clone();
    assert!(stderr_text(&output).contains("Which package did you mean?"));
}

#[test]
fn templates_lists_every_action() {
    let output = nixtalk().arg("templates").assert().success().get_output().clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 11);
    assert!(stdout.contains("nix-env -iA nixpkgs <package> --dry-run"));
    assert!(stdout.contains("systemctl status <service> --no-pager"));
}

#[test]
fn repl_processes_lines_until_quit() {
    let output = nixtalk()
        .args(["--mock", "repl", "--json"])
        .write_stdin("search firefox\n\nlist installed\nquit\nsearch vim\n")
        .assert()
        .success()
        .get_output()
        .clone();

    let results: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["intent"], "search");
    assert_eq!(results[1]["data"]["count"], 3);
}

#[test]
fn config_file_selects_mock_executor() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "executor:\n  mode: mock\nresponse:\n  max_suggestions: 2").unwrap();

    let output = nixtalk()
        .arg("--config")
        .arg(config.path())
        .args(["ask", "--json", "list", "installed"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["data"]["kind"], "list");
    assert_eq!(json["data"]["packages"][1], "git-2.42.0");
}

#[test]
fn unreadable_config_is_an_error() {
    let output = nixtalk()
        .args(["--config", "/nonexistent/nixtalk.yaml", "ask", "list", "installed"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    assert!(stderr_text(&output).contains("loading config"));
}

#[test]
fn blank_request_is_rejected() {
    let output = nixtalk()
        .args(["--mock", "ask", "--json", "   "])
        .assert()
        .code(1)
        .get_output()
        .clone();

    assert_eq!(stdout_json(&output)["errorCode"], "invalid-input");
}
