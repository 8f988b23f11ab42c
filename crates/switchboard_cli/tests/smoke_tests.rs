//! CLI smoke tests: drive the binary end to end through stdin.

use std::io::Write;
use std::process::{Command, Stdio};

const MISSING_CONFIG: &str = "/tmp/nonexistent_switchboard_config_12345.toml";

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_switchboard"));
    cmd.env_remove("SWITCHBOARD_CONFIG")
        .env_remove("RUST_LOG")
        .env("SWITCHBOARD_LOG", "error");
    cmd
}

fn run_session(extra_args: &[&str], input: &str) -> (bool, String) {
    let mut child = cli_bin()
        .arg("--config")
        .arg(MISSING_CONFIG)
        .args(extra_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");
    let output = child.wait_with_output().expect("failed to run");
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
    )
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("--platform"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("switchboard"),
        "Expected crate name in --version output"
    );
}

#[test]
fn test_missing_config_falls_back_to_echo_tool() {
    let output = cli_bin()
        .arg("--config")
        .arg(MISSING_CONFIG)
        .arg("--list-tools")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("echo\t"), "got: {}", stdout);
}

#[test]
fn test_tool_call_and_echo_through_stdin() {
    let (ok, stdout) = run_session(
        &[],
        "/echo {\"text\": \"ping\", \"upper\": true}\nplain words\nquit\n",
    );
    assert!(ok);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["PING", "plain words"]);
}

#[test]
fn test_errors_are_translated_not_leaked() {
    let (ok, stdout) = run_session(&[], "/missing\n/echo {}\n");
    assert!(ok);
    assert!(stdout.contains("The requested tool is not available."));
    assert!(stdout.contains("Invalid request:"));
}

#[test]
fn test_discord_truncation_applies() {
    let long = "z".repeat(2500);
    let (ok, stdout) = run_session(&["--platform", "discord"], &format!("{}\n", long));
    assert!(ok);
    let line = stdout.lines().next().unwrap_or_default();
    assert_eq!(line.chars().count(), 2000);
    assert!(line.ends_with("..."));
}
