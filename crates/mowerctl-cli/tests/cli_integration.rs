//! CLI subprocess integration tests.
//!
//! These tests invoke the `mowerctl` binary against the mock runtime with a
//! throwaway config and verify exit codes, stdout content, and the files left
//! behind on the host.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn mowerctl_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mowerctl"));
    cmd.env("MOWERCTL_RUNTIME", "mock");
    cmd.env("MOWERCTL_SKIP_PREREQS", "1");
    cmd.env_remove("MOWERCTL_CONFIG");
    cmd.env_remove("MOWERCTL_LOG");
    cmd
}

/// Config rooted in `dir` with an empty sysfs tree, so no udev lookups run.
fn write_config(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir.join("sys/bus/usb/devices")).unwrap();
    let path = dir.join("mowerctl.toml");
    std::fs::write(
        &path,
        r#"sysfs_root = "sys"
usb_root = "no-usb"

[roster]
backoff_ms = 0

[runtime]
backend = "mock"
"#,
    )
    .unwrap();
    path
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    let config = write_config(dir);
    mowerctl_bin()
        .current_dir(dir)
        .arg("--config")
        .arg(&config)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn help_flag_exits_zero() {
    let output = mowerctl_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    for sub in ["list_usb_names", "list_usb_info", "autopilot", "obstacles", "pipe"] {
        assert!(out.contains(sub), "help must list '{sub}': {out}");
    }
}

#[test]
fn help_subcommand_exits_zero() {
    let output = mowerctl_bin().arg("help").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage"));
}

#[test]
fn missing_subcommand_prints_help() {
    let output = mowerctl_bin().output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Usage"));
}

#[test]
fn unknown_subcommand_prints_help() {
    let output = mowerctl_bin().arg("mow-the-lawn").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Usage"));
}

#[test]
fn extra_arguments_are_an_error() {
    let output = mowerctl_bin().args(["version", "now"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
    assert!(stdout(&output).contains("Usage"));
}

#[test]
fn version_subcommand() {
    let output = mowerctl_bin().arg("version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("mowerctl "));

    let output = mowerctl_bin().args(["version", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "mowerctl");
}

#[test]
fn autopilot_without_credential_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.ini"), "[Settings]\n").unwrap();

    let output = run_in(dir.path(), &["autopilot"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("oxchief.env"), "stderr: {stderr}");
    assert!(!dir.path().join("temp/device_names.txt").exists());
    assert!(!dir.path().join("temp/devices.txt").exists());
}

#[test]
fn base_launch_with_mock_runtime() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("oxchief.env"), "auth_token=abc\n").unwrap();
    std::fs::write(dir.path().join("config.ini"), "[Settings]\n").unwrap();

    let output = run_in(dir.path(), &["base", "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["role"], "base");
    assert_eq!(json["running"], true);

    let names = std::fs::read_to_string(dir.path().join("temp/device_names.txt")).unwrap();
    assert!(names.is_empty());
}

#[test]
fn re_launches_robot_roles() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("oxchief.env"), "robot_id=42\n").unwrap();
    std::fs::write(dir.path().join("config.ini"), "[Settings]\n").unwrap();

    let output = run_in(dir.path(), &["re", "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["deployment"], "robot");
    let roles: Vec<&str> = json["launched"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["autopilot", "obstacle"]);
}

#[test]
fn list_usb_names_on_empty_bus() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["list_usb_names", "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json, serde_json::json!([]));
}

#[test]
fn logs_with_nothing_running() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["logs"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("no running instances"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "unknown_key = 1\n").unwrap();
    let output = mowerctl_bin()
        .arg("--config")
        .arg(&config)
        .arg("ps")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad.toml"));
}

#[test]
fn completions_generate() {
    let output = mowerctl_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("mowerctl"));
}

#[test]
fn doctor_reports_missing_credential() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.ini"), "[Settings]\n").unwrap();

    let output = run_in(dir.path(), &["doctor", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["healthy"], false);
    let credential = json["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "credential")
        .unwrap();
    assert_eq!(credential["status"], "fail");

    std::fs::write(dir.path().join("oxchief.env"), "role=base\n").unwrap();
    let output = run_in(dir.path(), &["doctor", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let message = json["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "credential")
        .and_then(|c| c["message"].as_str())
        .unwrap()
        .to_owned();
    assert!(message.contains("oxchief.env"), "{message}");
    assert!(message.contains("base"), "{message}");
}

/// Config whose names roster lives in a directory the scratch purge leaves
/// absent, so the roster can never be written.
fn write_unwritable_roster_config(dir: &Path) -> PathBuf {
    let path = write_config(dir);
    let mut content = std::fs::read_to_string(&path).unwrap();
    content = content.replace(
        "[roster]\n",
        "[roster]\nnames_file = \"missing-sub/device_names.txt\"\n",
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn exhausted_roster_exits_one_without_launching() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("oxchief.env"), "robot_id=42\n").unwrap();
    std::fs::write(dir.path().join("config.ini"), "[Settings]\n").unwrap();
    let config = write_unwritable_roster_config(dir.path());

    for sub in ["autopilot", "re"] {
        let output = mowerctl_bin()
            .current_dir(dir.path())
            .arg("--config")
            .arg(&config)
            .arg(sub)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1), "{sub}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("device_names.txt"), "{sub}: {stderr}");
        assert!(stderr.contains("10"), "{sub}: {stderr}");
    }
    assert!(!dir.path().join("temp/missing-sub").exists());
}

#[test]
fn pipe_refuses_a_channel_that_is_not_a_fifo() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let count = dir.path().join("count");
    std::fs::create_dir_all(dir.path().join("pipe")).unwrap();
    std::fs::write(
        dir.path().join("pipe/oxpipe"),
        format!("echo x >> {}", count.display()),
    )
    .unwrap();

    let output = mowerctl_bin()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("pipe")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a FIFO"), "stderr: {stderr}");
    assert!(!count.exists());
    assert!(!dir.path().join("pipe/output.txt").exists());
}
