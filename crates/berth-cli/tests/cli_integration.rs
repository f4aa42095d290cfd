//! CLI subprocess integration tests.
//!
//! These tests invoke the `berth` binary as a subprocess and verify exit
//! codes, stdout content, and JSON output. Only commands that can run without
//! a container engine are exercised against the live binary.

use std::path::{Path, PathBuf};
use std::process::Command;

const UBUNTU: &str = "ID=ubuntu\nVERSION_ID=\"24.04\"\nVERSION_CODENAME=noble\n";
const FEDORA_41: &str = "ID=fedora\nVERSION_ID=41\n";
const AMAZON: &str = "ID=amzn\nVERSION_ID=\"2023\"\n";

fn berth_bin(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_berth"));
    cmd.current_dir(cwd);
    cmd.env_remove("BERTH_LOG");
    cmd
}

fn write_os_release(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("os-release");
    std::fs::write(&path, content).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = berth_bin(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "berth --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("berth"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = berth_bin(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in [
        "detect", "plan", "install", "doctor", "pull", "start", "stop", "restart", "up", "wait",
    ] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_detect_json_reports_profile() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), UBUNTU);

    let output = berth_bin(dir.path())
        .args(["--json", "detect", "--arch", "x86_64", "--os-release"])
        .arg(&os_release)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "detect must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    assert_eq!(json["family"], "ubuntu");
    assert_eq!(json["arch"], "amd64");
    assert_eq!(json["codename"], "noble");
}

#[test]
fn cli_detect_rejects_unknown_arch() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), UBUNTU);

    let output = berth_bin(dir.path())
        .args(["detect", "--arch", "riscv64", "--os-release"])
        .arg(&os_release)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported architecture"), "stderr: {stderr}");
}

#[test]
fn cli_detect_rejects_unknown_distribution() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), "ID=gentoo\n");

    let output = berth_bin(dir.path())
        .args(["detect", "--arch", "aarch64", "--os-release"])
        .arg(&os_release)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("gentoo"));
}

#[test]
fn cli_plan_prints_numbered_steps() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), UBUNTU);

    let output = berth_bin(dir.path())
        .args(["plan", "--arch", "aarch64", "--os-release"])
        .arg(&os_release)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("6 steps"), "stdout: {stdout}");
    assert!(stdout.contains(" 1. apt-get update"));
    assert!(stdout.contains("arch=arm64"));
}

#[test]
fn cli_plan_fedora_41_uses_dnf5_syntax() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), FEDORA_41);

    let output = berth_bin(dir.path())
        .args(["--json", "plan", "--arch", "x86_64", "--os-release"])
        .arg(&os_release)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["family"], "fedora");
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    let args = steps[1]["command"]["args"].as_array().unwrap();
    assert!(args.iter().any(|a| a == "addrepo"));
}

#[test]
fn cli_plan_amazon_uses_admin_user() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), AMAZON);

    let output = berth_bin(dir.path())
        .args([
            "plan",
            "--arch",
            "x86_64",
            "--admin-user",
            "deploy",
            "--os-release",
        ])
        .arg(&os_release)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("usermod -a -G docker deploy"), "stdout: {stdout}");
}

#[test]
fn cli_plan_for_podman_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = write_os_release(dir.path(), UBUNTU);

    let output = berth_bin(dir.path())
        .args(["--engine", "podman", "plan", "--arch", "x86_64", "--os-release"])
        .arg(&os_release)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be installed automatically"), "stderr: {stderr}");
}

#[test]
fn cli_unknown_engine_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = berth_bin(dir.path())
        .args(["--engine", "lxc", "pull"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("lxc"));
}

#[test]
fn cli_missing_explicit_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = berth_bin(dir.path())
        .args(["--config", "missing.toml", "pull"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.toml"));
}

#[test]
fn cli_malformed_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("berth.toml"), "engine = \"docker\"\nretries = 5\n").unwrap();

    let output = berth_bin(dir.path()).arg("stop").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("retries"));
}

#[test]
fn cli_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    let output = berth_bin(dir.path())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("berth"));
    assert!(stdout.contains("restart"));
}
