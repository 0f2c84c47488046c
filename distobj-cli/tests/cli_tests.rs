//! Tests for the distobj binary

use distobj_core::Config;
use std::process::Command;
use tempfile::TempDir;

fn distobj() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_distobj"));
    cmd.env_remove("DISTOBJ_RESTORE_MAX_ROUNDS")
        .env_remove("DISTOBJ_LOG_LEVEL");
    cmd
}

#[test]
fn test_config_written_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("distobj.toml");

    let status = distobj()
        .args(["config", "--output"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.restore.max_rounds, 5000);
}

#[test]
fn test_session_id_is_eight_digits() {
    let output = distobj().arg("session-id").output().unwrap();
    assert!(output.status.success());

    let id = String::from_utf8(output.stdout).unwrap();
    let id = id.trim();
    assert_eq!(id.len(), 8);
    assert!(id.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_demo_single_device_completes() {
    let output = distobj()
        .args(["--log-level", "error", "demo", "--objects", "2", "--peers", "0"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("result: Completed after 1 round(s)"));
    assert_eq!(stdout.matches(" success").count(), 2);
}

#[test]
fn test_bad_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[restore]\nmax_rounds = 0\n").unwrap();

    let status = distobj().arg("--config").arg(&path).arg("session-id").status().unwrap();
    assert!(!status.success());
}
