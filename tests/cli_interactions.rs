//! CLI options interaction tests
//!
//! These tests run the `sbert` binary and check how options combine, how
//! conflicts are rejected and what exit codes come back.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::Command;
use std::thread;
use tempfile::TempDir;

/// Binary under test, isolated from any `.env` in the repository and from
/// transport variables in the caller's environment
fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sbert").unwrap();
    cmd.current_dir(dir.path());
    for var in ["SERIAL_PORT", "REMOTE_HOST", "REMOTE_PORT", "DEFAULT_BAUDRATE", "TEST_DURATION"] {
        cmd.env_remove(var);
    }
    cmd
}

fn spawn_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let mut buffer = [0u8; 1024];
                while let Ok(n) = stream.read(&mut buffer) {
                    if n == 0 || stream.write_all(&buffer[..n]).is_err() {
                        break;
                    }
                }
            });
        }
    });
    port
}

#[test]
fn test_help_mentions_binary() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sbert"))
        .stdout(predicate::str::contains("--remote-port"));
}

#[test]
fn test_no_transport_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--mode", "once", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No transport configured"));
}

#[test]
fn test_color_flags_conflict() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--color", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--color and --no-color"));
}

#[test]
fn test_serial_and_remote_conflict() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--port", "/dev/ttyUSB0", "--host", "127.0.0.1"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_out_of_range_values_rejected() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--frame-length", "0"])
        .assert()
        .failure();

    create_test_cmd(&dir)
        .args(["--host", "127.0.0.1", "--remote-port", "7", "--ber", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--ber"));

    create_test_cmd(&dir)
        .args(["--parity", "X"])
        .assert()
        .failure();
}

#[test]
fn test_list_ports_succeeds() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--list-ports", "--no-color"])
        .assert()
        .success();
}

#[test]
fn test_once_over_tcp_prints_report() {
    let dir = TempDir::new().unwrap();
    let port = spawn_echo_server();
    create_test_cmd(&dir)
        .args(["--host", "127.0.0.1", "--remote-port", &port.to_string()])
        .args(["--mode", "once", "--frame-length", "32", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Serial BER Test Results"))
        .stdout(predicate::str::contains("Bits Transmitted (N)"))
        .stdout(predicate::str::contains("320"));
}

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    let port = spawn_echo_server();
    let output = create_test_cmd(&dir)
        .args(["--host", "127.0.0.1", "--remote-port", &port.to_string()])
        .args(["--mode", "once", "--frame-length", "8", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_frames_transmitted"], 8);
    assert_eq!(report["total_frames_lost"], 0);
}

#[test]
fn test_loop_check_over_tcp() {
    let dir = TempDir::new().unwrap();
    let port = spawn_echo_server();
    create_test_cmd(&dir)
        .args(["--host", "127.0.0.1", "--remote-port", &port.to_string()])
        .args(["--mode", "loop", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("loop check succeeded"));
}

#[test]
fn test_check_host() {
    let dir = TempDir::new().unwrap();
    let port = spawn_echo_server();
    create_test_cmd(&dir)
        .args(["--check-host", "--host", "127.0.0.1", "--remote-port", &port.to_string(), "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("accepts connections"));
}

#[test]
fn test_env_file_supplies_transport() {
    let dir = TempDir::new().unwrap();
    let port = spawn_echo_server();
    std::fs::write(
        dir.path().join(".env"),
        format!("REMOTE_HOST=127.0.0.1\nREMOTE_PORT={}\n", port),
    )
    .unwrap();

    create_test_cmd(&dir)
        .args(["--mode", "once", "--frame-length", "4", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_frames_transmitted\": 4"));
}
