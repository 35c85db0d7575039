#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn harness(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gameapi-harness").unwrap();
    cmd.current_dir(dir.path()).env_remove("HARNESS_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, body: &str) {
    std::fs::write(dir.path().join("gameapi-harness.yaml"), body).unwrap();
}

// ---------------------------------------------------------------------------
// config show
// ---------------------------------------------------------------------------

#[test]
fn show_defaults_without_config_file() {
    let dir = TempDir::new().unwrap();
    let output = harness(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["server"]["port"], 8000);
    assert_eq!(json["server"]["host"], "127.0.0.1");
    assert_eq!(json["controls"]["validate_schema"], true);
    assert_eq!(json["controls"]["auto_send"], false);
    assert_eq!(json["controls"]["send_delay_ms"], 0);
}

#[test]
fn show_reads_file_from_parent_directory() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server:\n  port: 9001\ncontrols:\n  auto_send: true\n");
    let nested = dir.path().join("game/build");
    std::fs::create_dir_all(&nested).unwrap();

    let mut cmd = Command::cargo_bin("gameapi-harness").unwrap();
    cmd.current_dir(&nested)
        .env_remove("HARNESS_CONFIG")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gameapi-harness.yaml"))
        .stdout(predicate::str::contains("port: 9001"))
        .stdout(predicate::str::contains("auto_send: true"));
}

#[test]
fn explicit_config_flag_wins() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server:\n  port: 9001\n");
    let other = dir.path().join("other.yaml");
    std::fs::write(&other, "server:\n  port: 9200\n").unwrap();

    harness(&dir)
        .args(["config", "show", "--config"])
        .arg(&other)
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 9200"));
}

#[test]
fn config_env_var_is_honoured() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env.yaml");
    std::fs::write(&path, "seed: 42\n").unwrap();

    harness(&dir)
        .env("HARNESS_CONFIG", &path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seed: 42"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    harness(&dir)
        .args(["config", "show", "--config", "nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

// ---------------------------------------------------------------------------
// config validate
// ---------------------------------------------------------------------------

#[test]
fn validate_clean_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "controls:\n  send_delay_ms: 500\n");
    harness(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn validate_rejects_out_of_range_delay() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "controls:\n  send_delay_ms: 20000\n");
    harness(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn validate_warnings_do_not_fail() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server:\n  port: 0\n");
    let output = harness(&dir)
        .args(["config", "validate", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["warnings"][0]["level"], "warning");
}

#[test]
fn malformed_yaml_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server: [not, a, map\n");
    harness(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

#[test]
fn serve_help_lists_control_flags() {
    let dir = TempDir::new().unwrap();
    harness(&dir)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--auto-send"))
        .stdout(predicate::str::contains("--ignore-forced"))
        .stdout(predicate::str::contains("--no-validate"))
        .stdout(predicate::str::contains("--delay-ms"));
}

#[test]
fn serve_rejects_out_of_range_delay_before_binding() {
    let dir = TempDir::new().unwrap();
    harness(&dir)
        .args(["serve", "--delay-ms", "20000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --delay-ms"));
}

#[test]
fn serve_rejects_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server:\n  host: \"\"\n");
    harness(&dir)
        .args(["serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("server.host is empty"));
}

#[test]
fn serve_quits_on_quit_command() {
    let dir = TempDir::new().unwrap();
    harness(&dir)
        .args(["serve", "--port", "0"])
        .write_stdin("help\nquit\n")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Waiting for a game on ws://127.0.0.1:"))
        .stdout(predicate::str::contains("force <n|name> [json]"));
}
