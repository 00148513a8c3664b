use assert_cmd::Command;
use predicates::str::contains;

const PODLOG_STORE: &str = "podlog-store";

#[test]
fn help_message_lists_the_config_flag() {
    let mut cmd = Command::cargo_bin(PODLOG_STORE).unwrap();
    cmd.arg("--help").assert().success().stdout(contains("--config"));
}

#[test]
fn missing_required_config_flag_fails() {
    let mut cmd = Command::cargo_bin(PODLOG_STORE).unwrap();
    cmd.assert().failure();
}

#[test]
fn nonexistent_config_path_fails() {
    let mut cmd = Command::cargo_bin(PODLOG_STORE).unwrap();
    cmd.arg("--config").arg("/nonexistent/path/to/config.json").assert().failure();
}
