use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, toml: &str) -> PathBuf {
    let path = dir.path().join("roto.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn roto() -> Command {
    let mut cmd = Command::cargo_bin("roto").unwrap();
    cmd.arg("--sim").arg("--log-level").arg("warn");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["mode", "cockpit", "--limit", "30"], 0, "mode CockpitMode active", "stdout")]
#[case(&["power", "60"], 0, "max power", "stdout")]
#[case(&["rumble", "--seconds", "0.5", "--power", "40"], 0, "rumble 0.5s", "stdout")]
#[case(&["rotate", "--to", "90", "--power", "100", "--wait-ms", "3000"], 0, "(now 90)", "stdout")]
#[case(&["rotate", "--by", "30"], 2, "--dir", "stderr")]
#[case(&["mode", "bogus"], 2, "invalid value", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = roto();
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn unplugged_chair_reports_not_connected() {
    roto()
        .env("ROTO_TEST_SIM_UNPLUGGED", "1")
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not connected"));
}

#[rstest]
fn unconfirmed_mode_times_out_with_exit_3() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[device]\nmode_confirm_timeout_ms = 100\n");
    roto()
        .env("ROTO_TEST_SIM_UNCONFIRMED", "1")
        .arg("--config")
        .arg(&cfg)
        .arg("mode")
        .arg("free")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "did not confirm mode FreeMode within 100 ms",
        ));
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[follow]\nmax_power = 150\n");
    roto()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("follow.max_power must be <= 100"));
}

#[rstest]
fn calibrate_current_records_home() {
    roto()
        .env("ROTO_TEST_SIM_ANGLE", "123")
        .arg("calibrate")
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("home=Some(123)"));
}

#[rstest]
fn follow_from_stdin_ends_at_eof() {
    roto()
        .arg("follow")
        .write_stdin("10\n20\n-\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("follow done"));
}
