use assert_cmd::prelude::*;
use rstest::rstest;
use std::process::Command;

fn json_line(stdout: &[u8], key: &str) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .find(|l| l.contains(key))
        .unwrap_or_else(|| panic!("no JSON line with {key}; stdout was: {text}"));
    serde_json::from_str(line).unwrap()
}

/// A short sweep run emits one summary record with the telemetry snapshot.
#[rstest]
fn follow_sweep_summary_schema() {
    let mut cmd = Command::cargo_bin("roto").unwrap();
    cmd.args([
        "--sim",
        "--json",
        "--log-level",
        "error",
        "follow",
        "--sweep",
        "--amplitude",
        "30",
        "--duration-s",
        "1.5",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let v = json_line(&out, "\"final_angle\"");

    assert!(v["final_angle"].is_i64());
    assert!(v["calibrated_angle"].is_number());
    assert!(v["home"].is_i64(), "home set when follow starts: {v}");
    let tel = v["telemetry"].as_object().unwrap();
    for key in [
        "actual_angle",
        "precise_angle",
        "target_angle",
        "capped_target_angle",
        "delta",
        "direction",
        "power",
        "min_power",
        "max_power",
        "anti_jump_ms",
        "angular_velocity",
        "full_turns",
        "calibrated_angle",
        "receive_hz",
        "lerp_hz",
        "send_hz",
    ] {
        assert!(tel.contains_key(key), "missing telemetry key {key}");
    }
    assert_eq!(tel["min_power"], 30);
}

#[rstest]
fn json_errors_carry_reason() {
    let mut cmd = Command::cargo_bin("roto").unwrap();
    cmd.env("ROTO_TEST_SIM_UNPLUGGED", "1")
        .args(["--sim", "--json", "--log-level", "error", "self-check"]);
    let out = cmd.assert().code(2).get_output().stdout.clone();
    let v = json_line(&out, "\"reason\"");
    assert_eq!(v["reason"], "NotConnected");
    assert!(v["message"].as_str().unwrap().contains("not connected"));
}
