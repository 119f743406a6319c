use roto_config::{load_file, load_toml};
use rstest::rstest;

#[test]
fn empty_file_is_valid_with_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults validate");
    assert_eq!(cfg.device.vid, 0x04D9);
    assert_eq!(cfg.device.pid, 0xB564);
    assert_eq!(cfg.follow.write_hz, 50);
    assert_eq!(cfg.follow.anti_jump_ms, 100);
    assert_eq!(cfg.interpolator.rate_hz, 90);
    assert!(!cfg.interpolator.shortest_arc);
    assert_eq!(cfg.telemetry.interval_ms, 100);
}

#[test]
fn hex_ids_and_partial_sections_parse() {
    let toml = r#"
[device]
vid = 0x1234
pid = 0xABCD

[follow]
max_power = 95
cap_enabled = true
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.device.vid, 0x1234);
    assert_eq!(cfg.device.pid, 0xABCD);
    assert_eq!(cfg.device.read_timeout_ms, 50);
    assert_eq!(cfg.follow.max_power, 95);
    assert_eq!(cfg.follow.min_power, 30);
    assert!(cfg.follow.cap_enabled);
}

#[test]
fn unknown_sections_are_rejected() {
    let err = load_toml("[joystick]\ndeadzone = 5\n").expect_err("unknown section");
    assert!(err.to_string().contains("joystick"));
}

#[rstest]
#[case("[follow]\nwrite_hz = 0\n", "follow.write_hz")]
#[case("[follow]\nmax_power = 120\n", "follow.max_power must be <= 100")]
#[case("[follow]\nmin_power = 90\nmax_power = 60\n", "follow.min_power")]
#[case("[follow]\npower_ramp_deg = 0.0\n", "follow.power_ramp_deg")]
#[case(
    "[follow]\ncap_enabled = true\ndelta_cap_deg = 0.0\n",
    "follow.delta_cap_deg"
)]
#[case("[interpolator]\nrate_hz = 0\n", "interpolator.rate_hz")]
#[case("[device]\nread_timeout_ms = 0\n", "device.read_timeout_ms")]
#[case("[device]\nvid = 0\n", "must be non-zero")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
#[case("[telemetry]\nudp_target = \"nowhere\"\n", "telemetry.udp_target")]
#[case("[telemetry]\ninterval_ms = 0\n", "telemetry.interval_ms")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        err.to_string().contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn udp_target_accepts_socket_address() {
    let cfg = load_toml("[telemetry]\nudp_target = \"127.0.0.1:9100\"\n").expect("parse");
    cfg.validate().expect("valid");
}

#[test]
fn load_file_reads_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[interpolator]\nrate_hz = 120\n").expect("write");
    let cfg = load_file(&good).expect("load");
    assert_eq!(cfg.interpolator.rate_hz, 120);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[follow]\nwrite_hz = 0\n").expect("write");
    assert!(load_file(&bad).is_err());
    assert!(load_file(&dir.path().join("missing.toml")).is_err());
}
