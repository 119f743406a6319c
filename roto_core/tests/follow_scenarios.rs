//! Follow tracker behaviour over whole sessions, driven tick by tick.

use roto_core::FollowCfg;
use roto_core::angle::Direction;
use roto_core::follow::{FollowAction, FollowTracker};
use rstest::rstest;

const TICK_MS: u64 = 20;

#[test]
fn absolute_first_arm_rotates_once_to_target() {
    let cfg = FollowCfg {
        absolute_start: true,
        ..FollowCfg::default()
    };
    let mut t = FollowTracker::new(cfg, 0);

    let first = t.step(Some(45.0), 0, 0);
    let cmd = first.rotate_command().expect("first tick rotates");
    assert_eq!(cmd.direction, Direction::Right);
    assert_eq!(cmd.angle, 45);
    // 45° on the 0..50 ramp from 30 to 80
    assert_eq!(cmd.power, 75);

    // the chair arrives; nothing else is ever commanded
    let mut rotates = 1;
    for i in 1..50 {
        let s = t.step(Some(45.0), 45, i * TICK_MS);
        if s.rotate_command().is_some() {
            rotates += 1;
        }
    }
    assert_eq!(rotates, 1);
}

#[test]
fn no_target_issues_no_commands() {
    let mut t = FollowTracker::new(FollowCfg::default(), 0);
    for i in 0..20 {
        let s = t.step(None, 123, i * TICK_MS);
        assert_eq!(s.action, FollowAction::Hold);
        assert_eq!(s.delta, 0.0);
        assert_eq!(s.direction, None);
        assert_eq!(s.power, 0);
        assert!(!t.is_armed());
    }
}

#[test]
fn target_crossing_zero_moves_twenty_degrees() {
    let mut t = FollowTracker::new(FollowCfg::default(), 0);
    t.step(Some(350.0), 100, 0);
    let s = t.step(Some(10.0), 100, TICK_MS);
    assert_eq!(s.target_chair, 120.0);
    assert_eq!(s.delta, 20.0);
    let cmd = s.rotate_command().unwrap();
    assert_eq!(cmd.angle, 120);
    assert_eq!(cmd.direction, Direction::Right);
}

#[test]
fn aligned_session_disarms_after_anti_jump_window() {
    let mut t = FollowTracker::new(FollowCfg::default(), 0);
    let mut disarmed_at = None;
    for i in 0..12 {
        let now = i * TICK_MS;
        let s = t.step(Some(200.0), 30, now);
        if s.action == FollowAction::Hold {
            disarmed_at = Some(now);
            break;
        }
        assert_eq!(s.action, FollowAction::Aligned);
        assert_eq!(s.anti_jump_ms, now);
    }
    // aligned from t=0; the tick after the timer passes 100 ms disarms
    assert_eq!(disarmed_at, Some(140));
    assert!(!t.is_armed());

    // next sample re-arms from the current pair
    t.step(Some(210.0), 31, 160);
    assert_eq!(t.arm_count(), 2);
    assert_eq!(t.start_target(), Some(210.0));
    assert_eq!(t.start_chair(), Some(31));
}

#[test]
fn movement_resets_anti_jump() {
    let mut t = FollowTracker::new(FollowCfg::default(), 0);
    t.step(Some(0.0), 0, 0);
    t.step(Some(0.0), 0, 60);
    let s = t.step(Some(0.0), 0, 80);
    assert_eq!(s.anti_jump_ms, 80);
    let s = t.step(Some(30.0), 0, 100);
    assert!(s.rotate_command().is_some());
    let s = t.step(Some(30.0), 30, 120);
    assert_eq!(s.anti_jump_ms, 0);
    let s = t.step(Some(30.0), 30, 200);
    assert_eq!(s.anti_jump_ms, 80);
    assert!(t.is_armed());
}

#[rstest]
#[case(0.5, FollowAction::Aligned)]
#[case(0.99, FollowAction::Aligned)]
fn sub_degree_deltas_count_as_aligned(#[case] nudge: f32, #[case] expected: FollowAction) {
    let mut t = FollowTracker::new(FollowCfg::default(), 0);
    t.step(Some(100.0), 50, 0);
    let s = t.step(Some(100.0 + nudge), 50, TICK_MS);
    assert_eq!(s.action, expected);
}

#[rstest]
#[case(5.0, 35)]
#[case(25.0, 55)]
#[case(50.0, 80)]
#[case(120.0, 80)]
fn power_follows_clamped_ramp(#[case] delta: f32, #[case] power: u8) {
    let mut t = FollowTracker::new(FollowCfg::default(), 0);
    t.step(Some(0.0), 0, 0);
    let s = t.step(Some(delta), 0, TICK_MS);
    assert_eq!(s.power, power);
}

#[test]
fn capped_step_stops_short_in_the_right_direction() {
    let cfg = FollowCfg {
        cap_enabled: true,
        delta_cap_deg: 30.0,
        ..FollowCfg::default()
    };
    let mut t = FollowTracker::new(cfg, 0);
    t.step(Some(0.0), 350, 0);
    let s = t.step(Some(90.0), 350, TICK_MS);
    assert_eq!(s.target_chair, 80.0);
    assert_eq!(s.direction, Some(Direction::Right));
    assert_eq!(s.commanded, 20);
    // uncapped delta still drives the power
    assert_eq!(s.power, 80);
}
