use proptest::prelude::*;
use roto_core::angle::{
    Direction, get_direction, normalize, normalize_i32, reflected_delta, step_towards,
};

/// Degrees travelled when turning from `source` to `target` in `dir`.
fn travel(target: i32, source: i32, dir: Direction) -> i32 {
    match dir {
        Direction::Right => (target - source).rem_euclid(360),
        Direction::Left => (source - target).rem_euclid(360),
    }
}

proptest! {
    #[test]
    fn normalize_lands_in_range_and_is_idempotent(x in -1.0e6f32..1.0e6) {
        let n = normalize(x);
        prop_assert!((0.0..360.0).contains(&n), "normalize({x}) = {n}");
        prop_assert_eq!(normalize(n), n);
    }

    #[test]
    fn normalize_i32_lands_in_range_and_is_idempotent(x in any::<i32>()) {
        let n = normalize_i32(x);
        prop_assert!((0..360).contains(&n));
        prop_assert_eq!(normalize_i32(n), n);
    }

    #[test]
    fn direction_takes_the_short_way(target in 0i32..360, source in 0i32..360) {
        let dir = get_direction(target, source);
        prop_assert!(travel(target, source, dir) <= 180);
    }

    #[test]
    fn reflected_delta_is_symmetric_and_bounded(a in 0.0f32..360.0, b in 0.0f32..360.0) {
        let d = reflected_delta(a, b);
        prop_assert!((0.0..=180.0).contains(&d));
        prop_assert!((d - reflected_delta(b, a)).abs() < 1e-3);
    }

    #[test]
    fn stepping_by_the_delta_reaches_the_target(target in 0i32..360, source in 0i32..360) {
        let dir = get_direction(target, source);
        let d = travel(target, source, dir);
        let reached = step_towards(source as f32, dir, d as f32);
        prop_assert!(reflected_delta(reached, target as f32) < 1e-3);
    }
}

#[test]
fn half_turn_boundary_resolves_by_ordering() {
    // exactly 180 apart is not "far": the ordering rule decides
    assert_eq!(get_direction(180, 0), Direction::Right);
    assert_eq!(get_direction(0, 180), Direction::Left);
    // one past the half turn flips
    assert_eq!(get_direction(181, 0), Direction::Left);
    assert_eq!(get_direction(0, 181), Direction::Right);
    // equal angles fall into the `<=` branch
    assert_eq!(get_direction(90, 90), Direction::Left);
}
