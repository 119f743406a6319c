//! Angular arithmetic on the chair's yaw circle.
//!
//! All angles are degrees. "Normalized" means the half-open range `[0, 360)`.

use serde::Serialize;

/// Degrees in a full turn.
pub const FULL_TURN: f32 = 360.0;
/// Largest angle a single shortest-path rotation ever covers.
pub const HALF_TURN: f32 = 180.0;

/// Rotational sense of a motor command. `Right` increases the chair angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Byte the device expects in a rotate command.
    #[inline]
    pub const fn wire_code(self) -> u8 {
        match self {
            Direction::Left => b'L',
            Direction::Right => b'R',
        }
    }

    /// Signed unit used for telemetry and relative moves.
    #[inline]
    pub const fn sign(self) -> i32 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

/// Wrap any finite angle into `[0, 360)`. Non-finite input maps to 0.
#[inline]
pub fn normalize(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if r >= FULL_TURN { 0.0 } else { r }
}

/// Integer variant of [`normalize`].
#[inline]
pub fn normalize_i32(deg: i32) -> i32 {
    deg.rem_euclid(360)
}

/// Unsigned distance between two angles along the shorter arc, in `[0, 180]`.
#[inline]
pub fn reflected_delta(a: f32, b: f32) -> f32 {
    let d = (a - b).abs() % FULL_TURN;
    if d > HALF_TURN { FULL_TURN - d } else { d }
}

/// Shortest-rotation direction from `source` to `target`.
///
/// A forward difference larger than a half turn flips the sense, so the
/// commanded rotation never exceeds 180°. Ties at exactly 180° resolve by the
/// ordering of the two angles: `target > source` turns Right, otherwise Left.
pub fn get_direction(target: i32, source: i32) -> Direction {
    let far = (i64::from(target) - i64::from(source)).abs() > 180;
    if target > source {
        if far { Direction::Left } else { Direction::Right }
    } else if far {
        Direction::Right
    } else {
        Direction::Left
    }
}

/// Angle reached by turning `degrees` from `from` in `direction`.
#[inline]
pub fn step_towards(from: f32, direction: Direction, degrees: f32) -> f32 {
    normalize(from + direction.sign() as f32 * degrees)
}

/// Linear map of `x` from `[x_min, x_max]` onto `[y_min, y_max]`, clamped to the output range.
pub fn map_range_clamped(x: f32, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> f32 {
    let span = x_max - x_min;
    let y = if span == 0.0 {
        y_max
    } else {
        y_min + (y_max - y_min) * (x - x_min) / span
    };
    y.clamp(y_min.min(y_max), y_min.max(y_max))
}
