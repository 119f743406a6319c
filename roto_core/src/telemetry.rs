//! Shared diagnostics record, refreshed by the control loops.
//!
//! One [`TelemetrySink`] is created per controller and shared by reference.
//! Writers update fields in place under a short lock; readers take a copy.
//! A version counter lets pollers skip unchanged records.

use crate::util::lock;
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Encoded size of [`Telemetry::to_bytes`].
pub const TELEMETRY_BYTES: usize = 16 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Telemetry {
    /// Last raw angle reported by the device.
    pub actual_angle: i32,
    /// Interpolated angle.
    pub precise_angle: f32,
    /// Chair angle the follow loop is tracking.
    pub target_angle: i32,
    /// Angle actually commanded after delta capping.
    pub capped_target_angle: i32,
    pub delta: f32,
    /// -1 left, 1 right, 0 when no rotation was commanded.
    pub direction: i32,
    pub power: i32,
    pub min_power: i32,
    /// Highest power commanded this session.
    pub max_power: i32,
    pub anti_jump_ms: i32,
    /// Degrees per second along the shorter arc.
    pub angular_velocity: f32,
    /// Net full turns detected from wraps of the interpolated angle.
    pub full_turns: i32,
    pub calibrated_angle: f32,
    pub receive_hz: f32,
    pub lerp_hz: f32,
    pub send_hz: f32,
}

impl Telemetry {
    /// Fixed little-endian layout, fields in declaration order, 4 bytes each.
    pub fn to_bytes(&self) -> [u8; TELEMETRY_BYTES] {
        let words: [[u8; 4]; 16] = [
            self.actual_angle.to_le_bytes(),
            self.precise_angle.to_le_bytes(),
            self.target_angle.to_le_bytes(),
            self.capped_target_angle.to_le_bytes(),
            self.delta.to_le_bytes(),
            self.direction.to_le_bytes(),
            self.power.to_le_bytes(),
            self.min_power.to_le_bytes(),
            self.max_power.to_le_bytes(),
            self.anti_jump_ms.to_le_bytes(),
            self.angular_velocity.to_le_bytes(),
            self.full_turns.to_le_bytes(),
            self.calibrated_angle.to_le_bytes(),
            self.receive_hz.to_le_bytes(),
            self.lerp_hz.to_le_bytes(),
            self.send_hz.to_le_bytes(),
        ];
        let mut out = [0u8; TELEMETRY_BYTES];
        for (dst, w) in out.chunks_exact_mut(4).zip(words) {
            dst.copy_from_slice(&w);
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct TelemetrySink {
    record: Mutex<Telemetry>,
    version: AtomicU64,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `f` to the record and bumps the version.
    pub fn update(&self, f: impl FnOnce(&mut Telemetry)) {
        f(&mut lock(&self.record));
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> Telemetry {
        *lock(&self.record)
    }

    /// Incremented on every update.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Snapshot only if the record changed since `seen`.
    pub fn changed_since(&self, seen: u64) -> Option<(u64, Telemetry)> {
        let v = self.version();
        (v != seen).then(|| (v, self.snapshot()))
    }

    pub fn reset(&self) {
        self.update(|t| *t = Telemetry::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_little_endian_in_field_order() {
        let t = Telemetry {
            actual_angle: 258,
            send_hz: 50.0,
            ..Telemetry::default()
        };
        let b = t.to_bytes();
        assert_eq!(&b[..4], &[2, 1, 0, 0]);
        assert_eq!(&b[60..], &50.0f32.to_le_bytes());
    }

    #[test]
    fn version_tracks_updates() {
        let sink = TelemetrySink::new();
        assert_eq!(sink.changed_since(0), None);
        sink.update(|t| t.power = 40);
        let (v, snap) = sink.changed_since(0).unwrap();
        assert_eq!(v, 1);
        assert_eq!(snap.power, 40);
        assert_eq!(sink.changed_since(v), None);
    }
}
