//! Runtime configuration for the chair controller.
//!
//! These are the structs consumed by `DeviceTransport`, `AngleInterpolator`
//! and `MotionController`. They are separate from the TOML-deserialized
//! config in `roto_config`; see `conversions` for the bridge.

use std::time::Duration;

/// USB identity and I/O timeouts.
#[derive(Debug, Clone)]
pub struct DeviceCfg {
    pub vid: u16,
    pub pid: u16,
    /// Timeout of a single blocking read in the read loop. Bounds how long
    /// shutdown waits for the reader to notice the stop flag.
    pub read_timeout_ms: u64,
    /// Upper bound on waiting for a SetMode confirmation report.
    pub mode_confirm_timeout_ms: u64,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            vid: 0x04D9,
            pid: 0xB564,
            read_timeout_ms: 50,
            mode_confirm_timeout_ms: 3000,
        }
    }
}

impl DeviceCfg {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn mode_confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.mode_confirm_timeout_ms)
    }
}

/// Follow-target loop tuning.
#[derive(Debug, Clone)]
pub struct FollowCfg {
    /// Command rate of the follow loop.
    pub write_hz: u32,
    /// Aligned time after which the session disarms.
    pub anti_jump_ms: u64,
    /// Deltas below this count as aligned.
    pub min_delta_deg: f32,
    pub min_power: u8,
    pub max_power: u8,
    /// Delta at which power reaches `max_power`.
    pub power_ramp_deg: f32,
    /// Largest single step when capping is enabled.
    pub delta_cap_deg: f32,
    pub cap_enabled: bool,
    /// Wait before the first iteration so the interpolator has samples.
    pub startup_delay_ms: u64,
    /// First arm of a session tracks the target as an absolute angle
    /// relative to the calibration home rather than from where it starts.
    pub absolute_start: bool,
}

impl Default for FollowCfg {
    fn default() -> Self {
        Self {
            write_hz: 50,
            anti_jump_ms: 100,
            min_delta_deg: 1.0,
            min_power: 30,
            max_power: 80,
            power_ramp_deg: 50.0,
            delta_cap_deg: 50.0,
            cap_enabled: false,
            startup_delay_ms: 500,
            absolute_start: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterpolatorCfg {
    pub rate_hz: u32,
    /// Interpolate along the shorter arc instead of the raw numeric path.
    pub shortest_arc: bool,
    /// How long the loop idles between checks when nobody listens.
    pub idle_ms: u64,
}

impl Default for InterpolatorCfg {
    fn default() -> Self {
        Self {
            rate_hz: 90,
            shortest_arc: false,
            idle_ms: 1000,
        }
    }
}

/// Everything the controller needs, bundled for the builder.
#[derive(Debug, Clone, Default)]
pub struct ControllerCfg {
    pub device: DeviceCfg,
    pub follow: FollowCfg,
    pub interpolator: InterpolatorCfg,
}

impl ControllerCfg {
    /// Rejects values the loops cannot run with.
    pub fn check(&self) -> Result<(), crate::error::BuildError> {
        use crate::error::BuildError::InvalidConfig;
        if self.follow.write_hz == 0 {
            return Err(InvalidConfig("follow.write_hz must be > 0"));
        }
        if self.interpolator.rate_hz == 0 {
            return Err(InvalidConfig("interpolator.rate_hz must be > 0"));
        }
        if self.follow.min_power > self.follow.max_power {
            return Err(InvalidConfig("follow.min_power must be <= follow.max_power"));
        }
        if self.follow.max_power > 100 {
            return Err(InvalidConfig("follow.max_power must be <= 100"));
        }
        if !(self.follow.power_ramp_deg.is_finite() && self.follow.power_ramp_deg > 0.0) {
            return Err(InvalidConfig("follow.power_ramp_deg must be > 0"));
        }
        if !(self.follow.min_delta_deg.is_finite() && self.follow.min_delta_deg >= 0.0) {
            return Err(InvalidConfig("follow.min_delta_deg must be >= 0"));
        }
        if self.follow.cap_enabled
            && !(self.follow.delta_cap_deg.is_finite() && self.follow.delta_cap_deg > 0.0)
        {
            return Err(InvalidConfig("follow.delta_cap_deg must be > 0 when capping"));
        }
        Ok(())
    }
}
