//! `From` implementations bridging `roto_config` types to `roto_core` types.

use crate::config::{ControllerCfg, DeviceCfg, FollowCfg, InterpolatorCfg};

// ── DeviceCfg ────────────────────────────────────────────────────────────────

impl From<&roto_config::DeviceCfg> for DeviceCfg {
    fn from(c: &roto_config::DeviceCfg) -> Self {
        Self {
            vid: c.vid,
            pid: c.pid,
            read_timeout_ms: c.read_timeout_ms,
            mode_confirm_timeout_ms: c.mode_confirm_timeout_ms,
        }
    }
}

// ── FollowCfg ────────────────────────────────────────────────────────────────

impl From<&roto_config::FollowCfg> for FollowCfg {
    fn from(c: &roto_config::FollowCfg) -> Self {
        Self {
            write_hz: c.write_hz,
            anti_jump_ms: c.anti_jump_ms,
            min_delta_deg: c.min_delta_deg,
            min_power: c.min_power,
            max_power: c.max_power,
            power_ramp_deg: c.power_ramp_deg,
            delta_cap_deg: c.delta_cap_deg,
            cap_enabled: c.cap_enabled,
            startup_delay_ms: c.startup_delay_ms,
            absolute_start: c.absolute_start,
        }
    }
}

// ── InterpolatorCfg ──────────────────────────────────────────────────────────

impl From<&roto_config::InterpolatorCfg> for InterpolatorCfg {
    fn from(c: &roto_config::InterpolatorCfg) -> Self {
        Self {
            rate_hz: c.rate_hz,
            shortest_arc: c.shortest_arc,
            ..Self::default()
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&roto_config::Config> for ControllerCfg {
    fn from(c: &roto_config::Config) -> Self {
        Self {
            device: (&c.device).into(),
            follow: (&c.follow).into(),
            interpolator: (&c.interpolator).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_agree() {
        let from_file = ControllerCfg::from(&roto_config::Config::default());
        let native = ControllerCfg::default();
        assert_eq!(from_file.device.vid, native.device.vid);
        assert_eq!(from_file.device.pid, native.device.pid);
        assert_eq!(from_file.follow.write_hz, native.follow.write_hz);
        assert_eq!(from_file.follow.max_power, native.follow.max_power);
        assert_eq!(from_file.interpolator.rate_hz, native.interpolator.rate_hz);
        assert_eq!(from_file.interpolator.idle_ms, native.interpolator.idle_ms);
    }
}
