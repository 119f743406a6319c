#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the chair controller.
//!
//! `Config` and its sections are deserialized from TOML and validated.
//! Every section is optional; a missing section takes its defaults, so an
//! empty file is a valid configuration.
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceCfg {
    /// USB vendor id. TOML accepts hex literals (`0x04D9`).
    pub vid: u16,
    pub pid: u16,
    /// Timeout of one blocking HID read (ms)
    pub read_timeout_ms: u64,
    /// How long `set_mode` waits for the device to confirm (ms)
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FollowCfg {
    pub write_hz: u32,
    pub anti_jump_ms: u64,
    pub min_delta_deg: f32,
    pub min_power: u8,
    pub max_power: u8,
    /// Delta (deg) at which power reaches `max_power`
    pub power_ramp_deg: f32,
    pub delta_cap_deg: f32,
    pub cap_enabled: bool,
    pub startup_delay_ms: u64,
    /// First arm tracks the target as an absolute angle from the home
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InterpolatorCfg {
    pub rate_hz: u32,
    /// Interpolate along the shorter arc across the 0/360 seam
    pub shortest_arc: bool,
}

impl Default for InterpolatorCfg {
    fn default() -> Self {
        Self {
            rate_hz: 90,
            shortest_arc: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryCfg {
    /// Optional "ip:port" to publish telemetry records to over UDP
    pub udp_target: Option<String>,
    pub interval_ms: u64,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            udp_target: None,
            interval_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceCfg,
    pub follow: FollowCfg,
    pub interpolator: InterpolatorCfg,
    pub logging: Logging,
    pub telemetry: TelemetryCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Reads, parses and validates a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("reading {}: {e}", path.display()))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parsing {}: {e}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.vid == 0 || self.device.pid == 0 {
            eyre::bail!("device.vid and device.pid must be non-zero");
        }
        if self.device.read_timeout_ms == 0 {
            eyre::bail!("device.read_timeout_ms must be >= 1");
        }
        if self.device.read_timeout_ms > 5_000 {
            eyre::bail!("device.read_timeout_ms is unreasonably large (>5s)");
        }
        if self.device.mode_confirm_timeout_ms == 0 {
            eyre::bail!("device.mode_confirm_timeout_ms must be >= 1");
        }

        // Follow
        let f = &self.follow;
        if f.write_hz == 0 || f.write_hz > 1000 {
            eyre::bail!("follow.write_hz must be in 1..=1000");
        }
        if f.max_power > 100 {
            eyre::bail!("follow.max_power must be <= 100");
        }
        if f.min_power > f.max_power {
            eyre::bail!("follow.min_power must be <= follow.max_power");
        }
        if !(f.min_delta_deg >= 0.0 && f.min_delta_deg < 180.0) {
            eyre::bail!("follow.min_delta_deg must be in [0, 180)");
        }
        if !(f.power_ramp_deg > 0.0 && f.power_ramp_deg <= 180.0) {
            eyre::bail!("follow.power_ramp_deg must be in (0, 180]");
        }
        if f.cap_enabled && !(f.delta_cap_deg > 0.0 && f.delta_cap_deg <= 180.0) {
            eyre::bail!("follow.delta_cap_deg must be in (0, 180] when cap_enabled");
        }
        if f.startup_delay_ms > 60_000 {
            eyre::bail!("follow.startup_delay_ms is unreasonably large (>60s)");
        }

        // Interpolator
        if self.interpolator.rate_hz == 0 || self.interpolator.rate_hz > 2000 {
            eyre::bail!("interpolator.rate_hz must be in 1..=2000");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Telemetry
        if let Some(target) = self.telemetry.udp_target.as_deref()
            && target.parse::<SocketAddr>().is_err()
        {
            eyre::bail!("telemetry.udp_target must be ip:port, got {target:?}");
        }
        if self.telemetry.interval_ms == 0 {
            eyre::bail!("telemetry.interval_ms must be >= 1");
        }
        Ok(())
    }
}
