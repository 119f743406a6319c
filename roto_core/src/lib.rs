#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core for a motorized rotating chair (hardware-agnostic).
//!
//! All device I/O goes through `roto_traits::HidLink`; time goes through
//! `roto_traits::Clock`, so every loop runs against the simulated chair or a
//! mock in tests exactly as it does against the real device.
//!
//! ## Architecture
//!
//! - **Angles**: normalization, shortest-path direction (`angle`)
//! - **Codec**: 33-byte HID reports, checksum, multi-packet reassembly (`protocol`)
//! - **Transport**: connect handshake, read loop, writes (`transport`)
//! - **Interpolator**: fixed-rate smoothing of sparse angle reports (`interpolator`)
//! - **Follow**: per-tick tracking decisions with anti-jump and capping (`follow`)
//! - **Controller**: modes, calibration, commands, follow thread (`controller`)
//! - **Telemetry**: shared diagnostics record (`telemetry`)
//!
//! ## Threads
//!
//! A connected controller runs the transport read loop and the interpolator;
//! a follow session adds the follow loop. Each is owned by exactly one
//! handle and joined when that handle stops or drops.

pub mod angle;
pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod follow;
pub mod hw_error;
pub mod interpolator;
pub mod mocks;
pub mod protocol;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod util;

pub use angle::{Direction, get_direction, normalize};
pub use builder::MotionControllerBuilder;
pub use config::{ControllerCfg, DeviceCfg, FollowCfg, InterpolatorCfg};
pub use controller::{MotionController, TargetFn};
pub use error::{BuildError, Result, RotoError};
pub use telemetry::{Telemetry, TelemetrySink};
pub use types::{
    CalibrationMode, ChairSnapshot, ChairState, ConnectionStatus, ModeParams, ModeType,
    MovementMode, RotateCommand,
};
