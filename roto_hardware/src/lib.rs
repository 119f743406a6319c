//! HID backends for the chair: an always-available simulator and, behind the
//! `hardware` feature, a hidapi-based link to the real device.

pub mod error;
pub mod sim;

#[cfg(feature = "hardware")]
pub mod hid;

#[cfg(feature = "hardware")]
pub use hid::{HidapiLink, HidapiOpener};
pub use sim::{SimParams, SimStats, SimulatedChair, SimulatedOpener};
