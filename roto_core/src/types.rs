//! Domain types shared by the codec, transport and controller.

use crate::angle::Direction;
use serde::Serialize;

/// Operating mode of the chair.
///
/// The first five variants exist on the wire. `FollowObject` and
/// `JoystickMode` are host-side modes: the device runs `HeadTrack` while the
/// controller drives it. `Error` is only ever reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ModeType {
    #[default]
    IdleMode,
    Calibration,
    HeadTrack,
    FreeMode,
    CockpitMode,
    FollowObject,
    JoystickMode,
    Error,
}

impl ModeType {
    /// Mode code written into a SetMode command, if the mode can be commanded.
    pub const fn wire_code(self) -> Option<u8> {
        match self {
            ModeType::IdleMode => Some(0),
            ModeType::Calibration => Some(1),
            ModeType::HeadTrack | ModeType::FollowObject | ModeType::JoystickMode => Some(2),
            ModeType::FreeMode => Some(3),
            ModeType::CockpitMode => Some(4),
            ModeType::Error => None,
        }
    }

    /// Mode reported by the device for a given code.
    pub const fn from_wire(code: u8) -> Option<ModeType> {
        match code {
            0 => Some(ModeType::IdleMode),
            1 => Some(ModeType::Calibration),
            2 => Some(ModeType::HeadTrack),
            3 => Some(ModeType::FreeMode),
            4 => Some(ModeType::CockpitMode),
            5 => Some(ModeType::Error),
            _ => None,
        }
    }

    /// Mode the device reports once this mode is active.
    pub const fn device_mode(self) -> ModeType {
        match self {
            ModeType::FollowObject | ModeType::JoystickMode => ModeType::HeadTrack,
            other => other,
        }
    }

    /// Host-side modes that need a running follow routine.
    pub const fn is_follow(self) -> bool {
        matches!(self, ModeType::FollowObject | ModeType::JoystickMode)
    }
}

impl std::fmt::Display for ModeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MovementMode {
    #[default]
    Smooth,
    Jerky,
}

impl MovementMode {
    pub const fn wire_code(self) -> u8 {
        match self {
            MovementMode::Smooth => 0,
            MovementMode::Jerky => 1,
        }
    }
}

/// Parameters carried by a SetMode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeParams {
    /// Half-width of the allowed arc in cockpit mode, degrees.
    pub cockpit_angle_limit: i32,
    pub movement: MovementMode,
    /// Power ceiling, 30..=100.
    pub max_power: i32,
}

impl Default for ModeParams {
    fn default() -> Self {
        Self {
            cockpit_angle_limit: 0,
            movement: MovementMode::Smooth,
            max_power: 100,
        }
    }
}

/// Snapshot of the chair as last reported by the device.
///
/// Replaced wholesale on each report; never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChairState {
    pub mode: ModeType,
    /// Raw angle in whole degrees, `[0, 360)`.
    pub angle: i32,
    pub target_cockpit: i32,
    pub max_power: i32,
}

/// Chair state enriched with the smoothed angle stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChairSnapshot {
    pub state: ChairState,
    pub lerped_angle: f32,
    /// Lerped angle relative to the calibration home, `[0, 360)`.
    pub calibrated_angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    /// Physically rotate to the device's zero at low power.
    SetToZero,
    /// Record the current raw angle as the home baseline; no movement.
    SetCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A single rotate-to-angle motor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RotateCommand {
    pub direction: Direction,
    /// Absolute target, degrees `0..=360`.
    pub angle: i32,
    /// Motor power, `0..=100`.
    pub power: u8,
}
