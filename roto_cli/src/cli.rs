//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use roto_core::{CalibrationMode, Direction, ModeType, MovementMode};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "roto", version, about = "Rotating chair controller")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Talk to the built-in simulated chair instead of USB hardware
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: requests SCHED_FIFO for the process before the control threads start (they inherit it), pins to one CPU, and locks memory with mlockall. Needs CAP_SYS_NICE / CAP_IPC_LOCK or root; failures are logged and the run continues.\n\nOther OSes: only memory locking is attempted where available."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority (1..=max); Linux only
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin to (Linux only, default 0)
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    Idle,
    Calibration,
    HeadTrack,
    Free,
    Cockpit,
    Follow,
    Joystick,
}

impl From<ModeArg> for ModeType {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Idle => ModeType::IdleMode,
            ModeArg::Calibration => ModeType::Calibration,
            ModeArg::HeadTrack => ModeType::HeadTrack,
            ModeArg::Free => ModeType::FreeMode,
            ModeArg::Cockpit => ModeType::CockpitMode,
            ModeArg::Follow => ModeType::FollowObject,
            ModeArg::Joystick => ModeType::JoystickMode,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DirArg {
    Left,
    Right,
}

impl From<DirArg> for Direction {
    fn from(d: DirArg) -> Self {
        match d {
            DirArg::Left => Direction::Left,
            DirArg::Right => Direction::Right,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CalibrateArg {
    /// Drive the chair to the device zero at low power
    Zero,
    /// Record the current angle as home without moving
    Current,
}

impl From<CalibrateArg> for CalibrationMode {
    fn from(c: CalibrateArg) -> Self {
        match c {
            CalibrateArg::Zero => CalibrationMode::SetToZero,
            CalibrateArg::Current => CalibrationMode::SetCurrent,
        }
    }
}

/// SetMode parameters shared by `mode` and `follow`.
#[derive(Args, Debug, Clone, Copy)]
pub struct ModeOpts {
    /// Half-width of the allowed arc in cockpit mode (degrees)
    #[arg(long, default_value_t = 0)]
    pub limit: i32,
    /// Jerky instead of smooth movement
    #[arg(long, action = ArgAction::SetTrue)]
    pub jerky: bool,
    /// Power ceiling (30..=100)
    #[arg(long, default_value_t = 100)]
    pub max_power: i32,
}

impl ModeOpts {
    pub fn params(&self) -> roto_core::ModeParams {
        roto_core::ModeParams {
            cockpit_angle_limit: self.limit,
            movement: if self.jerky {
                MovementMode::Jerky
            } else {
                MovementMode::Smooth
            },
            max_power: self.max_power,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect, wait for the first state report, print it, disconnect
    SelfCheck,
    /// Switch the operating mode and wait for the device to confirm
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
        #[command(flatten)]
        opts: ModeOpts,
    },
    /// Change the power ceiling of the current mode
    Power {
        /// Power (30..=100)
        power: i32,
    },
    /// Rotate to an absolute angle or by a relative amount
    Rotate {
        /// Absolute target angle (degrees)
        #[arg(long, conflicts_with = "by", required_unless_present = "by")]
        to: Option<i32>,
        /// Relative rotation (degrees, needs --dir)
        #[arg(long, requires = "dir")]
        by: Option<i32>,
        /// Direction; with --to and no --dir the shorter way is taken
        #[arg(long, value_enum)]
        dir: Option<DirArg>,
        /// Motor power (0..=100)
        #[arg(long, default_value_t = 50)]
        power: i32,
        /// Wait until the chair reports the target angle (ms, 0 = don't wait)
        #[arg(long, value_name = "MS", default_value_t = 0)]
        wait_ms: u64,
    },
    /// Vibrate the chair
    Rumble {
        /// Duration in seconds (0..=25.5)
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
        /// Power (0..=100)
        #[arg(long, default_value_t = 50)]
        power: i32,
    },
    /// Calibrate the home angle
    Calibrate {
        #[arg(value_enum)]
        how: CalibrateArg,
    },
    /// Follow a stream of target angles
    Follow {
        /// Built-in sweep instead of reading targets from stdin
        #[arg(long, action = ArgAction::SetTrue)]
        sweep: bool,
        /// Sweep amplitude (degrees)
        #[arg(long, default_value_t = 45.0)]
        amplitude: f32,
        /// Sweep period (seconds)
        #[arg(long, default_value_t = 4.0)]
        period_s: f32,
        /// Stop after this many seconds (0 = until EOF or Ctrl-C)
        #[arg(long, default_value_t = 0.0)]
        duration_s: f32,
        /// Use joystick mode instead of follow-object mode
        #[arg(long, action = ArgAction::SetTrue)]
        joystick: bool,
        #[command(flatten)]
        opts: ModeOpts,
        #[command(flatten)]
        rt: RtArgs,
        /// Print loop rates and transport counters on exit
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
}
