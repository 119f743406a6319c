//! In-process chair that speaks the HID wire format.
//!
//! The simulator parses the same 33-byte output reports the real device
//! accepts, moves its platform toward the commanded angle at a speed
//! proportional to the commanded power, and streams state reports split into
//! a first packet and a continuation packet.

use crate::error::HwError;
use roto_traits::{Clock, HidLink, HidOpener, MonotonicClock};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const REPORT_LEN: usize = 33;
const MESSAGE_LEN: usize = 19;
const SYNC: u8 = 0xF1;
const CHECKSUM_AT: usize = MESSAGE_LEN - 1;
const FIRST_PACKET: usize = 8;

const CMD_CONNECT: u8 = 0x41;
const CMD_DISCONNECT: u8 = 0x5A;
const CMD_MODE: u8 = b'S';
const CMD_MOTION: u8 = b'M';

/// Wire code of the idle mode.
pub const IDLE_MODE: u8 = 0;

/// Tunables of the simulated platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Platform speed at power 100.
    pub max_speed_deg_s: f32,
    /// Interval between unsolicited state reports.
    pub report_interval: Duration,
    /// Apply SetMode and answer with an immediate state report. When false
    /// the chair ignores mode changes, like firmware that stopped listening.
    pub confirm_modes: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_speed_deg_s: 180.0,
            report_interval: Duration::from_millis(20),
            confirm_modes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Motion {
    target: f32,
    clockwise: bool,
    power: u8,
}

/// Counters and last observed values, for tests and diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub accepted: u64,
    pub rejected: u64,
    pub reports_sent: u64,
    pub rumbles: u64,
    pub last_rumble: Option<(u8, u8)>,
    pub features: Vec<Vec<u8>>,
}

struct SimState {
    params: SimParams,
    angle: f32,
    mode: u8,
    max_power: u8,
    motion: Option<Motion>,
    session_open: bool,
    unplugged: bool,
    outbox: VecDeque<[u8; REPORT_LEN]>,
    last_step: Instant,
    next_report: Instant,
    stats: SimStats,
}

/// A simulated chair. Clones share the same platform.
#[derive(Clone)]
pub struct SimulatedChair {
    st: Arc<Mutex<SimState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

fn lock(m: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn checksum(message: &[u8]) -> u8 {
    message
        .iter()
        .take(CHECKSUM_AT)
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Remaining travel from `from` to `to` when turning in one direction.
fn travel(from: f32, to: f32, clockwise: bool) -> f32 {
    if clockwise {
        (to - from).rem_euclid(360.0)
    } else {
        (from - to).rem_euclid(360.0)
    }
}

impl Default for SimulatedChair {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChair {
    pub fn new() -> Self {
        Self::with_params(SimParams::default(), Arc::new(MonotonicClock::new()))
    }

    pub fn with_params(params: SimParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let now = clock.now();
        Self {
            st: Arc::new(Mutex::new(SimState {
                params,
                angle: 0.0,
                mode: IDLE_MODE,
                max_power: 100,
                motion: None,
                session_open: false,
                unplugged: false,
                outbox: VecDeque::new(),
                last_step: now,
                next_report: now,
                stats: SimStats::default(),
            })),
            clock,
        }
    }

    /// Places the platform at `angle` and cancels any motion.
    pub fn set_angle(&self, angle: f32) {
        let mut st = lock(&self.st);
        st.angle = angle.rem_euclid(360.0);
        st.motion = None;
    }

    pub fn angle(&self) -> f32 {
        lock(&self.st).angle
    }

    /// Current mode wire code.
    pub fn mode(&self) -> u8 {
        lock(&self.st).mode
    }

    pub fn is_moving(&self) -> bool {
        lock(&self.st).motion.is_some()
    }

    /// Whether a Connect command was received and not yet followed by Disconnect.
    pub fn session_open(&self) -> bool {
        lock(&self.st).session_open
    }

    pub fn stats(&self) -> SimStats {
        lock(&self.st).stats.clone()
    }

    /// Simulates pulling the USB cable; every later call fails.
    pub fn unplug(&self) {
        let mut st = lock(&self.st);
        st.unplugged = true;
        st.session_open = false;
        st.outbox.clear();
    }

    /// Advances the platform to the clock's current time.
    pub fn tick(&self) {
        let now = self.clock.now();
        lock(&self.st).advance(now);
    }
}

impl SimState {
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_step).as_secs_f32();
        self.last_step = now;
        let Some(m) = self.motion else {
            return;
        };
        let power = m.power.min(self.max_power);
        let step = self.params.max_speed_deg_s * f32::from(power) / 100.0 * dt;
        let left = travel(self.angle, m.target, m.clockwise);
        if step >= left {
            self.angle = m.target;
            self.motion = None;
            tracing::trace!(angle = self.angle, "sim: target reached");
        } else if m.clockwise {
            self.angle = (self.angle + step).rem_euclid(360.0);
        } else {
            self.angle = (self.angle - step).rem_euclid(360.0);
        }
    }

    fn state_message(&self) -> [u8; MESSAGE_LEN] {
        let mut m = [0u8; MESSAGE_LEN];
        let a = (self.angle.round() as i32).rem_euclid(360);
        m[0] = SYNC;
        m[1] = CMD_MODE;
        m[2] = self.mode;
        if a >= 256 {
            m[5] = 1;
            m[6] = (a - 256) as u8;
        } else {
            m[6] = a as u8;
        }
        m[CHECKSUM_AT] = checksum(&m);
        m
    }

    /// Queues the current state as a first packet plus one continuation.
    fn queue_state(&mut self) {
        let msg = self.state_message();
        for part in [&msg[..FIRST_PACKET], &msg[FIRST_PACKET..]] {
            let mut r = [0u8; REPORT_LEN];
            r[1] = part.len() as u8;
            r[2..2 + part.len()].copy_from_slice(part);
            self.outbox.push_back(r);
        }
        self.stats.reports_sent += 1;
    }

    fn apply(&mut self, report: &[u8]) {
        if report.len() < 2 + MESSAGE_LEN || usize::from(report[1]) != MESSAGE_LEN {
            self.stats.rejected += 1;
            return;
        }
        let m = &report[2..2 + MESSAGE_LEN];
        if m[0] != SYNC || m[CHECKSUM_AT] != checksum(m) {
            self.stats.rejected += 1;
            tracing::debug!("sim: bad checksum, command ignored");
            return;
        }
        self.stats.accepted += 1;
        match m[1] {
            CMD_CONNECT => {
                self.session_open = true;
                self.queue_state();
            }
            CMD_DISCONNECT => {
                self.session_open = false;
                self.motion = None;
                self.outbox.clear();
            }
            CMD_MODE if self.params.confirm_modes => {
                self.mode = m[2];
                self.max_power = m[12].min(100);
                tracing::debug!(mode = self.mode, max_power = self.max_power, "sim: mode");
                self.queue_state();
            }
            CMD_MODE => tracing::debug!(mode = m[2], "sim: mode change ignored"),
            CMD_MOTION if m[7] == 1 => {
                self.stats.rumbles += 1;
                self.stats.last_rumble = Some((m[8], m[9]));
            }
            CMD_MOTION => {
                let clockwise = match m[3] {
                    b'R' => true,
                    b'L' => false,
                    _ => {
                        self.stats.rejected += 1;
                        return;
                    }
                };
                let target = (u16::from(m[4]) * 256 + u16::from(m[5])) % 360;
                self.motion = Some(Motion {
                    target: f32::from(target),
                    clockwise,
                    power: m[6],
                });
            }
            other => {
                self.stats.rejected += 1;
                tracing::debug!(cmd = other, "sim: unknown command");
            }
        }
    }
}

impl HidLink for SimulatedChair {
    fn write(&self, report: &[u8]) -> Result<usize, BoxError> {
        let now = self.clock.now();
        let mut st = lock(&self.st);
        if st.unplugged {
            return Err(Box::new(HwError::Disconnected));
        }
        st.advance(now);
        st.apply(report);
        Ok(report.len())
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
        let wait = {
            let now = self.clock.now();
            let mut st = lock(&self.st);
            if st.unplugged {
                return Err(Box::new(HwError::Disconnected));
            }
            st.advance(now);
            if st.outbox.is_empty() && st.session_open && now >= st.next_report {
                let interval = st.params.report_interval;
                st.next_report = now + interval;
                st.queue_state();
            }
            if let Some(r) = st.outbox.pop_front() {
                let n = r.len().min(buf.len());
                buf[..n].copy_from_slice(&r[..n]);
                return Ok(n);
            }
            st.next_report.saturating_duration_since(now)
        };
        // Idle until the next report is due, then let the caller poll again.
        self.clock.sleep(wait.max(Duration::from_millis(1)).min(timeout));
        Ok(0)
    }

    fn send_feature(&self, data: &[u8]) -> Result<(), BoxError> {
        let mut st = lock(&self.st);
        if st.unplugged {
            return Err(Box::new(HwError::Disconnected));
        }
        st.stats.features.push(data.to_vec());
        Ok(())
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let st = lock(&self.st);
        if st.unplugged {
            return Err(Box::new(HwError::Disconnected));
        }
        let last = st.stats.features.last().cloned().unwrap_or_default();
        let n = last.len().min(buf.len());
        buf[..n].copy_from_slice(&last[..n]);
        Ok(n)
    }
}

/// Opener that always finds the one simulated chair.
#[derive(Clone, Default)]
pub struct SimulatedOpener {
    chair: SimulatedChair,
}

impl SimulatedOpener {
    pub fn new(chair: SimulatedChair) -> Self {
        Self { chair }
    }

    pub fn chair(&self) -> &SimulatedChair {
        &self.chair
    }
}

impl HidOpener for SimulatedOpener {
    fn open(&self, vid: u16, pid: u16) -> Result<Box<dyn HidLink>, BoxError> {
        if lock(&self.chair.st).unplugged {
            return Err(Box::new(HwError::Hid(format!(
                "no device {vid:04x}:{pid:04x}"
            ))));
        }
        tracing::info!(vid, pid, "opened simulated chair");
        Ok(Box::new(self.chair.clone()))
    }
}
