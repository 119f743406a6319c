//! The motion controller: connection and mode state, calibration, motor
//! commands, and the follow-target routine.
//!
//! Data flow: transport reports replace the cached [`ChairState`] and feed
//! the interpolator; the interpolator's ticks update velocity, calibrated
//! angle and telemetry and reach data observers; the follow routine runs on
//! its own thread at the write rate and reads the last *raw* angle.
//!
//! Safety: at most one follow thread exists. Starting a session, stopping
//! one, and dropping the controller all cancel and join the previous thread
//! before anything else touches session state.

use crate::angle::{Direction, get_direction, normalize, normalize_i32, reflected_delta};
use crate::config::ControllerCfg;
use crate::error::{Result, RotoError};
use crate::follow::{FollowStep, FollowTracker};
use crate::interpolator::AngleInterpolator;
use crate::protocol::{Command, RawState};
use crate::telemetry::TelemetrySink;
use crate::transport::{DeviceTransport, TransportEvent};
use crate::types::{
    CalibrationMode, ChairSnapshot, ChairState, ConnectionStatus, ModeParams, ModeType,
    RotateCommand,
};
use crate::util::{lock, period_us, rate_hz, read, write};
use crossbeam_channel as xch;
use roto_traits::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Supplies the angle to follow; `None` means hands off.
pub type TargetFn = Arc<dyn Fn() -> Option<f32> + Send + Sync>;
pub type StatusObserver = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;
pub type ModeObserver = Arc<dyn Fn(ModeType) + Send + Sync>;
pub type DataObserver = Arc<dyn Fn(&ChairSnapshot) + Send + Sync>;

/// Power used by `calibrate(SetToZero)`.
pub const CALIBRATION_POWER: u8 = 30;
/// Range accepted by `set_power`.
pub const MIN_MODE_POWER: i32 = 30;
pub const MAX_MODE_POWER: i32 = 100;
/// Longest rumble the wire format can carry.
pub const MAX_RUMBLE_S: f32 = 25.5;
/// A jump of the interpolated angle larger than this between two ticks is a wrap.
const WRAP_JUMP_DEG: f32 = 300.0;
const STARTUP_SLICE: Duration = Duration::from_millis(20);

#[derive(Default)]
struct Observers {
    status: Mutex<Vec<StatusObserver>>,
    mode: Mutex<Vec<ModeObserver>>,
    data: Mutex<Vec<DataObserver>>,
}

#[derive(Debug, Default)]
struct MotionTrack {
    prev: Option<(f32, Instant)>,
    full_turns: i32,
    last_report: Option<Instant>,
}

pub(crate) struct Inner {
    cfg: ControllerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    transport: DeviceTransport,
    interpolator: AngleInterpolator,
    telemetry: Arc<TelemetrySink>,
    state: RwLock<ChairState>,
    status: RwLock<ConnectionStatus>,
    /// Mode as the caller sees it; may be a host-side mode.
    host_mode: RwLock<ModeType>,
    params: RwLock<ModeParams>,
    home: RwLock<Option<i32>>,
    waiters: Mutex<Vec<(ModeType, xch::Sender<ModeType>)>>,
    observers: Observers,
    motion: Mutex<MotionTrack>,
}

struct FollowSession {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct MotionController {
    inner: Arc<Inner>,
    follow: Mutex<Option<FollowSession>>,
}

impl std::fmt::Debug for MotionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionController")
            .field("status", &self.status())
            .field("state", &self.state())
            .field("mode", &self.mode())
            .field("home", &self.home_angle())
            .field("following", &self.is_following())
            .finish()
    }
}

impl MotionController {
    pub(crate) fn new(
        cfg: ControllerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        transport: DeviceTransport,
        telemetry: Arc<TelemetrySink>,
    ) -> Self {
        let interpolator = AngleInterpolator::new(cfg.interpolator.clone(), clock.clone());
        let params = ModeParams {
            max_power: i32::from(cfg.follow.max_power),
            ..ModeParams::default()
        };
        let inner = Arc::new(Inner {
            cfg,
            clock,
            transport,
            interpolator,
            telemetry,
            state: RwLock::new(ChairState::default()),
            status: RwLock::new(ConnectionStatus::Disconnected),
            host_mode: RwLock::new(ModeType::IdleMode),
            params: RwLock::new(params),
            home: RwLock::new(None),
            waiters: Mutex::new(Vec::new()),
            observers: Observers::default(),
            motion: Mutex::new(MotionTrack::default()),
        });

        let weak = Arc::downgrade(&inner);
        inner.transport.add_listener(Arc::new(move |ev| {
            if let Some(inner) = weak.upgrade() {
                Inner::on_transport_event(&inner, ev);
            }
        }));
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        inner.interpolator.set_listener(Some(Arc::new(move |angle| {
            if let Some(inner) = weak.upgrade() {
                inner.on_interpolated(angle);
            }
        })));

        Self {
            inner,
            follow: Mutex::new(None),
        }
    }

    // ── observers ────────────────────────────────────────────────────────────

    pub fn on_connection_status(&self, f: impl Fn(ConnectionStatus) + Send + Sync + 'static) {
        lock(&self.inner.observers.status).push(Arc::new(f));
    }

    /// Called with every mode change the device reports.
    pub fn on_mode_changed(&self, f: impl Fn(ModeType) + Send + Sync + 'static) {
        lock(&self.inner.observers.mode).push(Arc::new(f));
    }

    /// Called on every interpolator tick.
    pub fn on_data_changed(&self, f: impl Fn(&ChairSnapshot) + Send + Sync + 'static) {
        lock(&self.inner.observers.data).push(Arc::new(f));
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn state(&self) -> ChairState {
        *read(&self.inner.state)
    }

    pub fn snapshot(&self) -> ChairSnapshot {
        self.inner.snapshot(self.inner.interpolator.current())
    }

    pub fn status(&self) -> ConnectionStatus {
        *read(&self.inner.status)
    }

    pub fn mode(&self) -> ModeType {
        *read(&self.inner.host_mode)
    }

    pub fn params(&self) -> ModeParams {
        *read(&self.inner.params)
    }

    pub fn home_angle(&self) -> Option<i32> {
        *read(&self.inner.home)
    }

    pub fn telemetry(&self) -> &Arc<TelemetrySink> {
        &self.inner.telemetry
    }

    pub fn transport(&self) -> &DeviceTransport {
        &self.inner.transport
    }

    pub fn interpolator(&self) -> &AngleInterpolator {
        &self.inner.interpolator
    }

    pub fn is_following(&self) -> bool {
        lock(&self.follow).is_some()
    }

    // ── connection ───────────────────────────────────────────────────────────

    /// Connects to the chair. Returns `false` if the device could not be
    /// opened or did not accept the handshake.
    pub fn connect(&self) -> bool {
        if self.inner.transport.is_connected() {
            return true;
        }
        self.inner.set_status(ConnectionStatus::Connecting);
        self.inner.transport.connect()
    }

    pub fn disconnect(&self) {
        self.stop_follow();
        self.inner.transport.disconnect();
        self.inner.interpolator.stop();
    }

    // ── modes ────────────────────────────────────────────────────────────────

    /// Switches the device mode and waits for the device to confirm it.
    ///
    /// No-op when `mode` is already active. Host-side modes are sent as
    /// `HeadTrack`. Fails with `ModeConfirmTimeout` if no confirming report
    /// arrives within `device.mode_confirm_timeout_ms`.
    pub fn set_mode(&self, mode: ModeType, params: ModeParams) -> Result<()> {
        if self.mode() == mode && self.state().mode == mode.device_mode() {
            tracing::debug!(%mode, "mode already active");
            return Ok(());
        }
        if !self.inner.transport.is_connected() {
            return Err(RotoError::NotConnected.into());
        }
        let params = clamp_params(params);
        let device_mode = mode.device_mode();
        let cmd = Command::SetMode { mode, params };

        if self.state().mode == device_mode {
            self.inner.transport.send(&cmd)?;
        } else {
            let (tx, rx) = xch::bounded(1);
            lock(&self.inner.waiters).push((device_mode, tx));
            if let Err(e) = self.inner.transport.send(&cmd) {
                self.inner.drop_waiters(device_mode);
                return Err(e);
            }
            let timeout = self.inner.cfg.device.mode_confirm_timeout();
            if rx.recv_timeout(timeout).is_err() {
                self.inner.drop_waiters(device_mode);
                tracing::warn!(%mode, "mode change not confirmed");
                return Err(RotoError::ModeConfirmTimeout {
                    mode,
                    waited_ms: timeout.as_millis() as u64,
                }
                .into());
            }
        }

        *write(&self.inner.params) = params;
        *write(&self.inner.host_mode) = mode;
        tracing::info!(%mode, max_power = params.max_power, "mode set");
        Ok(())
    }

    /// Changes the power ceiling of the current mode. Clamped to 30..=100.
    /// Does not wait for confirmation since the mode itself is unchanged.
    pub fn set_power(&self, power: i32) -> Result<()> {
        let power = power.clamp(MIN_MODE_POWER, MAX_MODE_POWER);
        let params = {
            let mut p = write(&self.inner.params);
            p.max_power = power;
            *p
        };
        write(&self.inner.state).max_power = power;
        self.inner.transport.send(&Command::SetMode {
            mode: self.mode(),
            params,
        })
    }

    /// Stops any follow session, sets `mode`, and for follow-type modes
    /// starts following `target`.
    pub fn switch_mode(
        &self,
        mode: ModeType,
        params: ModeParams,
        target: Option<TargetFn>,
    ) -> Result<()> {
        self.stop_follow();
        self.set_mode(mode, params)?;
        if mode.is_follow() {
            match target {
                Some(t) => self.follow_target(t)?,
                None => tracing::error!(%mode, "follow mode needs a target function"),
            }
        }
        Ok(())
    }

    // ── motion ───────────────────────────────────────────────────────────────

    /// Rotates to an absolute angle. `angle` is clamped to 0..=360 and
    /// `power` to 0..=100. Skipped when the chair already reports `angle`.
    pub fn rotate_to_angle(&self, direction: Direction, angle: i32, power: i32) -> Result<()> {
        let angle = angle.clamp(0, 360);
        if angle == self.state().angle {
            tracing::trace!(angle, "already at angle");
            return Ok(());
        }
        let cmd = RotateCommand {
            direction,
            angle,
            power: power.clamp(0, 100) as u8,
        };
        tracing::debug!(?direction, angle, power = cmd.power, "rotate");
        self.inner.transport.send(&Command::Rotate(cmd))
    }

    /// Rotates by `degrees` relative to the current raw angle.
    pub fn rotate(&self, direction: Direction, degrees: i32, power: i32) -> Result<()> {
        let from = self.state().angle;
        let target = normalize_i32(from + direction.sign() * degrees);
        self.rotate_to_angle(direction, target, power)
    }

    /// Rotates to `angle` along the shorter way.
    pub fn rotate_to_closest(&self, angle: i32, power: i32) -> Result<()> {
        let angle = normalize_i32(angle);
        let direction = get_direction(angle, self.state().angle);
        self.rotate_to_angle(direction, angle, power)
    }

    /// Vibrates the chair. Duration clamped to 0..=25.5 s, power to 0..=100.
    pub fn rumble(&self, duration_s: f32, power: i32) -> Result<()> {
        let duration_s = if duration_s.is_finite() {
            duration_s.clamp(0.0, MAX_RUMBLE_S)
        } else {
            0.0
        };
        self.inner.transport.send(&Command::Rumble {
            duration_s,
            power: power.clamp(0, 100) as u8,
        })
    }

    pub fn calibrate(&self, mode: CalibrationMode) -> Result<()> {
        match mode {
            CalibrationMode::SetCurrent => {
                let angle = self.state().angle;
                *write(&self.inner.home) = Some(angle);
                tracing::info!(home = angle, "calibration home set");
                Ok(())
            }
            CalibrationMode::SetToZero => {
                let direction = get_direction(0, self.state().angle);
                self.rotate_to_angle(direction, 0, i32::from(CALIBRATION_POWER))
            }
        }
    }

    // ── follow ───────────────────────────────────────────────────────────────

    /// Starts following `target`, replacing any running session.
    ///
    /// The previous session is cancelled and joined first. The chair's
    /// current raw angle becomes the calibration home.
    pub fn follow_target(&self, target: TargetFn) -> Result<()> {
        let mut slot = lock(&self.follow);
        if let Some(old) = slot.take() {
            join_follow(old);
        }

        let home = self.state().angle;
        *write(&self.inner.home) = Some(home);
        self.inner.telemetry.update(|t| {
            t.min_power = i32::from(self.inner.cfg.follow.min_power);
            t.max_power = 0;
        });
        self.inner.interpolator.start();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name("roto-follow".into())
            .spawn(move || follow_routine(&inner, &target, &stop_flag, home))
            .map_err(|e| RotoError::State(format!("spawn follow thread: {e}")))?;

        *slot = Some(FollowSession { stop, handle });
        tracing::info!(home, "follow started");
        Ok(())
    }

    /// Cancels and joins the follow session, if any.
    pub fn stop_follow(&self) {
        if let Some(s) = lock(&self.follow).take() {
            join_follow(s);
            tracing::info!("follow stopped");
        }
    }
}

impl Drop for MotionController {
    fn drop(&mut self) {
        self.stop_follow();
        self.inner.interpolator.stop();
    }
}

fn join_follow(s: FollowSession) {
    s.stop.store(true, Ordering::Relaxed);
    match s.handle.join() {
        Ok(()) => tracing::trace!("follow thread joined"),
        Err(e) => tracing::warn!(?e, "follow thread panicked"),
    }
}

fn clamp_params(p: ModeParams) -> ModeParams {
    ModeParams {
        cockpit_angle_limit: p.cockpit_angle_limit.clamp(0, 180),
        movement: p.movement,
        max_power: p.max_power.clamp(MIN_MODE_POWER, MAX_MODE_POWER),
    }
}

fn follow_routine(inner: &Inner, target: &TargetFn, stop: &AtomicBool, home: i32) {
    let clock = inner.clock.as_ref();
    let cfg = &inner.cfg.follow;

    let mut wait = Duration::from_millis(cfg.startup_delay_ms);
    while !wait.is_zero() && !stop.load(Ordering::Relaxed) {
        let slice = wait.min(STARTUP_SLICE);
        clock.sleep(slice);
        wait -= slice;
    }

    let mut tracker = FollowTracker::new(cfg.clone(), home);
    let period = Duration::from_micros(period_us(cfg.write_hz));
    let epoch = clock.now();
    let mut last_tick = epoch;

    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::debug!("follow received shutdown signal");
            break;
        }
        let started = clock.now();

        let sample = target();
        let chair = read(&inner.state).angle;
        let step = tracker.step(sample, chair, clock.ms_since(epoch));

        if let Some(cmd) = step.rotate_command() {
            if inner.transport.is_connected() {
                if let Err(e) = inner.transport.send(&Command::Rotate(cmd)) {
                    tracing::debug!(error = %e, "follow rotate not sent");
                }
            }
        }

        let spent = clock.now().saturating_duration_since(started);
        if spent < period && !stop.load(Ordering::Relaxed) {
            clock.sleep(period - spent);
        }
        let now = clock.now();
        let send_hz = rate_hz(now.saturating_duration_since(last_tick).as_micros() as u64);
        last_tick = now;
        publish_step(inner, &step, send_hz);
    }
    tracker.disarm();
}

fn publish_step(inner: &Inner, step: &FollowStep, send_hz: f32) {
    inner.telemetry.update(|t| {
        t.target_angle = step.target_chair.round() as i32;
        t.capped_target_angle = step.commanded;
        t.delta = step.delta;
        t.direction = step.direction.map_or(0, Direction::sign);
        t.power = i32::from(step.power);
        t.max_power = t.max_power.max(i32::from(step.power));
        t.anti_jump_ms = step.anti_jump_ms.min(i32::MAX as u64) as i32;
        t.send_hz = send_hz;
    });
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        *write(&self.status) = status;
        let observers = lock(&self.observers.status).clone();
        for o in observers {
            o(status);
        }
    }

    fn drop_waiters(&self, mode: ModeType) {
        lock(&self.waiters).retain(|(m, _)| *m != mode);
    }

    fn on_transport_event(this: &Arc<Self>, ev: TransportEvent) {
        match ev {
            TransportEvent::Connected => {
                this.set_status(ConnectionStatus::Connected);
                if !this.interpolator.is_running() {
                    this.interpolator.start();
                }
            }
            TransportEvent::Disconnected => {
                this.set_status(ConnectionStatus::Disconnected);
                this.interpolator.stop();
                *lock(&this.motion) = MotionTrack::default();
            }
            TransportEvent::State(raw) => this.on_raw_state(raw),
        }
    }

    fn on_raw_state(&self, raw: RawState) {
        let params = *read(&self.params);
        let (prev, next) = {
            let mut s = write(&self.state);
            let prev = *s;
            *s = ChairState {
                mode: raw.mode.unwrap_or(prev.mode),
                angle: raw.angle,
                target_cockpit: params.cockpit_angle_limit,
                max_power: params.max_power,
            };
            (prev, *s)
        };
        self.interpolator.update_value(next.angle as f32);

        let now = self.clock.now();
        let receive_hz = {
            let mut m = lock(&self.motion);
            let hz = m
                .last_report
                .map(|t| rate_hz(now.saturating_duration_since(t).as_micros() as u64));
            m.last_report = Some(now);
            hz
        };
        self.telemetry.update(|t| {
            t.actual_angle = next.angle;
            if let Some(hz) = receive_hz {
                t.receive_hz = hz;
            }
        });

        lock(&self.waiters).retain(|(m, tx)| {
            if *m == next.mode {
                let _ = tx.try_send(next.mode);
                false
            } else {
                true
            }
        });

        if prev.mode != next.mode {
            {
                let mut host = write(&self.host_mode);
                if host.device_mode() != next.mode {
                    *host = next.mode;
                }
            }
            tracing::info!(from = %prev.mode, to = %next.mode, "device mode changed");
            let observers = lock(&self.observers.mode).clone();
            for o in observers {
                o(next.mode);
            }
        }
    }

    fn on_interpolated(&self, angle: f32) {
        let now = self.clock.now();
        let (velocity, full_turns) = {
            let mut m = lock(&self.motion);
            if m.last_report.is_none() {
                // nothing reported yet this session; the value is a placeholder
                return;
            }
            let mut velocity = 0.0;
            if let Some((prev, at)) = m.prev {
                let dt = now.saturating_duration_since(at).as_secs_f32();
                if dt > 0.0 {
                    velocity = reflected_delta(angle, prev) / dt;
                }
                let jump = angle - prev;
                if jump.abs() > WRAP_JUMP_DEG {
                    m.full_turns += if jump < 0.0 { 1 } else { -1 };
                }
            }
            m.prev = Some((angle, now));
            (velocity, m.full_turns)
        };

        let snapshot = self.snapshot(angle);
        let lerp_hz = self.interpolator.achieved_hz();
        self.telemetry.update(|t| {
            t.precise_angle = angle;
            t.calibrated_angle = snapshot.calibrated_angle;
            t.angular_velocity = velocity;
            t.full_turns = full_turns;
            t.lerp_hz = lerp_hz;
        });

        let observers = lock(&self.observers.data).clone();
        for o in observers {
            o(&snapshot);
        }
    }

    fn snapshot(&self, lerped: f32) -> ChairSnapshot {
        let home = read(&self.home).map_or(lerped, |h| h as f32);
        ChairSnapshot {
            state: *read(&self.state),
            lerped_angle: lerped,
            calibrated_angle: normalize(lerped - home),
        }
    }
}
