//! Command execution: backend selection, controller assembly, and one
//! function per subcommand.

use crate::cli::{Cli, Commands, ModeOpts};
use crate::publish::UdpPublisher;
use crate::rt::setup_rt_once;
use roto_core::error::{Result as CoreResult, RotoError};
use roto_core::{ControllerCfg, Direction, ModeType, MotionController, TargetFn, TelemetrySink};
use roto_hardware::{SimParams, SimulatedChair, SimulatedOpener};
use roto_traits::{HidOpener, MonotonicClock};
use serde_json::json;
use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// How long to wait for the first state report after connecting.
const FIRST_STATE_TIMEOUT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(5);

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

/// Simulated chair, shaped by `ROTO_TEST_SIM_*` variables so CLI tests can
/// reach failure paths.
fn sim_opener() -> SimulatedOpener {
    let params = SimParams {
        confirm_modes: !env_flag("ROTO_TEST_SIM_UNCONFIRMED"),
        ..SimParams::default()
    };
    let chair = SimulatedChair::with_params(params, Arc::new(MonotonicClock::new()));
    if let Some(a) = std::env::var("ROTO_TEST_SIM_ANGLE")
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
    {
        chair.set_angle(a);
    }
    if env_flag("ROTO_TEST_SIM_UNPLUGGED") {
        chair.unplug();
    }
    SimulatedOpener::new(chair)
}

pub fn make_opener(sim: bool) -> Arc<dyn HidOpener> {
    #[cfg(feature = "hardware")]
    if !sim {
        return Arc::new(roto_hardware::HidapiOpener);
    }
    #[cfg(not(feature = "hardware"))]
    if !sim {
        tracing::warn!("built without the hardware feature; using the simulated chair");
    }
    Arc::new(sim_opener())
}

fn emit(json_mode: bool, value: &serde_json::Value, text: &str) {
    if json_mode {
        println!("{value}");
    } else {
        println!("{text}");
    }
}

/// Polls `cond` until it holds, `deadline` passes, or shutdown is requested.
fn wait_for(deadline: Instant, shutdown: &AtomicBool, mut cond: impl FnMut() -> bool) -> bool {
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline || shutdown.load(Ordering::Relaxed) {
            return false;
        }
        std::thread::sleep(POLL);
    }
}

/// Connects and waits until the chair has reported its state once.
fn connect(ctrl: &MotionController, shutdown: &AtomicBool) -> CoreResult<()> {
    if !ctrl.connect() {
        return Err(RotoError::NotConnected.into());
    }
    let stats = ctrl.transport().stats();
    let got_state = wait_for(Instant::now() + FIRST_STATE_TIMEOUT, shutdown, || {
        stats.messages_in.load(Ordering::Relaxed) > 0
    });
    if !got_state {
        ctrl.disconnect();
        return Err(RotoError::Timeout.into());
    }
    tracing::info!(angle = ctrl.state().angle, mode = %ctrl.state().mode, "chair connected");
    Ok(())
}

pub fn run(cli: &Cli, cfg: &roto_config::Config, shutdown: &Arc<AtomicBool>) -> CoreResult<()> {
    if let Commands::Follow { rt, .. } = &cli.cmd {
        setup_rt_once(rt);
    }

    let telemetry = Arc::new(TelemetrySink::new());
    let ctrl = MotionController::builder()
        .with_config(ControllerCfg::from(cfg))
        .with_telemetry(telemetry.clone())
        .with_opener(make_opener(cli.sim))
        .build()?;

    connect(&ctrl, shutdown)?;
    let result = dispatch(cli, cfg, &ctrl, &telemetry, shutdown);
    ctrl.disconnect();
    result
}

fn dispatch(
    cli: &Cli,
    cfg: &roto_config::Config,
    ctrl: &MotionController,
    telemetry: &Arc<TelemetrySink>,
    shutdown: &Arc<AtomicBool>,
) -> CoreResult<()> {
    let json_mode = cli.json;
    match &cli.cmd {
        Commands::SelfCheck => {
            let s = ctrl.state();
            let stats = ctrl.transport().stats();
            emit(
                json_mode,
                &json!({
                    "status": "ok",
                    "mode": s.mode.to_string(),
                    "angle": s.angle,
                    "reports_in": stats.reports_in.load(Ordering::Relaxed),
                }),
                &format!("self-check ok: mode={} angle={}", s.mode, s.angle),
            );
            Ok(())
        }
        Commands::Mode { mode, opts } => {
            let mode = ModeType::from(*mode);
            ctrl.set_mode(mode, opts.params())?;
            emit(
                json_mode,
                &json!({ "mode": mode.to_string(), "device_mode": ctrl.state().mode.to_string() }),
                &format!("mode {mode} active"),
            );
            Ok(())
        }
        Commands::Power { power } => {
            ctrl.set_power(*power)?;
            let p = ctrl.state().max_power;
            emit(json_mode, &json!({ "max_power": p }), &format!("max power {p}"));
            Ok(())
        }
        Commands::Rotate {
            to,
            by,
            dir,
            power,
            wait_ms,
        } => rotate(
            ctrl,
            RotateArgs {
                to: *to,
                by: *by,
                dir: dir.map(Direction::from),
                power: *power,
                wait: Duration::from_millis(*wait_ms),
            },
            json_mode,
            shutdown,
        ),
        Commands::Rumble { seconds, power } => {
            ctrl.rumble(*seconds, *power)?;
            emit(
                json_mode,
                &json!({ "rumble_s": seconds, "power": power }),
                &format!("rumble {seconds:.1}s at power {power}"),
            );
            Ok(())
        }
        Commands::Calibrate { how } => {
            ctrl.calibrate((*how).into())?;
            emit(
                json_mode,
                &json!({ "home": ctrl.home_angle(), "angle": ctrl.state().angle }),
                &format!(
                    "calibrated: home={:?} angle={}",
                    ctrl.home_angle(),
                    ctrl.state().angle
                ),
            );
            Ok(())
        }
        Commands::Follow {
            sweep,
            amplitude,
            period_s,
            duration_s,
            joystick,
            opts,
            rt: _,
            stats,
        } => {
            let source = if *sweep {
                TargetSource::Sweep {
                    amplitude: *amplitude,
                    period_s: *period_s,
                }
            } else {
                TargetSource::Stdin
            };
            let run = FollowRun {
                source,
                duration: (*duration_s > 0.0).then(|| Duration::from_secs_f32(*duration_s)),
                mode: if *joystick {
                    ModeType::JoystickMode
                } else {
                    ModeType::FollowObject
                },
                opts: *opts,
                stats: *stats,
            };
            follow(ctrl, cfg, telemetry, &run, json_mode, shutdown)
        }
    }
}

struct RotateArgs {
    to: Option<i32>,
    by: Option<i32>,
    dir: Option<Direction>,
    power: i32,
    wait: Duration,
}

fn rotate(
    ctrl: &MotionController,
    args: RotateArgs,
    json_mode: bool,
    shutdown: &AtomicBool,
) -> CoreResult<()> {
    let start = ctrl.state().angle;
    let target = match (args.to, args.by, args.dir) {
        (Some(to), _, Some(d)) => {
            ctrl.rotate_to_angle(d, to, args.power)?;
            to.clamp(0, 359)
        }
        (Some(to), _, None) => {
            ctrl.rotate_to_closest(to, args.power)?;
            to.rem_euclid(360)
        }
        (None, Some(by), Some(d)) => {
            ctrl.rotate(d, by, args.power)?;
            (start + d.sign() * by).rem_euclid(360)
        }
        _ => return Err(RotoError::State("rotate needs --to, or --by with --dir".into()).into()),
    };

    if !args.wait.is_zero() {
        let reached = wait_for(Instant::now() + args.wait, shutdown, || {
            ctrl.state().angle == target
        });
        if !reached {
            tracing::warn!(target, angle = ctrl.state().angle, "target not reached in time");
            return Err(RotoError::Timeout.into());
        }
    }
    let angle = ctrl.state().angle;
    emit(
        json_mode,
        &json!({ "start": start, "target": target, "angle": angle }),
        &format!("rotate {start} -> {target} (now {angle})"),
    );
    Ok(())
}

enum TargetSource {
    Stdin,
    Sweep { amplitude: f32, period_s: f32 },
}

struct FollowRun {
    source: TargetSource,
    duration: Option<Duration>,
    mode: ModeType,
    opts: ModeOpts,
    stats: bool,
}

/// Target fed from stdin, one angle per line; `-` or an empty line means
/// hands off. Sets `eof` when stdin closes.
fn stdin_target(eof: Arc<AtomicBool>) -> CoreResult<TargetFn> {
    let latest: Arc<Mutex<Option<f32>>> = Arc::new(Mutex::new(None));
    let writer = latest.clone();
    // Blocking stdin reads cannot be cancelled, so this thread is left
    // detached; it exits on EOF or with the process.
    std::thread::Builder::new()
        .name("roto-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let t = line.trim();
                let value = if t.is_empty() || t == "-" {
                    None
                } else {
                    match t.parse::<f32>() {
                        Ok(v) if v.is_finite() => Some(v),
                        _ => {
                            tracing::warn!(line = t, "ignoring unparsable target");
                            continue;
                        }
                    }
                };
                *writer.lock().unwrap_or_else(PoisonError::into_inner) = value;
            }
            eof.store(true, Ordering::Relaxed);
        })
        .map_err(|e| RotoError::State(format!("spawn stdin reader: {e}")))?;
    Ok(Arc::new(move || {
        *latest.lock().unwrap_or_else(PoisonError::into_inner)
    }))
}

fn sweep_target(amplitude: f32, period_s: f32) -> TargetFn {
    let start = Instant::now();
    let period = period_s.max(0.1);
    Arc::new(move || {
        let t = start.elapsed().as_secs_f32();
        Some(amplitude * (std::f32::consts::TAU * t / period).sin())
    })
}

fn follow(
    ctrl: &MotionController,
    cfg: &roto_config::Config,
    telemetry: &Arc<TelemetrySink>,
    run: &FollowRun,
    json_mode: bool,
    shutdown: &AtomicBool,
) -> CoreResult<()> {
    let eof = Arc::new(AtomicBool::new(false));
    let target = match run.source {
        TargetSource::Stdin => stdin_target(eof.clone())?,
        TargetSource::Sweep {
            amplitude,
            period_s,
        } => sweep_target(amplitude, period_s),
    };

    let _publisher = match cfg.telemetry.udp_target.as_deref() {
        Some(t) => {
            let addr: SocketAddr = t
                .parse()
                .map_err(|e| RotoError::Config(format!("telemetry.udp_target {t:?}: {e}")))?;
            Some(UdpPublisher::spawn(
                addr,
                Duration::from_millis(cfg.telemetry.interval_ms),
                telemetry.clone(),
            )?)
        }
        None => None,
    };

    ctrl.switch_mode(run.mode, run.opts.params(), Some(target))?;
    let started = Instant::now();
    tracing::info!(mode = %run.mode, "following; Ctrl-C to stop");

    let mut outcome = Ok(());
    loop {
        if shutdown.load(Ordering::Relaxed) || eof.load(Ordering::Relaxed) {
            break;
        }
        if run.duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        if !ctrl.transport().is_connected() {
            outcome = Err(RotoError::NotConnected.into());
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    ctrl.stop_follow();

    let snap = ctrl.snapshot();
    let tel = telemetry.snapshot();
    if run.stats {
        print_stats(ctrl, &tel, started.elapsed());
    }
    emit(
        json_mode,
        &json!({
            "final_angle": snap.state.angle,
            "calibrated_angle": snap.calibrated_angle,
            "home": ctrl.home_angle(),
            "telemetry": tel,
        }),
        &format!(
            "follow done: angle={} calibrated={:.1}",
            snap.state.angle, snap.calibrated_angle
        ),
    );
    outcome
}

/// Print loop rates and transport counters to stderr.
fn print_stats(ctrl: &MotionController, tel: &roto_core::Telemetry, ran: Duration) {
    let s = ctrl.transport().stats();
    eprintln!("\n--- Roto Stats ---");
    eprintln!("Run time (s): {:.1}", ran.as_secs_f32());
    eprintln!(
        "Rates receive/lerp/send (Hz): {:.1} / {:.1} / {:.1}",
        tel.receive_hz, tel.lerp_hz, tel.send_hz
    );
    eprintln!(
        "Reports in/out: {} / {}",
        s.reports_in.load(Ordering::Relaxed),
        s.reports_out.load(Ordering::Relaxed)
    );
    eprintln!(
        "Messages in / dropped packets: {} / {}",
        s.messages_in.load(Ordering::Relaxed),
        s.dropped_in.load(Ordering::Relaxed)
    );
    eprintln!("Full turns: {}", tel.full_turns);
    eprintln!("Max power commanded: {}", tel.max_power);
    eprintln!("------------------\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_starts_at_zero_and_stays_in_amplitude() {
        let f = sweep_target(30.0, 1.0);
        let first = f().unwrap();
        assert!(first.abs() < 5.0);
        for _ in 0..5 {
            assert!(f().unwrap().abs() <= 30.0);
        }
    }

    #[test]
    fn wait_for_gives_up_at_deadline() {
        let stop = AtomicBool::new(false);
        let t0 = Instant::now();
        assert!(!wait_for(t0 + Duration::from_millis(20), &stop, || false));
        assert!(t0.elapsed() >= Duration::from_millis(20));
        assert!(wait_for(t0, &stop, || true));
    }
}
