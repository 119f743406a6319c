//! Smooths sparse raw angle reports into a steady, fixed-rate stream.
//!
//! The device reports its angle at 5-20 Hz. The interpolator keeps the two
//! most recent reports and, on its own thread, emits
//! `previous + (latest - previous) * t` at the configured rate, where `t` is
//! the fraction of the last report interval that has elapsed since the
//! latest report (clamped to `[0, 1]`).
//!
//! Reports and ticks meet in [`SampleCell`], a set of atomics: the report
//! thread never waits on the tick loop and the tick loop never waits on it.
//!
//! Safety: the worker thread is stopped and joined on `stop` and on drop.

use crate::angle::{FULL_TURN, HALF_TURN, normalize};
use crate::config::InterpolatorCfg;
use crate::util::{lock, period_us, rate_hz};
use roto_traits::clock::Clock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Receives every interpolated angle.
pub type AngleListener = Arc<dyn Fn(f32) + Send + Sync>;

/// Longest single sleep while idling, so `stop` stays responsive.
const IDLE_SLICE: Duration = Duration::from_millis(50);

/// The two most recent raw samples and their spacing.
#[derive(Debug, Clone, Copy)]
pub struct Samples {
    previous: f32,
    latest: f32,
    /// Interval between the last two reports; never zero.
    frame_time: Duration,
    last_update: Option<Instant>,
}

impl Default for Samples {
    fn default() -> Self {
        Self {
            previous: 0.0,
            latest: 0.0,
            frame_time: Duration::from_millis(1),
            last_update: None,
        }
    }
}

impl Samples {
    /// Records a new raw report taken at `now`.
    pub fn update(&mut self, angle: f32, now: Instant) {
        self.previous = self.latest;
        self.latest = angle;
        if let Some(prev) = self.last_update {
            self.frame_time = now
                .saturating_duration_since(prev)
                .max(Duration::from_millis(1));
        }
        self.last_update = Some(now);
    }

    /// Interpolated angle at `now`, wrapped into `[0, 360)`.
    pub fn value_at(&self, now: Instant, shortest_arc: bool) -> f32 {
        let Some(last) = self.last_update else {
            return normalize(self.latest);
        };
        let elapsed = now.saturating_duration_since(last).as_secs_f32();
        let t = (elapsed / self.frame_time.as_secs_f32()).clamp(0.0, 1.0);
        let mut span = self.latest - self.previous;
        if shortest_arc {
            if span > HALF_TURN {
                span -= FULL_TURN;
            } else if span < -HALF_TURN {
                span += FULL_TURN;
            }
        }
        normalize(self.previous + span * t)
    }

    pub fn latest(&self) -> f32 {
        self.latest
    }

    pub fn previous(&self) -> f32 {
        self.previous
    }

    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }
}

/// Lock-free home of the latest [`Samples`]. Single writer (the report
/// thread); a reader racing a write may see the new pair with the old frame
/// time for one tick.
struct SampleCell {
    epoch: Instant,
    /// `previous` bits in the high half, `latest` bits in the low half.
    pair: AtomicU64,
    frame_us: AtomicU64,
    /// Micros since `epoch` of the last report, plus one; zero means none.
    last_us: AtomicU64,
}

impl SampleCell {
    fn new(epoch: Instant) -> Self {
        let cell = Self {
            epoch,
            pair: AtomicU64::new(0),
            frame_us: AtomicU64::new(0),
            last_us: AtomicU64::new(0),
        };
        cell.store(&Samples::default());
        cell
    }

    fn load(&self) -> Samples {
        let last_us = self.last_us.load(Ordering::Acquire);
        let pair = self.pair.load(Ordering::Acquire);
        Samples {
            previous: f32::from_bits((pair >> 32) as u32),
            latest: f32::from_bits(pair as u32),
            frame_time: Duration::from_micros(self.frame_us.load(Ordering::Acquire)),
            last_update: last_us
                .checked_sub(1)
                .map(|us| self.epoch + Duration::from_micros(us)),
        }
    }

    fn store(&self, s: &Samples) {
        let pair = (u64::from(s.previous.to_bits()) << 32) | u64::from(s.latest.to_bits());
        let last_us = s.last_update.map_or(0, |t| {
            t.saturating_duration_since(self.epoch).as_micros() as u64 + 1
        });
        self.frame_us
            .store(s.frame_time.as_micros() as u64, Ordering::Release);
        self.pair.store(pair, Ordering::Release);
        self.last_us.store(last_us, Ordering::Release);
    }

    fn update(&self, angle: f32, now: Instant) {
        let mut s = self.load();
        s.update(angle, now);
        self.store(&s);
    }
}

struct Shared {
    samples: SampleCell,
    listener: Mutex<Option<AngleListener>>,
    /// f32 bits of the achieved loop rate.
    achieved_hz: AtomicU32,
    ticks: AtomicU64,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct AngleInterpolator {
    cfg: InterpolatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl AngleInterpolator {
    pub fn new(cfg: InterpolatorCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            shared: Arc::new(Shared {
                samples: SampleCell::new(clock.now()),
                listener: Mutex::new(None),
                achieved_hz: AtomicU32::new(0),
                ticks: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
            cfg,
            clock,
        }
    }

    /// Feeds a raw angle report.
    pub fn update_value(&self, angle: f32) {
        let now = self.clock.now();
        self.shared.samples.update(angle, now);
    }

    /// Installs (or with `None`, removes) the consumer of the smoothed stream.
    /// Without a listener the loop idles instead of computing.
    pub fn set_listener(&self, listener: Option<AngleListener>) {
        *lock(&self.shared.listener) = listener;
    }

    /// Current interpolated value, computed on demand.
    pub fn current(&self) -> f32 {
        let now = self.clock.now();
        self.shared.samples.load().value_at(now, self.cfg.shortest_arc)
    }

    pub fn samples(&self) -> Samples {
        self.shared.samples.load()
    }

    /// Loop rate achieved over the last tick.
    pub fn achieved_hz(&self) -> f32 {
        f32::from_bits(self.shared.achieved_hz.load(Ordering::Relaxed))
    }

    /// Number of values delivered to listeners since construction.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker).is_some()
    }

    /// Starts the loop, replacing (and joining) any loop already running.
    pub fn start(&self) {
        let mut slot = lock(&self.worker);
        if let Some(old) = slot.take() {
            join_worker(old);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let shared = self.shared.clone();
        let clock = self.clock.clone();
        let period = Duration::from_micros(period_us(self.cfg.rate_hz));
        let idle = Duration::from_millis(self.cfg.idle_ms);
        let shortest_arc = self.cfg.shortest_arc;

        let handle = std::thread::spawn(move || {
            let mut last_tick = clock.now();
            loop {
                if stop_flag.load(Ordering::Relaxed) {
                    tracing::debug!("interpolator received shutdown signal");
                    break;
                }

                let listener = lock(&shared.listener).clone();
                let Some(listener) = listener else {
                    idle_wait(clock.as_ref(), &stop_flag, idle);
                    last_tick = clock.now();
                    continue;
                };

                let started = clock.now();
                let value = shared.samples.load().value_at(started, shortest_arc);
                listener(value);
                shared.ticks.fetch_add(1, Ordering::Relaxed);

                let spent = clock.now().saturating_duration_since(started);
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                if spent < period {
                    clock.sleep(period - spent);
                }
                let now = clock.now();
                let us = now.saturating_duration_since(last_tick).as_micros() as u64;
                shared
                    .achieved_hz
                    .store(rate_hz(us).to_bits(), Ordering::Relaxed);
                last_tick = now;
            }
            tracing::trace!("interpolator thread exiting cleanly");
        });

        *slot = Some(Worker { stop, handle });
    }

    /// Stops and joins the loop, then forgets the samples so the next run
    /// starts from zero. No-op when not running.
    pub fn stop(&self) {
        if let Some(w) = lock(&self.worker).take() {
            join_worker(w);
            self.shared.samples.store(&Samples::default());
        }
    }
}

impl Drop for AngleInterpolator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn idle_wait(clock: &(dyn Clock + Send + Sync), stop: &AtomicBool, total: Duration) {
    let mut left = total;
    while !left.is_zero() && !stop.load(Ordering::Relaxed) {
        let slice = left.min(IDLE_SLICE);
        clock.sleep(slice);
        left = left.saturating_sub(slice);
    }
}

fn join_worker(w: Worker) {
    w.stop.store(true, Ordering::Relaxed);
    match w.handle.join() {
        Ok(()) => tracing::trace!("interpolator thread joined"),
        Err(e) => tracing::warn!(?e, "interpolator thread panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn no_samples_yields_zero() {
        let s = Samples::default();
        assert_eq!(s.value_at(Instant::now(), false), 0.0);
    }

    #[test]
    fn fraction_is_clamped() {
        let base = Instant::now();
        let mut s = Samples::default();
        s.update(10.0, base);
        s.update(20.0, at(base, 100));
        assert_eq!(s.frame_time(), Duration::from_millis(100));
        assert!((s.value_at(at(base, 150), false) - 15.0).abs() < 1e-3);
        assert_eq!(s.value_at(at(base, 400), false), 20.0);
    }

    #[test]
    fn same_instant_updates_keep_frame_time_positive() {
        let base = Instant::now();
        let mut s = Samples::default();
        s.update(1.0, base);
        s.update(2.0, base);
        assert_eq!(s.frame_time(), Duration::from_millis(1));
    }

    #[test]
    fn raw_mode_sweeps_back_across_the_wrap() {
        let base = Instant::now();
        let mut s = Samples::default();
        s.update(350.0, base);
        s.update(10.0, at(base, 100));
        let mid = s.value_at(at(base, 150), false);
        assert!((mid - 180.0).abs() < 1e-3, "raw midpoint {mid}");
        let mid = s.value_at(at(base, 150), true);
        assert!(mid < 1e-3 || mid > 359.999, "short-arc midpoint {mid}");
    }
}
