//! Interpolator output shape and worker-thread lifecycle.

use roto_core::InterpolatorCfg;
use roto_core::interpolator::AngleInterpolator;
use roto_traits::clock::test_clock::TestClock;
use roto_traits::clock::{Clock, MonotonicClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn with_test_clock(cfg: InterpolatorCfg) -> (AngleInterpolator, TestClock) {
    let clock = TestClock::new();
    let interp = AngleInterpolator::new(cfg, Arc::new(clock.clone()));
    (interp, clock)
}

#[test]
fn ten_hz_reports_become_a_smooth_ramp() {
    let (interp, clock) = with_test_clock(InterpolatorCfg::default());
    let report = Duration::from_millis(100);

    interp.update_value(10.0);
    clock.advance(report);
    interp.update_value(20.0);

    // 100 Hz ticks between the 2nd and 3rd report
    let mut seen = vec![interp.current()];
    for _ in 0..10 {
        clock.advance(Duration::from_millis(10));
        seen.push(interp.current());
    }
    assert!((seen[0] - 10.0).abs() < 1e-3);
    assert!(seen.windows(2).all(|w| w[1] > w[0]), "not increasing: {seen:?}");
    assert!((seen[10] - 20.0).abs() < 1e-3);
    assert!(seen.iter().all(|v| (10.0..=20.0).contains(v)));

    interp.update_value(30.0);
    let after = interp.current();
    assert!((after - 20.0).abs() < 1e-3);
    clock.advance(Duration::from_millis(50));
    assert!((interp.current() - 25.0).abs() < 1e-3);
}

#[test]
fn holds_latest_once_interval_elapses() {
    let (interp, clock) = with_test_clock(InterpolatorCfg::default());
    interp.update_value(100.0);
    clock.advance(Duration::from_millis(50));
    interp.update_value(110.0);
    clock.advance(Duration::from_secs(5));
    assert_eq!(interp.current(), 110.0);
}

#[test]
fn zero_before_first_report() {
    let (interp, _clock) = with_test_clock(InterpolatorCfg::default());
    assert_eq!(interp.current(), 0.0);
    let s = interp.samples();
    assert_eq!((s.previous(), s.latest()), (0.0, 0.0));
}

#[test]
fn shortest_arc_option_crosses_the_seam_forward() {
    let cfg = InterpolatorCfg {
        shortest_arc: true,
        ..InterpolatorCfg::default()
    };
    let (interp, clock) = with_test_clock(cfg);
    interp.update_value(350.0);
    clock.advance(Duration::from_millis(100));
    interp.update_value(10.0);
    clock.advance(Duration::from_millis(25));
    assert!((interp.current() - 355.0).abs() < 1e-3);
    clock.advance(Duration::from_millis(50));
    assert!((interp.current() - 5.0).abs() < 1e-3);
}

#[test]
fn worker_delivers_ticks_and_stops() {
    let interp = AngleInterpolator::new(
        InterpolatorCfg {
            rate_hz: 200,
            ..InterpolatorCfg::default()
        },
        Arc::new(MonotonicClock::new()),
    );
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    interp.set_listener(Some(Arc::new(move |_| {
        c.fetch_add(1, Ordering::Relaxed);
    })));
    interp.update_value(42.0);
    interp.start();
    assert!(interp.is_running());
    std::thread::sleep(Duration::from_millis(100));
    interp.stop();
    assert!(!interp.is_running());

    let n = count.load(Ordering::Relaxed);
    assert!(n >= 5, "only {n} ticks in 100ms at 200Hz");
    assert!(interp.achieved_hz() > 0.0);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(count.load(Ordering::Relaxed), n, "ticks after stop");
}

#[test]
fn idle_without_listener_and_stop_stays_prompt() {
    let clock = MonotonicClock::new();
    let interp = AngleInterpolator::new(InterpolatorCfg::default(), Arc::new(clock));
    interp.start();
    std::thread::sleep(Duration::from_millis(20));
    let t0 = clock.now();
    interp.stop();
    // idle slices are short even though the idle period is a full second
    assert!(clock.ms_since(t0) < 500);
    assert_eq!(interp.ticks(), 0);
}

#[test]
fn restart_and_drop_do_not_leak_threads() {
    for _ in 0..10 {
        let interp = AngleInterpolator::new(
            InterpolatorCfg::default(),
            Arc::new(MonotonicClock::new()),
        );
        interp.set_listener(Some(Arc::new(|_| {})));
        interp.start();
        interp.start();
        std::thread::sleep(Duration::from_millis(5));
        drop(interp);
    }
}

#[test]
fn stop_forgets_the_last_session() {
    let interp = AngleInterpolator::new(
        InterpolatorCfg::default(),
        Arc::new(MonotonicClock::new()),
    );
    interp.set_listener(Some(Arc::new(|_| {})));
    interp.start();
    interp.update_value(200.0);
    interp.update_value(210.0);
    interp.stop();

    let s = interp.samples();
    assert_eq!((s.previous(), s.latest()), (0.0, 0.0));
    assert_eq!(s.frame_time(), Duration::from_millis(1));
    assert_eq!(interp.current(), 0.0);
}

#[test]
fn concurrent_reports_and_reads_see_whole_pairs() {
    let interp = Arc::new(AngleInterpolator::new(
        InterpolatorCfg::default(),
        Arc::new(MonotonicClock::new()),
    ));
    interp.update_value(10.0);
    interp.update_value(20.0);

    let writer = {
        let interp = interp.clone();
        std::thread::spawn(move || {
            for i in 0..5_000 {
                interp.update_value(if i % 2 == 0 { 10.0 } else { 20.0 });
            }
        })
    };
    for _ in 0..5_000 {
        let s = interp.samples();
        assert!(
            matches!((s.previous(), s.latest()), (10.0, 20.0) | (20.0, 10.0)),
            "torn pair {s:?}"
        );
        let v = interp.current();
        assert!((10.0..=20.0).contains(&v), "value {v}");
    }
    writer.join().unwrap();
}
