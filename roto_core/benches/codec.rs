use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use roto_core::FollowCfg;
use roto_core::angle::Direction;
use roto_core::follow::FollowTracker;
use roto_core::interpolator::Samples;
use roto_core::protocol::{Command, Reassembler, split_into_reports, state_message};
use roto_core::{ModeType, RotateCommand};
use std::time::{Duration, Instant};

fn group_from_env(c: &mut Criterion, name: &str) -> criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> {
    let mut g = c.benchmark_group(name);
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p roto_core --bench codec
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(Duration::from_millis(ms_u64));
    }
    g
}

pub fn bench_codec(c: &mut Criterion) {
    let mut g = group_from_env(c, "codec");

    g.bench_function("encode_rotate", |b| {
        let mut angle = 0;
        b.iter(|| {
            angle = (angle + 7) % 360;
            let cmd = Command::Rotate(RotateCommand {
                direction: Direction::Right,
                angle,
                power: 60,
            });
            black_box(cmd.report())
        });
    });

    // one second of device reports, split the way the device splits them
    let stream: Vec<_> = (0..20)
        .flat_map(|i| split_into_reports(&state_message(ModeType::HeadTrack, i * 17), 8, 11))
        .collect();
    g.bench_function("reassemble_stream", |b| {
        b.iter_batched(
            Reassembler::new,
            |mut ra| {
                let mut n = 0;
                for r in &stream {
                    if ra.push(black_box(r)).is_some() {
                        n += 1;
                    }
                }
                black_box(n)
            },
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

pub fn bench_control(c: &mut Criterion) {
    let mut g = group_from_env(c, "control");

    let base = Instant::now();
    let mut samples = Samples::default();
    samples.update(350.0, base);
    samples.update(10.0, base + Duration::from_millis(100));
    g.bench_function("interpolate", |b| {
        let mut ms = 0u64;
        b.iter(|| {
            ms = (ms + 1) % 200;
            black_box(samples.value_at(base + Duration::from_millis(ms), true))
        });
    });

    g.bench_function("follow_step", |b| {
        b.iter_batched(
            || FollowTracker::new(FollowCfg::default(), 0),
            |mut t| {
                for i in 0..50u64 {
                    let target = Some((i as f32 * 3.3) % 360.0);
                    black_box(t.step(black_box(target), (i as i32 * 2) % 360, i * 20));
                }
            },
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

criterion_group!(codec, bench_codec, bench_control);
criterion_main!(codec);
