use proptest::prelude::*;
use roto_core::angle::Direction;
use roto_core::protocol::{
    CHECKSUM_AT, Command, MESSAGE_LEN, REPORT_LEN, Reassembler, checksum, split_angle,
    split_into_reports, state_message,
};
use roto_core::{ModeParams, ModeType, MovementMode, RotateCommand};
use rstest::rstest;

fn rotate(direction: Direction, angle: i32, power: u8) -> Command {
    Command::Rotate(RotateCommand {
        direction,
        angle,
        power,
    })
}

fn any_command() -> impl Strategy<Value = Command> {
    let mode = prop_oneof![
        Just(ModeType::IdleMode),
        Just(ModeType::Calibration),
        Just(ModeType::HeadTrack),
        Just(ModeType::FreeMode),
        Just(ModeType::CockpitMode),
        Just(ModeType::FollowObject),
        Just(ModeType::JoystickMode),
    ];
    let dir = prop_oneof![Just(Direction::Left), Just(Direction::Right)];
    prop_oneof![
        Just(Command::Connect),
        Just(Command::Disconnect),
        (mode, 0i32..=180, any::<bool>(), 30i32..=100).prop_map(|(mode, limit, jerky, power)| {
            Command::SetMode {
                mode,
                params: ModeParams {
                    cockpit_angle_limit: limit,
                    movement: if jerky {
                        MovementMode::Jerky
                    } else {
                        MovementMode::Smooth
                    },
                    max_power: power,
                },
            }
        }),
        (dir, 0i32..=360, 0u8..=100).prop_map(|(d, a, p)| rotate(d, a, p)),
        (0.0f32..25.5, 0u8..=100).prop_map(|(duration_s, power)| Command::Rumble {
            duration_s,
            power
        }),
    ]
}

proptest! {
    #[test]
    fn every_message_carries_its_checksum(cmd in any_command()) {
        let m = cmd.message().unwrap();
        let sum = m[..CHECKSUM_AT].iter().fold(0u8, |a, b| a.wrapping_add(*b));
        prop_assert_eq!(m[0], 0xF1);
        prop_assert_eq!(m[CHECKSUM_AT], sum);
        prop_assert_eq!(checksum(&m), sum);

        let r = cmd.report().unwrap();
        prop_assert_eq!(r.len(), REPORT_LEN);
        prop_assert_eq!(r[0], 0);
        prop_assert_eq!(usize::from(r[1]), MESSAGE_LEN);
        prop_assert_eq!(&r[2..2 + MESSAGE_LEN], &m[..]);
    }

    #[test]
    fn garbage_never_panics_the_reassembler(packets in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 0..30)) {
        let mut ra = Reassembler::new();
        for p in &packets {
            if let Some(s) = ra.push(p) {
                prop_assert!((0..360).contains(&s.angle));
            }
        }
    }
}

#[rstest]
#[case(0, 0, 0)]
#[case(1, 0, 1)]
#[case(255, 0, 255)]
#[case(256, 1, 0)]
#[case(300, 1, 44)]
#[case(359, 1, 103)]
#[case(360, 1, 103)]
fn rotate_angle_split(#[case] angle: i32, #[case] high: u8, #[case] low: u8) {
    assert_eq!(split_angle(angle), (high, low));
    let m = rotate(Direction::Right, angle, 50).message().unwrap();
    assert_eq!((m[4], m[5]), (high, low));
}

#[test]
fn angle_360_encodes_like_359() {
    let a = rotate(Direction::Left, 360, 70).report().unwrap();
    let b = rotate(Direction::Left, 359, 70).report().unwrap();
    assert_eq!(a, b);
}

#[test]
fn rotate_layout() {
    let m = rotate(Direction::Right, 90, 64).message().unwrap();
    assert_eq!(&m[..8], &[0xF1, b'M', 1, b'R', 0, 90, 64, 0]);
    let m = rotate(Direction::Left, 90, 64).message().unwrap();
    assert_eq!(m[3], 0x4C);
}

#[rstest]
fn reassembly_round_trip(
    #[values(0, 1, 255, 256, 359)] angle: i32,
    #[values(ModeType::IdleMode, ModeType::HeadTrack, ModeType::CockpitMode)] mode: ModeType,
    #[values((19, 19), (8, 11), (2, 5), (1, 1))] split: (usize, usize),
) {
    let mut ra = Reassembler::new();
    let reports = split_into_reports(&state_message(mode, angle), split.0, split.1);
    let (last, head) = reports.split_last().unwrap();
    for r in head {
        assert_eq!(ra.push(r), None);
        assert!(ra.is_accumulating());
    }
    let s = ra.push(last).expect("message completes on last packet");
    assert_eq!(s.mode, Some(mode));
    assert_eq!(s.angle, angle);
    assert!(!ra.is_accumulating());
}

#[test]
fn repeated_first_packet_restarts_reassembly() {
    let mut ra = Reassembler::new();
    let stale = split_into_reports(&state_message(ModeType::FreeMode, 10), 8, 11);
    let fresh = split_into_reports(&state_message(ModeType::HeadTrack, 200), 8, 11);
    assert_eq!(ra.push(&stale[0]), None);
    assert_eq!(ra.push(&fresh[0]), None);
    let s = ra.push(&fresh[1]).unwrap();
    assert_eq!(s.mode, Some(ModeType::HeadTrack));
    assert_eq!(s.angle, 200);
}

#[test]
fn stream_recovers_after_desync() {
    let mut ra = Reassembler::new();
    let a = split_into_reports(&state_message(ModeType::FreeMode, 42), 8, 11);
    // join mid-message: continuation first
    assert_eq!(ra.push(&a[1]), None);
    assert_eq!(ra.dropped(), 1);
    assert_eq!(ra.push(&a[0]), None);
    let s = ra.push(&a[1]).unwrap();
    assert_eq!(s.angle, 42);
}
