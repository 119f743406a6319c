//! Wire codec for the chair's HID reports.
//!
//! Commands are assembled in a 19-byte message that starts with the `0xF1`
//! sync byte and ends with an additive checksum. On the wire a message is
//! wrapped in a 33-byte report: `[report id 0, length 19, message.., zero pad]`.
//!
//! Incoming state arrives split across several reports. [`Reassembler`]
//! stitches them back together and yields a [`RawState`] per message.

use crate::angle::{Direction, normalize_i32};
use crate::error::RotoError;
use crate::types::{ModeParams, ModeType, MovementMode, RotateCommand};

/// Size of every HID report, both directions, including the report id.
pub const REPORT_LEN: usize = 33;
/// Size of a complete protocol message.
pub const MESSAGE_LEN: usize = 19;
/// First byte of every message.
pub const SYNC: u8 = 0xF1;
/// Index of the checksum inside a message.
pub const CHECKSUM_AT: usize = MESSAGE_LEN - 1;

/// Feature report written (then read back) right after the device is opened.
pub const FEATURE_REPORT: [u8; 9] = [0x00, 0x01, 0x00, 0xC2, 0x01, 0x00, 0x01, 0x00, 0x08];

const CMD_CONNECT: u8 = 0x41;
const CMD_DISCONNECT: u8 = 0x5A;
const CMD_MODE: u8 = b'S';
const CMD_MOTION: u8 = b'M';

const MODE_RESERVED: u8 = 40;

pub type Message = [u8; MESSAGE_LEN];
pub type Report = [u8; REPORT_LEN];

/// Additive checksum over everything that precedes the checksum byte.
#[inline]
pub fn checksum(message: &[u8]) -> u8 {
    message
        .iter()
        .take(CHECKSUM_AT)
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Outgoing command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    SetMode { mode: ModeType, params: ModeParams },
    Rotate(RotateCommand),
    /// Duration in seconds (tenths resolution on the wire) and power.
    Rumble { duration_s: f32, power: u8 },
}

impl Command {
    /// Builds the 19-byte message with its checksum filled in.
    pub fn message(&self) -> Result<Message, RotoError> {
        let mut m: Message = [0; MESSAGE_LEN];
        m[0] = SYNC;
        match *self {
            Command::Connect => m[1] = CMD_CONNECT,
            Command::Disconnect => m[1] = CMD_DISCONNECT,
            Command::SetMode { mode, params } => {
                let code = mode.wire_code().ok_or(RotoError::InvalidMode(mode))?;
                m[1] = CMD_MODE;
                m[2] = code;
                m[3] = params.movement.wire_code();
                m[9] = clamp_u8(params.cockpit_angle_limit);
                m[11] = MODE_RESERVED;
                m[12] = clamp_u8(params.max_power);
                m[14] = 1;
            }
            Command::Rotate(cmd) => {
                let (high, low) = split_angle(cmd.angle);
                m[1] = CMD_MOTION;
                m[2] = 1;
                m[3] = cmd.direction.wire_code();
                m[4] = high;
                m[5] = low;
                m[6] = cmd.power;
                m[7] = 0;
            }
            Command::Rumble { duration_s, power } => {
                m[1] = CMD_MOTION;
                m[7] = 1;
                m[8] = power;
                // truncation, not rounding
                m[9] = (duration_s.max(0.0) * 10.0) as u8;
            }
        }
        m[CHECKSUM_AT] = checksum(&m);
        Ok(m)
    }

    /// Builds the full 33-byte report ready for a HID write.
    pub fn report(&self) -> Result<Report, RotoError> {
        Ok(wrap(&self.message()?))
    }
}

impl Command {
    /// Parses an outgoing report back into a command, as a device would.
    ///
    /// Returns `None` for anything that is not a well-formed message with a
    /// valid checksum.
    pub fn parse(report: &[u8]) -> Option<Command> {
        if report.len() < 2 + MESSAGE_LEN || usize::from(report[1]) != MESSAGE_LEN {
            return None;
        }
        let m = &report[2..2 + MESSAGE_LEN];
        if m[0] != SYNC || m[CHECKSUM_AT] != checksum(m) {
            return None;
        }
        match m[1] {
            CMD_CONNECT => Some(Command::Connect),
            CMD_DISCONNECT => Some(Command::Disconnect),
            CMD_MODE => {
                let mode = ModeType::from_wire(m[2]).filter(|m| *m != ModeType::Error)?;
                let movement = if m[3] == 1 {
                    MovementMode::Jerky
                } else {
                    MovementMode::Smooth
                };
                Some(Command::SetMode {
                    mode,
                    params: ModeParams {
                        cockpit_angle_limit: i32::from(m[9]),
                        movement,
                        max_power: i32::from(m[12]),
                    },
                })
            }
            CMD_MOTION if m[7] == 1 => Some(Command::Rumble {
                duration_s: f32::from(m[9]) / 10.0,
                power: m[8],
            }),
            CMD_MOTION => {
                let direction = match m[3] {
                    b'L' => Direction::Left,
                    b'R' => Direction::Right,
                    _ => return None,
                };
                Some(Command::Rotate(RotateCommand {
                    direction,
                    angle: i32::from(m[4]) * 256 + i32::from(m[5]),
                    power: m[6],
                }))
            }
            _ => None,
        }
    }
}

/// Wraps a message into a report.
pub fn wrap(message: &Message) -> Report {
    let mut r: Report = [0; REPORT_LEN];
    r[1] = MESSAGE_LEN as u8;
    r[2..2 + MESSAGE_LEN].copy_from_slice(message);
    r
}

/// High/low split used by rotate commands. 360 is sent as 359.
pub fn split_angle(angle: i32) -> (u8, u8) {
    let a = if angle == 360 { 359 } else { angle.clamp(0, 359) };
    if a >= 256 {
        (1, (a - 256) as u8)
    } else {
        (0, a as u8)
    }
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, i32::from(u8::MAX)) as u8
}

/// Device state carried by one reassembled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawState {
    /// `None` when the mode byte is not one the device is known to send.
    pub mode: Option<ModeType>,
    /// Whole degrees, `[0, 360)`.
    pub angle: i32,
}

/// Decodes a complete message.
pub fn decode(message: &[u8]) -> RawState {
    let byte = |i: usize| message.get(i).copied().unwrap_or(0);
    let mode = ModeType::from_wire(byte(2));
    let low = i32::from(byte(6));
    let angle = if byte(5) == 1 { low + 256 } else { low };
    RawState {
        mode,
        angle: normalize_i32(angle),
    }
}

/// Builds the message a device would send for a given state.
///
/// Used by the simulated chair and tests; the real device fills other
/// bytes too, which the decoder ignores.
pub fn state_message(mode: ModeType, angle: i32) -> Message {
    let mut m: Message = [0; MESSAGE_LEN];
    let a = normalize_i32(angle);
    m[0] = SYNC;
    m[1] = CMD_MODE;
    m[2] = mode.wire_code().unwrap_or(5);
    if a >= 256 {
        m[5] = 1;
        m[6] = (a - 256) as u8;
    } else {
        m[6] = a as u8;
    }
    m[CHECKSUM_AT] = checksum(&m);
    m
}

/// Splits a message into a first report carrying `first` bytes and
/// continuation reports carrying at most `chunk` bytes each.
pub fn split_into_reports(message: &Message, first: usize, chunk: usize) -> Vec<Report> {
    let chunk = chunk.clamp(1, REPORT_LEN - 2);
    let first = first.clamp(1, MESSAGE_LEN);
    let mut out = Vec::with_capacity(1 + MESSAGE_LEN / chunk);
    let mut push = |bytes: &[u8]| {
        let mut r: Report = [0; REPORT_LEN];
        r[1] = bytes.len() as u8;
        r[2..2 + bytes.len()].copy_from_slice(bytes);
        out.push(r);
    };
    push(&message[..first]);
    for piece in message[first..].chunks(chunk) {
        push(piece);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingFirst,
    Accumulating { filled: usize },
}

/// Stateful reassembly of multi-packet messages.
///
/// Packets are `[report id, payload length, payload..]`. A payload starting
/// with the sync byte opens a new message; anything else continues the open
/// one, or is dropped if none is open. Copies are bounds-checked so a
/// garbled length byte can never index past either buffer.
#[derive(Debug, Clone)]
pub struct Reassembler {
    buf: Message,
    phase: Phase,
    dropped: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub const fn new() -> Self {
        Self {
            buf: [0; MESSAGE_LEN],
            phase: Phase::AwaitingFirst,
            dropped: 0,
        }
    }

    /// Feeds one packet. Returns the decoded state when a message completes.
    pub fn push(&mut self, packet: &[u8]) -> Option<RawState> {
        if packet.len() < 3 {
            self.dropped += 1;
            return None;
        }
        let declared = usize::from(packet[1]);
        let payload = &packet[2..];
        let take = declared.min(payload.len());

        let filled = if payload[0] == SYNC {
            self.buf = [0; MESSAGE_LEN];
            let n = take.min(MESSAGE_LEN);
            self.buf[..n].copy_from_slice(&payload[..n]);
            declared
        } else {
            let Phase::Accumulating { filled } = self.phase else {
                self.dropped += 1;
                tracing::trace!("continuation packet without a first packet, dropped");
                return None;
            };
            if filled < MESSAGE_LEN {
                let n = take.min(MESSAGE_LEN - filled);
                self.buf[filled..filled + n].copy_from_slice(&payload[..n]);
            }
            filled + declared
        };

        if filled >= MESSAGE_LEN {
            self.phase = Phase::AwaitingFirst;
            Some(decode(&self.buf))
        } else {
            self.phase = Phase::Accumulating { filled };
            None
        }
    }

    /// Whether a message is partially assembled.
    pub fn is_accumulating(&self) -> bool {
        matches!(self.phase, Phase::Accumulating { .. })
    }

    /// Packets discarded because no message was open.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.phase = Phase::AwaitingFirst;
        self.buf = [0; MESSAGE_LEN];
    }
}
