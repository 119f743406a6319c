//! Per-tick decision logic of the follow-target routine.
//!
//! [`FollowTracker`] holds the armed state of one follow session and turns a
//! target sample plus the chair's last raw angle into at most one rotate
//! command. It owns no threads and reads no clocks, so the controller's loop
//! and the tests drive it with whatever notion of time they have.
//!
//! Tracking is relative: when a session arms it records the pair
//! (target, chair) and from then on commands the chair to
//! `start_chair + (target - start_target)`. Once the chair has been aligned
//! for longer than the anti-jump window the session disarms and re-arms on
//! the next sample, discarding accumulated drift.

use crate::angle::{Direction, get_direction, map_range_clamped, normalize, reflected_delta};
use crate::config::FollowCfg;
use crate::types::RotateCommand;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Arm {
    start_target: f32,
    start_chair: i32,
}

/// What the tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FollowAction {
    /// No target, or the session just disarmed. The chair holds position.
    Hold,
    /// Within `min_delta_deg` of the target.
    Aligned,
    Rotate(RotateCommand),
}

/// One tick's decision plus the values telemetry reports for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FollowStep {
    pub action: FollowAction,
    pub target: Option<f32>,
    /// Where the chair should end up, before capping.
    pub target_chair: f32,
    /// Angle actually commanded (differs from `target_chair` when capped).
    pub commanded: i32,
    pub delta: f32,
    pub direction: Option<Direction>,
    pub power: u8,
    pub anti_jump_ms: u64,
    pub armed: bool,
}

impl FollowStep {
    fn hold(target: Option<f32>, armed: bool) -> Self {
        Self {
            action: FollowAction::Hold,
            target,
            target_chair: 0.0,
            commanded: 0,
            delta: 0.0,
            direction: None,
            power: 0,
            anti_jump_ms: 0,
            armed,
        }
    }

    pub fn rotate_command(&self) -> Option<RotateCommand> {
        match self.action {
            FollowAction::Rotate(cmd) => Some(cmd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FollowTracker {
    cfg: FollowCfg,
    home: i32,
    arm: Option<Arm>,
    aligned_since_ms: Option<u64>,
    anti_jump_ms: u64,
    arms: u64,
}

impl FollowTracker {
    /// `home` is the calibration baseline captured when the session starts.
    pub fn new(cfg: FollowCfg, home: i32) -> Self {
        Self {
            cfg,
            home,
            arm: None,
            aligned_since_ms: None,
            anti_jump_ms: 0,
            arms: 0,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.arm.is_some()
    }

    /// Target angle captured by the current arm.
    pub fn start_target(&self) -> Option<f32> {
        self.arm.map(|a| a.start_target)
    }

    pub fn start_chair(&self) -> Option<i32> {
        self.arm.map(|a| a.start_chair)
    }

    /// Times the session has armed.
    pub fn arm_count(&self) -> u64 {
        self.arms
    }

    pub fn disarm(&mut self) {
        self.arm = None;
        self.aligned_since_ms = None;
        self.anti_jump_ms = 0;
    }

    /// Runs one tick. `now_ms` is session time and must not go backwards.
    pub fn step(&mut self, target: Option<f32>, chair_angle: i32, now_ms: u64) -> FollowStep {
        let Some(target) = target else {
            self.disarm();
            return FollowStep::hold(None, false);
        };

        let arm = match self.arm {
            None => {
                let arm = if self.cfg.absolute_start && self.arms == 0 {
                    Arm {
                        start_target: 0.0,
                        start_chair: self.home,
                    }
                } else {
                    Arm {
                        start_target: target,
                        start_chair: chair_angle,
                    }
                };
                self.arm = Some(arm);
                self.arms += 1;
                self.aligned_since_ms = None;
                self.anti_jump_ms = 0;
                tracing::debug!(
                    start_target = arm.start_target,
                    start_chair = arm.start_chair,
                    "follow armed"
                );
                arm
            }
            Some(_) if self.anti_jump_ms > self.cfg.anti_jump_ms => {
                tracing::trace!(aligned_ms = self.anti_jump_ms, "anti-jump disarm");
                self.disarm();
                return FollowStep::hold(Some(target), false);
            }
            Some(arm) => arm,
        };

        let delta_target = normalize(target - arm.start_target);
        let target_chair = normalize(arm.start_chair as f32 + delta_target);
        let delta = reflected_delta(target_chair, chair_angle as f32);

        if delta >= self.cfg.min_delta_deg {
            self.aligned_since_ms = None;
            self.anti_jump_ms = 0;

            let power = map_range_clamped(
                delta,
                0.0,
                self.cfg.power_ramp_deg,
                f32::from(self.cfg.min_power),
                f32::from(self.cfg.max_power),
            )
            .round() as u8;
            let target_int = (target_chair.round() as i32).rem_euclid(360);
            let direction = get_direction(target_int, chair_angle);
            let commanded = if self.cfg.cap_enabled && delta > self.cfg.delta_cap_deg {
                let capped = normalize(
                    chair_angle as f32 + direction.sign() as f32 * self.cfg.delta_cap_deg,
                );
                (capped.round() as i32).rem_euclid(360)
            } else {
                target_int
            };
            let cmd = RotateCommand {
                direction,
                angle: commanded,
                power,
            };
            FollowStep {
                action: FollowAction::Rotate(cmd),
                target: Some(target),
                target_chair,
                commanded,
                delta,
                direction: Some(direction),
                power,
                anti_jump_ms: 0,
                armed: true,
            }
        } else {
            let since = *self.aligned_since_ms.get_or_insert(now_ms);
            self.anti_jump_ms = now_ms.saturating_sub(since);
            FollowStep {
                action: FollowAction::Aligned,
                target: Some(target),
                target_chair,
                commanded: chair_angle,
                delta,
                direction: None,
                power: 0,
                anti_jump_ms: self.anti_jump_ms,
                armed: true,
            }
        }
    }
}
