//! Host-facing façade
//!
//! `BreakoutCore` owns one level and drives it with a fixed-step
//! accumulator. The host pushes input and frame deltas, then reads poses
//! and drains hit events once `update` has returned.

use std::collections::BTreeMap;

use crate::config::LevelConfig;
use crate::error::{CoreError, CoreResult};
use crate::render::{RenderPose, TransformInstance, extract_instances};
use crate::sim::{BodyHandle, GamePhase, GameState, HitEvent, Pose, TickInput, tick};

/// One Breakout level plus its frame pacing
#[derive(Debug, Clone)]
pub struct BreakoutCore {
    config: LevelConfig,
    state: GameState,
    /// Unsimulated time carried between updates
    accumulator: f32,
    /// Input buffered until the next update
    pending_tap: bool,
    pending_drag: f32,
    epoch: u32,
    overruns: u64,
}

impl BreakoutCore {
    /// Validate `config` and build the level
    pub fn new(config: LevelConfig) -> CoreResult<Self> {
        let state = GameState::new(&config, 0)?;
        Ok(Self {
            config,
            state,
            accumulator: 0.0,
            pending_tap: false,
            pending_drag: 0.0,
            epoch: 0,
            overruns: 0,
        })
    }

    /// Rebuild the level from scratch. Handles from before the reset are
    /// rejected afterwards.
    pub fn reset(&mut self) -> CoreResult<()> {
        let epoch = self.epoch.wrapping_add(1);
        self.state = GameState::new(&self.config, epoch)?;
        self.epoch = epoch;
        self.accumulator = 0.0;
        self.pending_tap = false;
        self.pending_drag = 0.0;
        log::info!("Level reset (epoch {})", epoch);
        Ok(())
    }

    /// Swap in a new level configuration and reset. On error the current
    /// level is left untouched.
    pub fn load_level(&mut self, config: LevelConfig) -> CoreResult<()> {
        config.validate()?;
        let previous = std::mem::replace(&mut self.config, config);
        if let Err(err) = self.reset() {
            self.config = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Advance by a frame delta in seconds. Runs whole fixed steps only;
    /// the remainder carries over to the next call.
    pub fn update(&mut self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("Ignoring invalid frame delta {}", dt);
            return;
        }
        if self.state.phase.is_terminal() {
            return;
        }

        let fixed = self.config.fixed_dt;
        let max = self.config.max_steps_per_update;
        self.accumulator += dt;

        let pending = (self.accumulator / fixed) as u32;
        let steps = pending.min(max);
        let overrun = pending > max;
        if overrun {
            self.overruns += 1;
            log::warn!("{}", CoreError::StepOverrun { requested: pending, max });
        }
        if steps == 0 {
            return;
        }

        // Input is applied once, spread over this update's steps
        let mut input = TickInput {
            launch: self.pending_tap,
            paddle_velocity: self.pending_drag / (steps as f32 * fixed),
        };
        self.pending_tap = false;
        self.pending_drag = 0.0;

        for _ in 0..steps {
            tick(&mut self.state, &input, fixed);
            self.accumulator -= fixed;
            // Clear one-shot inputs after processing
            input.launch = false;
            if self.state.phase.is_terminal() {
                break;
            }
        }
        self.accumulator = if overrun {
            // Drop the backlog, keep the fractional part
            self.accumulator.rem_euclid(fixed)
        } else {
            self.accumulator.max(0.0)
        };
    }

    /// Launch request. Only honoured while the ball waits on the paddle.
    pub fn handle_tap(&mut self) {
        if self.state.phase == GamePhase::Idle {
            self.pending_tap = true;
        } else {
            log::debug!("Tap ignored in {:?}", self.state.phase);
        }
    }

    /// Horizontal paddle drag in world units, applied over the next update
    pub fn handle_drag(&mut self, delta_x: f32) {
        if !delta_x.is_finite() {
            log::warn!("Ignoring non-finite drag {}", delta_x);
            return;
        }
        if self.state.phase.is_terminal() {
            return;
        }
        self.pending_drag += delta_x;
    }

    /// Clear `out` and fill it with one instance per live body
    pub fn render(&self, out: &mut Vec<TransformInstance>) {
        extract_instances(self.state.world.bodies.iter_alive(), out);
    }

    /// Poses of every live body keyed by handle
    pub fn render_poses(&self) -> BTreeMap<BodyHandle, RenderPose> {
        self.state
            .world
            .bodies
            .iter_alive()
            .map(|(handle, body)| (handle, RenderPose::from_body(body)))
            .collect()
    }

    /// Hit events since the last drain, oldest first
    pub fn drain_hits(&mut self) -> impl Iterator<Item = HitEvent> + '_ {
        self.state.drain_hits()
    }

    /// Drain every queued hit into `listener`. Returns how many were sent.
    pub fn dispatch_hits<F>(&mut self, mut listener: F) -> usize
    where
        F: FnMut(HitEvent),
    {
        let mut count = 0;
        for hit in self.state.drain_hits() {
            listener(hit);
            count += 1;
        }
        count
    }

    pub fn pose(&self, handle: BodyHandle) -> CoreResult<Pose> {
        self.state.world.bodies.pose(handle)
    }

    pub fn velocity(&self, handle: BodyHandle) -> CoreResult<glam::Vec2> {
        self.state.world.bodies.velocity(handle)
    }

    #[inline]
    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    #[inline]
    pub fn lives(&self) -> u8 {
        self.state.lives
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.state.score
    }

    #[inline]
    pub fn bricks_remaining(&self) -> usize {
        self.state.bricks_remaining
    }

    pub fn paddle(&self) -> BodyHandle {
        self.state.paddle
    }

    pub fn balls(&self) -> &[BodyHandle] {
        &self.state.balls
    }

    /// Brick at (row, col), row 0 at the top. May be stale once broken.
    pub fn brick_at(&self, row: u32, col: u32) -> Option<BodyHandle> {
        self.state.brick_at(row, col)
    }

    /// Fixed steps simulated in this level
    pub fn steps(&self) -> u64 {
        self.state.time_ticks
    }

    /// Updates that hit the step cap
    pub fn overrun_count(&self) -> u64 {
        self.overruns
    }

    pub fn dropped_hits(&self) -> u64 {
        self.state.dropped_hits()
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }
}
