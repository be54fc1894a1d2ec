//! Game state and core simulation types
//!
//! Everything one level needs between ticks: the physics world, the
//! handles of the gameplay bodies, rules counters and the hit queue.

use std::collections::{BTreeSet, VecDeque};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::body::{Body, BodyHandle, BodyKind, Pose, Tag};
use super::detector::Contact;
use super::resolver::ResolvePolicy;
use super::shape::Shape;
use super::world::World;
use crate::config::LevelConfig;
use crate::consts::*;
use crate::error::CoreResult;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Ball attached to paddle, waiting for a tap
    Idle,
    /// Active gameplay
    Playing,
    /// Last ball left the field; resolved on the next tick
    BallLost,
    /// No lives left
    GameOver,
    /// Every brick destroyed
    LevelCleared,
}

impl GamePhase {
    /// Terminal phases never step again
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::GameOver | GamePhase::LevelCleared)
    }
}

/// A ball struck a brick during a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    pub brick: BodyHandle,
    pub ball: BodyHandle,
    /// Contact point in world space
    pub point: Vec2,
    /// Hits the brick can still take
    pub remaining_durability: u8,
    pub destroyed: bool,
}

/// Complete state of one level
#[derive(Debug, Clone)]
pub struct GameState {
    pub world: World,
    pub phase: GamePhase,
    pub lives: u8,
    pub score: u64,
    pub bricks_remaining: usize,
    pub paddle: BodyHandle,
    /// Balls in play, ascending handle order
    pub balls: Vec<BodyHandle>,
    /// Brick handles row-major, row 0 at the top. Entries go stale as
    /// bricks break.
    pub brick_grid: Vec<BodyHandle>,
    /// Simulation tick counter
    pub time_ticks: u64,
    config: LevelConfig,
    rng: Pcg32,
    hits: VecDeque<HitEvent>,
    dropped_hits: u64,
}

impl GameState {
    /// Build a level from `config` with handles stamped with `epoch`
    pub fn new(config: &LevelConfig, epoch: u32) -> CoreResult<Self> {
        config.validate()?;

        let policy = ResolvePolicy {
            paddle_english: config.paddle_english,
            max_ball_speed: config.max_ball_speed,
            min_vertical_ratio: config.min_vertical_ratio,
        };
        let mut world = World::new(epoch, config.play_field(), config.gravity, policy);

        // --- WALLS ---
        let size = config.play_field_size;
        let t = config.wall_thickness;
        let walls = [
            // Left and right run from the open bottom up past the top wall
            (Vec2::new(-t * 0.5, (size.y + t) * 0.5), Shape::rect(t, size.y + t)),
            (Vec2::new(size.x + t * 0.5, (size.y + t) * 0.5), Shape::rect(t, size.y + t)),
            (Vec2::new(size.x * 0.5, size.y + t * 0.5), Shape::rect(size.x + 2.0 * t, t)),
        ];
        for (center, shape) in walls {
            world.bodies.insert(
                Body::new(BodyKind::Static, shape, Pose::at(center), Tag::Wall)
                    .with_restitution(config.restitution),
            )?;
        }

        // --- BRICKS ---
        let layout = &config.brick_layout;
        let left = (size.x - layout.row_width()) * 0.5;
        let step = layout.brick_size + Vec2::splat(layout.gap);
        let mut brick_grid = Vec::with_capacity(layout.brick_count().unwrap_or(0));
        for row in 0..layout.rows {
            for col in 0..layout.cols {
                let center = Vec2::new(
                    left + layout.brick_size.x * 0.5 + col as f32 * step.x,
                    size.y - layout.top_margin - layout.brick_size.y * 0.5 - row as f32 * step.y,
                );
                let handle = world.bodies.insert(
                    Body::new(
                        BodyKind::Static,
                        Shape::rect(layout.brick_size.x, layout.brick_size.y),
                        Pose::at(center),
                        Tag::Brick,
                    )
                    .with_restitution(config.restitution)
                    .with_durability(layout.durability_at(row, col)),
                )?;
                brick_grid.push(handle);
            }
        }

        // --- PADDLE ---
        let paddle = world.bodies.insert(
            Body::new(
                BodyKind::Kinematic,
                Shape::rect(config.paddle_size.x, config.paddle_size.y),
                Pose::at(Vec2::new(size.x * 0.5, config.paddle_y)),
                Tag::Paddle,
            )
            .with_restitution(config.restitution),
        )?;

        let mut state = Self {
            world,
            phase: GamePhase::Idle,
            lives: config.lives,
            score: 0,
            bricks_remaining: brick_grid.len(),
            paddle,
            balls: Vec::new(),
            brick_grid,
            time_ticks: 0,
            config: config.clone(),
            rng: Pcg32::seed_from_u64(config.seed),
            hits: VecDeque::with_capacity(config.hit_queue_capacity),
            dropped_hits: 0,
        };
        state.spawn_ball_attached()?;

        log::info!(
            "Level built: {} bricks, {} lives, epoch {}",
            state.bricks_remaining,
            state.lives,
            epoch
        );
        Ok(state)
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    /// Brick handle at (row, col), row 0 at the top
    pub fn brick_at(&self, row: u32, col: u32) -> Option<BodyHandle> {
        let index = self.config.brick_layout.index_of(row, col)?;
        self.brick_grid.get(index).copied()
    }

    /// Where an attached ball sits relative to the paddle
    fn attach_position(&self) -> Option<Vec2> {
        let paddle = self.world.bodies.get(self.paddle).ok()?;
        let offset = paddle.shape.half_extents().y + self.config.ball_radius + ATTACH_GAP;
        Some(paddle.pose.position + Vec2::new(0.0, offset))
    }

    /// Spawn a ball attached to the paddle
    pub fn spawn_ball_attached(&mut self) -> CoreResult<BodyHandle> {
        let at = self.attach_position().unwrap_or(Vec2::new(
            self.config.play_field_size.x * 0.5,
            self.config.paddle_y,
        ));
        let handle = self.world.bodies.insert(
            Body::new(
                BodyKind::Dynamic,
                Shape::circle(self.config.ball_radius),
                Pose::at(at),
                Tag::Ball,
            )
            .with_restitution(self.config.restitution),
        )?;
        self.balls.push(handle);
        self.balls.sort();
        Ok(handle)
    }

    /// Keep every ball resting on the paddle
    pub fn attach_balls(&mut self) {
        let Some(at) = self.attach_position() else {
            return;
        };
        for &ball in &self.balls {
            if let Ok(body) = self.world.bodies.get_mut(ball) {
                body.pose.position = at;
                body.velocity = Vec2::ZERO;
            }
        }
    }

    /// Send attached balls upward and start play
    pub fn launch(&mut self) {
        let spread = self.config.launch_spread;
        let speed = self.config.ball_speed;
        for ball in self.balls.clone() {
            let angle = if spread > 0.0 {
                self.rng.random_range(-spread..=spread)
            } else {
                0.0
            };
            let direction = Vec2::from_angle(angle).rotate(Vec2::Y);
            if let Err(err) = self.world.bodies.set_velocity(ball, direction * speed) {
                log::warn!("Launch skipped: {}", err);
            }
        }
        self.phase = GamePhase::Playing;
        log::info!("Ball launched at tick {}", self.time_ticks);
    }

    /// Queue a hit, dropping the oldest when full
    pub fn push_hit(&mut self, hit: HitEvent) {
        if self.hits.len() >= self.config.hit_queue_capacity {
            self.hits.pop_front();
            self.dropped_hits += 1;
            log::warn!(
                "Hit queue full ({}), dropped oldest event",
                self.config.hit_queue_capacity
            );
        }
        self.hits.push_back(hit);
    }

    /// Remove and return every queued hit, oldest first
    pub fn drain_hits(&mut self) -> impl Iterator<Item = HitEvent> + '_ {
        self.hits.drain(..)
    }

    pub fn pending_hits(&self) -> usize {
        self.hits.len()
    }

    /// Hits lost to queue overflow since the level started
    pub fn dropped_hits(&self) -> u64 {
        self.dropped_hits
    }

    /// Apply resolved ball-brick contacts: durability, score, hit events.
    /// Each brick takes at most one hit per step.
    pub fn apply_contacts(&mut self, contacts: &[Contact]) {
        let mut struck = BTreeSet::new();
        for contact in contacts {
            let is_ball = self
                .world
                .bodies
                .get(contact.a)
                .map(|body| body.tag == Tag::Ball)
                .unwrap_or(false);
            if !is_ball {
                continue;
            }
            let Ok(brick) = self.world.bodies.get_mut(contact.b) else {
                continue;
            };
            if brick.tag != Tag::Brick || !struck.insert(contact.b) {
                continue;
            }

            brick.durability = brick.durability.saturating_sub(1);
            let remaining = brick.durability;
            let destroyed = remaining == 0;
            if destroyed {
                if let Err(err) = self.world.bodies.destroy_body(contact.b) {
                    log::warn!("Could not destroy brick: {}", err);
                    continue;
                }
                self.bricks_remaining = self.bricks_remaining.saturating_sub(1);
                self.score += self.config.points_per_brick;
                log::debug!(
                    "Brick {} destroyed, {} remaining",
                    contact.b,
                    self.bricks_remaining
                );
            }

            self.push_hit(HitEvent {
                brick: contact.b,
                ball: contact.a,
                point: contact.point,
                remaining_durability: remaining,
                destroyed,
            });
        }
    }

    /// Remove balls that left the field. Returns true if none remain.
    pub fn remove_lost_balls(&mut self) -> bool {
        let size = self.config.play_field_size;
        let t = self.config.wall_thickness;
        let mut lost = Vec::new();
        for &ball in &self.balls {
            let Ok(pose) = self.world.bodies.pose(ball) else {
                lost.push(ball);
                continue;
            };
            let p = pose.position;
            if p.y < 0.0 {
                lost.push(ball);
            } else if p.x < -t || p.x > size.x + t || p.y > size.y + t {
                log::warn!("Ball {} escaped the walls at {:?}", ball, p);
                lost.push(ball);
            }
        }

        for ball in &lost {
            // Already gone is fine
            let _ = self.world.bodies.destroy_body(*ball);
        }
        self.balls.retain(|ball| !lost.contains(ball));
        self.balls.is_empty()
    }
}
