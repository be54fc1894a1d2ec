//! Level configuration
//!
//! Everything needed to build a playable level. Loaded from JSON by the
//! embedding app or built in code; missing fields fall back to defaults.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::sim::Aabb;

/// Largest brick grid a level may describe
pub const MAX_BRICKS: usize = 1 << 16;

/// Brick grid description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickLayout {
    pub rows: u32,
    pub cols: u32,
    /// Full width/height of one brick
    pub brick_size: Vec2,
    /// Space between neighbouring bricks
    pub gap: f32,
    /// Distance from the top of the play field to the first row
    pub top_margin: f32,
    /// Hits to break each brick: one entry for all bricks, or one per
    /// brick in row-major order (row 0 is the top row)
    pub durability: Vec<u8>,
}

impl Default for BrickLayout {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 8,
            brick_size: Vec2::new(32.0, 12.0),
            gap: 4.0,
            top_margin: 40.0,
            durability: vec![1],
        }
    }
}

impl BrickLayout {
    /// `rows * cols`, or `None` if that does not fit in a `usize`
    #[inline]
    pub fn brick_count(&self) -> Option<usize> {
        (self.rows as usize).checked_mul(self.cols as usize)
    }

    /// Row-major slot of (row, col)
    pub fn index_of(&self, row: u32, col: u32) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        (row as usize)
            .checked_mul(self.cols as usize)?
            .checked_add(col as usize)
    }

    /// Hits needed to break the brick at (row, col)
    pub fn durability_at(&self, row: u32, col: u32) -> u8 {
        match self.durability.as_slice() {
            [uniform] => *uniform,
            table => self
                .index_of(row, col)
                .and_then(|i| table.get(i))
                .copied()
                .unwrap_or(1),
        }
    }

    /// Total width of one row including gaps
    pub fn row_width(&self) -> f32 {
        self.cols as f32 * self.brick_size.x + self.cols.saturating_sub(1) as f32 * self.gap
    }

    /// Total height of the grid including gaps
    pub fn grid_height(&self) -> f32 {
        self.rows as f32 * self.brick_size.y + self.rows.saturating_sub(1) as f32 * self.gap
    }
}

/// Level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    // === Play field ===
    /// Interior size; origin at bottom-left, y up
    pub play_field_size: Vec2,
    /// Thickness of the left, right and top walls (outside the field)
    pub wall_thickness: f32,

    // === Bricks ===
    pub brick_layout: BrickLayout,

    // === Paddle ===
    pub paddle_size: Vec2,
    /// Height of the paddle center above the bottom of the field
    pub paddle_y: f32,
    /// Fraction of paddle horizontal speed passed on to the ball
    pub paddle_english: f32,

    // === Ball ===
    pub ball_radius: f32,
    /// Launch speed
    pub ball_speed: f32,
    /// Speed cap after paddle hits
    pub max_ball_speed: f32,
    /// Smallest |vy| / speed after a paddle hit (0 disables)
    pub min_vertical_ratio: f32,
    /// Random launch angle range, ± radians from straight up
    pub launch_spread: f32,

    // === Physics ===
    pub restitution: f32,
    pub gravity: Vec2,
    /// Fixed simulation step in seconds
    pub fixed_dt: f32,
    /// Step cap per update (spiral-of-death guard)
    pub max_steps_per_update: u32,

    // === Rules ===
    pub lives: u8,
    pub points_per_brick: u64,
    /// Hit events kept before the oldest is dropped
    pub hit_queue_capacity: usize,
    /// Seed for launch angle randomness
    pub seed: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            // Play field
            play_field_size: Vec2::new(320.0, 480.0),
            wall_thickness: 10.0,

            // Bricks
            brick_layout: BrickLayout::default(),

            // Paddle
            paddle_size: Vec2::new(64.0, 10.0),
            paddle_y: 30.0,
            paddle_english: 0.5,

            // Ball
            ball_radius: BALL_RADIUS,
            ball_speed: BALL_START_SPEED,
            max_ball_speed: BALL_MAX_SPEED,
            min_vertical_ratio: 0.25,
            launch_spread: 0.35,

            // Physics
            restitution: 1.0,
            gravity: Vec2::ZERO,
            fixed_dt: SIM_DT,
            max_steps_per_update: MAX_SUBSTEPS,

            // Rules
            lives: 3,
            points_per_brick: 10,
            hit_queue_capacity: 256,
            seed: 0,
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

impl LevelConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LevelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Play field interior as a box
    pub fn play_field(&self) -> Aabb {
        Aabb::new(Vec2::ZERO, self.play_field_size)
    }

    /// Reject anything that cannot produce a playable level
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("play_field_size.x", self.play_field_size.x)?;
        positive("play_field_size.y", self.play_field_size.y)?;
        positive("wall_thickness", self.wall_thickness)?;

        let layout = &self.brick_layout;
        if layout.rows == 0 || layout.cols == 0 {
            return Err(ConfigError::EmptyLayout);
        }
        let expected = match layout.brick_count() {
            Some(count) if count <= MAX_BRICKS => count,
            _ => {
                return Err(ConfigError::TooManyBricks {
                    rows: layout.rows,
                    cols: layout.cols,
                    max: MAX_BRICKS,
                });
            }
        };
        positive("brick_layout.brick_size.x", layout.brick_size.x)?;
        positive("brick_layout.brick_size.y", layout.brick_size.y)?;
        non_negative("brick_layout.gap", layout.gap)?;
        non_negative("brick_layout.top_margin", layout.top_margin)?;
        if layout.durability.len() != 1 && layout.durability.len() != expected {
            return Err(ConfigError::DurabilityCount {
                expected,
                got: layout.durability.len(),
            });
        }
        if layout.durability.contains(&0) {
            return Err(ConfigError::ZeroDurability);
        }

        positive("paddle_size.x", self.paddle_size.x)?;
        positive("paddle_size.y", self.paddle_size.y)?;
        positive("paddle_y", self.paddle_y)?;
        non_negative("paddle_english", self.paddle_english)?;

        positive("ball_radius", self.ball_radius)?;
        positive("ball_speed", self.ball_speed)?;
        positive("max_ball_speed", self.max_ball_speed)?;
        non_negative("min_vertical_ratio", self.min_vertical_ratio)?;
        non_negative("launch_spread", self.launch_spread)?;
        if self.ball_speed > self.max_ball_speed {
            return Err(ConfigError::SpeedAboveCap {
                speed: self.ball_speed,
                max: self.max_ball_speed,
            });
        }

        non_negative("restitution", self.restitution)?;
        if !self.gravity.is_finite() {
            return Err(ConfigError::NotPositive {
                field: "gravity",
                value: f32::NAN,
            });
        }
        positive("fixed_dt", self.fixed_dt)?;
        if self.max_steps_per_update == 0 {
            return Err(ConfigError::ZeroCount {
                field: "max_steps_per_update",
            });
        }
        if self.lives == 0 {
            return Err(ConfigError::ZeroCount { field: "lives" });
        }
        if self.hit_queue_capacity == 0 {
            return Err(ConfigError::ZeroCount {
                field: "hit_queue_capacity",
            });
        }

        // Geometry must fit
        let needed = layout.row_width();
        if needed > self.play_field_size.x {
            return Err(ConfigError::LayoutTooWide {
                needed,
                available: self.play_field_size.x,
            });
        }
        let bricks_bottom = self.play_field_size.y - layout.top_margin - layout.grid_height();
        let launch_room = self.paddle_y
            + self.paddle_size.y * 0.5
            + self.ball_radius * 2.0
            + ATTACH_GAP;
        if bricks_bottom < launch_room {
            return Err(ConfigError::LayoutTooTall {
                needed: self.play_field_size.y - bricks_bottom + launch_room,
                available: self.play_field_size.y,
            });
        }
        if self.paddle_size.x > self.play_field_size.x {
            return Err(ConfigError::LayoutTooWide {
                needed: self.paddle_size.x,
                available: self.play_field_size.x,
            });
        }

        Ok(())
    }
}
