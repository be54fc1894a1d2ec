//! Breakout Core - physics and game loop for a brick breaker
//!
//! Core modules:
//! - `sim`: Deterministic simulation (bodies, collisions, game state)
//! - `engine`: Host-facing façade with fixed-step pacing and buffered input
//! - `config`: Data-driven level layout and tuning
//! - `render`: Pose extraction and GPU-ready instance data
//! - `error`: Error types
//!
//! Coordinates are y-up with the origin at the bottom-left corner of the
//! play field.

pub mod config;
pub mod engine;
pub mod error;
pub mod render;
pub mod sim;

pub use engine::BreakoutCore;
pub use config::{BrickLayout, LevelConfig};
pub use error::{ConfigError, CoreError, CoreResult};
pub use render::{RenderPose, TransformInstance};
pub use sim::{BodyHandle, GamePhase, HitEvent, Pose, Tag};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 5.0;
    pub const BALL_START_SPEED: f32 = 240.0;
    /// Maximum ball speed after paddle hits
    pub const BALL_MAX_SPEED: f32 = 480.0;

    /// Space between paddle top and a waiting ball
    pub const ATTACH_GAP: f32 = 2.0;
}
