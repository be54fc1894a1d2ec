//! Error taxonomy for the simulation core
//!
//! Only configuration/setup failures are returned to the embedding
//! application as hard errors. Everything else is logged and recovered
//! locally so a late UI event can never take down the render loop.

use thiserror::Error;

use crate::sim::BodyHandle;

/// Result alias used throughout the crate
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Operation referenced a destroyed, purged or foreign body
    #[error("invalid body handle {0}")]
    InvalidHandle(BodyHandle),

    /// Zero-size shape or zero-length direction
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    /// More fixed steps were pending than a single update may run
    #[error("step overrun: {requested} steps pending, clamped to {max}")]
    StepOverrun { requested: u32, max: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Problems found while validating or parsing a [`crate::LevelConfig`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be finite and greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f32 },

    #[error("`{field}` must be finite and non-negative (got {value})")]
    Negative { field: &'static str, value: f32 },

    #[error("brick layout needs at least one row and one column")]
    EmptyLayout,

    #[error("brick layout of {rows} x {cols} exceeds the {max} brick limit")]
    TooManyBricks { rows: u32, cols: u32, max: usize },

    #[error("brick durability table has {got} entries, expected 1 or {expected}")]
    DurabilityCount { expected: usize, got: usize },

    #[error("brick durability must be at least 1")]
    ZeroDurability,

    #[error("brick layout is {needed} wide but the play field interior is only {available}")]
    LayoutTooWide { needed: f32, available: f32 },

    #[error("level needs {needed} of height but the play field interior is only {available}")]
    LayoutTooTall { needed: f32, available: f32 },

    #[error("launch speed {speed} is above the ball speed cap {max}")]
    SpeedAboveCap { speed: f32, max: f32 },

    #[error("`{field}` must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("could not parse level config: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
