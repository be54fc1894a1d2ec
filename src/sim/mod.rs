//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (ascending body handle)
//! - No rendering or platform dependencies

pub mod body;
pub mod broadphase;
pub mod collision;
pub mod detector;
pub mod resolver;
pub mod shape;
pub mod state;
pub mod tick;
pub mod world;

pub use body::{Body, BodyHandle, BodyKind, BodyStore, Pose, Tag};
pub use broadphase::UniformGrid;
pub use collision::{
    CollisionResult, Sweep, normalize_checked, reflect_velocity, reflect_with_restitution,
};
pub use detector::{Contact, detect, sweep_remaining};
pub use resolver::{ResolvePolicy, integrate, resolve_contacts};
pub use shape::{Aabb, Shape};
pub use state::{GamePhase, GameState, HitEvent};
pub use tick::{TickInput, tick};
pub use world::{MAX_SWEEP_PASSES, World};
