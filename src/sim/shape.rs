//! Shape primitives for bodies
//!
//! Breakout only needs two shapes:
//! - `Circle`: the ball
//! - `Box`: axis-aligned rectangles for walls, paddle and bricks
//!
//! Bodies never rotate, so every box is an AABB once placed at a position.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box centered at `center` extending `half_extents` on each side
    #[inline]
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Check if a point lies inside or on the boundary
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Strict overlap test (touching edges do not count)
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Grow the box by `margin` on every side
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Closest point on or inside the box to `p`
    #[inline]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }
}

/// Body shape, local to the body's position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Box { half_extents: Vec2 },
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle { radius }
    }

    /// Box from full width/height
    pub fn rect(width: f32, height: f32) -> Self {
        Shape::Box {
            half_extents: Vec2::new(width * 0.5, height * 0.5),
        }
    }

    /// World-space bounds when placed at `position`
    pub fn aabb(&self, position: Vec2) -> Aabb {
        match *self {
            Shape::Circle { radius } => Aabb::from_center(position, Vec2::splat(radius)),
            Shape::Box { half_extents } => Aabb::from_center(position, half_extents),
        }
    }

    /// Largest full extent along either axis (drives broad-phase cell size)
    pub fn max_extent(&self) -> f32 {
        match *self {
            Shape::Circle { radius } => radius * 2.0,
            Shape::Box { half_extents } => half_extents.max_element() * 2.0,
        }
    }

    /// Half extents of the bounding box (radius for circles)
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Circle { radius } => Vec2::splat(radius),
            Shape::Box { half_extents } => half_extents,
        }
    }

    /// True when any dimension is zero, negative or not finite
    pub fn is_degenerate(&self) -> bool {
        match *self {
            Shape::Circle { radius } => !(radius.is_finite() && radius > 0.0),
            Shape::Box { half_extents } => {
                !(half_extents.is_finite() && half_extents.x > 0.0 && half_extents.y > 0.0)
            }
        }
    }
}
