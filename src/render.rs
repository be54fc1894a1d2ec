//! Render extraction
//!
//! The core never draws. It hands out one transform per live body, either
//! as plain poses keyed by handle or as a GPU-ready instance buffer the
//! host uploads as-is.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::{Body, BodyHandle, Shape, Tag};

/// Pose of one live body, for hosts that draw with their own types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderPose {
    pub tag: Tag,
    pub shape: Shape,
    pub position: Vec2,
    pub angle: f32,
    /// Hits left (bricks only)
    pub durability: u8,
}

impl RenderPose {
    pub fn from_body(body: &Body) -> Self {
        Self {
            tag: body.tag,
            shape: body.shape,
            position: body.pose.position,
            angle: body.pose.angle,
            durability: body.durability,
        }
    }
}

/// Shape codes for `TransformInstance::shape`
pub mod shape_kind {
    pub const CIRCLE: u32 = 0;
    pub const BOX: u32 = 1;
}

/// Tag codes for `TransformInstance::tag`
pub mod tag_kind {
    pub const WALL: u32 = 0;
    pub const PADDLE: u32 = 1;
    pub const BALL: u32 = 2;
    pub const BRICK: u32 = 3;
}

/// Per-body instance data, laid out for a vertex buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformInstance {
    pub position: [f32; 2],
    /// Radius in both lanes for circles
    pub half_extents: [f32; 2],
    pub angle: f32,
    pub tag: u32,
    pub shape: u32,
    pub durability: u32,
}

impl TransformInstance {
    pub const fn new(position: [f32; 2], half_extents: [f32; 2], tag: u32, shape: u32) -> Self {
        Self {
            position,
            half_extents,
            angle: 0.0,
            tag,
            shape,
            durability: 0,
        }
    }

    pub fn from_pose(pose: &RenderPose) -> Self {
        let shape = match pose.shape {
            Shape::Circle { .. } => shape_kind::CIRCLE,
            Shape::Box { .. } => shape_kind::BOX,
        };
        let tag = match pose.tag {
            Tag::Wall => tag_kind::WALL,
            Tag::Paddle => tag_kind::PADDLE,
            Tag::Ball => tag_kind::BALL,
            Tag::Brick => tag_kind::BRICK,
        };
        Self {
            angle: pose.angle,
            durability: pose.durability as u32,
            ..Self::new(pose.position.to_array(), pose.shape.half_extents().to_array(), tag, shape)
        }
    }
}

/// Fill `out` with one instance per live body, ascending handle order
pub fn extract_instances<'a>(
    bodies: impl Iterator<Item = (BodyHandle, &'a Body)>,
    out: &mut Vec<TransformInstance>,
) {
    out.clear();
    out.extend(bodies.map(|(_, body)| TransformInstance::from_pose(&RenderPose::from_body(body))));
}
