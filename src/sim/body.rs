//! Rigid body store
//!
//! Generational arena holding every simulated body for one level.
//! - Handles are `(epoch, index, generation)`; a purged slot bumps its
//!   generation, and a level reset bumps the epoch, so stale handles are
//!   detected in O(1) instead of resolving against an unrelated body.
//! - Iteration is always in ascending handle order for determinism.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::shape::{Aabb, Shape};
use crate::error::{CoreError, CoreResult};

/// Stable identity of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle {
    /// Level instance the handle was issued in
    pub epoch: u32,
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}v{}", self.epoch, self.index, self.generation)
    }
}

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves (walls, bricks)
    Static,
    /// Velocity set from outside only (paddle)
    Kinematic,
    /// Velocity changed by collision response (ball)
    Dynamic,
}

/// Gameplay role of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Wall,
    Paddle,
    Ball,
    Brick,
}

/// Position and orientation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    /// Radians. Breakout bodies are axis-aligned, so this stays 0.
    pub angle: f32,
}

impl Pose {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            angle: 0.0,
        }
    }
}

/// A simulated body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub kind: BodyKind,
    pub shape: Shape,
    pub pose: Pose,
    pub velocity: Vec2,
    /// Bounciness in 0..=1 (values above 1 add energy)
    pub restitution: f32,
    pub tag: Tag,
    /// Hits left before a brick breaks (unused for other tags)
    pub durability: u8,
    pub alive: bool,
}

impl Body {
    pub fn new(kind: BodyKind, shape: Shape, pose: Pose, tag: Tag) -> Self {
        Self {
            kind,
            shape,
            pose,
            velocity: Vec2::ZERO,
            restitution: 1.0,
            tag,
            durability: 1,
            alive: true,
        }
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_durability(mut self, durability: u8) -> Self {
        self.durability = durability;
        self
    }

    /// World-space bounds
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(self.pose.position)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    body: Option<Body>,
}

/// Arena of bodies for one level
#[derive(Debug, Clone)]
pub struct BodyStore {
    epoch: u32,
    slots: Vec<Slot>,
    /// Reusable slot indices, lowest first
    free: Vec<u32>,
    /// Bodies destroyed this step, reclaimed by `purge_dead`
    pending: Vec<BodyHandle>,
}

impl BodyStore {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            slots: Vec::new(),
            free: Vec::new(),
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Create a body with default restitution
    pub fn create_body(
        &mut self,
        kind: BodyKind,
        shape: Shape,
        pose: Pose,
        tag: Tag,
    ) -> CoreResult<BodyHandle> {
        self.insert(Body::new(kind, shape, pose, tag))
    }

    /// Insert a fully built body. Rejects degenerate shapes and poses.
    pub fn insert(&mut self, body: Body) -> CoreResult<BodyHandle> {
        if body.shape.is_degenerate() {
            return Err(CoreError::DegenerateGeometry("body shape has zero or invalid size"));
        }
        if !body.pose.position.is_finite() {
            return Err(CoreError::DegenerateGeometry("body position is not finite"));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    body: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.body = Some(body);

        Ok(BodyHandle {
            epoch: self.epoch,
            index,
            generation: slot.generation,
        })
    }

    /// Mark a body dead. Lookups fail immediately; the slot is reclaimed
    /// by the next `purge_dead`.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> CoreResult<()> {
        let body = self.get_mut(handle)?;
        body.alive = false;
        self.pending.push(handle);
        Ok(())
    }

    /// Reclaim slots of bodies destroyed since the last purge.
    /// Returns how many bodies were removed.
    pub fn purge_dead(&mut self) -> usize {
        let count = self.pending.len();
        for handle in self.pending.drain(..) {
            let slot = &mut self.slots[handle.index as usize];
            slot.body = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index);
        }
        // Hand out the lowest free index first
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        count
    }

    fn slot(&self, handle: BodyHandle) -> Option<&Slot> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: BodyHandle) -> CoreResult<&Body> {
        self.slot(handle)
            .and_then(|slot| slot.body.as_ref())
            .filter(|body| body.alive)
            .ok_or(CoreError::InvalidHandle(handle))
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> CoreResult<&mut Body> {
        if self.slot(handle).is_none() {
            return Err(CoreError::InvalidHandle(handle));
        }
        self.slots[handle.index as usize]
            .body
            .as_mut()
            .filter(|body| body.alive)
            .ok_or(CoreError::InvalidHandle(handle))
    }

    #[inline]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_ok()
    }

    pub fn pose(&self, handle: BodyHandle) -> CoreResult<Pose> {
        self.get(handle).map(|body| body.pose)
    }

    pub fn velocity(&self, handle: BodyHandle) -> CoreResult<Vec2> {
        self.get(handle).map(|body| body.velocity)
    }

    /// Set a body's linear velocity. Static bodies ignore the request.
    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> CoreResult<()> {
        let body = self.get_mut(handle)?;
        if body.kind == BodyKind::Static {
            log::warn!("Ignoring velocity for static body {}", handle);
            return Ok(());
        }
        body.velocity = velocity;
        Ok(())
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) -> CoreResult<()> {
        self.get_mut(handle)?.pose.position = position;
        Ok(())
    }

    /// Alive bodies in ascending handle order
    pub fn iter_alive(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        let epoch = self.epoch;
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            slot.body.as_ref().filter(|body| body.alive).map(|body| {
                (
                    BodyHandle {
                        epoch,
                        index: index as u32,
                        generation: slot.generation,
                    },
                    body,
                )
            })
        })
    }

    /// Visit alive bodies in ascending handle order
    pub fn for_each_alive<F>(&self, mut visitor: F)
    where
        F: FnMut(BodyHandle, &Body),
    {
        for (handle, body) in self.iter_alive() {
            visitor(handle, body);
        }
    }

    /// Handles of alive non-static bodies, ascending
    pub fn moving_handles(&self) -> Vec<BodyHandle> {
        self.iter_alive()
            .filter(|(_, body)| body.kind != BodyKind::Static)
            .map(|(handle, _)| handle)
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.iter_alive().count()
    }

    pub fn count_tagged(&self, tag: Tag) -> usize {
        self.iter_alive().filter(|(_, body)| body.tag == tag).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brick(store: &mut BodyStore, x: f32) -> BodyHandle {
        store
            .create_body(
                BodyKind::Static,
                Shape::rect(10.0, 4.0),
                Pose::at(Vec2::new(x, 0.0)),
                Tag::Brick,
            )
            .unwrap()
    }

    #[test]
    fn test_create_and_lookup() {
        let mut store = BodyStore::new(0);
        let h = brick(&mut store, 5.0);
        assert_eq!(store.pose(h).unwrap().position, Vec2::new(5.0, 0.0));
        assert_eq!(store.get(h).unwrap().tag, Tag::Brick);
        assert_eq!(store.alive_count(), 1);
    }

    #[test]
    fn test_degenerate_shape_rejected() {
        let mut store = BodyStore::new(0);
        let result = store.create_body(
            BodyKind::Dynamic,
            Shape::circle(0.0),
            Pose::default(),
            Tag::Ball,
        );
        assert!(matches!(result, Err(CoreError::DegenerateGeometry(_))));
        assert_eq!(store.alive_count(), 0);
    }

    #[test]
    fn test_destroy_invalidates_handle_only() {
        let mut store = BodyStore::new(0);
        let a = brick(&mut store, 0.0);
        let b = brick(&mut store, 20.0);

        store.destroy_body(a).unwrap();
        assert_eq!(store.pose(a), Err(CoreError::InvalidHandle(a)));
        assert_eq!(
            store.set_velocity(a, Vec2::ONE),
            Err(CoreError::InvalidHandle(a))
        );
        assert_eq!(store.destroy_body(a), Err(CoreError::InvalidHandle(a)));
        assert_eq!(store.pose(b).unwrap().position, Vec2::new(20.0, 0.0));
    }

    #[test]
    fn test_purged_slot_reuse_gets_new_handle() {
        let mut store = BodyStore::new(0);
        let a = brick(&mut store, 0.0);
        store.destroy_body(a).unwrap();
        assert_eq!(store.purge_dead(), 1);

        let c = brick(&mut store, 40.0);
        assert_eq!(c.index, a.index);
        assert_ne!(c, a);
        assert!(store.get(a).is_err());
        assert_eq!(store.pose(c).unwrap().position, Vec2::new(40.0, 0.0));
    }

    #[test]
    fn test_foreign_epoch_rejected() {
        let mut old = BodyStore::new(0);
        let stale = brick(&mut old, 0.0);
        let mut fresh = BodyStore::new(1);
        let _ = brick(&mut fresh, 0.0);
        assert_eq!(fresh.get(stale).err(), Some(CoreError::InvalidHandle(stale)));
    }

    #[test]
    fn test_static_ignores_velocity() {
        let mut store = BodyStore::new(0);
        let a = brick(&mut store, 0.0);
        store.set_velocity(a, Vec2::new(5.0, 0.0)).unwrap();
        assert_eq!(store.velocity(a).unwrap(), Vec2::ZERO);
    }

    #[test]
    fn test_iteration_ascending() {
        let mut store = BodyStore::new(0);
        let handles: Vec<_> = (0..5).map(|i| brick(&mut store, i as f32 * 20.0)).collect();
        store.destroy_body(handles[1]).unwrap();
        store.destroy_body(handles[3]).unwrap();
        store.purge_dead();
        let refill = brick(&mut store, 100.0);
        assert_eq!(refill.index, 1);

        let mut seen = Vec::new();
        store.for_each_alive(|h, _| seen.push(h));
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
        assert_eq!(seen.len(), 4);
    }

    proptest! {
        #[test]
        fn prop_destroy_never_affects_others(count in 1usize..20, victim in 0usize..20) {
            let mut store = BodyStore::new(0);
            let handles: Vec<_> = (0..count).map(|i| brick(&mut store, i as f32 * 15.0)).collect();
            let victim = victim % count;
            store.destroy_body(handles[victim]).unwrap();
            if victim % 2 == 0 {
                store.purge_dead();
            }
            for (i, h) in handles.iter().enumerate() {
                if i == victim {
                    prop_assert_eq!(store.pose(*h), Err(CoreError::InvalidHandle(*h)));
                } else {
                    let expected = Vec2::new(i as f32 * 15.0, 0.0);
                    prop_assert_eq!(store.pose(*h).unwrap().position, expected);
                }
            }
        }
    }
}
