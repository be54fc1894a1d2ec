//! The simulated world: body store plus one fixed step of physics
//!
//! Per step: detect contacts → resolve in order → re-sweep the balls that
//! bounced → integrate.
//! Destroyed bodies are purged separately so the caller decides when
//! end-of-step removal happens.

use glam::Vec2;

use super::body::{BodyHandle, BodyKind, BodyStore};
use super::broadphase::UniformGrid;
use super::detector::{Contact, detect, sweep_remaining};
use super::resolver::{ResolvePolicy, StepProgress, integrate, resolve_contacts};
use super::shape::Aabb;

/// Resolve passes per step before a still-colliding ball is held in place
pub const MAX_SWEEP_PASSES: usize = 4;

#[derive(Debug, Clone)]
pub struct World {
    pub bodies: BodyStore,
    grid: UniformGrid,
    /// Constant acceleration for dynamic bodies (zero for Breakout)
    pub gravity: Vec2,
    /// Play field interior; kinematic bodies stay inside it
    pub bounds: Aabb,
    pub policy: ResolvePolicy,
    /// Simulated seconds
    time: f64,
    steps: u64,
}

impl World {
    pub fn new(epoch: u32, bounds: Aabb, gravity: Vec2, policy: ResolvePolicy) -> Self {
        Self {
            bodies: BodyStore::new(epoch),
            grid: UniformGrid::default(),
            gravity,
            bounds,
            policy,
            time: 0.0,
            steps: 0,
        }
    }

    /// Advance one fixed step with full collision handling.
    /// Returns the contacts the resolver acted on, in resolution order.
    ///
    /// A ball that bounces mid-step has the rest of its motion swept again,
    /// up to [`MAX_SWEEP_PASSES`] times. A ball still hitting something
    /// after the last pass stops where it is for the rest of the step.
    pub fn step(&mut self, dt: f32) -> Vec<Contact> {
        let mut pending = detect(&self.bodies, &mut self.grid, dt);
        let mut progress = StepProgress::new();
        let mut resolved = Vec::new();

        for _ in 0..MAX_SWEEP_PASSES {
            if pending.is_empty() {
                break;
            }
            let touched = self.dynamic_members(&pending);
            resolved.extend(resolve_contacts(
                &mut self.bodies,
                &pending,
                &self.policy,
                dt,
                &mut progress,
            ));
            pending = sweep_remaining(&self.bodies, &self.grid, &touched, &progress, dt);
        }
        for contact in &pending {
            log::debug!("Holding {} after {} sweep passes", contact.a, MAX_SWEEP_PASSES);
            progress.insert(contact.a, 1.0);
        }

        integrate(&mut self.bodies, dt, self.gravity, &progress, &self.bounds, true);
        self.advance_clock(dt);
        resolved
    }

    /// Advance one step moving kinematic bodies only (no contacts)
    pub fn step_kinematic(&mut self, dt: f32) {
        integrate(&mut self.bodies, dt, self.gravity, &StepProgress::new(), &self.bounds, false);
        self.advance_clock(dt);
    }

    /// Dynamic bodies named by `contacts`, ascending and deduplicated
    fn dynamic_members(&self, contacts: &[Contact]) -> Vec<BodyHandle> {
        let mut handles: Vec<_> = contacts
            .iter()
            .flat_map(|c| [c.a, c.b])
            .filter(|&h| {
                self.bodies
                    .get(h)
                    .map(|body| body.kind == BodyKind::Dynamic)
                    .unwrap_or(false)
            })
            .collect();
        handles.sort_unstable();
        handles.dedup();
        handles
    }

    fn advance_clock(&mut self, dt: f32) {
        self.time += dt as f64;
        self.steps += 1;
    }

    /// Reclaim bodies destroyed during this step
    pub fn purge_dead(&mut self) -> usize {
        self.bodies.purge_dead()
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}
