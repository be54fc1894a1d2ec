//! Contact detection for one fixed step
//!
//! 1. Broad phase: uniform grid candidate pairs
//! 2. Narrow phase: exact circle/box overlap at the start of the step
//! 3. Tunneling guard: each moving ball sweeps its step motion against
//!    boxes so a thin brick cannot be skipped
//!
//! Contacts come out sorted by ascending penetration, then ascending
//! handle pair. The resolver walks them in that order.

use std::cmp::Ordering;

use glam::Vec2;

use super::body::{Body, BodyHandle, BodyKind, BodyStore};
use super::broadphase::UniformGrid;
use super::collision::{CollisionResult, aabb_aabb, circle_aabb, circle_circle, sweep_circle_aabb};
use super::resolver::StepProgress;
use super::shape::{Aabb, Shape};

/// A detected contact, valid for the current step only
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// The dynamic body (lower handle if both are dynamic)
    pub a: BodyHandle,
    /// The other body
    pub b: BodyHandle,
    /// Unit normal pointing from `b` toward `a`
    pub normal: Vec2,
    /// Overlap depth, 0 for swept contacts
    pub penetration: f32,
    pub point: Vec2,
    /// Fraction of the whole step at which a swept contact first touches
    pub toi: Option<f32>,
}

/// Deterministic contact order: penetration, then handle pair
pub fn contact_order(x: &Contact, y: &Contact) -> Ordering {
    x.penetration
        .total_cmp(&y.penetration)
        .then_with(|| (x.a, x.b).cmp(&(y.a, y.b)))
}

/// Exact overlap of `a` against `b`, normal pointing toward `a`
fn narrow_phase(a: &Body, b: &Body) -> CollisionResult {
    let pa = a.pose.position;
    let pb = b.pose.position;
    match (a.shape, b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(pa, ra, pb, rb)
        }
        (Shape::Circle { radius }, Shape::Box { .. }) => circle_aabb(pa, radius, &b.aabb()),
        (Shape::Box { .. }, Shape::Circle { radius }) => {
            let mut result = circle_aabb(pb, radius, &a.aabb());
            result.normal = -result.normal;
            result
        }
        (Shape::Box { .. }, Shape::Box { .. }) => aabb_aabb(&a.aabb(), &b.aabb()),
    }
}

/// Find every contact for a step of length `dt`
pub fn detect(store: &BodyStore, grid: &mut UniformGrid, dt: f32) -> Vec<Contact> {
    grid.rebuild(store);
    let mut contacts = Vec::new();

    // --- DISCRETE OVERLAPS ---
    for (first, second) in grid.candidate_pairs(store) {
        let (Ok(body_first), Ok(body_second)) = (store.get(first), store.get(second)) else {
            continue;
        };

        // `a` is the dynamic side; the lower handle wins if both are
        let (a, b, body_a, body_b) = if body_first.kind == BodyKind::Dynamic {
            (first, second, body_first, body_second)
        } else {
            (second, first, body_second, body_first)
        };

        let result = narrow_phase(body_a, body_b);
        if result.hit {
            contacts.push(Contact {
                a,
                b,
                normal: result.normal,
                penetration: result.penetration,
                point: result.point,
                toi: None,
            });
        }
    }

    // --- SWEPT BALL MOTION ---
    for (handle, body) in store.iter_alive() {
        let Shape::Circle { radius } = body.shape else {
            continue;
        };
        if body.kind != BodyKind::Dynamic {
            continue;
        }
        let sweep = earliest_sweep(store, grid, &contacts, handle, body, radius, dt, 0.0);
        contacts.extend(sweep);
    }

    contacts.sort_by(contact_order);
    contacts
}

/// Sweep what is left of the step for `balls` after a resolve pass.
///
/// `progress` holds the fraction of the step each ball has already used.
/// A ball that bounced mid-step travels the rest with a new velocity, and
/// that segment can cross another body. Call again after resolving the
/// returned contacts until it comes back empty.
pub fn sweep_remaining(
    store: &BodyStore,
    grid: &UniformGrid,
    balls: &[BodyHandle],
    progress: &StepProgress,
    dt: f32,
) -> Vec<Contact> {
    let mut contacts = Vec::new();
    for &handle in balls {
        let Ok(body) = store.get(handle) else {
            continue;
        };
        let Shape::Circle { radius } = body.shape else {
            continue;
        };
        if body.kind != BodyKind::Dynamic {
            continue;
        }
        let done = progress.get(&handle).copied().unwrap_or(0.0);
        if done >= 1.0 {
            continue;
        }
        contacts.extend(earliest_sweep(store, grid, &[], handle, body, radius, dt, done));
    }
    contacts.sort_by(contact_order);
    contacts
}

/// Earliest swept hit of a ball against non-dynamic boxes over the part of
/// the step after `done`.
///
/// Bodies the ball already overlaps are skipped; their discrete contact
/// covers them. Ties on time of impact go to the lower handle. Kinematic
/// targets are swept from where they stand at `done`.
#[allow(clippy::too_many_arguments)]
fn earliest_sweep(
    store: &BodyStore,
    grid: &UniformGrid,
    discrete: &[Contact],
    handle: BodyHandle,
    ball: &Body,
    radius: f32,
    dt: f32,
    done: f32,
) -> Option<Contact> {
    let span = dt * (1.0 - done);
    let start = ball.pose.position;
    let travel = ball.velocity * span;
    if travel.length_squared() <= f32::EPSILON {
        return None;
    }

    let swept = ball.shape.aabb(start).union(&ball.shape.aabb(start + travel));
    let mut best: Option<(f32, BodyHandle, Vec2, Vec2)> = None;

    for other in grid.query(&swept) {
        if other == handle || discrete.iter().any(|c| c.a == handle && c.b == other) {
            continue;
        }
        let Ok(target) = store.get(other) else {
            continue;
        };
        if target.kind == BodyKind::Dynamic || !matches!(target.shape, Shape::Box { .. }) {
            continue;
        }

        // Sweep in the target's frame so a moving paddle is handled too
        let relative = (ball.velocity - target.velocity) * span;
        let offset = target.velocity * dt * done;
        let bounds = Aabb::new(target.aabb().min + offset, target.aabb().max + offset);
        let Some(hit) = sweep_circle_aabb(start, start + relative, radius, &bounds) else {
            continue;
        };

        let better = match best {
            None => true,
            Some((t, h, _, _)) => hit.t < t || (hit.t == t && other < h),
        };
        if better {
            best = Some((hit.t, other, hit.normal, hit.point));
        }
    }

    best.map(|(t, other, normal, point)| Contact {
        a: handle,
        b: other,
        normal,
        penetration: 0.0,
        point,
        toi: Some(done + (1.0 - done) * t),
    })
}
