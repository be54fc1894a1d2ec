//! Collision response and integration
//!
//! Body kinds are switched on here directly:
//! - Static: never moved, never changes velocity
//! - Kinematic: moved by its externally set velocity, clamped to the field
//! - Dynamic: the only kind whose velocity collision response changes

use std::collections::BTreeMap;

use glam::Vec2;

use super::body::{BodyHandle, BodyKind, BodyStore};
use super::collision::{normalize_checked, reflect_with_restitution};
use super::detector::Contact;
use super::shape::Aabb;

/// Extra separation added after pushing a ball out of a surface, so the
/// next step does not see a zero-depth overlap
pub const CONTACT_SLOP: f32 = 0.01;

/// Tunable response rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvePolicy {
    /// Fraction of paddle horizontal velocity added to a bounced ball
    pub paddle_english: f32,
    /// Ball speed cap, enforced after every bounce
    pub max_ball_speed: f32,
    /// Smallest |vy| / speed allowed after a paddle hit
    pub min_vertical_ratio: f32,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            paddle_english: 0.5,
            max_ball_speed: f32::MAX,
            min_vertical_ratio: 0.0,
        }
    }
}

/// Fraction of the step already spent by each body during swept resolution
pub type StepProgress = BTreeMap<BodyHandle, f32>;

/// Box2D-style restitution mixing
#[inline]
fn mix_restitution(a: f32, b: f32) -> f32 {
    a.max(b)
}

/// Apply the paddle's "english" and keep the bounce playable
fn steer_off_paddle(
    velocity: Vec2,
    normal: Vec2,
    paddle_velocity: Vec2,
    policy: &ResolvePolicy,
) -> Vec2 {
    let mut v = velocity;
    v.x += paddle_velocity.x * policy.paddle_english;

    let speed = v.length();
    let min_vy = speed * policy.min_vertical_ratio.clamp(0.0, 1.0);
    if v.y.abs() < min_vy {
        let up = if normal.y != 0.0 { normal.y.signum() } else { v.y.signum() };
        v.y = up * min_vy;
        v.x = v.x.signum() * (speed * speed - min_vy * min_vy).max(0.0).sqrt();
    }

    let (dir, degenerate) = normalize_checked(v);
    if degenerate {
        return velocity;
    }
    dir * speed.min(policy.max_ball_speed)
}

/// Resolve contacts in order. Returns the contacts that were acted on.
///
/// A contact counts as resolved when the dynamic body was moving into it.
/// Overlaps that are already separating only get positional correction,
/// and stale swept contacts are dropped. No bounce leaves a dynamic body
/// faster than `policy.max_ball_speed`.
pub fn resolve_contacts(
    store: &mut BodyStore,
    contacts: &[Contact],
    policy: &ResolvePolicy,
    dt: f32,
    progress: &mut StepProgress,
) -> Vec<Contact> {
    let mut resolved = Vec::new();

    for contact in contacts {
        let (Ok(a), Ok(b)) = (store.get(contact.a), store.get(contact.b)) else {
            log::debug!("Skipping contact with vanished body {} / {}", contact.a, contact.b);
            continue;
        };
        let (a, b) = (a.clone(), b.clone());
        if a.kind != BodyKind::Dynamic {
            continue;
        }

        let n = contact.normal;
        let e = mix_restitution(a.restitution, b.restitution);

        match b.kind {
            BodyKind::Dynamic => {
                // Equal-mass exchange along the normal
                let relative = a.velocity - b.velocity;
                let approach = relative.dot(n);
                let half = n * (contact.penetration * 0.5 + CONTACT_SLOP);
                if let Ok(body) = store.get_mut(contact.a) {
                    body.pose.position += half;
                }
                if let Ok(body) = store.get_mut(contact.b) {
                    body.pose.position -= half;
                }
                if approach < 0.0 {
                    let impulse = -(1.0 + e) * approach * 0.5;
                    if let Ok(body) = store.get_mut(contact.a) {
                        body.velocity =
                            (body.velocity + n * impulse).clamp_length_max(policy.max_ball_speed);
                    }
                    if let Ok(body) = store.get_mut(contact.b) {
                        body.velocity =
                            (body.velocity - n * impulse).clamp_length_max(policy.max_ball_speed);
                    }
                    resolved.push(*contact);
                }
            }

            BodyKind::Static | BodyKind::Kinematic => {
                let relative = a.velocity - b.velocity;
                let approaching = relative.dot(n) < 0.0;
                let Ok(body) = store.get_mut(contact.a) else {
                    continue;
                };

                match contact.toi {
                    Some(t) => {
                        let done = progress.get(&contact.a).copied().unwrap_or(0.0);
                        if !approaching || done > t {
                            log::trace!("Stale swept contact {} -> {}", contact.a, contact.b);
                            continue;
                        }
                        // Advance to the touch point, then bounce
                        body.pose.position += a.velocity * dt * (t - done) + n * CONTACT_SLOP;
                        progress.insert(contact.a, t);
                    }
                    None => {
                        body.pose.position += n * (contact.penetration + CONTACT_SLOP);
                    }
                }

                if !approaching {
                    continue;
                }

                let mut v = b.velocity + reflect_with_restitution(relative, n, e);
                if b.kind == BodyKind::Kinematic {
                    v = steer_off_paddle(v, n, b.velocity, policy);
                }
                body.velocity = v.clamp_length_max(policy.max_ball_speed);
                resolved.push(*contact);
            }
        }
    }

    resolved
}

/// Semi-implicit Euler over one step.
///
/// Dynamic bodies gain `gravity * dt` then move for whatever part of the
/// step swept resolution has not already used. Kinematic bodies move and
/// are clamped inside `bounds`. When `include_dynamic` is false only
/// kinematic bodies move.
pub fn integrate(
    store: &mut BodyStore,
    dt: f32,
    gravity: Vec2,
    progress: &StepProgress,
    bounds: &Aabb,
    include_dynamic: bool,
) {
    for handle in store.moving_handles() {
        let Ok(body) = store.get_mut(handle) else {
            continue;
        };
        match body.kind {
            BodyKind::Static => {}
            BodyKind::Dynamic => {
                if !include_dynamic {
                    continue;
                }
                body.velocity += gravity * dt;
                let remaining = 1.0 - progress.get(&handle).copied().unwrap_or(0.0);
                body.pose.position += body.velocity * dt * remaining;
            }
            BodyKind::Kinematic => {
                body.pose.position += body.velocity * dt;
                let half = body.shape.half_extents();
                let lo = bounds.min + half;
                let hi = bounds.max - half;
                if lo.x <= hi.x {
                    body.pose.position.x = body.pose.position.x.clamp(lo.x, hi.x);
                }
                if lo.y <= hi.y {
                    body.pose.position.y = body.pose.position.y.clamp(lo.y, hi.y);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::body::{Body, Pose, Tag};
    use crate::sim::shape::Shape;

    const DT: f32 = 1.0 / 120.0;

    fn contact(a: BodyHandle, b: BodyHandle, normal: Vec2, penetration: f32) -> Contact {
        Contact {
            a,
            b,
            normal,
            penetration,
            point: Vec2::ZERO,
            toi: None,
        }
    }

    fn ball(store: &mut BodyStore, at: Vec2, vel: Vec2) -> BodyHandle {
        let h = store
            .create_body(BodyKind::Dynamic, Shape::circle(4.0), Pose::at(at), Tag::Ball)
            .unwrap();
        store.set_velocity(h, vel).unwrap();
        h
    }

    fn wall(store: &mut BodyStore) -> BodyHandle {
        store
            .create_body(
                BodyKind::Static,
                Shape::rect(10.0, 100.0),
                Pose::at(Vec2::new(-5.0, 50.0)),
                Tag::Wall,
            )
            .unwrap()
    }

    #[test]
    fn test_elastic_wall_bounce_conserves_speed() {
        let mut store = BodyStore::new(0);
        let w = wall(&mut store);
        let b = ball(&mut store, Vec2::new(3.0, 50.0), Vec2::new(-120.0, 35.0));
        let before = store.velocity(b).unwrap();

        let resolved = resolve_contacts(
            &mut store,
            &[contact(b, w, Vec2::X, 1.0)],
            &ResolvePolicy::default(),
            DT,
            &mut StepProgress::new(),
        );
        assert_eq!(resolved.len(), 1);

        let after = store.velocity(b).unwrap();
        assert!((after.x - 120.0).abs() < 1e-4);
        assert!((after.y - 35.0).abs() < 1e-4);
        assert!((after.length() - before.length()).abs() < 1e-4);
        // Pushed out of the wall
        assert!(store.pose(b).unwrap().position.x >= 4.0);
        // Wall untouched
        assert_eq!(store.velocity(w).unwrap(), Vec2::ZERO);
        assert_eq!(store.pose(w).unwrap().position, Vec2::new(-5.0, 50.0));
    }

    #[test]
    fn test_separating_overlap_is_corrected_not_bounced() {
        let mut store = BodyStore::new(0);
        let w = wall(&mut store);
        let b = ball(&mut store, Vec2::new(3.0, 50.0), Vec2::new(120.0, 0.0));

        let resolved = resolve_contacts(
            &mut store,
            &[contact(b, w, Vec2::X, 1.0)],
            &ResolvePolicy::default(),
            DT,
            &mut StepProgress::new(),
        );
        assert!(resolved.is_empty());
        assert_eq!(store.velocity(b).unwrap(), Vec2::new(120.0, 0.0));
        assert!(store.pose(b).unwrap().position.x > 3.0);
    }

    #[test]
    fn test_second_contact_sees_updated_velocity() {
        let mut store = BodyStore::new(0);
        let w = wall(&mut store);
        let other = wall(&mut store);
        let b = ball(&mut store, Vec2::new(3.0, 50.0), Vec2::new(-100.0, 0.0));

        // Both contacts share a normal: only the first one bounces
        let resolved = resolve_contacts(
            &mut store,
            &[contact(b, w, Vec2::X, 0.5), contact(b, other, Vec2::X, 0.5)],
            &ResolvePolicy::default(),
            DT,
            &mut StepProgress::new(),
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].b, w);
        assert!((store.velocity(b).unwrap().x - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_paddle_english_biases_horizontal() {
        let mut store = BodyStore::new(0);
        let paddle = store
            .create_body(
                BodyKind::Kinematic,
                Shape::rect(60.0, 10.0),
                Pose::at(Vec2::new(0.0, 0.0)),
                Tag::Paddle,
            )
            .unwrap();
        store.set_velocity(paddle, Vec2::new(200.0, 0.0)).unwrap();
        let b = ball(&mut store, Vec2::new(0.0, 8.5), Vec2::new(0.0, -240.0));

        let policy = ResolvePolicy {
            paddle_english: 0.5,
            max_ball_speed: 1000.0,
            min_vertical_ratio: 0.0,
        };
        resolve_contacts(
            &mut store,
            &[contact(b, paddle, Vec2::Y, 0.5)],
            &policy,
            DT,
            &mut StepProgress::new(),
        );

        let v = store.velocity(b).unwrap();
        assert!((v.x - 100.0).abs() < 1e-3);
        assert!((v.y - 240.0).abs() < 1e-3);
        // Paddle velocity is never touched by response
        assert_eq!(store.velocity(paddle).unwrap(), Vec2::new(200.0, 0.0));
    }

    #[test]
    fn test_paddle_bounce_respects_speed_cap_and_vertical_ratio() {
        let mut store = BodyStore::new(0);
        let paddle = store
            .create_body(
                BodyKind::Kinematic,
                Shape::rect(60.0, 10.0),
                Pose::at(Vec2::ZERO),
                Tag::Paddle,
            )
            .unwrap();
        store.set_velocity(paddle, Vec2::new(5000.0, 0.0)).unwrap();
        let b = ball(&mut store, Vec2::new(0.0, 8.5), Vec2::new(0.0, -240.0));

        let policy = ResolvePolicy {
            paddle_english: 1.0,
            max_ball_speed: 480.0,
            min_vertical_ratio: 0.3,
        };
        resolve_contacts(
            &mut store,
            &[contact(b, paddle, Vec2::Y, 0.5)],
            &policy,
            DT,
            &mut StepProgress::new(),
        );

        let v = store.velocity(b).unwrap();
        assert!(v.length() <= 480.0 + 1e-2);
        assert!(v.y > 0.0);
        assert!(v.y / v.length() >= 0.3 - 1e-4);
    }

    #[test]
    fn test_swept_contact_consumes_step() {
        let mut store = BodyStore::new(0);
        let brick = store
            .create_body(
                BodyKind::Static,
                Shape::rect(32.0, 12.0),
                Pose::at(Vec2::new(0.0, 40.0)),
                Tag::Brick,
            )
            .unwrap();
        let b = ball(&mut store, Vec2::new(0.0, 20.0), Vec2::new(0.0, 7200.0));

        let mut progress = StepProgress::new();
        let swept = Contact {
            a: b,
            b: brick,
            normal: Vec2::NEG_Y,
            penetration: 0.0,
            point: Vec2::new(0.0, 34.0),
            toi: Some(10.0 / 60.0),
        };
        let resolved =
            resolve_contacts(&mut store, &[swept], &ResolvePolicy::default(), DT, &mut progress);
        assert_eq!(resolved.len(), 1);
        assert!((store.pose(b).unwrap().position.y - (30.0 - CONTACT_SLOP)).abs() < 1e-3);

        let bounds = Aabb::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0));
        integrate(&mut store, DT, Vec2::ZERO, &progress, &bounds, true);
        // Remaining 5/6 of the step travelled downward at 7200
        let y = store.pose(b).unwrap().position.y;
        assert!((y - (30.0 - CONTACT_SLOP - 50.0)).abs() < 1e-2);
    }

    #[test]
    fn test_integrate_kinds() {
        let mut store = BodyStore::new(0);
        let w = wall(&mut store);
        let paddle = store
            .create_body(
                BodyKind::Kinematic,
                Shape::rect(20.0, 10.0),
                Pose::at(Vec2::new(85.0, 10.0)),
                Tag::Paddle,
            )
            .unwrap();
        store.set_velocity(paddle, Vec2::new(1200.0, 0.0)).unwrap();
        let b = ball(&mut store, Vec2::new(50.0, 50.0), Vec2::new(120.0, 0.0));

        let bounds = Aabb::new(Vec2::ZERO, Vec2::new(100.0, 100.0));
        integrate(&mut store, DT, Vec2::new(0.0, -120.0), &StepProgress::new(), &bounds, true);

        assert_eq!(store.pose(w).unwrap().position, Vec2::new(-5.0, 50.0));
        // Paddle clamped to the right edge
        assert!((store.pose(paddle).unwrap().position.x - 90.0).abs() < 1e-4);
        // Gravity applied before position (semi-implicit)
        let v = store.velocity(b).unwrap();
        assert!((v.y + 1.0).abs() < 1e-4);
        let p = store.pose(b).unwrap().position;
        assert!((p.x - 51.0).abs() < 1e-4);
        assert!((p.y - (50.0 - DT)).abs() < 1e-4);
    }

    #[test]
    fn test_bouncy_wall_cannot_exceed_speed_cap() {
        let mut store = BodyStore::new(0);
        let w = store
            .insert(
                Body::new(
                    BodyKind::Static,
                    Shape::rect(10.0, 100.0),
                    Pose::at(Vec2::new(-5.0, 50.0)),
                    Tag::Wall,
                )
                .with_restitution(1.5),
            )
            .unwrap();
        let b = ball(&mut store, Vec2::new(3.0, 50.0), Vec2::new(-400.0, 0.0));

        let policy = ResolvePolicy {
            max_ball_speed: 480.0,
            ..Default::default()
        };
        let resolved = resolve_contacts(
            &mut store,
            &[contact(b, w, Vec2::X, 1.0)],
            &policy,
            DT,
            &mut StepProgress::new(),
        );
        assert_eq!(resolved.len(), 1);
        // 1.5 restitution would give 600
        let v = store.velocity(b).unwrap();
        assert!((v.x - 480.0).abs() < 1e-3);
    }

    #[test]
    fn test_later_swept_contact_in_same_step() {
        let mut store = BodyStore::new(0);
        let brick = store
            .create_body(
                BodyKind::Static,
                Shape::rect(32.0, 12.0),
                Pose::at(Vec2::new(0.0, 0.0)),
                Tag::Brick,
            )
            .unwrap();
        let b = ball(&mut store, Vec2::new(0.0, 30.0), Vec2::new(0.0, -9600.0));

        let mut progress = StepProgress::new();
        progress.insert(b, 0.5);
        let swept = Contact {
            a: b,
            b: brick,
            normal: Vec2::Y,
            penetration: 0.0,
            point: Vec2::new(0.0, 6.0),
            toi: Some(0.75),
        };
        let policy = ResolvePolicy::default();
        let resolved = resolve_contacts(&mut store, &[swept], &policy, DT, &mut progress);
        assert_eq!(resolved.len(), 1);
        // Moved only the 20 units between 0.5 and 0.75 of the step
        assert!((store.pose(b).unwrap().position.y - (10.0 + CONTACT_SLOP)).abs() < 1e-3);
        assert_eq!(progress.get(&b).copied(), Some(0.75));

        // A contact from before the progress mark is stale
        let earlier = Contact {
            toi: Some(0.6),
            ..swept
        };
        store.set_velocity(b, Vec2::new(0.0, -9600.0)).unwrap();
        assert!(resolve_contacts(&mut store, &[earlier], &policy, DT, &mut progress).is_empty());
    }
}
