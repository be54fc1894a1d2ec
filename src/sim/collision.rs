//! Narrow-phase geometry: overlap tests, sweeps and reflection
//!
//! All normals returned here point from the second shape toward the first,
//! which is the direction the first shape must move to separate.

use glam::Vec2;

use super::shape::Aabb;

/// Lengths below this are treated as zero
pub const EPSILON: f32 = 1.0e-6;

/// Result of a collision check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Collision point (if hit)
    pub point: Vec2,
    /// Surface normal at collision (pointing toward the first shape)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Normalize `v`, flagging near-zero input instead of producing NaN.
///
/// Returns `(unit, false)` normally and `(Vec2::ZERO, true)` when degenerate.
#[inline]
pub fn normalize_checked(v: Vec2) -> (Vec2, bool) {
    let len = v.length();
    if len.is_finite() && len > EPSILON {
        (v / len, false)
    } else {
        (Vec2::ZERO, true)
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Reflect with the normal component scaled by `restitution`
///
/// v' = v - (1 + e)(v·n)n; `e = 1` is a perfectly elastic bounce.
#[inline]
pub fn reflect_with_restitution(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    velocity - (1.0 + restitution) * velocity.dot(normal) * normal
}

/// Circle `a` against circle `b`
pub fn circle_circle(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> CollisionResult {
    let delta = pos_a - pos_b;
    let dist = delta.length();
    let reach = radius_a + radius_b;
    if dist >= reach {
        return CollisionResult::miss();
    }

    let (mut normal, degenerate) = normalize_checked(delta);
    if degenerate {
        // Concentric: pick a stable separation axis
        normal = Vec2::Y;
    }

    CollisionResult {
        hit: true,
        point: pos_b + normal * radius_b,
        normal,
        penetration: reach - dist,
    }
}

/// Circle against a box
pub fn circle_aabb(center: Vec2, radius: f32, aabb: &Aabb) -> CollisionResult {
    let closest = aabb.closest_point(center);
    let delta = center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > EPSILON * EPSILON {
        if dist_sq >= radius * radius {
            return CollisionResult::miss();
        }
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            point: closest,
            normal: delta / dist,
            penetration: radius - dist,
        };
    }

    // Center is inside the box: push out through the nearest face
    let to_min = center - aabb.min;
    let to_max = aabb.max - center;
    let faces = [
        (to_min.x, Vec2::NEG_X),
        (to_max.x, Vec2::X),
        (to_min.y, Vec2::NEG_Y),
        (to_max.y, Vec2::Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .fold((f32::MAX, Vec2::Y), |best, face| if face.0 < best.0 { face } else { best });

    CollisionResult {
        hit: true,
        point: center + normal * depth,
        normal,
        penetration: depth + radius,
    }
}

/// Box `a` against box `b`, separating along the axis of least overlap
pub fn aabb_aabb(a: &Aabb, b: &Aabb) -> CollisionResult {
    if !a.overlaps(b) {
        return CollisionResult::miss();
    }

    let overlap_x = a.max.x.min(b.max.x) - a.min.x.max(b.min.x);
    let overlap_y = a.max.y.min(b.max.y) - a.min.y.max(b.min.y);
    let delta = a.center() - b.center();

    let (normal, penetration) = if overlap_x < overlap_y {
        (Vec2::new(if delta.x < 0.0 { -1.0 } else { 1.0 }, 0.0), overlap_x)
    } else {
        (Vec2::new(0.0, if delta.y < 0.0 { -1.0 } else { 1.0 }), overlap_y)
    };

    let lo = a.min.max(b.min);
    let hi = a.max.min(b.max);
    CollisionResult {
        hit: true,
        point: (lo + hi) * 0.5,
        normal,
        penetration,
    }
}

/// First time of impact of a moving circle against a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    /// Fraction of the motion segment travelled at first touch, in [0, 1]
    pub t: f32,
    /// Face normal of the box at the touch
    pub normal: Vec2,
    /// Contact point on the box surface
    pub point: Vec2,
}

/// Sweep a circle moving from `start` to `end` against `aabb`.
///
/// Slab test against the box grown by `radius`. Returns `None` if the
/// segment never enters the box, or if it starts already overlapping
/// (the discrete test owns that case).
pub fn sweep_circle_aabb(start: Vec2, end: Vec2, radius: f32, aabb: &Aabb) -> Option<Sweep> {
    let grown = aabb.expand(radius);
    let motion = end - start;

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_x = f32::NEG_INFINITY;
    let mut enter_y = f32::NEG_INFINITY;

    for axis in 0..2 {
        let (s, d, lo, hi) = if axis == 0 {
            (start.x, motion.x, grown.min.x, grown.max.x)
        } else {
            (start.y, motion.y, grown.min.y, grown.max.y)
        };

        if d.abs() < EPSILON {
            if s <= lo || s >= hi {
                return None;
            }
            continue;
        }

        let t1 = (lo - s) / d;
        let t2 = (hi - s) / d;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        if axis == 0 {
            enter_x = near;
        } else {
            enter_y = near;
        }
        t_enter = t_enter.max(near);
        t_exit = t_exit.min(far);
    }

    if t_enter > t_exit || t_enter > 1.0 || t_exit < 0.0 || t_enter < 0.0 {
        return None;
    }

    let sign_x = if motion.x > 0.0 { -1.0 } else { 1.0 };
    let sign_y = if motion.y > 0.0 { -1.0 } else { 1.0 };
    let normal = if (enter_x - enter_y).abs() <= EPSILON {
        // Exact corner: bounce straight back along both axes
        Vec2::new(sign_x, sign_y).normalize()
    } else if enter_x > enter_y {
        Vec2::new(sign_x, 0.0)
    } else {
        Vec2::new(0.0, sign_y)
    };

    let center_at_hit = start + motion * t_enter;
    Some(Sweep {
        t: t_enter,
        normal,
        point: aabb.closest_point(center_at_hit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reflect_velocity() {
        // Ball moving right, hits vertical wall (normal pointing left)
        let velocity = Vec2::new(100.0, 0.0);
        let normal = Vec2::new(-1.0, 0.0);

        let reflected = reflect_velocity(velocity, normal);
        assert!((reflected.x - (-100.0)).abs() < 0.001);
        assert!(reflected.y.abs() < 0.001);
    }

    #[test]
    fn test_restitution_scales_normal_component_only() {
        let v = Vec2::new(30.0, -40.0);
        let out = reflect_with_restitution(v, Vec2::Y, 0.5);
        assert!((out.x - 30.0).abs() < 1e-4);
        assert!((out.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_checked_degenerate() {
        let (n, degenerate) = normalize_checked(Vec2::ZERO);
        assert!(degenerate);
        assert_eq!(n, Vec2::ZERO);
        assert!(!n.x.is_nan());

        let (n, degenerate) = normalize_checked(Vec2::new(3.0, 4.0));
        assert!(!degenerate);
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_circle_circle() {
        let result = circle_circle(Vec2::new(3.0, 0.0), 2.0, Vec2::ZERO, 2.0);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::X);
        assert!((result.penetration - 1.0).abs() < 1e-6);

        let result = circle_circle(Vec2::new(5.0, 0.0), 2.0, Vec2::ZERO, 2.0);
        assert!(!result.hit);
    }

    #[test]
    fn test_circle_circle_concentric_is_finite() {
        let result = circle_circle(Vec2::ONE, 1.0, Vec2::ONE, 1.0);
        assert!(result.hit);
        assert!(result.normal.is_finite());
        assert!((result.penetration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_circle_aabb_face() {
        let wall = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));

        // Ball just above the top face
        let result = circle_aabb(Vec2::new(5.0, 12.0), 3.0, &wall);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::Y);
        assert!((result.penetration - 1.0).abs() < 1e-5);
        assert_eq!(result.point, Vec2::new(5.0, 10.0));

        let result = circle_aabb(Vec2::new(5.0, 14.0), 3.0, &wall);
        assert!(!result.hit);
    }

    #[test]
    fn test_circle_aabb_center_inside() {
        let brick = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 4.0));
        let result = circle_aabb(Vec2::new(5.0, 3.5), 1.0, &brick);
        assert!(result.hit);
        // Nearest face is the top
        assert_eq!(result.normal, Vec2::Y);
        assert!((result.penetration - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_aabb() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 4.0));
        let b = Aabb::new(Vec2::new(3.0, 1.0), Vec2::new(10.0, 3.0));
        let result = aabb_aabb(&a, &b);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::NEG_X);
        assert!((result.penetration - 1.0).abs() < 1e-6);

        let far = Aabb::new(Vec2::new(20.0, 20.0), Vec2::new(21.0, 21.0));
        assert!(!aabb_aabb(&a, &far).hit);
    }

    #[test]
    fn test_sweep_hits_thin_box_crossed_in_one_step() {
        // Brick 4 units thick, ball travels 50 units in one step
        let brick = Aabb::new(Vec2::new(-10.0, 20.0), Vec2::new(10.0, 24.0));
        let sweep = sweep_circle_aabb(Vec2::new(0.0, 0.0), Vec2::new(0.0, 50.0), 2.0, &brick)
            .expect("segment crosses the brick");
        // Ball top touches brick bottom when center reaches y = 18
        assert!((sweep.t - 18.0 / 50.0).abs() < 1e-5);
        assert_eq!(sweep.normal, Vec2::NEG_Y);
        assert_eq!(sweep.point, Vec2::new(0.0, 20.0));
    }

    #[test]
    fn test_sweep_miss_and_start_inside() {
        let brick = Aabb::new(Vec2::new(-10.0, 20.0), Vec2::new(10.0, 24.0));
        // Passes beside the brick
        let beside = sweep_circle_aabb(Vec2::new(30.0, 0.0), Vec2::new(30.0, 50.0), 2.0, &brick);
        assert!(beside.is_none());
        // Stops short of the brick
        let short = sweep_circle_aabb(Vec2::new(0.0, 0.0), Vec2::new(0.0, 10.0), 2.0, &brick);
        assert!(short.is_none());
        // Already overlapping at the start
        let inside = sweep_circle_aabb(Vec2::new(0.0, 19.0), Vec2::new(0.0, 40.0), 2.0, &brick);
        assert!(inside.is_none());
    }

    #[test]
    fn test_sweep_side_face() {
        let wall = Aabb::new(Vec2::new(100.0, -50.0), Vec2::new(110.0, 50.0));
        let sweep = sweep_circle_aabb(Vec2::new(0.0, 0.0), Vec2::new(200.0, 10.0), 5.0, &wall)
            .expect("hits wall");
        assert_eq!(sweep.normal, Vec2::NEG_X);
        assert!((sweep.t - 95.0 / 200.0).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_elastic_reflection_preserves_speed(
            vx in -500.0f32..500.0,
            vy in -500.0f32..500.0,
            axis in 0usize..4,
        ) {
            let normal = [Vec2::X, Vec2::NEG_X, Vec2::Y, Vec2::NEG_Y][axis];
            let v = Vec2::new(vx, vy);
            let out = reflect_with_restitution(v, normal, 1.0);
            prop_assert!((out.length() - v.length()).abs() < 1e-2);
            // Tangential component untouched, normal component reversed
            let tangent = Vec2::new(-normal.y, normal.x);
            prop_assert!((out.dot(tangent) - v.dot(tangent)).abs() < 1e-3);
            prop_assert!((out.dot(normal) + v.dot(normal)).abs() < 1e-3);
        }

        #[test]
        fn prop_normalize_never_nan(x in -1.0e-3f32..1.0e-3, y in -1.0e-3f32..1.0e-3) {
            let (n, degenerate) = normalize_checked(Vec2::new(x, y));
            prop_assert!(n.is_finite());
            if !degenerate {
                prop_assert!((n.length() - 1.0).abs() < 1e-4);
            }
        }
    }
}
