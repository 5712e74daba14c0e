//! Narrow-phase collision handling.
//!
//! Two kinds of contact are resolved:
//! - circle against the four viewport walls, with a resting snap on the floor
//! - circle against circle, using candidates from the bucket grid
//!
//! Both reflect velocities immediately but only *accumulate* positional
//! corrections on the bodies. The integrator applies those once at the start
//! of the next microstep, so several simultaneous overlaps add up instead of
//! fighting each other.
//!
//! Degenerate input (coincident centers, non-positive mass or radius,
//! non-finite results) never reaches body state: the pair is skipped.

use tracing::trace;
use ultraviolet::DVec2;

use crate::body::Body;
use crate::config::WorldConfig;
use crate::grid::CollisionBuckets;
use crate::stats::{FrameStats, PhaseTimer};

/// Distance above the floor at which a resting body counts as having left it.
pub const FLOOR_CONTACT_SLOP: f64 = 0.5;

/// Axis-aligned box the bodies are kept inside. `top < bottom` (y grows down).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    /// Bounds of a viewport anchored at the origin.
    pub fn viewport(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Finite and non-empty.
    pub fn is_valid(&self) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.is_finite())
            && self.right > self.left
            && self.bottom > self.top
    }
}

/// Bounces a body off the walls it penetrates while still moving into them.
///
/// A slow impact on the floor snaps the body to rest on it instead of
/// bouncing. Returns the number of walls hit.
pub fn collide_boundary(body: &mut Body, bounds: &Bounds, config: &WorldConfig) -> u32 {
    let r = body.radius;
    let mut left_pen = (body.pos.x - r - bounds.left).min(0.0);
    let mut top_pen = (body.pos.y - r - bounds.top).min(0.0);
    let mut right_pen = (body.pos.x + r - bounds.right).max(0.0);
    let mut bottom_pen = (body.pos.y + r - bounds.bottom).max(0.0);

    // Already moving away from a wall: leave it alone so it does not stick.
    if body.vel.x < 0.0 {
        right_pen = 0.0;
    }
    if body.vel.x > 0.0 {
        left_pen = 0.0;
    }
    if body.vel.y < 0.0 {
        bottom_pen = 0.0;
    }
    if body.vel.y > 0.0 {
        top_pen = 0.0;
    }

    let e = config.restitution;
    let mut hits = 0;

    if bottom_pen > 0.0 {
        let rest_speed = config.floor_rest_speed;
        if body.vel.y * body.vel.y < rest_speed * rest_speed {
            body.vel.y = 0.0;
            body.pos.y = bounds.bottom - r;
            body.on_floor = true;
        } else {
            body.vel.y = -body.vel.y * e;
            body.push_impulse(DVec2::new(0.0, -1.0));
            body.on_floor = false;
            hits += 1;
        }
    } else if body.pos.y + r < bounds.bottom - FLOOR_CONTACT_SLOP {
        body.on_floor = false;
    }

    if top_pen < 0.0 {
        body.vel.y = -body.vel.y * e;
        body.push_impulse(DVec2::new(0.0, 1.0));
        hits += 1;
    }
    if left_pen < 0.0 {
        body.vel.x = -body.vel.x * e;
        body.push_impulse(DVec2::new(1.0, 0.0));
        hits += 1;
    }
    if right_pen > 0.0 {
        body.vel.x = -body.vel.x * e;
        body.push_impulse(DVec2::new(-1.0, 0.0));
        hits += 1;
    }

    hits
}

/// Post-collision velocities of two circles exchanging momentum along the
/// line of centers, scaled by `restitution`.
///
/// Returns `None` for coincident centers, non-positive masses or any
/// non-finite result.
pub fn elastic_response(
    x1: DVec2,
    v1: DVec2,
    m1: f64,
    x2: DVec2,
    v2: DVec2,
    m2: f64,
    restitution: f64,
) -> Option<(DVec2, DVec2)> {
    let d = x1 - x2;
    let dist_sq = d.mag_sq();
    if !(dist_sq > 0.0 && dist_sq.is_finite()) {
        return None;
    }
    if !(m1 > 0.0 && m2 > 0.0) {
        return None;
    }
    let total = m1 + m2;
    if !total.is_finite() {
        return None;
    }

    let k = (v1 - v2).dot(d) / dist_sq;
    let v1_new = (v1 - d * (2.0 * m2 / total * k)) * restitution;
    let v2_new = (v2 + d * (2.0 * m1 / total * k)) * restitution;

    let finite = |v: DVec2| v.x.is_finite() && v.y.is_finite();
    if finite(v1_new) && finite(v2_new) {
        Some((v1_new, v2_new))
    } else {
        None
    }
}

/// Resolves overlaps between the body at `slot` and its grid neighbours.
///
/// A pair is only handled from the lighter (or equal) body's side. Equal-mass
/// pairs are entered into the grid's ignore relation so the reverse side does
/// not handle them again this frame. `candidates` is scratch space.
pub fn collide_pair(
    slot: usize,
    bodies: &mut [Body],
    grid: &mut CollisionBuckets,
    candidates: &mut Vec<usize>,
    config: &WorldConfig,
    stats: &mut FrameStats,
    timing: bool,
) {
    let Some(body) = bodies.get(slot) else {
        return;
    };
    let (id, pos, radius, mass) = (body.id, body.pos, body.radius, body.mass);
    if !(mass > 0.0 && radius > 0.0) || !(pos.x.is_finite() && pos.y.is_finite()) {
        return;
    }

    let query = PhaseTimer::start(timing);
    candidates.clear();
    for bucket in grid.near(pos.x, pos.y, radius) {
        candidates.extend_from_slice(bucket);
    }
    stats.query_ms += query.elapsed_ms();

    for &other_slot in candidates.iter() {
        if other_slot == slot {
            continue;
        }

        let check = PhaseTimer::start(timing);
        let Some(other) = bodies.get(other_slot) else {
            continue;
        };
        if other.mass < mass || grid.should_ignore(id, other.id) {
            continue;
        }
        stats.pairs_checked += 1;

        let (other_id, other_pos, other_mass) = (other.id, other.pos, other.mass);
        let reach = radius + other.radius;
        let d = pos - other_pos;
        let dist_sq = d.mag_sq();
        let overlapping = dist_sq < reach * reach;
        stats.check_ms += check.elapsed_ms();

        if !overlapping {
            continue;
        }
        if !(dist_sq > 0.0 && reach > 0.0) {
            trace!(body = %id, other = %other_id, "skipping coincident pair");
            stats.degenerate_pairs += 1;
            continue;
        }

        let response = PhaseTimer::start(timing);
        stats.contacts += 1;

        let normal = d / dist_sq.sqrt();
        bodies[slot].push_impulse(normal);
        bodies[other_slot].push_impulse(-normal);

        let v1 = bodies[slot].vel;
        let v2 = bodies[other_slot].vel;
        if (v1 - v2).dot(d) < 0.0 {
            match elastic_response(pos, v1, mass, other_pos, v2, other_mass, config.restitution) {
                Some((v1_new, v2_new)) => {
                    bodies[slot].vel = v1_new;
                    bodies[other_slot].vel = v2_new;
                }
                None => {
                    trace!(body = %id, other = %other_id, "skipping degenerate response");
                    stats.degenerate_pairs += 1;
                }
            }
        }

        if other_mass == mass {
            grid.ignore(id, other_id);
        }
        stats.response_ms += response.elapsed_ms();
    }
}
