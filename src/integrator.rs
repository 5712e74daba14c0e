//! Fixed-microstep time stepping.
//!
//! Each frame's elapsed time is cut into microsteps of a constant length.
//! Whatever is left over (less than one microstep) is carried to the next
//! frame. Every microstep runs two passes over all bodies:
//!
//! 1. forces and kinematics: reset acceleration to gravity, apply the pending
//!    positional correction, add the drag spring, integrate
//! 2. collisions: walls first, then neighbours from the bucket grid
//!
//! No body enters pass 2 before every body finished pass 1.

use tracing::warn;
use ultraviolet::DVec2;

use crate::body::{Body, BodyId};
use crate::collision::{Bounds, collide_boundary, collide_pair};
use crate::config::WorldConfig;
use crate::grid::CollisionBuckets;
use crate::stats::FrameStats;

/// A body held by the pointer and the point it is being pulled toward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragTarget {
    pub body: BodyId,
    pub target: DVec2,
}

/// Per-call inputs of [`Integrator::advance`].
#[derive(Clone, Copy, Debug)]
pub struct StepInput<'a> {
    pub bounds: Bounds,
    pub drag: Option<DragTarget>,
    pub config: &'a WorldConfig,
    pub paused: bool,
    pub slow: bool,
    /// Measure phase timings into the frame stats.
    pub timing: bool,
}

/// Carries leftover time between frames and runs the microstep loop.
#[derive(Debug, Default)]
pub struct Integrator {
    remainder: f64,
    simulated_time: f64,
    microsteps: u64,
    candidates: Vec<usize>,
}

impl Integrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time received but not yet simulated (always less than one microstep
    /// of the configuration last used).
    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    /// Total simulated seconds.
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// Total microsteps run.
    pub fn microsteps(&self) -> u64 {
        self.microsteps
    }

    /// Drops the carried remainder and the clocks.
    pub fn reset(&mut self) {
        self.remainder = 0.0;
        self.simulated_time = 0.0;
        self.microsteps = 0;
    }

    /// Integrates `frame_dt` seconds of wall time. Returns the number of
    /// microsteps run.
    pub fn advance(
        &mut self,
        frame_dt: f64,
        bodies: &mut [Body],
        grid: &mut CollisionBuckets,
        input: &StepInput<'_>,
        stats: &mut FrameStats,
    ) -> u32 {
        if input.paused {
            return 0;
        }

        let config = input.config;
        let mut dt = if frame_dt.is_finite() { frame_dt.clamp(0.0, config.max_frame_dt) } else { 0.0 };
        if input.slow {
            dt *= config.slow_motion_factor;
        }

        let step = config.microstep;
        let mut remaining = self.remainder + dt;
        let mut ran = 0;
        while remaining >= step {
            remaining -= step;
            self.microstep(step, bodies, grid, input, stats);
            ran += 1;
        }
        self.remainder = remaining;
        self.simulated_time += f64::from(ran) * step;
        self.microsteps += u64::from(ran);
        stats.microsteps += ran;
        ran
    }

    fn microstep(
        &mut self,
        dt: f64,
        bodies: &mut [Body],
        grid: &mut CollisionBuckets,
        input: &StepInput<'_>,
        stats: &mut FrameStats,
    ) {
        let config = input.config;

        for slot in 0..bodies.len() {
            let body = &mut bodies[slot];
            body.acc = DVec2::new(0.0, config.gravity);

            if body.has_pending_impulse() && body.apply_impulse() {
                grid.move_body(slot, body);
            }

            if body.frozen {
                if let Some(drag) = input.drag.filter(|d| d.body == body.id) {
                    apply_drag(body, drag.target, config);
                }
            }

            let (prev_pos, prev_vel) = (body.pos, body.vel);
            body.step(dt);
            if !is_finite(body.pos) || !is_finite(body.vel) {
                warn!(body = %body.id, "non-finite state after step, reverting");
                body.pos = prev_pos;
                body.vel = if is_finite(prev_vel) { prev_vel } else { DVec2::zero() };
            }
            grid.move_body(slot, body);
        }

        for slot in 0..bodies.len() {
            stats.boundary_hits += collide_boundary(&mut bodies[slot], &input.bounds, config);
            grid.move_body(slot, &mut bodies[slot]);
            collide_pair(slot, bodies, grid, &mut self.candidates, config, stats, input.timing);
        }
    }
}

/// Spring pull toward `target`, strength proportional to distance and
/// inversely to mass, with light velocity damping.
fn apply_drag(body: &mut Body, target: DVec2, config: &WorldConfig) {
    let delta = target - body.pos;
    let dist = delta.mag();
    if dist > 0.0 && dist.is_finite() && body.mass > 0.0 {
        body.acc += delta / dist * (dist * config.drag_stiffness / body.mass);
    }
    body.vel *= config.drag_damping;
}

#[inline]
fn is_finite(v: DVec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Rig {
        bodies: Vec<Body>,
        grid: CollisionBuckets,
        integrator: Integrator,
        config: WorldConfig,
        stats: FrameStats,
    }

    impl Rig {
        fn new(config: WorldConfig, bodies: Vec<Body>) -> Self {
            let mut rig = Self {
                bodies,
                grid: CollisionBuckets::new(),
                integrator: Integrator::new(),
                config,
                stats: FrameStats::default(),
            };
            for (slot, body) in rig.bodies.iter_mut().enumerate() {
                rig.grid.insert(slot, body);
            }
            rig
        }

        fn advance_with(&mut self, dt: f64, drag: Option<DragTarget>, paused: bool, slow: bool) -> u32 {
            let input = StepInput {
                bounds: Bounds::viewport(4000.0, 4000.0),
                drag,
                config: &self.config,
                paused,
                slow,
                timing: false,
            };
            self.integrator
                .advance(dt, &mut self.bodies, &mut self.grid, &input, &mut self.stats)
        }

        fn advance(&mut self, dt: f64) -> u32 {
            self.advance_with(dt, None, false, false)
        }
    }

    fn ball(id: u32, x: f64, y: f64) -> Body {
        Body::new(BodyId(id), DVec2::new(x, y), DVec2::zero(), 20.0, 0.001)
    }

    #[test]
    fn remainder_accumulates_small_frames() {
        let config = WorldConfig::default().with_gravity(0.0);
        let step = config.microstep;
        let mut rig = Rig::new(config, vec![ball(1, 500.0, 500.0)]);

        for _ in 0..1000 {
            rig.advance(step / 10.0);
        }
        let simulated = rig.integrator.simulated_time();
        let fed = 1000.0 * step / 10.0;
        assert!((fed - simulated).abs() <= step);
        assert_relative_eq!(simulated + rig.integrator.remainder(), fed, epsilon = 1e-9);
        assert!(rig.integrator.microsteps() >= 99);
        assert!(rig.integrator.remainder() < step);
    }

    #[test]
    fn paused_advance_has_no_effect() {
        let mut rig = Rig::new(WorldConfig::default(), vec![ball(1, 500.0, 500.0)]);
        assert_eq!(rig.advance_with(0.05, None, true, false), 0);
        assert_eq!(rig.bodies[0].pos, DVec2::new(500.0, 500.0));
        assert_eq!(rig.integrator.remainder(), 0.0);
    }

    #[test]
    fn frame_time_is_clamped() {
        let config = WorldConfig::default();
        let expected = (config.max_frame_dt / config.microstep).round() as i64;
        let mut rig = Rig::new(config, vec![]);
        let ran = rig.advance(5.0);
        assert!((i64::from(ran) - expected).abs() <= 1, "ran {ran}");
        assert_eq!(rig.advance(f64::NAN), 0);
        assert_eq!(rig.advance(-1.0), 0);
    }

    #[test]
    fn slow_motion_scales_time() {
        let config = WorldConfig::default();
        let mut rig = Rig::new(config.clone(), vec![]);
        rig.advance_with(0.08, None, false, true);
        let scaled = 0.08 * config.slow_motion_factor;
        assert_relative_eq!(
            rig.integrator.simulated_time() + rig.integrator.remainder(),
            scaled,
            epsilon = 1e-12
        );
    }

    #[test]
    fn free_fall_matches_closed_form() {
        let config = WorldConfig::default();
        let g = config.gravity;
        let mut rig = Rig::new(config, vec![ball(1, 500.0, 100.0)]);
        rig.advance(0.1);
        let t = rig.integrator.simulated_time();
        assert_relative_eq!(rig.bodies[0].pos.y, 100.0 + 0.5 * g * t * t, max_relative = 1e-9);
        assert_relative_eq!(rig.bodies[0].vel.y, g * t, max_relative = 1e-9);
        assert!(rig.grid.validate(&rig.bodies));
    }

    #[test]
    fn drag_pulls_toward_target() {
        let config = WorldConfig::default().with_gravity(0.0);
        let mut held = ball(1, 500.0, 500.0);
        held.frozen = true;
        let mut rig = Rig::new(config, vec![held]);
        let drag = DragTarget {
            body: BodyId(1),
            target: DVec2::new(900.0, 500.0),
        };

        rig.advance_with(0.05, Some(drag), false, false);
        assert!(rig.bodies[0].pos.x > 500.0);
        assert_relative_eq!(rig.bodies[0].pos.y, 500.0);
    }

    #[test]
    fn drag_for_other_body_is_ignored() {
        let config = WorldConfig::default().with_gravity(0.0);
        let mut held = ball(1, 500.0, 500.0);
        held.frozen = true;
        let mut rig = Rig::new(config, vec![held]);
        let drag = DragTarget {
            body: BodyId(9),
            target: DVec2::new(900.0, 500.0),
        };
        rig.advance_with(0.05, Some(drag), false, false);
        assert_eq!(rig.bodies[0].pos, DVec2::new(500.0, 500.0));
    }

    #[test]
    fn drag_at_target_stays_finite() {
        let config = WorldConfig::default().with_gravity(0.0);
        let mut held = ball(1, 500.0, 500.0);
        held.frozen = true;
        let mut rig = Rig::new(config, vec![held]);
        let drag = DragTarget {
            body: BodyId(1),
            target: DVec2::new(500.0, 500.0),
        };
        rig.advance_with(0.05, Some(drag), false, false);
        assert_eq!(rig.bodies[0].pos, DVec2::new(500.0, 500.0));
    }

    #[test]
    fn pending_impulse_applied_once_and_rebucketed() {
        let config = WorldConfig::default().with_gravity(0.0);
        let step = config.microstep;
        let mut body = ball(1, 127.5, 500.0);
        body.push_impulse(DVec2::new(1.0, 0.0));
        let mut rig = Rig::new(config, vec![body]);

        rig.advance(step);
        assert_relative_eq!(rig.bodies[0].pos.x, 128.5);
        assert_eq!(rig.bodies[0].cell.0, 1);
        assert!(!rig.bodies[0].has_pending_impulse());
        assert!(rig.grid.validate(&rig.bodies));

        rig.advance(step);
        assert_relative_eq!(rig.bodies[0].pos.x, 128.5);
    }

    #[test]
    fn overlapping_pair_is_pushed_apart() {
        let config = WorldConfig::default().with_gravity(0.0);
        let step = config.microstep;
        let mut rig = Rig::new(
            config,
            vec![ball(1, 500.0, 500.0), Body::new(BodyId(2), DVec2::new(530.0, 500.0), DVec2::zero(), 25.0, 0.001)],
        );
        for _ in 0..40 {
            rig.advance(step);
        }
        let gap = (rig.bodies[1].pos - rig.bodies[0].pos).mag();
        assert!(gap >= 45.0, "gap {gap}");
        assert!(rig.grid.validate(&rig.bodies));
    }
}
