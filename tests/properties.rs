//! Randomized checks of the grid and the pair response.

use ballpit_sim::collision::{collide_pair, elastic_response};
use ballpit_sim::{Body, BodyId, CollisionBuckets, DVec2, FrameStats, WorldConfig};
use broccoli::aabb::Rect;
use proptest::prelude::*;

const MASS_SCALE: f64 = 0.001;

fn body(id: u32, x: f64, y: f64, radius: f64) -> Body {
    Body::new(BodyId(id), DVec2::new(x, y), DVec2::zero(), radius, MASS_SCALE)
}

#[derive(Clone, Debug)]
enum GridOp {
    Push(f64, f64),
    Move(usize, f64, f64),
    Pop,
}

fn grid_op() -> impl Strategy<Value = GridOp> {
    // Coordinates stray outside the grid on both sides to hit the clamping.
    let coord = -500.0..140_000.0f64;
    prop_oneof![
        (coord.clone(), coord.clone()).prop_map(|(x, y)| GridOp::Push(x, y)),
        (any::<usize>(), coord.clone(), coord).prop_map(|(i, x, y)| GridOp::Move(i, x, y)),
        Just(GridOp::Pop),
    ]
}

fn circle() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    (0.0..600.0f64, 0.0..600.0f64, -500.0..500.0f64, -500.0..500.0f64, 0.0..80.0f64)
}

proptest! {
    #[test]
    fn grid_membership_survives_any_edit_sequence(ops in prop::collection::vec(grid_op(), 1..120)) {
        let mut grid = CollisionBuckets::new();
        let mut bodies: Vec<Body> = Vec::new();
        let mut next_id = 1;

        for op in ops {
            match op {
                GridOp::Push(x, y) => {
                    let mut b = body(next_id, x, y, 10.0);
                    next_id += 1;
                    grid.insert(bodies.len(), &mut b);
                    bodies.push(b);
                }
                GridOp::Move(i, x, y) => {
                    if bodies.is_empty() {
                        continue;
                    }
                    let slot = i % bodies.len();
                    bodies[slot].pos = DVec2::new(x, y);
                    grid.move_body(slot, &mut bodies[slot]);
                }
                GridOp::Pop => {
                    if let Some(mut b) = bodies.pop() {
                        grid.remove(bodies.len(), &mut b);
                    }
                }
            }
            prop_assert!(grid.validate(&bodies));
            prop_assert_eq!(grid.len(), bodies.len());
        }
    }

    #[test]
    fn response_is_finite_or_skipped(
        a in circle(),
        b in circle(),
        coincident in any::<bool>(),
        restitution in 0.0..=1.0f64,
    ) {
        let (bx, by) = if coincident { (a.0, a.1) } else { (b.0, b.1) };
        let m1 = a.4.powi(3) * MASS_SCALE;
        let m2 = b.4.powi(3) * MASS_SCALE;
        let out = elastic_response(
            DVec2::new(a.0, a.1), DVec2::new(a.2, a.3), m1,
            DVec2::new(bx, by), DVec2::new(b.2, b.3), m2,
            restitution,
        );
        if let Some((v1, v2)) = out {
            prop_assert!(v1.x.is_finite() && v1.y.is_finite());
            prop_assert!(v2.x.is_finite() && v2.y.is_finite());
        }
        if coincident || m1 <= 0.0 || m2 <= 0.0 {
            prop_assert!(out.is_none());
        }
    }

    #[test]
    fn crowded_pair_pass_never_produces_nan(
        circles in prop::collection::vec(circle(), 2..40),
        stack in any::<bool>(),
    ) {
        let config = WorldConfig::default();
        let mut grid = CollisionBuckets::new();
        let mut bodies: Vec<Body> = Vec::new();
        for (i, &(x, y, vx, vy, r)) in circles.iter().enumerate() {
            // Optionally pile everything onto one point.
            let (x, y) = if stack { (300.0, 300.0) } else { (x, y) };
            let mut b = Body::new(BodyId(i as u32 + 1), DVec2::new(x, y), DVec2::new(vx, vy), r, MASS_SCALE);
            grid.insert(i, &mut b);
            bodies.push(b);
        }

        let mut scratch = Vec::new();
        let mut stats = FrameStats::default();
        for slot in 0..bodies.len() {
            collide_pair(slot, &mut bodies, &mut grid, &mut scratch, &config, &mut stats, false);
        }
        for b in &mut bodies {
            prop_assert!(b.vel.x.is_finite() && b.vel.y.is_finite());
            prop_assert!(b.impulse.x.is_finite() && b.impulse.y.is_finite());
            b.apply_impulse();
            prop_assert!(b.pos.x.is_finite() && b.pos.y.is_finite());
        }
        if stack {
            prop_assert_eq!(stats.contacts, 0);
        }
    }

    #[test]
    fn near_query_covers_every_overlapping_box(circles in prop::collection::vec(circle(), 1..60)) {
        let mut grid = CollisionBuckets::new();
        let mut bodies: Vec<Body> = Vec::new();
        for (i, &(x, y, _, _, r)) in circles.iter().enumerate() {
            let mut b = body(i as u32 + 1, x * 3.0, y * 3.0, r);
            grid.insert(i, &mut b);
            bodies.push(b);
        }

        let mut rects = bodies
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let r = b.radius as f32;
                let (x, y) = (b.pos.x as f32, b.pos.y as f32);
                (Rect::new(x - r, x + r, y - r, y + r), i)
            })
            .collect::<Vec<_>>();
        let mut pairs = Vec::new();
        let mut tree = broccoli::Tree::new(&mut rects);
        tree.find_colliding_pairs(|a, b| {
            pairs.push((*a.unpack_inner(), *b.unpack_inner()));
        });

        for (i, j) in pairs {
            for (from, to) in [(i, j), (j, i)] {
                let b = &bodies[from];
                let found = grid
                    .near(b.pos.x, b.pos.y, b.radius)
                    .iter()
                    .any(|bucket| bucket.contains(&to));
                prop_assert!(found, "slot {} missing from near({})", to, from);
            }
        }
    }
}
