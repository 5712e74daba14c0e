use tracing::{debug, warn};
use ultraviolet::DVec2;

use crate::{
    body::{Body, BodyId, BodySnapshot},
    collision::Bounds,
    config::WorldConfig,
    error::{Result, SimError},
    grid::{CELL_SIZE, CollisionBuckets},
    integrator::{DragTarget, Integrator, StepInput},
    spawn,
    stats::FrameStats,
};

/// Smallest radius accepted by [`SimulationWorld::add_body`].
pub const MIN_BODY_RADIUS: f64 = 1.0;

/// Owns the bodies, the bucket grid and the integrator, and drives them once
/// per display frame.
///
/// Slots in the body list double as render slots: bodies are appended on
/// spawn and popped from the tail on removal, so a live body never changes
/// slot.
#[derive(Debug)]
pub struct SimulationWorld {
    config: WorldConfig,
    bodies: Vec<Body>,
    grid: CollisionBuckets,
    integrator: Integrator,
    rng: fastrand::Rng,
    next_id: u32,
    target_count: usize,
    paused: bool,
    slow: bool,
    timing: bool,
    drag: Option<DragTarget>,
    bounds: Bounds,
    snapshots: Vec<BodySnapshot>,
    stats: FrameStats,
}

impl Default for SimulationWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl SimulationWorld {
    /// Default viewport used until the first `advance` supplies one.
    pub const DEFAULT_BOUNDS: Bounds = Bounds {
        left: 0.0,
        top: 0.0,
        right: 1280.0,
        bottom: 720.0,
    };

    /// Creates an empty world. Bodies appear on the first `advance`.
    pub fn new(config: WorldConfig) -> Self {
        let config = config.sanitized();
        Self {
            rng: fastrand::Rng::with_seed(config.seed),
            target_count: config.target_count,
            config,
            bodies: Vec::new(),
            grid: CollisionBuckets::new(),
            integrator: Integrator::new(),
            next_id: 1,
            paused: false,
            slow: false,
            timing: false,
            drag: None,
            bounds: Self::DEFAULT_BOUNDS,
            snapshots: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replaces the configuration. Does not change the target count or reseed.
    pub fn set_config(&mut self, config: WorldConfig) {
        self.config = config.sanitized();
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Population the next `advance` reconciles toward.
    pub fn set_target_count(&mut self, n: usize) {
        self.target_count = n;
    }

    pub fn gravity(&self) -> f64 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: f64) {
        self.config = self.config.clone().with_gravity(gravity).sanitized();
    }

    /// Microstep length; out-of-range values are clamped.
    pub fn set_microstep(&mut self, microstep: f64) {
        self.config = self.config.clone().with_microstep(microstep).sanitized();
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_slow_motion(&self) -> bool {
        self.slow
    }

    pub fn set_slow_motion(&mut self, slow: bool) {
        self.slow = slow;
    }

    /// Enable or disable phase timings in [`FrameStats`].
    pub fn enable_timing(&mut self, enabled: bool) {
        self.timing = enabled;
    }

    /// Adds a body at the tail and registers it in the grid.
    /// The target count grows to include it.
    ///
    /// The radius is clamped into `[MIN_BODY_RADIUS, CELL_SIZE]`; the
    /// neighbour query only reaches one bucket past the query square.
    pub fn add_body(&mut self, pos: DVec2, vel: DVec2, radius: f64) -> Result<BodyId> {
        if !(pos.x.is_finite() && pos.y.is_finite()) {
            return Err(SimError::InvalidBody(format!("non-finite position ({}, {})", pos.x, pos.y)));
        }
        if !(vel.x.is_finite() && vel.y.is_finite()) {
            return Err(SimError::InvalidBody(format!("non-finite velocity ({}, {})", vel.x, vel.y)));
        }
        if !radius.is_finite() {
            return Err(SimError::InvalidBody(format!("non-finite radius {radius}")));
        }
        let clamped = radius.clamp(MIN_BODY_RADIUS, CELL_SIZE);
        if clamped != radius {
            warn!(radius, clamped, "body radius clamped");
        }

        let id = self.allocate_id();
        let body = Body::new(id, pos, vel, clamped, self.config.mass_scale);
        self.push_body(body);
        self.target_count = self.target_count.max(self.bodies.len());
        Ok(id)
    }

    /// Freezes `id` and pulls it toward (x, y) from the next microstep on.
    /// A previously held body is released.
    pub fn set_drag_target(&mut self, id: BodyId, x: f64, y: f64) -> Result<()> {
        if !self.bodies.iter().any(|b| b.id == id) {
            return Err(SimError::UnknownBody(id));
        }
        if self.drag.is_none_or(|d| d.body != id) {
            debug!(body = %id, "drag start");
        }
        for body in &mut self.bodies {
            body.frozen = body.id == id;
        }
        self.drag = Some(DragTarget {
            body: id,
            target: DVec2::new(x, y),
        });
        Ok(())
    }

    /// Releases the held body, if any.
    pub fn clear_drag_target(&mut self) {
        if let Some(drag) = self.drag.take() {
            debug!(body = %drag.body, "drag end");
            if let Some(body) = self.bodies.iter_mut().find(|b| b.id == drag.body) {
                body.frozen = false;
            }
        }
    }

    pub fn drag_target(&self) -> Option<DragTarget> {
        self.drag
    }

    /// Runs one display frame: integrates `dt` seconds inside `bounds`, then
    /// reconciles the population and refreshes the snapshots.
    ///
    /// Returns whether the renderer should redraw.
    pub fn advance(&mut self, dt: f64, bounds: Bounds) -> bool {
        self.stats.reset();
        if self.paused {
            return false;
        }

        if bounds.is_valid() {
            self.bounds = bounds;
        } else {
            warn!(?bounds, "invalid viewport, keeping previous bounds");
        }

        self.grid.new_frame();
        let input = StepInput {
            bounds: self.bounds,
            drag: self.drag,
            config: &self.config,
            paused: false,
            slow: self.slow,
            timing: self.timing,
        };
        self.integrator
            .advance(dt, &mut self.bodies, &mut self.grid, &input, &mut self.stats);

        let changed = self.reconcile_population();
        self.refresh_snapshots();
        changed || !self.bodies.is_empty()
    }

    /// Spawns or pops bodies until the live count equals the target.
    /// Returns true if the population changed.
    fn reconcile_population(&mut self) -> bool {
        let before = self.bodies.len();
        if before == self.target_count {
            return false;
        }

        while self.bodies.len() > self.target_count {
            let slot = self.bodies.len() - 1;
            let Some(mut body) = self.bodies.pop() else {
                break;
            };
            self.grid.remove(slot, &mut body);
            if self.drag.is_some_and(|d| d.body == body.id) {
                self.drag = None;
            }
        }

        while self.bodies.len() < self.target_count {
            let id = self.allocate_id();
            let body = spawn::spawn_body(&mut self.rng, id, &self.bounds, &self.config);
            self.push_body(body);
        }

        debug!(from = before, to = self.bodies.len(), "population reconciled");
        true
    }

    fn allocate_id(&mut self) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn push_body(&mut self, mut body: Body) {
        let slot = self.bodies.len();
        self.grid.insert(slot, &mut body);
        self.snapshots.push(body.snapshot());
        self.bodies.push(body);
    }

    fn refresh_snapshots(&mut self) {
        self.snapshots.clear();
        self.snapshots.extend(self.bodies.iter().map(Body::snapshot));
    }

    /// Removes every body and forgets carried time and drag state.
    /// The population is rebuilt on the next `advance`.
    pub fn reset(&mut self) {
        while let Some(mut body) = self.bodies.pop() {
            let slot = self.bodies.len();
            self.grid.remove(slot, &mut body);
        }
        self.grid.clear();
        self.integrator.reset();
        self.drag = None;
        self.snapshots.clear();
        self.stats.reset();
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Render-ready state as of the last completed `advance`.
    pub fn snapshots(&self) -> &[BodySnapshot] {
        &self.snapshots
    }

    /// Counters and timings of the last `advance`.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn grid(&self) -> &CollisionBuckets {
        &self.grid
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn simulated_time(&self) -> f64 {
        self.integrator.simulated_time()
    }

    pub fn remainder(&self) -> f64 {
        self.integrator.remainder()
    }

    /// Checks grid membership of every live body.
    pub fn validate_grid(&self) -> bool {
        self.grid.validate(&self.bodies)
    }
}
