use std::fmt;

use ultraviolet::DVec2;

/// Stable identity of a body, handed out from a monotonic counter.
/// Lets the UI re-associate a drag gesture with the body it grabbed.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Grid cell (column, row) a body is registered in.
pub type Cell = (i32, i32);

/// Cell value of a body that is not registered in any bucket.
pub const NO_CELL: Cell = (-1, -1);

/// Mass of a circle of the given radius: volume-proportional, scaled down so
/// on-screen bodies stay in a tractable numeric range.
#[inline]
pub fn mass_for_radius(radius: f64, mass_scale: f64) -> f64 {
    radius * radius * radius * mass_scale
}

/// A circular point mass.
#[derive(Clone, Debug)]
pub struct Body {
    pub id: BodyId,
    /// Position of the center (pixels).
    pub pos: DVec2,
    /// Velocity (pixels per second).
    pub vel: DVec2,
    /// Acceleration (reset every microstep).
    pub acc: DVec2,
    pub radius: f64,
    pub mass: f64,
    /// Sum of unit correction vectors collected during the current microstep.
    pub impulse: DVec2,
    /// Number of corrections summed into `impulse`.
    pub impulse_count: u32,
    /// Bucket this body is registered in, `NO_CELL` when not inserted.
    pub cell: Cell,
    /// Resting on the lower boundary.
    pub on_floor: bool,
    /// Held by a drag gesture.
    pub frozen: bool,
    /// Packed `0x00RRGGBB` for the renderer.
    pub color: u32,
}

impl Body {
    /// Creates a body with mass derived from its radius.
    /// The body starts outside the grid.
    pub fn new(id: BodyId, pos: DVec2, vel: DVec2, radius: f64, mass_scale: f64) -> Self {
        Self {
            id,
            pos,
            vel,
            acc: DVec2::zero(),
            radius,
            mass: mass_for_radius(radius, mass_scale),
            impulse: DVec2::zero(),
            impulse_count: 0,
            cell: NO_CELL,
            on_floor: false,
            frozen: false,
            color: 0x808080,
        }
    }

    pub fn is_inserted(&self) -> bool {
        self.cell.0 >= 0 && self.cell.1 >= 0
    }

    pub fn has_pending_impulse(&self) -> bool {
        self.impulse_count != 0 || self.impulse != DVec2::zero()
    }

    /// Adds one unit correction to the pending impulse.
    #[inline]
    pub fn push_impulse(&mut self, dir: DVec2) {
        self.impulse += dir;
        self.impulse_count += 1;
    }

    /// Applies the pending impulse as a position nudge and clears it.
    ///
    /// The nudge is the mean of the collected unit vectors, so it never
    /// exceeds one world unit. Returns true if the position changed.
    pub fn apply_impulse(&mut self) -> bool {
        let count = self.impulse_count;
        let sum = self.impulse;
        self.impulse = DVec2::zero();
        self.impulse_count = 0;

        if count == 0 {
            return false;
        }
        let correction = sum / f64::from(count);
        if !(correction.x.is_finite() && correction.y.is_finite()) || correction == DVec2::zero() {
            return false;
        }
        self.pos += correction;
        true
    }

    /// Advances position and velocity over `dt` with constant acceleration.
    pub fn step(&mut self, dt: f64) {
        self.pos += self.vel * dt + self.acc * (0.5 * dt * dt);
        self.vel += self.acc * dt;
    }

    /// Render-ready copy of the visible state.
    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            id: self.id.0,
            color: self.color,
            x: self.pos.x,
            y: self.pos.y,
            radius: self.radius,
        }
    }
}

/// Read-only view of one body, laid out for the rendering host.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodySnapshot {
    pub id: u32,
    pub color: u32,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}
