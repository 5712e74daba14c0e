//! Tunable parameters of the simulation.
//!
//! A `WorldConfig` can be built in code, taken from one of the presets, or
//! loaded from JSON. The world always runs on a [`WorldConfig::sanitized`]
//! copy, so out-of-range values are clamped rather than rejected at runtime.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SimError};
use crate::grid::CELL_SIZE;

/// Shortest microstep the integrator accepts (seconds).
pub const MIN_MICROSTEP: f64 = 1.0e-4;
/// Longest microstep the integrator accepts (seconds).
pub const MAX_MICROSTEP: f64 = 0.1;

/// Main configuration for a simulation world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Fixed microstep duration (seconds).
    pub microstep: f64,
    /// Frame elapsed time is clamped to this before integration (seconds).
    pub max_frame_dt: f64,
    /// Downward acceleration (pixels per second squared). May be negative.
    pub gravity: f64,
    /// Time scale applied in slow-motion mode.
    pub slow_motion_factor: f64,
    /// Fraction of speed kept after a bounce or pair collision.
    pub restitution: f64,
    /// Impact speed below which a body comes to rest on the floor.
    pub floor_rest_speed: f64,
    /// Spring constant pulling a dragged body toward its target.
    pub drag_stiffness: f64,
    /// Velocity factor applied to a dragged body every microstep.
    pub drag_damping: f64,
    /// Mass per cubic pixel of radius.
    pub mass_scale: f64,
    /// Smallest spawned radius.
    pub min_radius: f64,
    /// Largest spawned radius. Must not exceed the grid cell size.
    pub max_radius: f64,
    /// Spread of the random horizontal launch speed.
    pub spawn_speed: f64,
    /// Number of bodies the world reconciles toward.
    pub target_count: usize,
    /// Seed for spawn randomness.
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            microstep: 0.004,
            max_frame_dt: 0.1,
            gravity: 980.0,
            slow_motion_factor: 0.05,
            restitution: 0.98,
            floor_rest_speed: 30.0,
            drag_stiffness: 4000.0,
            drag_damping: 0.99,
            mass_scale: 0.001,
            min_radius: 16.0,
            max_radius: 80.0,
            spawn_speed: 550.0,
            target_count: 6,
            seed: 0x5eed,
        }
    }
}

impl WorldConfig {
    /// Fine microsteps for smooth stacking (3000 Hz).
    #[must_use]
    pub fn high_quality() -> Self {
        Self {
            microstep: 1.0 / 3000.0,
            ..Default::default()
        }
    }

    /// One microstep per display frame (60 Hz).
    #[must_use]
    pub fn fast() -> Self {
        Self {
            microstep: 1.0 / 60.0,
            ..Default::default()
        }
    }

    /// Set the microstep duration.
    #[must_use]
    pub fn with_microstep(mut self, microstep: f64) -> Self {
        self.microstep = microstep;
        self
    }

    /// Set the gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the restitution.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set the population target.
    #[must_use]
    pub fn with_target_count(mut self, target_count: usize) -> Self {
        self.target_count = target_count;
        self
    }

    /// Set the spawn seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.microstep.is_finite() || self.microstep <= 0.0 {
            return Err(SimError::InvalidTimestep(self.microstep));
        }
        if !self.max_frame_dt.is_finite() || self.max_frame_dt <= 0.0 {
            return Err(SimError::invalid_config("max_frame_dt must be positive"));
        }
        if !self.gravity.is_finite() {
            return Err(SimError::invalid_config("gravity must be finite"));
        }
        if !(0.0..=1.0).contains(&self.slow_motion_factor) || self.slow_motion_factor == 0.0 {
            return Err(SimError::invalid_config("slow_motion_factor must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config("restitution must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.drag_damping) {
            return Err(SimError::invalid_config("drag_damping must be in [0, 1]"));
        }
        if !self.mass_scale.is_finite() || self.mass_scale <= 0.0 {
            return Err(SimError::invalid_config("mass_scale must be positive"));
        }
        if !(self.min_radius > 0.0 && self.min_radius <= self.max_radius) {
            return Err(SimError::invalid_config("radius range must satisfy 0 < min <= max"));
        }
        if self.max_radius > CELL_SIZE {
            return Err(SimError::invalid_config(format!(
                "max_radius {} exceeds cell size {CELL_SIZE}",
                self.max_radius
            )));
        }
        Ok(())
    }

    /// Copy with every field clamped into its working range.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut c = self.clone();
        let defaults = Self::default();

        c.microstep = clamp_field("microstep", c.microstep, MIN_MICROSTEP, MAX_MICROSTEP, defaults.microstep);
        c.max_frame_dt = clamp_field("max_frame_dt", c.max_frame_dt, c.microstep, 1.0, defaults.max_frame_dt);
        c.gravity = clamp_field("gravity", c.gravity, -1.0e5, 1.0e5, defaults.gravity);
        c.slow_motion_factor =
            clamp_field("slow_motion_factor", c.slow_motion_factor, 1.0e-3, 1.0, defaults.slow_motion_factor);
        c.restitution = clamp_field("restitution", c.restitution, 0.0, 1.0, defaults.restitution);
        c.floor_rest_speed = clamp_field("floor_rest_speed", c.floor_rest_speed, 0.0, 1.0e4, defaults.floor_rest_speed);
        c.drag_stiffness = clamp_field("drag_stiffness", c.drag_stiffness, 0.0, 1.0e6, defaults.drag_stiffness);
        c.drag_damping = clamp_field("drag_damping", c.drag_damping, 0.0, 1.0, defaults.drag_damping);
        c.mass_scale = clamp_field("mass_scale", c.mass_scale, 1.0e-9, 1.0e3, defaults.mass_scale);
        c.max_radius = clamp_field("max_radius", c.max_radius, 1.0, CELL_SIZE, defaults.max_radius);
        c.min_radius = clamp_field("min_radius", c.min_radius, 1.0, c.max_radius, defaults.min_radius.min(c.max_radius));
        c.spawn_speed = clamp_field("spawn_speed", c.spawn_speed, 0.0, 1.0e5, defaults.spawn_speed);
        c
    }
}

fn clamp_field(name: &str, value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        warn!(field = name, value, fallback, "non-finite config value replaced");
        return fallback;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(field = name, value, clamped, "config value clamped");
    }
    clamped
}
