pub mod body;
pub mod c_api;
pub mod collision;
pub mod config;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod spawn;
pub mod stats;
pub mod world;

pub use body::{Body, BodyId, BodySnapshot};
pub use collision::Bounds;
pub use config::WorldConfig;
pub use error::{Result, SimError};
pub use grid::CollisionBuckets;
pub use integrator::{DragTarget, Integrator};
pub use stats::FrameStats;
pub use world::SimulationWorld;
pub use ultraviolet::DVec2;
