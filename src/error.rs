//! Error types for the outer simulation API.
//!
//! The microstep loop itself never fails; these errors come from loading
//! configuration and from caller requests that name missing bodies or supply
//! unusable body state.

use thiserror::Error;

use crate::body::BodyId;

/// Errors that can occur when configuring or commanding a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Microstep duration is not a positive finite number.
    #[error("invalid microstep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Body state a caller supplied cannot be simulated.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// No live body carries this id.
    #[error("unknown body: {0}")]
    UnknownBody(BodyId),

    /// Configuration JSON could not be parsed or written.
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
