// Error types for loading initial conditions and stepping the simulation

use thiserror::Error;

/// Result type for configuration / loading operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for simulation stepping
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Malformed or missing initial-condition data. Raised before any step runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read initial conditions: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse initial conditions: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid start date {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { value: String },

    #[error("body {body}: {field} must have 2 or 3 components, got {len}")]
    VectorDimension {
        body: String,
        field: &'static str,
        len: usize,
    },

    #[error("body {0} missing from initial conditions")]
    MissingBody(String),

    #[error("no bodies to simulate")]
    EmptySystem,

    #[error("maximum trail length must be at least 1")]
    ZeroTrailCeiling,
}

/// Faults raised by `SimulationState::step`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("trail memory overflow: body {body} would hold {length} points (max {max})")]
    TrailOverflow {
        body: String,
        length: usize,
        max: usize,
    },

    #[error("calendar overflow: cannot advance past {date}")]
    CalendarOverflow { date: chrono::NaiveDate },
}

/// Faults that end a playback run
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to deliver frame: {0}")]
    Sink(#[from] std::io::Error),

    #[error("playback thread panicked")]
    Panicked,
}
