//! Errors reported by the simulation.

use crate::ode_shared::IntegrationError;

use std::io;
use thiserror::Error;

/// Enumeration of the errors that may arise while configuring or running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Invalid run parameters, detected before any simulation work.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Mismatched lengths, missing fields or values that cannot be parsed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The integrator could not advance the state; `time` is the last successfully integrated time.
    #[error("Integration diverged after t = {time}: {source}")]
    IntegrationDivergence {
        time: f64,
        #[source]
        source: IntegrationError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    pub(crate) fn integration(time: f64, source: IntegrationError) -> Self {
        match source {
            IntegrationError::InvalidInput(msg) => SimulationError::InvalidInput(msg),
            source => SimulationError::IntegrationDivergence {
                time: source.time().unwrap_or(time).max(time),
                source,
            },
        }
    }
}
