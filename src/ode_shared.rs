//! Shared traits and structures for the adaptive integrator.

use nalgebra::DVector;
use std::fmt;
use thiserror::Error;

/// Right-hand side of a system of ordinary differential equations, evaluated species by species.
pub trait RateModel {
    /// Number of equations, i.e. the length of the state vector.
    fn dim(&self) -> usize;

    /// Instantaneous rate of change of component `i` at time `t` for the state `y`.
    fn rate(&self, i: usize, t: f64, y: &DVector<f64>) -> f64;

    /// Evaluates every component of the right-hand side into `dy`.
    fn rates(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        for i in 0..self.dim() {
            dy[i] = self.rate(i, t, y);
        }
    }
}

impl<M: RateModel + ?Sized> RateModel for &M {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn rate(&self, i: usize, t: f64, y: &DVector<f64>) -> f64 {
        (**self).rate(i, t, y)
    }

    fn rates(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        (**self).rates(t, y, dy)
    }
}

/// Enumeration of the errors that may arise during integration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Stopped at t = {t}. Step rejected {rejections} times in a row.")]
    TooManyRejections { t: f64, rejections: u32 },
    #[error("Stopped at t = {t}. Step size underflow.")]
    StepSizeUnderflow { t: f64 },
    #[error("Stopped at t = {t}. Need more than {n_step} steps.")]
    MaxNumStepReached { t: f64, n_step: u32 },
}

impl IntegrationError {
    /// Time reached by the last accepted step, if the failure happened during integration.
    pub fn time(&self) -> Option<f64> {
        match *self {
            IntegrationError::InvalidInput(_) => None,
            IntegrationError::TooManyRejections { t, .. }
            | IntegrationError::StepSizeUnderflow { t }
            | IntegrationError::MaxNumStepReached { t, .. } => Some(t),
        }
    }
}

/// Contains some statistics of the integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub num_eval: u32,
    pub accepted_steps: u32,
    pub rejected_steps: u32,
}

impl Stats {
    pub(crate) fn new() -> Stats {
        Stats::default()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Number of function evaluations: {}", self.num_eval)?;
        writeln!(f, "Number of accepted steps: {}", self.accepted_steps)?;
        write!(f, "Number of rejected steps: {}", self.rejected_steps)
    }
}

/// One trial step of the adaptive integrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepAttempt {
    /// Time at the start of the step.
    pub t: f64,
    /// Trial step size.
    pub h: f64,
    /// Worst component of the local error estimate.
    pub error: f64,
    pub accepted: bool,
}
