//! # CSTR control
//! `cstr_control` simulates the transient behaviour of a continuously stirred tank reactor under
//! PID feedback control. The mass balances are integrated with an adaptive Runge-Kutta-Fehlberg
//! 4(5) method, controller actions reach the reactor after a dead time, and scheduled disturbances
//! change the inlet concentration of the controlled species.

// Re-export from external crate
pub use nalgebra::DVector;

// Declare modules
pub mod butcher_tableau;
pub mod config;
pub mod delay_line;
pub mod error;
pub mod ode_shared;
pub mod pid;
pub mod reaction;
pub mod reactor;
pub mod record;
pub mod rkf45;
pub mod simulation;
pub mod step_size;

pub use config::SimulationConfig;
pub use delay_line::{DelayLine, DelayedItem};
pub use error::SimulationError;
pub use ode_shared::{IntegrationError, RateModel, Stats, StepAttempt};
pub use pid::{ControllerType, PidController, PidGains};
pub use reaction::{ReactionModel, Species};
pub use reactor::{Controllable, Cstr};
pub use record::{RecordRow, SimulationRecord};
pub use rkf45::{Advance, Rkf45};
pub use simulation::{RunSettings, SimulationLoop};
