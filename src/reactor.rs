//! Continuously stirred tank reactor and the capability interface used by the control loop.

use crate::error::SimulationError;
use crate::ode_shared::RateModel;
use crate::reaction::ReactionModel;
use crate::rkf45::Rkf45;

use log::warn;
use nalgebra::DVector;

/// Process that can be advanced in time and acted upon by a controller.
pub trait Controllable {
    /// Integrates the process from `t` to `t_end` and returns the new state.
    fn advance(&mut self, t: f64, t_end: f64, tolerance: f64)
        -> Result<&DVector<f64>, SimulationError>;
    /// Measured variable the controller drives to the setpoint.
    fn controlled_var(&self) -> f64;
    /// Variable adjusted by the controller.
    fn manipulated_var(&self) -> f64;
    /// Process input subject to disturbances.
    fn disturbed_var(&self) -> f64;
    fn apply_disturbance(&mut self, magnitude: f64);
    fn set_manipulated_variable(&mut self, value: f64);
    /// Current state vector.
    fn state(&self) -> &DVector<f64>;
    /// Labels of the state components, in order.
    fn state_names(&self) -> Vec<String>;
}

/// Perfectly mixed reactor with a single reaction, volume `V`, inlet flow `F`.
///
/// `dC_i/dt = F (C_in,i - C_i) / V + r_i(C)`
#[derive(Clone, Debug)]
pub struct Cstr {
    volume: f64,
    flow: f64,
    reaction: ReactionModel,
    initial: DVector<f64>,
    inlet: DVector<f64>,
    current: DVector<f64>,
    controlled: usize,
    step_hint: Option<f64>,
}

impl Cstr {
    /// Creates a reactor whose contents start at `initial`.
    ///
    /// # Arguments
    ///
    /// * `volume`      - Reactor volume, strictly positive
    /// * `flow`        - Initial volumetric flow through the reactor, non-negative
    /// * `reaction`    - Reaction taking place in the reactor
    /// * `initial`     - Initial concentrations, one per species
    /// * `inlet`       - Inlet concentrations, same length as `initial`
    /// * `controlled`  - Index of the controlled species
    ///
    pub fn new(
        volume: f64,
        flow: f64,
        reaction: ReactionModel,
        initial: Vec<f64>,
        inlet: Vec<f64>,
        controlled: usize,
    ) -> Result<Self, SimulationError> {
        if !(volume.is_finite() && volume > 0.0) {
            return Err(SimulationError::Configuration(format!(
                "reactor volume must be positive, got {}",
                volume
            )));
        }
        if !(flow.is_finite() && flow >= 0.0) {
            return Err(SimulationError::Configuration(format!(
                "flow must be non-negative, got {}",
                flow
            )));
        }
        if initial.len() != inlet.len() {
            return Err(SimulationError::InvalidInput(format!(
                "{} initial concentrations but {} inlet concentrations",
                initial.len(),
                inlet.len()
            )));
        }
        if initial.len() < reaction.n_species() {
            return Err(SimulationError::InvalidInput(format!(
                "the reaction names {} species but only {} concentrations are given",
                reaction.n_species(),
                initial.len()
            )));
        }
        if initial
            .iter()
            .chain(inlet.iter())
            .any(|c| !(c.is_finite() && *c >= 0.0))
        {
            return Err(SimulationError::Configuration(
                "concentrations must be finite and non-negative".to_string(),
            ));
        }
        if controlled >= initial.len() {
            return Err(SimulationError::InvalidInput(format!(
                "controlled index {} out of range for {} species",
                controlled,
                initial.len()
            )));
        }
        let initial = DVector::from_vec(initial);
        Ok(Cstr {
            volume,
            flow,
            reaction,
            current: initial.clone(),
            initial,
            inlet: DVector::from_vec(inlet),
            controlled,
            step_hint: None,
        })
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn flow(&self) -> f64 {
        self.flow
    }

    pub fn reaction(&self) -> &ReactionModel {
        &self.reaction
    }

    pub fn reaction_mut(&mut self) -> &mut ReactionModel {
        &mut self.reaction
    }

    pub fn initial_concentrations(&self) -> &DVector<f64> {
        &self.initial
    }

    pub fn inlet_concentrations(&self) -> &DVector<f64> {
        &self.inlet
    }

    pub fn controlled_index(&self) -> usize {
        self.controlled
    }

    /// Step size proposed at the end of the last integration.
    pub fn step_hint(&self) -> Option<f64> {
        self.step_hint
    }

    /// Restores the initial concentrations and forgets the step size hint.
    pub fn reset(&mut self) {
        self.current.copy_from(&self.initial);
        self.step_hint = None;
    }
}

impl RateModel for Cstr {
    fn dim(&self) -> usize {
        self.current.len()
    }

    fn rate(&self, i: usize, _t: f64, y: &DVector<f64>) -> f64 {
        self.flow * (self.inlet[i] - y[i]) / self.volume + self.reaction.species_rate(i, y)
    }

    fn rates(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        let r = self.reaction.rate(y);
        let n_reactants = self.reaction.reactants().len();
        let n_species = self.reaction.n_species();
        for i in 0..y.len() {
            let generation = if i < n_reactants {
                -r
            } else if i < n_species {
                r
            } else {
                0.0
            };
            dy[i] = self.flow * (self.inlet[i] - y[i]) / self.volume + generation;
        }
    }
}

impl Controllable for Cstr {
    fn advance(
        &mut self,
        t: f64,
        t_end: f64,
        tolerance: f64,
    ) -> Result<&DVector<f64>, SimulationError> {
        let out = Rkf45::new(tolerance)
            .with_initial_step(self.step_hint)
            .advance(&*self, t, &self.current, t_end)
            .map_err(|e| SimulationError::integration(t, e))?;

        let mut y = out.y;
        for (i, c) in y.iter_mut().enumerate() {
            if *c < 0.0 {
                warn!("clamped concentration {} of species {} to zero at t = {}", c, i, t_end);
                *c = 0.0;
            }
        }
        self.current = y;
        self.step_hint = Some(out.h_next);
        Ok(&self.current)
    }

    fn controlled_var(&self) -> f64 {
        self.current[self.controlled]
    }

    fn manipulated_var(&self) -> f64 {
        self.flow
    }

    fn disturbed_var(&self) -> f64 {
        self.inlet[self.controlled]
    }

    fn apply_disturbance(&mut self, magnitude: f64) {
        self.inlet[self.controlled] = magnitude;
    }

    fn set_manipulated_variable(&mut self, value: f64) {
        self.flow = if value.is_nan() { 0.0 } else { value.max(0.0) };
    }

    fn state(&self) -> &DVector<f64> {
        &self.current
    }

    fn state_names(&self) -> Vec<String> {
        let mut names = self.reaction.species_names();
        for i in names.len()..self.current.len() {
            names.push(format!("C{}", i));
        }
        names
    }
}
