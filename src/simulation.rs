//! Control loop: disturbances, dead-time delayed actuation, integration and PID updates, tick by tick.

use crate::delay_line::DelayLine;
use crate::error::SimulationError;
use crate::pid::{ControllerType, PidController, PidGains};
use crate::reactor::Controllable;
use crate::record::{RecordRow, SimulationRecord};

use log::{debug, info};

/// Relative slack, in units of the time step, allowed when comparing scheduled and tick times.
const TIME_SLACK: f64 = 1.0E-9;

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSettings {
    pub start_time: f64,
    pub end_time: f64,
    pub time_step: f64,
    pub tolerance: f64,
    pub dead_time: f64,
    pub setpoint: f64,
    pub controller_type: ControllerType,
    pub gains: PidGains,
    /// Constant added to the controller output.
    pub controller_bias: f64,
    /// `(time, magnitude)` pairs in non-decreasing time order.
    pub disturbances: Vec<(f64, f64)>,
}

impl RunSettings {
    /// Uncontrolled run over `[start_time, end_time]`.
    pub fn uncontrolled(start_time: f64, end_time: f64, time_step: f64, tolerance: f64) -> Self {
        RunSettings {
            start_time,
            end_time,
            time_step,
            tolerance,
            dead_time: 0.0,
            setpoint: 0.0,
            controller_type: ControllerType::Uncontrolled,
            gains: PidGains::new(0.0, 1.0, 0.0),
            controller_bias: 0.0,
            disturbances: Vec::new(),
        }
    }

    /// Checks the run parameters before any simulation work.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let finite = [
            self.start_time,
            self.end_time,
            self.time_step,
            self.tolerance,
            self.dead_time,
            self.setpoint,
            self.controller_bias,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(SimulationError::Configuration(
                "run parameters must be finite".to_string(),
            ));
        }
        if self.end_time < self.start_time {
            return Err(SimulationError::Configuration(format!(
                "end time {} is before start time {}",
                self.end_time, self.start_time
            )));
        }
        if self.time_step <= 0.0 {
            return Err(SimulationError::Configuration(format!(
                "time step must be positive, got {}",
                self.time_step
            )));
        }
        if self.time_step > self.end_time - self.start_time {
            return Err(SimulationError::Configuration(format!(
                "time step {} exceeds the horizon {}",
                self.time_step,
                self.end_time - self.start_time
            )));
        }
        if self.dead_time < 0.0 {
            return Err(SimulationError::Configuration(format!(
                "dead time must be non-negative, got {}",
                self.dead_time
            )));
        }
        if self.tolerance <= 0.0 {
            return Err(SimulationError::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.disturbances.iter().any(|(t, m)| !t.is_finite() || !m.is_finite()) {
            return Err(SimulationError::Configuration(
                "disturbance schedule contains non-finite values".to_string(),
            ));
        }
        if self.disturbances.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(SimulationError::Configuration(
                "disturbance schedule must be ordered by time".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of recorded ticks, `ceil((end - start) / dt) + 1`.
    pub fn n_ticks(&self) -> usize {
        let steps = (self.end_time - self.start_time) / self.time_step;
        (steps - TIME_SLACK).ceil().max(1.0) as usize + 1
    }

    /// Time of tick `k`, clamped to the end time.
    pub fn tick_time(&self, k: usize) -> f64 {
        (self.start_time + k as f64 * self.time_step).min(self.end_time)
    }
}

/// Drives a [`Controllable`] process with a PID controller over a run.
#[derive(Debug)]
pub struct SimulationLoop<P: Controllable> {
    process: P,
    settings: RunSettings,
    controller: PidController,
    actuation: DelayLine<f64>,
    disturbances: DelayLine<f64>,
}

impl<P: Controllable> SimulationLoop<P> {
    pub fn new(process: P, settings: RunSettings) -> Result<Self, SimulationError> {
        settings.validate()?;
        let controller = PidController::new(
            settings.gains,
            settings.controller_type,
            settings.time_step,
        )?
        .with_bias(settings.controller_bias);
        let disturbances = DelayLine::from_schedule(settings.disturbances.iter().copied())?;
        Ok(SimulationLoop {
            process,
            settings,
            controller,
            actuation: DelayLine::new(),
            disturbances,
        })
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn controller(&self) -> &PidController {
        &self.controller
    }

    pub fn into_process(self) -> P {
        self.process
    }

    fn is_controlled(&self) -> bool {
        self.settings.controller_type.is_controlled()
    }

    fn row(&self, time: f64) -> RecordRow {
        RecordRow {
            time,
            state: self.process.state().iter().copied().collect(),
            disturbed: self.process.disturbed_var(),
            manipulated: self.process.manipulated_var(),
            p: self.controller.p(),
            i: self.controller.i(),
            d: self.controller.d(),
        }
    }

    /// Runs every tick and returns the recorded table.
    ///
    /// Controller memory and both queues start fresh; the process continues from its current state.
    pub fn run(&mut self) -> Result<SimulationRecord, SimulationError> {
        let n_ticks = self.settings.n_ticks();
        let controlled = self.is_controlled();
        let slack = TIME_SLACK * self.settings.time_step;

        self.controller.reset();
        self.controller.prime(self.process.controlled_var());
        self.actuation.clear();
        self.disturbances =
            DelayLine::from_schedule(self.settings.disturbances.iter().copied())?;

        info!(
            "starting {} run: {} ticks from t = {} to t = {}",
            self.settings.controller_type, n_ticks, self.settings.start_time, self.settings.end_time
        );

        let mut record =
            SimulationRecord::with_capacity(self.process.state_names(), controlled, n_ticks);
        record.push(self.row(self.settings.start_time));

        for k in 1..n_ticks {
            let t_prev = self.settings.tick_time(k - 1);
            let t = self.settings.tick_time(k);

            // items due by the start of the interval act over all of it
            while let Some(item) = self.disturbances.pop_due(t_prev + slack) {
                info!("t = {}: disturbance {} applied", t_prev, item.value);
                self.process.apply_disturbance(item.value);
            }

            if controlled {
                while let Some(item) = self.actuation.pop_due(t_prev + slack) {
                    debug!(
                        "t = {}: actuation {} scheduled at {} applied",
                        t_prev, item.value, item.time
                    );
                    self.process.set_manipulated_variable(item.value);
                }
            }

            self.process.advance(t_prev, t, self.settings.tolerance)?;

            if controlled {
                let measurement = self.process.controlled_var();
                let output = self.controller.update(self.settings.setpoint, measurement);
                self.actuation.enqueue(t + self.settings.dead_time, output)?;
                debug!(
                    "t = {}: measurement {:.6}, P = {:.4e}, I = {:.4e}, D = {:.4e}, output {:.6}",
                    t,
                    measurement,
                    self.controller.p(),
                    self.controller.i(),
                    self.controller.d(),
                    output
                );
            }

            record.push(self.row(t));
        }

        info!("run finished at t = {}", self.settings.tick_time(n_ticks - 1));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::ReactionModel;
    use crate::reactor::Cstr;

    fn settings() -> RunSettings {
        RunSettings::uncontrolled(0.0, 1.0, 0.1, 1.0E-6)
    }

    #[test]
    fn tick_count_matches_horizon() {
        assert_eq!(settings().n_ticks(), 11);
        let mut s = settings();
        s.time_step = 0.3;
        assert_eq!(s.n_ticks(), 5);
        assert_eq!(s.tick_time(4), 1.0);
        s.time_step = 1.0;
        assert_eq!(s.n_ticks(), 2);
    }

    #[test]
    fn invalid_settings_are_configuration_errors() {
        let mut cases = Vec::new();
        let mut s = settings();
        s.end_time = -1.0;
        cases.push(s);
        let mut s = settings();
        s.time_step = 2.0;
        cases.push(s);
        let mut s = settings();
        s.dead_time = -0.1;
        cases.push(s);
        let mut s = settings();
        s.tolerance = 0.0;
        cases.push(s);
        let mut s = settings();
        s.disturbances = vec![(0.5, 1.0), (0.2, 1.0)];
        cases.push(s);
        for s in cases {
            assert!(matches!(s.validate(), Err(SimulationError::Configuration(_))), "{:?}", s);
        }
    }

    #[test]
    fn uncontrolled_run_keeps_flow_and_zero_terms() {
        let reaction = ReactionModel::from_equation("A -> B", 1.0).unwrap();
        let cstr = Cstr::new(1.0, 0.5, reaction, vec![1.0, 0.0], vec![1.0, 0.0], 0).unwrap();
        let mut sim = SimulationLoop::new(cstr, settings()).unwrap();
        let record = sim.run().unwrap();
        assert_eq!(record.len(), 11);
        for row in record.rows() {
            assert_eq!(row.manipulated, 0.5);
            assert_eq!((row.p, row.i, row.d), (0.0, 0.0, 0.0));
        }
        assert_eq!(record.rows()[10].time, 1.0);
    }
}
