//! Discrete PID controller with selectable active terms.

use crate::error::SimulationError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which terms of the control law are active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ControllerType {
    #[default]
    Uncontrolled,
    P,
    PI,
    PD,
    I,
    ID,
    D,
    PID,
}

impl ControllerType {
    pub fn proportional(self) -> bool {
        matches!(
            self,
            ControllerType::P | ControllerType::PI | ControllerType::PD | ControllerType::PID
        )
    }

    pub fn integral(self) -> bool {
        matches!(
            self,
            ControllerType::PI | ControllerType::I | ControllerType::ID | ControllerType::PID
        )
    }

    pub fn derivative(self) -> bool {
        matches!(
            self,
            ControllerType::PD | ControllerType::ID | ControllerType::D | ControllerType::PID
        )
    }

    pub fn is_controlled(self) -> bool {
        self != ControllerType::Uncontrolled
    }

    pub fn label(self) -> &'static str {
        match self {
            ControllerType::Uncontrolled => "UNCONTROLLED",
            ControllerType::P => "P",
            ControllerType::PI => "PI",
            ControllerType::PD => "PD",
            ControllerType::I => "I",
            ControllerType::ID => "ID",
            ControllerType::D => "D",
            ControllerType::PID => "PID",
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ControllerType {
    type Err = SimulationError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.trim().to_ascii_uppercase().as_str() {
            "P" => Ok(ControllerType::P),
            "PI" => Ok(ControllerType::PI),
            "PD" => Ok(ControllerType::PD),
            "I" => Ok(ControllerType::I),
            "ID" => Ok(ControllerType::ID),
            "D" => Ok(ControllerType::D),
            "PID" => Ok(ControllerType::PID),
            "UNCONTROLLED" | "NONE" => Ok(ControllerType::Uncontrolled),
            other => Err(SimulationError::InvalidInput(format!(
                "unknown controller type '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ControllerType {
    type Error = SimulationError;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

impl From<ControllerType> for String {
    fn from(kind: ControllerType) -> Self {
        kind.label().to_string()
    }
}

/// Controller gain `Kc`, integral time `τI` and derivative time `τD`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kc: f64,
    pub tau_i: f64,
    pub tau_d: f64,
}

impl PidGains {
    pub fn new(kc: f64, tau_i: f64, tau_d: f64) -> Self {
        PidGains { kc, tau_i, tau_d }
    }
}

/// PID controller sampled every `dt`.
///
/// * `P = Kc e`
/// * `I = I_prev + Kc / τI · e · dt` (forward Euler)
/// * `D = -Kc τD (m - m_prev) / dt` (on measurement)
/// * output `max(bias + P + I + D, 0)`
#[derive(Clone, Debug)]
pub struct PidController {
    gains: PidGains,
    kind: ControllerType,
    dt: f64,
    bias: f64,
    p: f64,
    i: f64,
    d: f64,
    measurement_prev: Option<f64>,
    output: f64,
}

impl PidController {
    pub fn new(
        gains: PidGains,
        kind: ControllerType,
        dt: f64,
    ) -> Result<Self, SimulationError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimulationError::Configuration(format!(
                "controller sample time must be positive, got {}",
                dt
            )));
        }
        if !gains.kc.is_finite() {
            return Err(SimulationError::Configuration(
                "controller gain must be finite".to_string(),
            ));
        }
        if kind.integral() && !(gains.tau_i.is_finite() && gains.tau_i > 0.0) {
            return Err(SimulationError::Configuration(format!(
                "integral time must be positive for a {} controller, got {}",
                kind, gains.tau_i
            )));
        }
        if kind.derivative() && !(gains.tau_d.is_finite() && gains.tau_d >= 0.0) {
            return Err(SimulationError::Configuration(format!(
                "derivative time must be non-negative for a {} controller, got {}",
                kind, gains.tau_d
            )));
        }
        Ok(PidController {
            gains,
            kind,
            dt,
            bias: 0.0,
            p: 0.0,
            i: 0.0,
            d: 0.0,
            measurement_prev: None,
            output: 0.0,
        })
    }

    /// Constant added to `P + I + D` before clamping.
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    /// Seeds the previous measurement so the first derivative term has no kick.
    pub fn prime(&mut self, measurement: f64) {
        self.measurement_prev = Some(measurement);
    }

    /// Updates the three terms for a new measurement and returns the controller output.
    pub fn update(&mut self, setpoint: f64, measurement: f64) -> f64 {
        if !self.kind.is_controlled() {
            self.measurement_prev = Some(measurement);
            self.output = 0.0;
            return self.output;
        }

        let error = setpoint - measurement;
        let PidGains { kc, tau_i, tau_d } = self.gains;

        self.p = if self.kind.proportional() { kc * error } else { 0.0 };
        self.i = if self.kind.integral() {
            self.i + kc / tau_i * error * self.dt
        } else {
            0.0
        };
        self.d = match (self.kind.derivative(), self.measurement_prev) {
            (true, Some(prev)) => -kc * tau_d * (measurement - prev) / self.dt,
            _ => 0.0,
        };
        self.measurement_prev = Some(measurement);

        self.output = (self.bias + self.p + self.i + self.d).max(0.0);
        self.output
    }

    /// Clears the memory of the controller for a fresh run.
    pub fn reset(&mut self) {
        self.p = 0.0;
        self.i = 0.0;
        self.d = 0.0;
        self.measurement_prev = None;
        self.output = 0.0;
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn i(&self) -> f64 {
        self.i
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn kind(&self) -> ControllerType {
        self.kind
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for kind in [
            ControllerType::Uncontrolled,
            ControllerType::P,
            ControllerType::PI,
            ControllerType::PD,
            ControllerType::I,
            ControllerType::ID,
            ControllerType::D,
            ControllerType::PID,
        ] {
            assert_eq!(kind.label().parse::<ControllerType>().unwrap(), kind);
        }
        assert_eq!("pid".parse::<ControllerType>().unwrap(), ControllerType::PID);
        assert!("PIDD".parse::<ControllerType>().is_err());
    }

    #[test]
    fn proportional_only() {
        let mut pid =
            PidController::new(PidGains::new(2.0, 1.0, 1.0), ControllerType::P, 0.5).unwrap();
        assert_eq!(pid.update(1.0, 0.25), 1.5);
        assert_eq!((pid.p(), pid.i(), pid.d()), (1.5, 0.0, 0.0));
    }

    #[test]
    fn integral_accumulates() {
        let mut pid =
            PidController::new(PidGains::new(2.0, 4.0, 0.0), ControllerType::I, 0.5).unwrap();
        pid.update(1.0, 0.0);
        assert_eq!(pid.i(), 0.25);
        pid.update(1.0, 0.0);
        assert_eq!(pid.i(), 0.5);
        pid.reset();
        assert_eq!(pid.i(), 0.0);
    }

    #[test]
    fn derivative_acts_on_measurement() {
        let mut pid =
            PidController::new(PidGains::new(1.0, 1.0, 2.0), ControllerType::D, 0.5).unwrap();
        pid.prime(1.0);
        // setpoint change alone produces no kick
        pid.update(5.0, 1.0);
        assert_eq!(pid.d(), 0.0);
        pid.update(5.0, 1.5);
        assert_eq!(pid.d(), -2.0);
    }

    #[test]
    fn output_is_clamped_at_zero() {
        let mut pid =
            PidController::new(PidGains::new(1.0, 1.0, 0.0), ControllerType::P, 0.1).unwrap();
        assert_eq!(pid.update(0.0, 3.0), 0.0);
        assert_eq!(pid.p(), -3.0);
        let mut biased = PidController::new(PidGains::new(1.0, 1.0, 0.0), ControllerType::P, 0.1)
            .unwrap()
            .with_bias(5.0);
        assert_eq!(biased.update(0.0, 3.0), 2.0);
    }

    #[test]
    fn uncontrolled_returns_zero() {
        let mut pid = PidController::new(
            PidGains::new(1.0, 1.0, 1.0),
            ControllerType::Uncontrolled,
            0.1,
        )
        .unwrap();
        assert_eq!(pid.update(10.0, 0.0), 0.0);
    }

    #[test]
    fn invalid_integral_time_is_rejected() {
        assert!(PidController::new(PidGains::new(1.0, 0.0, 0.0), ControllerType::PI, 0.1).is_err());
        assert!(PidController::new(PidGains::new(1.0, 0.0, 0.0), ControllerType::P, 0.1).is_ok());
        assert!(PidController::new(PidGains::new(1.0, 1.0, 0.0), ControllerType::P, 0.0).is_err());
    }
}
