//! Run configuration: JSON documents and line based task files.
//!
//! Task files hold one `key : value` pair per line, for example
//!
//! ```text
//! reaction equation : A -> B
//! k : 0.5
//! volume : 2.0
//! initial flow : 0.4
//! initial concentrations : 1.0, 0.0
//! inlet concentrations : 1.0, 0.0
//! controlled : 1
//! controller type : PI
//! start time : 0
//! end time : 20
//! time step : 0.1
//! tolerance : 1e-6
//! set point : 0.3
//! disturbances : 5, 1.2; 10, 0.8
//! ```
//!
//! Empty lines and lines starting with `#` are skipped.

use crate::error::SimulationError;
use crate::pid::{ControllerType, PidController, PidGains};
use crate::reaction::ReactionModel;
use crate::reactor::Cstr;
use crate::simulation::{RunSettings, SimulationLoop};

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reaction equation and rate constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionConfig {
    pub equation: String,
    pub k: f64,
}

/// Step change of the controlled species' inlet concentration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Disturbance {
    pub time: f64,
    pub magnitude: f64,
}

fn default_integrating_time_constant() -> f64 {
    1.0
}

/// Everything needed to build and run a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub start_time: f64,
    pub end_time: f64,
    pub time_step: f64,
    pub tolerance: f64,
    #[serde(default)]
    pub controller_type: ControllerType,
    #[serde(default)]
    pub controller_gain: f64,
    #[serde(default = "default_integrating_time_constant")]
    pub integrating_time_constant: f64,
    #[serde(default)]
    pub derivative_time_constant: f64,
    #[serde(default)]
    pub controller_bias: f64,
    #[serde(default)]
    pub dead_time: f64,
    #[serde(default)]
    pub set_point: f64,
    pub reactor_volume: f64,
    pub initial_flow: f64,
    pub reaction: ReactionConfig,
    pub initial_concentrations: Vec<f64>,
    pub inlet_concentrations: Vec<f64>,
    #[serde(default)]
    pub controlled_index: usize,
    #[serde(default)]
    pub disturbances: Vec<Disturbance>,
    /// Where the CSV table is written.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl SimulationConfig {
    pub fn from_json_str(text: &str) -> Result<Self, SimulationError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String, SimulationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a `.json` document or, for any other extension, a task file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        info!("loading configuration from {}", path.display());
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_task_str(&text)
        }
    }

    /// Parses the `key : value` task format.
    pub fn from_task_str(text: &str) -> Result<Self, SimulationError> {
        let map = parse_task_lines(text)?;
        let task = TaskMap(&map);

        let is_controlled = match task.optional("is controlled") {
            Some(v) => v.trim().eq_ignore_ascii_case("true"),
            None => true,
        };
        let controller_type = match task.optional("controller type") {
            Some(label) if is_controlled => label.parse::<ControllerType>()?,
            _ => ControllerType::Uncontrolled,
        };

        Ok(SimulationConfig {
            start_time: task.f64("start time")?,
            end_time: task.f64("end time")?,
            time_step: task.f64("time step")?,
            tolerance: task.f64("tolerance")?,
            controller_type,
            controller_gain: task.f64_or("controller gain", 0.0)?,
            integrating_time_constant: task
                .f64_or("integrating time constant", default_integrating_time_constant())?,
            derivative_time_constant: task.f64_or("derivative time constant", 0.0)?,
            controller_bias: task.f64_or("controller bias", 0.0)?,
            dead_time: task.f64_or("dead time", 0.0)?,
            set_point: task.f64_or("set point", 0.0)?,
            reactor_volume: task.f64("volume")?,
            initial_flow: task.f64("initial flow")?,
            reaction: ReactionConfig {
                equation: task.required("reaction equation")?.to_string(),
                k: task.f64("k")?,
            },
            initial_concentrations: task.list("initial concentrations")?,
            inlet_concentrations: task.list("inlet concentrations")?,
            controlled_index: match task.optional("controlled") {
                Some(v) => v.trim().parse().map_err(|e| {
                    SimulationError::InvalidInput(format!("'controlled' must be an index: {}", e))
                })?,
                None => 0,
            },
            disturbances: match task.optional("disturbances") {
                Some(v) => parse_disturbances(v)?,
                None => Vec::new(),
            },
            output: task.optional("populate to file").map(PathBuf::from),
        })
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            start_time: self.start_time,
            end_time: self.end_time,
            time_step: self.time_step,
            tolerance: self.tolerance,
            dead_time: self.dead_time,
            setpoint: self.set_point,
            controller_type: self.controller_type,
            gains: PidGains::new(
                self.controller_gain,
                self.integrating_time_constant,
                self.derivative_time_constant,
            ),
            controller_bias: self.controller_bias,
            disturbances: self
                .disturbances
                .iter()
                .map(|d| (d.time, d.magnitude))
                .collect(),
        }
    }

    pub fn reaction_model(&self) -> Result<ReactionModel, SimulationError> {
        ReactionModel::from_equation(&self.reaction.equation, self.reaction.k)
    }

    pub fn reactor(&self) -> Result<Cstr, SimulationError> {
        Cstr::new(
            self.reactor_volume,
            self.initial_flow,
            self.reaction_model()?,
            self.initial_concentrations.clone(),
            self.inlet_concentrations.clone(),
            self.controlled_index,
        )
    }

    /// Checks every parameter without running anything.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let settings = self.run_settings();
        settings.validate()?;
        PidController::new(settings.gains, settings.controller_type, settings.time_step)?;
        self.reactor()?;
        Ok(())
    }

    /// Builds a simulation ready to run.
    pub fn build(&self) -> Result<SimulationLoop<Cstr>, SimulationError> {
        SimulationLoop::new(self.reactor()?, self.run_settings())
    }
}

const TASK_KEYS: &[&str] = &[
    "header",
    "populate to file",
    "volume",
    "initial flow",
    "initial concentrations",
    "inlet concentrations",
    "controlled",
    "is controlled",
    "reaction equation",
    "k",
    "controller type",
    "start time",
    "end time",
    "time step",
    "controller gain",
    "integrating time constant",
    "derivative time constant",
    "controller bias",
    "tolerance",
    "set point",
    "dead time",
    "disturbances",
];

fn parse_task_lines(text: &str) -> Result<HashMap<String, String>, SimulationError> {
    let mut map = HashMap::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| {
            SimulationError::InvalidInput(format!(
                "line {}: expected 'name : value', got '{}'",
                n + 1,
                line
            ))
        })?;
        let key = key.trim().to_lowercase();
        if !TASK_KEYS.contains(&key.as_str()) {
            return Err(SimulationError::InvalidInput(format!(
                "line {}: unknown parameter '{}'",
                n + 1,
                key
            )));
        }
        map.insert(key, value.trim().to_string());
    }
    Ok(map)
}

struct TaskMap<'a>(&'a HashMap<String, String>);

impl<'a> TaskMap<'a> {
    fn optional(&self, key: &str) -> Option<&'a str> {
        self.0
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<&'a str, SimulationError> {
        self.optional(key)
            .ok_or_else(|| SimulationError::InvalidInput(format!("missing parameter '{}'", key)))
    }

    fn f64(&self, key: &str) -> Result<f64, SimulationError> {
        parse_number(key, self.required(key)?)
    }

    fn f64_or(&self, key: &str, default: f64) -> Result<f64, SimulationError> {
        match self.optional(key) {
            Some(v) => parse_number(key, v),
            None => Ok(default),
        }
    }

    fn list(&self, key: &str) -> Result<Vec<f64>, SimulationError> {
        self.required(key)?
            .split(',')
            .map(|v| parse_number(key, v))
            .collect()
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64, SimulationError> {
    value.trim().parse::<f64>().map_err(|e| {
        SimulationError::InvalidInput(format!("'{}' must be a number, got '{}': {}", key, value.trim(), e))
    })
}

fn parse_disturbances(value: &str) -> Result<Vec<Disturbance>, SimulationError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    value
        .split(';')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let parts: Vec<&str> = pair.split(',').collect();
            if parts.len() != 2 {
                return Err(SimulationError::InvalidInput(format!(
                    "disturbance '{}' must be 'time, magnitude'",
                    pair.trim()
                )));
            }
            Ok(Disturbance {
                time: parse_number("disturbances", parts[0])?,
                magnitude: parse_number("disturbances", parts[1])?,
            })
        })
        .collect()
}
