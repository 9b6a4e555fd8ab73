//! Stoichiometry and power-law kinetics of a single irreversible reaction.
//!
//! Concentration vectors are laid out reactants first, then products, in the order they
//! appear in the reaction. Components past the last product are inert.

use crate::error::SimulationError;

use nalgebra::DVector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chemical species taking part in the reaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub coefficient: u32,
}

impl Species {
    pub fn new(name: &str, coefficient: u32) -> Self {
        Species {
            name: name.to_string(),
            coefficient,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficient == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.coefficient, self.name)
        }
    }
}

/// Reaction `Σ ν_r R -> Σ ν_p P` with rate `k Π C_r^ν_r`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionModel {
    reactants: Vec<Species>,
    products: Vec<Species>,
    k: f64,
}

impl ReactionModel {
    pub fn new(
        reactants: Vec<Species>,
        products: Vec<Species>,
        k: f64,
    ) -> Result<Self, SimulationError> {
        if reactants.is_empty() {
            return Err(SimulationError::InvalidInput(
                "a reaction needs at least one reactant".to_string(),
            ));
        }
        if !(k.is_finite() && k >= 0.0) {
            return Err(SimulationError::InvalidInput(format!(
                "rate constant must be finite and non-negative, got {}",
                k
            )));
        }
        Ok(ReactionModel {
            reactants,
            products,
            k,
        })
    }

    /// Parses an equation such as `"A + 2 B -> C"`.
    pub fn from_equation(equation: &str, k: f64) -> Result<Self, SimulationError> {
        let sides: Vec<&str> = equation.split("->").collect();
        if sides.len() != 2 {
            return Err(SimulationError::InvalidInput(format!(
                "reaction equation '{}' must contain exactly one '->'",
                equation
            )));
        }
        let re = species_pattern()?;
        let reactants = parse_species_list(&re, sides[0])?;
        let products = parse_species_list(&re, sides[1])?;
        ReactionModel::new(reactants, products, k)
    }

    pub fn reactants(&self) -> &[Species] {
        &self.reactants
    }

    pub fn products(&self) -> &[Species] {
        &self.products
    }

    pub fn rate_constant(&self) -> f64 {
        self.k
    }

    pub fn set_rate_constant(&mut self, k: f64) -> Result<(), SimulationError> {
        if !(k.is_finite() && k >= 0.0) {
            return Err(SimulationError::InvalidInput(format!(
                "rate constant must be finite and non-negative, got {}",
                k
            )));
        }
        self.k = k;
        Ok(())
    }

    /// Number of species named by the equation.
    pub fn n_species(&self) -> usize {
        self.reactants.len() + self.products.len()
    }

    /// Names of the reactants followed by the products.
    pub fn species_names(&self) -> Vec<String> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .map(|s| s.name.clone())
            .collect()
    }

    /// Reaction rate `k Π C_r^ν_r` over the reactants.
    pub fn rate(&self, concentrations: &DVector<f64>) -> f64 {
        let prod: f64 = self
            .reactants
            .iter()
            .enumerate()
            .map(|(i, r)| concentrations[i].powi(r.coefficient as i32))
            .product();
        self.k * prod
    }

    /// Generation term of species `i`: consumption for reactants, production for products, zero otherwise.
    pub fn species_rate(&self, i: usize, concentrations: &DVector<f64>) -> f64 {
        if i < self.reactants.len() {
            -self.rate(concentrations)
        } else if i < self.n_species() {
            self.rate(concentrations)
        } else {
            0.0
        }
    }

    /// Reactant with the smallest ratio of concentration to stoichiometric coefficient.
    pub fn limiting_reactant(&self, concentrations: &DVector<f64>) -> Option<&Species> {
        self.reactants
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < concentrations.len())
            .map(|(i, r)| (concentrations[i] / r.coefficient.max(1) as f64, r))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, r)| r)
    }
}

impl fmt::Display for ReactionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |list: &[Species]| {
            list.iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" + ")
        };
        write!(
            f,
            "{} -> {} (k = {})",
            join(&self.reactants),
            join(&self.products),
            self.k
        )
    }
}

/// Optional coefficient, optional `*`, then the species name.
fn species_pattern() -> Result<Regex, SimulationError> {
    Regex::new(r"^\s*(\d+)?\s*\*?\s*([A-Za-z][A-Za-z0-9_()\[\]]*)\s*$")
        .map_err(|e| SimulationError::Configuration(format!("species pattern: {}", e)))
}

fn parse_species_list(re: &Regex, list: &str) -> Result<Vec<Species>, SimulationError> {
    let mut species = Vec::new();
    for term in list.split('+') {
        if term.trim().is_empty() {
            return Err(SimulationError::InvalidInput(format!(
                "empty species in '{}'",
                list.trim()
            )));
        }
        let caps = re.captures(term).ok_or_else(|| {
            SimulationError::InvalidInput(format!("cannot parse species '{}'", term.trim()))
        })?;
        let coefficient = match caps.get(1) {
            Some(m) => m.as_str().parse::<u32>().map_err(|e| {
                SimulationError::InvalidInput(format!("bad coefficient in '{}': {}", term.trim(), e))
            })?,
            None => 1,
        };
        if coefficient == 0 {
            return Err(SimulationError::InvalidInput(format!(
                "zero coefficient in '{}'",
                term.trim()
            )));
        }
        species.push(Species::new(&caps[2], coefficient));
    }
    Ok(species)
}
