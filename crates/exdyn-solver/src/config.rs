//! Simulation configuration.
//!
//! Concrete rheology and solver variants are selected by configuration
//! data through an explicit registry, not runtime reflection: each
//! enum variant names one implementation and `build()` constructs it.

use serde::{Deserialize, Serialize};

use exdyn_model::{Nondimensional, PropertyDb};

use crate::error::{Result, SolverError};
use crate::rheology::{ElasticPlaneStrain, MaxwellPlaneStrain, Rheology};

/// Registered rheology implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RheologyModel {
    MaxwellPlaneStrain,
    ElasticPlaneStrain,
}

impl RheologyModel {
    pub fn build(&self) -> Box<dyn Rheology> {
        match self {
            RheologyModel::MaxwellPlaneStrain => Box::new(MaxwellPlaneStrain),
            RheologyModel::ElasticPlaneStrain => Box::new(ElasticPlaneStrain),
        }
    }
}

/// One material region: a rheology variant plus its property database
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    pub model: RheologyModel,
    #[serde(flatten)]
    pub db: PropertyDb,
}

/// Time-stepping parameters chosen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStepping {
    #[serde(default)]
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
}

/// Complete driver-facing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    pub time: TimeStepping,
    #[serde(default)]
    pub normalizer: Nondimensional,
    pub materials: Vec<MaterialConfig>,
    /// Warn (never clamp) when dt exceeds the reported stable bound.
    #[serde(default = "default_true")]
    pub check_stable_dt: bool,
}

fn default_dimension() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimension != 2 {
            return Err(SolverError::Config(format!(
                "unsupported dimension {} (plane-strain rheologies are 2-d)",
                self.dimension
            )));
        }
        if !(self.time.dt > 0.0) || !self.time.dt.is_finite() {
            return Err(SolverError::InvalidTimeStep(self.time.dt));
        }
        if self.time.t_end <= self.time.t_start {
            return Err(SolverError::Config(format!(
                "t_end {} must exceed t_start {}",
                self.time.t_end, self.time.t_start
            )));
        }
        if self.materials.is_empty() {
            return Err(SolverError::Config("no materials configured".to_string()));
        }
        self.normalizer.validate()?;
        for material in &self.materials {
            material.db.derive()?;
        }
        Ok(())
    }

    pub fn num_steps(&self) -> usize {
        ((self.time.t_end - self.time.t_start) / self.time.dt).ceil() as usize
    }
}
