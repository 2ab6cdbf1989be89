//! Nondimensionalization scales.
//!
//! Properties are scaled exactly once at problem setup; the solver then
//! runs entirely in nondimensional quantities. The default scales of
//! 1.0 give a dimensional run.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::properties::ElasticProperties;

/// Characteristic scales used to nondimensionalize the problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nondimensional {
    /// Length scale [m].
    pub length_scale: f64,
    /// Pressure scale [Pa], typically a representative shear modulus.
    pub pressure_scale: f64,
    /// Time scale [s].
    pub time_scale: f64,
    /// Density scale [kg/m³].
    pub density_scale: f64,
}

impl Default for Nondimensional {
    fn default() -> Self {
        Self {
            length_scale: 1.0,
            pressure_scale: 1.0,
            time_scale: 1.0,
            density_scale: 1.0,
        }
    }
}

impl Nondimensional {
    /// Verify all scales are positive and finite.
    pub fn validate(&self) -> Result<()> {
        let check = |name: &'static str, value: f64| -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ModelError::InvalidScale { name, value })
            }
        };
        check("length_scale", self.length_scale)?;
        check("pressure_scale", self.pressure_scale)?;
        check("time_scale", self.time_scale)?;
        check("density_scale", self.density_scale)?;
        Ok(())
    }

    /// Nondimensionalize derived material properties. Consumes and
    /// returns the record so scaling cannot be applied to a value that
    /// the caller keeps using in dimensional form.
    pub fn properties(&self, props: ElasticProperties) -> ElasticProperties {
        ElasticProperties {
            density: props.density / self.density_scale,
            mu: props.mu / self.pressure_scale,
            lambda: props.lambda / self.pressure_scale,
            // Infinite relaxation time stays infinite.
            maxwell_time: props.maxwell_time / self.time_scale,
        }
    }

    pub fn time(&self, t: f64) -> f64 {
        t / self.time_scale
    }

    pub fn length(&self, l: f64) -> f64 {
        l / self.length_scale
    }

    pub fn velocity(&self, v: f64) -> f64 {
        v * self.time_scale / self.length_scale
    }

    /// Convert a nondimensional length back to meters for output.
    pub fn dimensionalize_length(&self, l: f64) -> f64 {
        l * self.length_scale
    }
}
