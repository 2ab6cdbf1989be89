//! Elastic material property records.
//!
//! Property databases store seismic observables (density, shear-wave
//! speed, dilatational-wave speed, viscosity). The solver works with
//! derived elastic moduli, converted once at setup:
//!
//! ```text
//! mu           = vs² · density
//! lambda       = vp² · density − 2·mu
//! maxwell_time = viscosity / mu
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Raw property database values for one material region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyDb {
    /// Mass density [kg/m³].
    pub density: f64,
    /// Shear-wave speed [m/s].
    pub vs: f64,
    /// Dilatational-wave speed [m/s]. Defaults to `vs·√3` (Poisson
    /// solid) when absent.
    #[serde(default)]
    pub vp: Option<f64>,
    /// Viscosity [Pa·s]. Absent for rate-independent materials.
    #[serde(default)]
    pub viscosity: Option<f64>,
}

impl PropertyDb {
    /// Derive elastic moduli, validating physical admissibility.
    pub fn derive(&self) -> Result<ElasticProperties> {
        let positive = |name: &'static str, value: f64| -> Result<f64> {
            if value > 0.0 && value.is_finite() {
                Ok(value)
            } else {
                Err(ModelError::InvalidProperty { name, value })
            }
        };

        let density = positive("density", self.density)?;
        let vs = positive("vs", self.vs)?;
        let vp = match self.vp {
            Some(vp) => positive("vp", vp)?,
            None => vs * 3.0_f64.sqrt(),
        };

        let mu = vs * vs * density;
        let lambda = vp * vp * density - 2.0 * mu;
        if lambda <= 0.0 {
            return Err(ModelError::InvalidProperty {
                name: "lambda",
                value: lambda,
            });
        }

        let maxwell_time = match self.viscosity {
            Some(viscosity) => positive("viscosity", viscosity)? / mu,
            None => f64::INFINITY,
        };

        Ok(ElasticProperties {
            density,
            mu,
            lambda,
            maxwell_time,
        })
    }
}

/// Derived elastic moduli for one material region.
///
/// Created once from [`PropertyDb`] values, nondimensionalized once,
/// then read-only for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticProperties {
    /// Mass density.
    pub density: f64,
    /// Shear modulus μ.
    pub mu: f64,
    /// Lamé parameter λ.
    pub lambda: f64,
    /// Maxwell relaxation time τ = viscosity / μ; infinite for
    /// rate-independent materials.
    pub maxwell_time: f64,
}
