//! Element-level integrators.
//!
//! An integrator accumulates residual and lumped-Jacobian
//! contributions for one material region into the field set,
//! delegating constitutive evaluation to a [`Rheology`]. The
//! discretization collaborator hands each integrator opaque
//! per-quadrature-point records (dof indices, strain-displacement
//! matrix, weights); assembly of those records is outside this crate.
//!
//! The explicit update recurrence being accumulated is
//!
//! ```text
//! (M/dt²)·d = f_ext − f_int(u(t)) + (M/dt²)·(u(t) − u(t−dt))
//! ```
//!
//! with `d = u(t+dt) − u(t)` the solved increment and `M` the lumped
//! mass. The Jacobian contribution `M/dt²` depends on dt, so a
//! time-step change marks the operator stale.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use exdyn_model::{ElasticProperties, FieldRole, FieldSet};

use crate::error::{Result, SolverError};
use crate::rheology::Rheology;

/// Integrator capability consumed by the formulation.
///
/// Contributions are additive, so the final residual and Jacobian do
/// not depend on the order integrators are visited in.
pub trait Integrator: Send {
    fn name(&self) -> &str;

    /// Advance internal time-step-dependent state. May mark the
    /// integrator's Jacobian contribution stale.
    fn time_step(&mut self, dt: f64);

    /// Whether the lumped operator must be rebuilt before the next
    /// solve.
    fn need_new_jacobian(&self) -> bool;

    /// Switch between total-solution and solution-increment mode.
    fn use_soln_incr(&mut self, flag: bool);

    /// Stable explicit time-step bound for this region's material.
    fn stable_dt(&self) -> f64;

    /// Accumulate this region's residual contribution. Also the only
    /// place per-point internal state is updated.
    fn compute_residual(&mut self, fields: &mut FieldSet, t: f64, dt: f64) -> Result<()>;

    /// Accumulate this region's lumped-Jacobian contribution and
    /// clear the stale flag.
    fn compute_jacobian(&mut self, fields: &mut FieldSet, t: f64, dt: f64) -> Result<()>;
}

/// Integrators visited in registration order.
pub type IntegratorSet = Vec<Box<dyn Integrator>>;

/// Per-quadrature-point data supplied by the discretization.
#[derive(Debug, Clone)]
pub struct QuadPoint {
    /// Global dof indices of the local displacement vector.
    pub dofs: Vec<usize>,
    /// Strain-displacement matrix, `tensor_size × dofs.len()`.
    pub b: DMatrix<f64>,
    /// Quadrature weight (tributary volume).
    pub weight: f64,
    /// Lumped mass weight per local dof, same length as `dofs`.
    pub mass_weights: Vec<f64>,
}

/// Pointwise elasticity integrator for one material region.
///
/// Holds one set of (nondimensionalized) elastic properties, the
/// region's rheology, and per-point internal state. Constitutive
/// evaluation is fanned out across points with rayon; the rheology
/// contract forbids cross-point state, so this is safe.
pub struct PointwiseElasticity {
    name: String,
    spatial_dim: usize,
    props: ElasticProperties,
    rheology: Box<dyn Rheology>,
    points: Vec<QuadPoint>,
    /// Internal state per point, `num_state_vars` values each.
    state: Vec<Vec<f64>>,
    /// Initial stress per point, `tensor_size` values each.
    initial_stress: Vec<Vec<f64>>,
    /// Initial (reference) strain per point.
    initial_strain: Vec<Vec<f64>>,
    /// Body-force acceleration per spatial dimension.
    body_force: Option<Vec<f64>>,
    dt: f64,
    stale_jacobian: bool,
    soln_incr: bool,
}

impl std::fmt::Debug for PointwiseElasticity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointwiseElasticity")
            .field("name", &self.name)
            .field("spatial_dim", &self.spatial_dim)
            .finish_non_exhaustive()
    }
}

impl PointwiseElasticity {
    pub fn new(
        name: impl Into<String>,
        spatial_dim: usize,
        props: ElasticProperties,
        rheology: Box<dyn Rheology>,
        points: Vec<QuadPoint>,
    ) -> Result<Self> {
        let tensor_size = rheology.tensor_size();
        for point in &points {
            if point.b.nrows() != tensor_size || point.b.ncols() != point.dofs.len() {
                return Err(SolverError::Config(format!(
                    "quad point B matrix is {}x{}, expected {}x{}",
                    point.b.nrows(),
                    point.b.ncols(),
                    tensor_size,
                    point.dofs.len()
                )));
            }
            if point.mass_weights.len() != point.dofs.len() {
                return Err(SolverError::Config(
                    "mass weight count differs from dof count".to_string(),
                ));
            }
        }

        let num_points = points.len();
        let num_state_vars = rheology.num_state_vars();
        Ok(Self {
            name: name.into(),
            spatial_dim,
            props,
            rheology,
            points,
            state: vec![vec![0.0; num_state_vars]; num_points],
            initial_stress: vec![vec![0.0; tensor_size]; num_points],
            initial_strain: vec![vec![0.0; tensor_size]; num_points],
            body_force: None,
            dt: f64::NAN,
            stale_jacobian: true,
            soln_incr: false,
        })
    }

    /// Set a uniform body-force acceleration (one component per
    /// spatial dimension). Global dofs are assumed interleaved by
    /// component, so a dof's component is `dof % spatial_dim`.
    pub fn with_body_force(mut self, accel: Vec<f64>) -> Result<Self> {
        if accel.len() != self.spatial_dim {
            return Err(SolverError::Config(format!(
                "body force has {} components for a {}-d region",
                accel.len(),
                self.spatial_dim
            )));
        }
        self.body_force = Some(accel);
        Ok(self)
    }

    /// Set per-point initial stress.
    pub fn with_initial_stress(mut self, stress: Vec<Vec<f64>>) -> Result<Self> {
        self.check_per_point(&stress, "initial stress")?;
        self.initial_stress = stress;
        Ok(self)
    }

    /// Set per-point initial (reference) strain.
    pub fn with_initial_strain(mut self, strain: Vec<Vec<f64>>) -> Result<Self> {
        self.check_per_point(&strain, "initial strain")?;
        self.initial_strain = strain;
        Ok(self)
    }

    /// Internal state of one point, for inspection and output.
    pub fn state(&self, point: usize) -> &[f64] {
        &self.state[point]
    }

    fn check_per_point(&self, values: &[Vec<f64>], what: &str) -> Result<()> {
        let tensor_size = self.rheology.tensor_size();
        if values.len() != self.points.len()
            || values.iter().any(|v| v.len() != tensor_size)
        {
            return Err(SolverError::Config(format!(
                "{what} must supply {tensor_size} components for each of {} points",
                self.points.len()
            )));
        }
        Ok(())
    }

    fn check_dofs(&self, total: usize) -> Result<()> {
        for point in &self.points {
            for &dof in &point.dofs {
                if dof >= total {
                    return Err(SolverError::DofOutOfRange { dof, total });
                }
            }
        }
        Ok(())
    }

    fn check_dt(&self, dt: f64) -> Result<f64> {
        if dt > 0.0 && dt.is_finite() {
            Ok(dt)
        } else {
            Err(SolverError::InvalidTimeStep(dt))
        }
    }
}

impl Integrator for PointwiseElasticity {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_step(&mut self, dt: f64) {
        // The lumped operator is M/dt²: any dt change invalidates it.
        if self.dt != dt {
            self.stale_jacobian = true;
        }
        self.dt = dt;
    }

    fn need_new_jacobian(&self) -> bool {
        self.stale_jacobian
    }

    fn use_soln_incr(&mut self, flag: bool) {
        self.soln_incr = flag;
    }

    fn stable_dt(&self) -> f64 {
        self.rheology.stable_dt(&self.props)
    }

    fn compute_residual(&mut self, fields: &mut FieldSet, _t: f64, dt: f64) -> Result<()> {
        // The accumulated recurrence solves for the increment; total
        // mode has no meaning for this integrator.
        if !self.soln_incr {
            return Err(SolverError::Config(format!(
                "integrator '{}' requires solution-increment mode",
                self.name
            )));
        }
        let dt = self.check_dt(dt)?;
        let density = self.props.density;
        let mass_coeff = density / (dt * dt);

        // Per-point contributions, computed while the displacement
        // generations are borrowed read-only. Both buffers still hold
        // pre-step values here.
        let contributions: Vec<(usize, crate::rheology::RheologyUpdate, DVector<f64>)> = {
            let disp_t = fields.get(FieldRole::DispT)?;
            let disp_tmdt = fields.get(FieldRole::DispTmdt)?;
            self.check_dofs(disp_t.len())?;
            let u_t = disp_t.as_slice();
            let u_tmdt = disp_tmdt.as_slice();

            let rheology = self.rheology.as_ref();
            let props = &self.props;
            let state = &self.state;
            let initial_stress = &self.initial_stress;
            let initial_strain = &self.initial_strain;
            let body_force = self.body_force.as_deref();
            let spatial_dim = self.spatial_dim;

            self.points
                .par_iter()
                .enumerate()
                .map(|(p, point)| {
                    let n_local = point.dofs.len();
                    let u_local =
                        DVector::from_iterator(n_local, point.dofs.iter().map(|&d| u_t[d]));
                    let strain = &point.b * &u_local;

                    let update = rheology.evaluate(
                        strain.as_slice(),
                        props,
                        &state[p],
                        &initial_stress[p],
                        &initial_strain[p],
                    );

                    // r = -Bᵀσ·w + ρ·mw·g + (ρ·mw/dt²)·(u_t − u_tmdt)
                    let mut local = -(point.b.transpose() * &update.stress) * point.weight;
                    for (k, &dof) in point.dofs.iter().enumerate() {
                        let mw = point.mass_weights[k];
                        local[k] += mass_coeff * mw * (u_t[dof] - u_tmdt[dof]);
                        if let Some(accel) = body_force {
                            local[k] += density * mw * accel[dof % spatial_dim];
                        }
                    }
                    (p, update, local)
                })
                .collect()
        };

        // State commit and residual scatter, sequential.
        let residual = fields.get_mut(FieldRole::Residual)?;
        let out = residual.as_mut_slice();
        for (p, update, local) in contributions {
            for (k, &dof) in self.points[p].dofs.iter().enumerate() {
                out[dof] += local[k];
            }
            self.state[p] = update.state;
        }
        Ok(())
    }

    fn compute_jacobian(&mut self, fields: &mut FieldSet, _t: f64, dt: f64) -> Result<()> {
        let dt = self.check_dt(dt)?;
        let mass_coeff = self.props.density / (dt * dt);

        let jacobian = fields.get_mut(FieldRole::LumpedJacobian)?;
        let total = jacobian.len();
        self.check_dofs(total)?;

        let out = jacobian.as_mut_slice();
        for point in &self.points {
            for (k, &dof) in point.dofs.iter().enumerate() {
                out[dof] += mass_coeff * point.mass_weights[k];
            }
        }
        self.stale_jacobian = false;
        Ok(())
    }
}
