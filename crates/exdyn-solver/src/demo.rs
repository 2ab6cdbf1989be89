//! Demo problem assembly.
//!
//! The engine consumes discretization data (dof indices,
//! strain-displacement matrices, quadrature weights) as opaque input.
//! This module is the stand-in collaborator that produces such data
//! for a one-dimensional bar of plane-strain material regions, used by
//! the CLI driver and the integration tests.

use nalgebra::DMatrix;

use exdyn_model::{FieldRole, FieldSet, Layout};

use crate::config::SimulationConfig;
use crate::constraints::{ConstraintSet, DirichletConstraint};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SolverError};
use crate::formulation::ExplicitFormulation;
use crate::integrators::{IntegratorSet, PointwiseElasticity, QuadPoint};
use crate::solver::LumpedSolver;

/// A bar of `num_nodes` nodes along x at uniform spacing, fixed at
/// the left end and driven at a constant x velocity at the right end.
///
/// Each node carries (ux, uy), interleaved. Elements between adjacent
/// nodes are split into one contiguous region per configured
/// material, each becoming its own integrator.
#[derive(Debug, Clone, Copy)]
pub struct BarProblem {
    pub num_nodes: usize,
    /// Node spacing [m].
    pub spacing: f64,
    /// Velocity prescribed at the right end [m/s].
    pub drive_rate: f64,
}

impl BarProblem {
    /// Build a formulation for this bar under the given configuration.
    /// Geometry, rate, and material properties are nondimensionalized
    /// here; the formulation runs entirely in scaled quantities.
    pub fn build(&self, config: &SimulationConfig) -> Result<ExplicitFormulation> {
        config.validate()?;
        let num_elements = self.num_nodes.saturating_sub(1);
        if num_elements < config.materials.len() {
            return Err(SolverError::Config(format!(
                "{} elements cannot host {} material regions",
                num_elements,
                config.materials.len()
            )));
        }

        let normalizer = config.normalizer;
        let h = normalizer.length(self.spacing);
        if !(h > 0.0) || !h.is_finite() {
            return Err(SolverError::Config(format!(
                "invalid node spacing {}",
                self.spacing
            )));
        }

        let mut fields = FieldSet::new();
        let layout = Layout::new(self.num_nodes, 2);
        fields.add(FieldRole::DispT, layout)?;
        fields.add(FieldRole::DispIncr, layout)?;

        // Contiguous element chunks, one integrator per material.
        let num_regions = config.materials.len();
        let chunk = num_elements.div_ceil(num_regions);
        let mut integrators: IntegratorSet = Vec::with_capacity(num_regions);
        for (region, material) in config.materials.iter().enumerate() {
            let first = region * chunk;
            let last = ((region + 1) * chunk).min(num_elements);
            let points: Vec<QuadPoint> = (first..last).map(|e| bar_element(e, h)).collect();

            let props = normalizer.properties(material.db.derive()?);
            integrators.push(Box::new(PointwiseElasticity::new(
                material.name.clone(),
                config.dimension,
                props,
                material.model.build(),
                points,
            )?));
        }

        let last_x_dof = 2 * (self.num_nodes - 1);
        let constraints: ConstraintSet = vec![
            Box::new(DirichletConstraint::fixed("fixed-end", vec![0, 1])),
            Box::new(DirichletConstraint::new(
                "driven-end",
                vec![last_x_dof],
                normalizer.velocity(self.drive_rate),
            )),
        ];

        Ok(ExplicitFormulation::new(
            fields,
            constraints,
            integrators,
            Box::new(LumpedSolver::new()),
            normalizer.time(config.time.dt),
            Diagnostics::default(),
        ))
    }
}

/// Quadrature record for the bar element between nodes `e` and `e+1`:
/// εxx from the x displacements, γxy from the y displacements, with
/// half the element mass lumped to each node.
fn bar_element(e: usize, h: f64) -> QuadPoint {
    let inv = 1.0 / h;
    let dofs = vec![2 * e, 2 * e + 1, 2 * e + 2, 2 * e + 3];
    let b = DMatrix::from_row_slice(
        3,
        4,
        &[
            -inv, 0.0, inv, 0.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, -inv, 0.0, inv,
        ],
    );
    QuadPoint {
        dofs,
        b,
        weight: h,
        mass_weights: vec![0.5 * h; 4],
    }
}

/// Drive a built formulation through the configured time span.
/// Returns the number of steps taken.
pub fn run(formulation: &mut ExplicitFormulation, config: &SimulationConfig) -> Result<usize> {
    let normalizer = *formulation.normalizer();
    let dt = normalizer.time(config.time.dt);
    let mut t = normalizer.time(config.time.t_start);
    let num_steps = config.num_steps();

    if config.check_stable_dt {
        let bound = formulation.stable_dt();
        if dt > bound {
            log::warn!(
                "dt = {dt} exceeds the stable explicit bound {bound}; results may be inaccurate"
            );
        }
    }

    for _ in 0..num_steps {
        formulation.prestep(t, dt)?;
        formulation.step(t, dt)?;
        formulation.poststep(t, dt)?;
        t += dt;
    }
    Ok(num_steps)
}
