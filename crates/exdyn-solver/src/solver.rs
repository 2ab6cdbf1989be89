//! Algebraic solver capability and the lumped diagonal solver.

use exdyn_model::{Field, FieldRole, FieldSet, ModelError};

use crate::error::{Result, SolverError};

/// Algebraic solver consumed by the formulation.
pub trait AlgebraicSolver: Send {
    /// Bind the solver to the problem: record layouts and the set of
    /// constrained dofs whose increments are prescribed, not solved.
    fn initialize(&mut self, fields: &FieldSet, constrained_dofs: &[usize]) -> Result<()>;

    /// Solve `jacobian · incr = residual`, writing into `incr`.
    /// Constrained entries of `incr` are left untouched.
    fn solve(&mut self, incr: &mut Field, jacobian: &Field, residual: &Field) -> Result<()>;
}

/// Matrix-free solver for a diagonal (lumped) operator: one division
/// per unconstrained dof.
#[derive(Debug, Default)]
pub struct LumpedSolver {
    /// Mask over all dofs; `true` entries are skipped by the solve.
    constrained: Vec<bool>,
}

impl LumpedSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlgebraicSolver for LumpedSolver {
    fn initialize(&mut self, fields: &FieldSet, constrained_dofs: &[usize]) -> Result<()> {
        let incr = fields.get(FieldRole::DispIncr)?;
        // The operator and residual must share the increment's layout.
        for role in [FieldRole::LumpedJacobian, FieldRole::Residual] {
            let field = fields.get(role)?;
            if field.layout() != incr.layout() {
                return Err(ModelError::LayoutMismatch {
                    expected: incr.layout(),
                    found: field.layout(),
                }
                .into());
            }
        }

        let total = incr.len();
        self.constrained = vec![false; total];
        for &dof in constrained_dofs {
            *self
                .constrained
                .get_mut(dof)
                .ok_or(SolverError::DofOutOfRange { dof, total })? = true;
        }
        Ok(())
    }

    fn solve(&mut self, incr: &mut Field, jacobian: &Field, residual: &Field) -> Result<()> {
        if self.constrained.len() != incr.len() {
            return Err(SolverError::Config(
                "lumped solver used before initialize".to_string(),
            ));
        }

        let jac = jacobian.as_slice();
        let res = residual.as_slice();
        let out = incr.as_mut_slice();
        for dof in 0..out.len() {
            if self.constrained[dof] {
                continue;
            }
            let diag = jac[dof];
            if !(diag > 0.0) {
                return Err(SolverError::SingularJacobian { dof, value: diag });
            }
            out[dof] = res[dof] / diag;
        }
        Ok(())
    }
}
