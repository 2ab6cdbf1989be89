//! Boundary-condition constraints.
//!
//! A constraint owns a set of constrained degrees of freedom and
//! writes prescribed values into the displacement-increment field for
//! a given time interval during prestep. The algebraic solve later
//! skips constrained dofs, so the values written here survive the
//! step unchanged.

use exdyn_model::{FieldRole, FieldSet};

use crate::error::{Result, SolverError};

/// Boundary-condition capability consumed by the formulation.
pub trait Constraint: Send {
    fn name(&self) -> &str;

    /// Switch between solving for total values and solving for the
    /// increment over a step. The explicit formulation always runs in
    /// increment mode.
    fn use_soln_incr(&mut self, flag: bool);

    /// Write the prescribed increment for the interval
    /// `[t_start, t_end]` into the increment field.
    fn set_field_incr(&self, t_start: f64, t_end: f64, fields: &mut FieldSet) -> Result<()>;

    /// Degrees of freedom this constraint owns.
    fn constrained_dofs(&self) -> &[usize];
}

/// Constraints applied in registration order.
pub type ConstraintSet = Vec<Box<dyn Constraint>>;

/// Prescribes a constant displacement rate on a set of dofs.
#[derive(Debug, Clone)]
pub struct DirichletConstraint {
    name: String,
    dofs: Vec<usize>,
    /// Displacement rate; an increment of `rate * (t_end - t_start)`
    /// is written each step.
    rate: f64,
    soln_incr: bool,
}

impl DirichletConstraint {
    pub fn new(name: impl Into<String>, dofs: Vec<usize>, rate: f64) -> Self {
        Self {
            name: name.into(),
            dofs,
            rate,
            soln_incr: false,
        }
    }

    /// A fixed (zero-rate) constraint.
    pub fn fixed(name: impl Into<String>, dofs: Vec<usize>) -> Self {
        Self::new(name, dofs, 0.0)
    }
}

impl Constraint for DirichletConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn use_soln_incr(&mut self, flag: bool) {
        self.soln_incr = flag;
    }

    fn set_field_incr(&self, t_start: f64, t_end: f64, fields: &mut FieldSet) -> Result<()> {
        let incr = fields.get_mut(FieldRole::DispIncr)?;
        let total = incr.len();
        let value = if self.soln_incr {
            self.rate * (t_end - t_start)
        } else {
            self.rate * t_end
        };
        for &dof in &self.dofs {
            let slot = incr
                .as_mut_slice()
                .get_mut(dof)
                .ok_or(SolverError::DofOutOfRange { dof, total })?;
            *slot = value;
        }
        Ok(())
    }

    fn constrained_dofs(&self) -> &[usize] {
        &self.dofs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exdyn_model::Layout;

    fn fields() -> FieldSet {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispIncr, Layout::new(3, 2)).unwrap();
        fields
    }

    #[test]
    fn writes_rate_times_interval_in_increment_mode() {
        let mut fields = fields();
        let mut bc = DirichletConstraint::new("driven-end", vec![4], 2.0);
        bc.use_soln_incr(true);
        bc.set_field_incr(10.0, 10.5, &mut fields).unwrap();

        let incr = fields.get(FieldRole::DispIncr).unwrap();
        assert_eq!(incr.as_slice()[4], 1.0);
        assert_eq!(incr.as_slice()[0], 0.0);
    }

    #[test]
    fn writes_total_value_outside_increment_mode() {
        let mut fields = fields();
        let bc = DirichletConstraint::new("driven-end", vec![0], 2.0);
        bc.set_field_incr(0.0, 3.0, &mut fields).unwrap();
        assert_eq!(fields.get(FieldRole::DispIncr).unwrap().as_slice()[0], 6.0);
    }

    #[test]
    fn rejects_out_of_range_dof() {
        let mut fields = fields();
        let bc = DirichletConstraint::fixed("bad", vec![99]);
        let err = bc.set_field_incr(0.0, 1.0, &mut fields).unwrap_err();
        assert!(matches!(
            err,
            SolverError::DofOutOfRange { dof: 99, total: 6 }
        ));
    }
}
