//! Error types for exdyn-solver.
//!
//! All variants are fatal-propagating: the formulation never retries
//! or rolls back. Out-of-order phase calls and missing fields are
//! caller bugs; numerical failures identify the phase and collaborator
//! that produced them so the driver can report and halt.

use thiserror::Error;

use exdyn_model::ModelError;

use crate::formulation::Phase;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("phase {called} called while {current}; expected {expected}")]
    PhaseOrder {
        current: Phase,
        called: &'static str,
        expected: &'static str,
    },

    #[error("phase {called} called with (t, dt) = ({t}, {dt}); prestep ran with ({t_expected}, {dt_expected})")]
    StepMismatch {
        called: &'static str,
        t: f64,
        dt: f64,
        t_expected: f64,
        dt_expected: f64,
    },

    #[error("invalid time step dt = {0}")]
    InvalidTimeStep(f64),

    #[error("dof index {dof} out of range for {total} dofs")]
    DofOutOfRange { dof: usize, total: usize },

    #[error("singular lumped Jacobian: non-positive diagonal {value} at dof {dof}")]
    SingularJacobian { dof: usize, value: f64 },

    #[error("constraint '{name}' failed during {phase}: {source}")]
    Constraint {
        name: String,
        phase: &'static str,
        source: Box<SolverError>,
    },

    #[error("integrator '{name}' failed during {phase}: {source}")]
    Integrator {
        name: String,
        phase: &'static str,
        source: Box<SolverError>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SolverError {
    /// Wrap a collaborator failure with the phase and collaborator
    /// name that produced it.
    pub(crate) fn in_integrator(self, name: &str, phase: &'static str) -> Self {
        SolverError::Integrator {
            name: name.to_string(),
            phase,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_constraint(self, name: &str, phase: &'static str) -> Self {
        SolverError::Constraint {
            name: name.to_string(),
            phase,
            source: Box::new(self),
        }
    }
}
