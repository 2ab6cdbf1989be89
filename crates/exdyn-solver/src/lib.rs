//! Explicit-dynamics time-integration engine for finite-element
//! elastodynamics.
//!
//! The engine advances a displacement field through time with an
//! explicit scheme and a lumped (diagonal) Jacobian operator. The
//! [`formulation::ExplicitFormulation`] coordinates field generations,
//! constraint application, constitutive evaluation, and conditional
//! reassembly of the lumped operator; constraints, integrators,
//! rheologies, and the algebraic solver are capability traits with
//! reference implementations in this crate.

pub mod config;
pub mod constraints;
pub mod demo;
pub mod diagnostics;
pub mod error;
pub mod formulation;
pub mod integrators;
pub mod rheology;
pub mod solver;

pub use config::{MaterialConfig, RheologyModel, SimulationConfig, TimeStepping};
pub use constraints::{Constraint, ConstraintSet, DirichletConstraint};
pub use demo::BarProblem;
pub use diagnostics::Diagnostics;
pub use error::{Result, SolverError};
pub use formulation::{ExplicitFormulation, Phase};
pub use integrators::{Integrator, IntegratorSet, PointwiseElasticity, QuadPoint};
pub use rheology::{ElasticPlaneStrain, MaxwellPlaneStrain, Rheology, RheologyUpdate};
pub use solver::{AlgebraicSolver, LumpedSolver};
