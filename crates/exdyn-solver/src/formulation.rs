//! Explicit time-stepping formulation with a lumped Jacobian.
//!
//! The formulation advances the system `[A(t)] {u(t+dt)} = {b(t)}`,
//! where `A` is the lumped (diagonal) operator stored as a field,
//! `b` depends on `u(t)` and `u(t-dt)`, and the solve produces the
//! displacement increment `u(t+dt) − u(t)`.
//!
//! One simulation step is the strictly ordered sequence
//! `prestep → step → poststep`:
//!
//! - **prestep** applies the constraints' prescribed increments for
//!   `[t, t+dt]`, advances each integrator's time-step-dependent
//!   state, and rebuilds the lumped operator only if some integrator
//!   reports it stale.
//! - **step** reforms the residual and solves for the increment. The
//!   total displacement is not touched here.
//! - **poststep** commits: `disp(t-dt) ← disp(t)`, then
//!   `disp(t) += incr`, then the increment is zeroed. The order is
//!   load-bearing; both displacement generations are read by the
//!   residual reform and must hold pre-step values until this commit.
//!
//! Failures propagate unmodified; there is no retry or rollback. The
//! caller decides whether to abort or restart with a smaller dt.

use exdyn_model::{FieldRole, FieldSet, Nondimensional};

use crate::constraints::ConstraintSet;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SolverError};
use crate::integrators::IntegratorSet;
use crate::solver::AlgebraicSolver;

/// Where the formulation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Uninitialized,
    /// Between steps; the next call must be `prestep`.
    Ready,
    /// `prestep(t, dt)` has run; the next call must be `step` with
    /// the same arguments.
    Prestepped { t: f64, dt: f64 },
    /// `step(t, dt)` has run; the next call must be `poststep` with
    /// the same arguments.
    Stepped { t: f64, dt: f64 },
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Uninitialized => write!(f, "uninitialized"),
            Phase::Ready => write!(f, "ready"),
            Phase::Prestepped { t, dt } => write!(f, "prestepped(t={t}, dt={dt})"),
            Phase::Stepped { t, dt } => write!(f, "stepped(t={t}, dt={dt})"),
        }
    }
}

/// Explicit formulation: owns the field set and coordinates
/// constraints, integrators, and the algebraic solver across the
/// four-phase step protocol.
pub struct ExplicitFormulation {
    fields: FieldSet,
    constraints: ConstraintSet,
    integrators: IntegratorSet,
    solver: Box<dyn AlgebraicSolver>,
    diagnostics: Diagnostics,
    normalizer: Nondimensional,
    initial_dt: f64,
    phase: Phase,
}

impl std::fmt::Debug for ExplicitFormulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplicitFormulation")
            .field("initial_dt", &self.initial_dt)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl ExplicitFormulation {
    /// Create an uninitialized formulation.
    ///
    /// `initial_dt` is the step size used to build the lumped operator
    /// during `initialize`; if the driver later steps with a different
    /// dt, the integrators report the operator stale and it is rebuilt
    /// in `prestep`.
    pub fn new(
        fields: FieldSet,
        constraints: ConstraintSet,
        integrators: IntegratorSet,
        solver: Box<dyn AlgebraicSolver>,
        initial_dt: f64,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            fields,
            constraints,
            integrators,
            solver,
            diagnostics,
            normalizer: Nondimensional::default(),
            initial_dt,
            phase: Phase::Uninitialized,
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Mutable field access for setting initial conditions before
    /// `initialize`.
    pub fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn normalizer(&self) -> &Nondimensional {
        &self.normalizer
    }

    /// Admissible explicit time-step upper bound: the minimum stable
    /// bound over all integrators. Advisory; the formulation never
    /// clamps or rejects a larger dt.
    pub fn stable_dt(&self) -> f64 {
        self.integrators
            .iter()
            .map(|integrator| integrator.stable_dt())
            .fold(f64::INFINITY, f64::min)
    }

    /// Allocate the remaining fields, build the lumped operator once,
    /// bind the solver, and switch all collaborators into
    /// solve-for-increment mode.
    ///
    /// Requires the caller to have created the `disp(t)` and
    /// `dispIncr(t->t+dt)` fields; everything else is allocated here
    /// by copying the increment field's layout and starts zeroed.
    pub fn initialize(&mut self, dimension: usize, normalizer: Nondimensional) -> Result<()> {
        self.expect_phase(Phase::Uninitialized, "initialize", "uninitialized")?;
        let _span = self.diagnostics.phase("init");

        normalizer.validate()?;
        self.normalizer = normalizer;
        if !(self.initial_dt > 0.0) || !self.initial_dt.is_finite() {
            return Err(SolverError::InvalidTimeStep(self.initial_dt));
        }

        let incr_layout = self.fields.get(FieldRole::DispIncr)?.layout();
        if incr_layout.dofs_per_point != dimension {
            return Err(SolverError::Config(format!(
                "increment field carries {} dofs per point for a {dimension}-d problem",
                incr_layout.dofs_per_point
            )));
        }
        let disp_layout = self.fields.get(FieldRole::DispT)?.layout();
        if disp_layout != incr_layout {
            return Err(exdyn_model::ModelError::LayoutMismatch {
                expected: incr_layout,
                found: disp_layout,
            }
            .into());
        }

        // Allocate the remaining generations from the increment
        // field's layout; Field::zeros starts them zeroed.
        self.fields
            .copy_layout(FieldRole::DispTmdt, FieldRole::DispIncr)?;
        self.fields
            .copy_layout(FieldRole::Residual, FieldRole::DispIncr)?;
        self.fields
            .copy_layout(FieldRole::LumpedJacobian, FieldRole::DispIncr)?;

        self.diagnostics.info("creating lumped Jacobian");
        for integrator in &mut self.integrators {
            integrator.time_step(self.initial_dt);
        }
        let dt = self.initial_dt;
        self.reform_jacobian(0.0, dt, "initialize")?;

        self.diagnostics.info("initializing solver");
        let constrained: Vec<usize> = self
            .constraints
            .iter()
            .flat_map(|constraint| constraint.constrained_dofs().iter().copied())
            .collect();
        self.solver.initialize(&self.fields, &constrained)?;

        // Solve for the increment in the displacement field.
        for constraint in &mut self.constraints {
            constraint.use_soln_incr(true);
        }
        for integrator in &mut self.integrators {
            integrator.use_soln_incr(true);
        }

        self.phase = Phase::Ready;
        Ok(())
    }

    /// Apply prescribed increments and rebuild the lumped operator if
    /// any integrator reports it stale.
    pub fn prestep(&mut self, t: f64, dt: f64) -> Result<()> {
        self.expect_phase(Phase::Ready, "prestep", "ready")?;
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SolverError::InvalidTimeStep(dt));
        }
        let _span = self.diagnostics.phase("prestep");

        for constraint in &self.constraints {
            constraint
                .set_field_incr(t, t + dt, &mut self.fields)
                .map_err(|err| err.in_constraint(constraint.name(), "prestep"))?;
        }

        let mut need_new_jacobian = false;
        for integrator in &mut self.integrators {
            integrator.time_step(dt);
            if integrator.need_new_jacobian() {
                need_new_jacobian = true;
            }
        }
        if need_new_jacobian {
            self.reform_jacobian(t, dt, "prestep")?;
        }

        self.phase = Phase::Prestepped { t, dt };
        Ok(())
    }

    /// Reform the residual and solve for the displacement increment.
    pub fn step(&mut self, t: f64, dt: f64) -> Result<()> {
        match self.phase {
            Phase::Prestepped {
                t: t_expected,
                dt: dt_expected,
            } => {
                if t != t_expected || dt != dt_expected {
                    return Err(SolverError::StepMismatch {
                        called: "step",
                        t,
                        dt,
                        t_expected,
                        dt_expected,
                    });
                }
            }
            current => {
                return Err(SolverError::PhaseOrder {
                    current,
                    called: "step",
                    expected: "prestepped",
                });
            }
        }
        let _span = self.diagnostics.phase("step");

        self.reform_residual(t, dt)?;

        self.diagnostics.info("solving equations");
        let (incr, jacobian, residual) = self.fields.solver_views()?;
        self.solver.solve(incr, jacobian, residual)?;

        self.phase = Phase::Stepped { t, dt };
        Ok(())
    }

    /// Commit the solved step and rotate the displacement generations.
    pub fn poststep(&mut self, t: f64, dt: f64) -> Result<()> {
        match self.phase {
            Phase::Stepped {
                t: t_expected,
                dt: dt_expected,
            } => {
                if t != t_expected || dt != dt_expected {
                    return Err(SolverError::StepMismatch {
                        called: "poststep",
                        t,
                        dt,
                        t_expected,
                        dt_expected,
                    });
                }
            }
            current => {
                return Err(SolverError::PhaseOrder {
                    current,
                    called: "poststep",
                    expected: "stepped",
                });
            }
        }
        let _span = self.diagnostics.phase("poststep");

        // Three-phase commit; the order is required.
        self.fields.copy(FieldRole::DispTmdt, FieldRole::DispT)?;
        self.fields
            .add_assign(FieldRole::DispT, FieldRole::DispIncr)?;
        self.fields.zero(FieldRole::DispIncr)?;

        self.phase = Phase::Ready;
        Ok(())
    }

    fn reform_jacobian(&mut self, t: f64, dt: f64, phase: &'static str) -> Result<()> {
        let _span = self.diagnostics.phase("reform-jacobian");
        self.diagnostics.info("integrating Jacobian operator");

        self.fields.zero(FieldRole::LumpedJacobian)?;
        for integrator in &mut self.integrators {
            integrator
                .compute_jacobian(&mut self.fields, t, dt)
                .map_err(|err| err.in_integrator(integrator.name(), phase))?;
        }

        self.diagnostics
            .view_field(self.fields.get(FieldRole::LumpedJacobian)?);
        Ok(())
    }

    fn reform_residual(&mut self, t: f64, dt: f64) -> Result<()> {
        let _span = self.diagnostics.phase("reform-residual");

        self.fields.zero(FieldRole::Residual)?;
        for integrator in &mut self.integrators {
            integrator
                .compute_residual(&mut self.fields, t, dt)
                .map_err(|err| err.in_integrator(integrator.name(), "step"))?;
        }
        Ok(())
    }

    fn expect_phase(
        &self,
        expected: Phase,
        called: &'static str,
        expected_name: &'static str,
    ) -> Result<()> {
        if self.phase != expected {
            return Err(SolverError::PhaseOrder {
                current: self.phase,
                called,
                expected: expected_name,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::DirichletConstraint;
    use crate::integrators::Integrator;
    use crate::solver::LumpedSolver;
    use exdyn_model::Layout;

    /// Minimal integrator: constant diagonal, constant residual,
    /// fixed stable bound, rebuild tracking.
    struct StubIntegrator {
        diag: f64,
        residual: f64,
        stable: f64,
        dt: f64,
        stale: bool,
        jacobian_builds: usize,
    }

    impl StubIntegrator {
        fn new(diag: f64, residual: f64, stable: f64) -> Self {
            Self {
                diag,
                residual,
                stable,
                dt: f64::NAN,
                stale: true,
                jacobian_builds: 0,
            }
        }
    }

    impl Integrator for StubIntegrator {
        fn name(&self) -> &str {
            "stub"
        }

        fn time_step(&mut self, dt: f64) {
            if self.dt != dt {
                self.stale = true;
            }
            self.dt = dt;
        }

        fn need_new_jacobian(&self) -> bool {
            self.stale
        }

        fn use_soln_incr(&mut self, _flag: bool) {}

        fn stable_dt(&self) -> f64 {
            self.stable
        }

        fn compute_residual(&mut self, fields: &mut FieldSet, _t: f64, _dt: f64) -> Result<()> {
            for entry in fields.get_mut(FieldRole::Residual)?.as_mut_slice() {
                *entry += self.residual;
            }
            Ok(())
        }

        fn compute_jacobian(&mut self, fields: &mut FieldSet, _t: f64, _dt: f64) -> Result<()> {
            // Encode the build count in the diagonal so tests can
            // observe how often the operator was rebuilt.
            self.jacobian_builds += 1;
            for entry in fields.get_mut(FieldRole::LumpedJacobian)?.as_mut_slice() {
                *entry += self.diag * self.jacobian_builds as f64;
            }
            self.stale = false;
            Ok(())
        }
    }

    fn base_fields() -> FieldSet {
        let layout = Layout::new(3, 2);
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispT, layout).unwrap();
        fields.add(FieldRole::DispIncr, layout).unwrap();
        fields
    }

    fn formulation(integrators: IntegratorSet, constraints: ConstraintSet) -> ExplicitFormulation {
        ExplicitFormulation::new(
            base_fields(),
            constraints,
            integrators,
            Box::new(LumpedSolver::new()),
            0.01,
            Diagnostics::default(),
        )
    }

    fn single_stub() -> IntegratorSet {
        vec![Box::new(StubIntegrator::new(4.0, 2.0, 1.0))]
    }

    #[test]
    fn initialize_requires_increment_field() {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispT, Layout::new(3, 2)).unwrap();
        let mut formulation = ExplicitFormulation::new(
            fields,
            Vec::new(),
            single_stub(),
            Box::new(LumpedSolver::new()),
            0.01,
            Diagnostics::default(),
        );
        let err = formulation
            .initialize(2, Nondimensional::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::Model(exdyn_model::ModelError::MissingField(FieldRole::DispIncr))
        ));
    }

    #[test]
    fn phases_must_run_in_order() {
        let mut formulation = formulation(single_stub(), Vec::new());

        assert!(matches!(
            formulation.prestep(0.0, 0.01).unwrap_err(),
            SolverError::PhaseOrder { .. }
        ));

        formulation.initialize(2, Nondimensional::default()).unwrap();
        assert!(matches!(
            formulation.step(0.0, 0.01).unwrap_err(),
            SolverError::PhaseOrder { .. }
        ));
        assert!(matches!(
            formulation.poststep(0.0, 0.01).unwrap_err(),
            SolverError::PhaseOrder { .. }
        ));

        formulation.prestep(0.0, 0.01).unwrap();
        assert!(matches!(
            formulation.prestep(0.0, 0.01).unwrap_err(),
            SolverError::PhaseOrder { .. }
        ));

        // step must carry the same (t, dt) as prestep.
        assert!(matches!(
            formulation.step(0.0, 0.02).unwrap_err(),
            SolverError::StepMismatch { .. }
        ));
        formulation.step(0.0, 0.01).unwrap();
        formulation.poststep(0.0, 0.01).unwrap();
        assert_eq!(formulation.phase(), Phase::Ready);
    }

    #[test]
    fn generation_invariant_after_poststep() {
        let mut formulation = formulation(single_stub(), Vec::new());
        formulation.initialize(2, Nondimensional::default()).unwrap();

        // Seed a nonzero current displacement.
        formulation
            .fields_mut()
            .get_mut(FieldRole::DispT)
            .unwrap()
            .as_mut_slice()
            .copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let disp_old: Vec<f64> = formulation
            .fields()
            .get(FieldRole::DispT)
            .unwrap()
            .as_slice()
            .to_vec();

        formulation.prestep(0.0, 0.01).unwrap();
        formulation.step(0.0, 0.01).unwrap();
        let incr: Vec<f64> = formulation
            .fields()
            .get(FieldRole::DispIncr)
            .unwrap()
            .as_slice()
            .to_vec();
        // Stub: incr = residual / diag everywhere.
        assert!(incr.iter().all(|&v| v == 0.5));

        formulation.poststep(0.0, 0.01).unwrap();
        let fields = formulation.fields();
        let disp_t = fields.get(FieldRole::DispT).unwrap().as_slice();
        let disp_tmdt = fields.get(FieldRole::DispTmdt).unwrap().as_slice();
        for i in 0..disp_old.len() {
            assert_eq!(disp_t[i], disp_old[i] + incr[i]);
            assert_eq!(disp_tmdt[i], disp_old[i]);
        }
        assert!(
            fields
                .get(FieldRole::DispIncr)
                .unwrap()
                .as_slice()
                .iter()
                .all(|&v| v == 0.0)
        );
    }

    #[test]
    fn jacobian_untouched_when_no_integrator_is_stale() {
        let mut formulation = formulation(single_stub(), Vec::new());
        formulation.initialize(2, Nondimensional::default()).unwrap();
        let before: Vec<f64> = formulation
            .fields()
            .get(FieldRole::LumpedJacobian)
            .unwrap()
            .as_slice()
            .to_vec();

        // Same dt as initialize: no integrator reports stale.
        formulation.prestep(0.0, 0.01).unwrap();
        let after = formulation
            .fields()
            .get(FieldRole::LumpedJacobian)
            .unwrap()
            .as_slice();
        assert_eq!(before.as_slice(), after);
    }

    #[test]
    fn dt_change_triggers_exactly_one_rebuild() {
        let mut formulation = formulation(single_stub(), Vec::new());
        formulation.initialize(2, Nondimensional::default()).unwrap();
        // Build 1 happened at initialize: entries = diag * 1.
        assert_eq!(
            formulation
                .fields()
                .get(FieldRole::LumpedJacobian)
                .unwrap()
                .as_slice()[0],
            4.0
        );

        // New dt: the integrator reports stale, prestep rebuilds once.
        formulation.prestep(0.0, 0.02).unwrap();
        assert_eq!(
            formulation
                .fields()
                .get(FieldRole::LumpedJacobian)
                .unwrap()
                .as_slice()[0],
            8.0
        );
        formulation.step(0.0, 0.02).unwrap();
        formulation.poststep(0.0, 0.02).unwrap();

        // Same dt again: no further rebuild.
        formulation.prestep(0.02, 0.02).unwrap();
        assert_eq!(
            formulation
                .fields()
                .get(FieldRole::LumpedJacobian)
                .unwrap()
                .as_slice()[0],
            8.0
        );
    }

    #[test]
    fn stable_dt_is_minimum_over_integrators() {
        let tau_a = 0.8;
        let tau_b = 0.3;
        let integrators: IntegratorSet = vec![
            Box::new(StubIntegrator::new(1.0, 0.0, 0.2 * tau_a)),
            Box::new(StubIntegrator::new(1.0, 0.0, 0.2 * tau_b)),
        ];
        let formulation = formulation(integrators, Vec::new());
        assert_eq!(formulation.stable_dt(), 0.2 * tau_b);
    }

    #[test]
    fn constrained_dofs_carry_prescribed_increments_through_solve() {
        let constraints: ConstraintSet =
            vec![Box::new(DirichletConstraint::new("driven", vec![0, 1], 3.0))];
        let mut formulation = formulation(single_stub(), constraints);
        formulation.initialize(2, Nondimensional::default()).unwrap();

        formulation.prestep(0.0, 0.01).unwrap();
        formulation.step(0.0, 0.01).unwrap();

        let incr = formulation
            .fields()
            .get(FieldRole::DispIncr)
            .unwrap()
            .as_slice();
        // rate · dt on the constrained dofs, residual/diag elsewhere.
        assert!((incr[0] - 0.03).abs() < 1e-15);
        assert!((incr[1] - 0.03).abs() < 1e-15);
        assert_eq!(incr[2], 0.5);
    }
}
