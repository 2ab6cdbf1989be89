//! Constitutive (rheology) contract and reference implementations.
//!
//! A rheology maps strain and prior internal state at one spatial
//! point to updated stress, the tangent elastic-constant tensor, and
//! updated internal state. Evaluation is a pure per-point function
//! with no cross-point state, so integrators may fan it out across
//! points in parallel.
//!
//! Stress convention (2-D plane strain, engineering ordering):
//! `[σxx, σyy, σxy]`, with the elastic constants forming a symmetric
//! 3×3 tensor:
//!
//! ```text
//! C1111 = λ + 2μ    C1122 = λ         C1112 = 0
//!                   C2222 = λ + 2μ    C2212 = 0
//!                                     C1212 = 2μ
//! ```

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use exdyn_model::ElasticProperties;

/// Result of one constitutive evaluation at one point.
#[derive(Debug, Clone)]
pub struct RheologyUpdate {
    /// Stress tensor components, length `tensor_size`.
    pub stress: DVector<f64>,
    /// Symmetric tangent tensor, `tensor_size × tensor_size`.
    pub elastic_consts: DMatrix<f64>,
    /// Updated internal state, length `num_state_vars`.
    pub state: Vec<f64>,
}

/// Constitutive law contract.
///
/// Implementations must be pure per point: no side effects beyond the
/// returned [`RheologyUpdate`], no dependence on other points. Slice
/// lengths are preconditions checked with assertions; violating them
/// is a caller bug.
pub trait Rheology: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of stress/strain tensor components.
    fn tensor_size(&self) -> usize;

    /// Length of the per-point internal state vector.
    fn num_state_vars(&self) -> usize;

    /// Largest stable explicit time step for a material with these
    /// properties. Infinite for rate-independent laws.
    fn stable_dt(&self, props: &ElasticProperties) -> f64;

    /// Evaluate stress, tangent, and updated state at one point.
    fn evaluate(
        &self,
        strain: &[f64],
        props: &ElasticProperties,
        state: &[f64],
        initial_stress: &[f64],
        initial_strain: &[f64],
    ) -> RheologyUpdate;
}

/// Plane-strain isotropic elastic-constant tensor.
fn plane_strain_consts(mu: f64, lambda: f64) -> Matrix3<f64> {
    let c1111 = lambda + 2.0 * mu;
    Matrix3::new(
        c1111, lambda, 0.0, //
        lambda, c1111, 0.0, //
        0.0, 0.0, 2.0 * mu,
    )
}

fn plane_strain_stress(
    consts: &Matrix3<f64>,
    strain: &[f64],
    initial_stress: &[f64],
    initial_strain: &[f64],
) -> Vector3<f64> {
    let strain = Vector3::from_column_slice(strain);
    let strain0 = Vector3::from_column_slice(initial_strain);
    let stress0 = Vector3::from_column_slice(initial_stress);
    consts * (strain - strain0) + stress0
}

/// Linear Maxwell viscoelastic material, 2-D plane strain.
///
/// Internal state: total strain (3 components) followed by viscous
/// strain (4 components: xx, yy, zz, xy). Each evaluation carries the
/// current total strain and its deviatoric decomposition forward as
/// the state consumed by the next evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxwellPlaneStrain;

impl MaxwellPlaneStrain {
    pub const TENSOR_SIZE: usize = 3;
    pub const NUM_STATE_VARS: usize = 7;

    /// Stability factor applied to the relaxation time.
    const STABLE_FRACTION: f64 = 0.2;
}

impl Rheology for MaxwellPlaneStrain {
    fn name(&self) -> &'static str {
        "maxwell-plane-strain"
    }

    fn tensor_size(&self) -> usize {
        Self::TENSOR_SIZE
    }

    fn num_state_vars(&self) -> usize {
        Self::NUM_STATE_VARS
    }

    fn stable_dt(&self, props: &ElasticProperties) -> f64 {
        Self::STABLE_FRACTION * props.maxwell_time
    }

    fn evaluate(
        &self,
        strain: &[f64],
        props: &ElasticProperties,
        state: &[f64],
        initial_stress: &[f64],
        initial_strain: &[f64],
    ) -> RheologyUpdate {
        assert_eq!(strain.len(), Self::TENSOR_SIZE);
        assert_eq!(state.len(), Self::NUM_STATE_VARS);
        assert_eq!(initial_stress.len(), Self::TENSOR_SIZE);
        assert_eq!(initial_strain.len(), Self::TENSOR_SIZE);

        let consts = plane_strain_consts(props.mu, props.lambda);
        let stress = plane_strain_stress(&consts, strain, initial_stress, initial_strain);

        // Deviatoric/volumetric split; the deviatoric part is the
        // viscous strain carried forward.
        let mean = (strain[0] + strain[1]) / 3.0;
        let viscous = [strain[0] - mean, strain[1] - mean, -mean, strain[2]];

        let mut new_state = Vec::with_capacity(Self::NUM_STATE_VARS);
        new_state.extend_from_slice(strain);
        new_state.extend_from_slice(&viscous);

        RheologyUpdate {
            stress: DVector::from_column_slice(stress.as_slice()),
            elastic_consts: DMatrix::from_fn(3, 3, |i, j| consts[(i, j)]),
            state: new_state,
        }
    }
}

/// Rate-independent isotropic elastic material, 2-D plane strain.
///
/// Same stress law as the Maxwell material without relaxation: no
/// internal state and no stability bound of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticPlaneStrain;

impl ElasticPlaneStrain {
    pub const TENSOR_SIZE: usize = 3;
}

impl Rheology for ElasticPlaneStrain {
    fn name(&self) -> &'static str {
        "elastic-plane-strain"
    }

    fn tensor_size(&self) -> usize {
        Self::TENSOR_SIZE
    }

    fn num_state_vars(&self) -> usize {
        0
    }

    fn stable_dt(&self, _props: &ElasticProperties) -> f64 {
        f64::INFINITY
    }

    fn evaluate(
        &self,
        strain: &[f64],
        props: &ElasticProperties,
        state: &[f64],
        initial_stress: &[f64],
        initial_strain: &[f64],
    ) -> RheologyUpdate {
        assert_eq!(strain.len(), Self::TENSOR_SIZE);
        assert!(state.is_empty());

        let consts = plane_strain_consts(props.mu, props.lambda);
        let stress = plane_strain_stress(&consts, strain, initial_stress, initial_strain);

        RheologyUpdate {
            stress: DVector::from_column_slice(stress.as_slice()),
            elastic_consts: DMatrix::from_fn(3, 3, |i, j| consts[(i, j)]),
            state: Vec::new(),
        }
    }
}
