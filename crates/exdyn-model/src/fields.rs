//! Field buffers and the field-generation protocol.
//!
//! The explicit formulation keeps several generations of the
//! displacement field alive at once (previous step, current step,
//! pending increment) alongside the residual and the lumped Jacobian.
//! Each generation is a [`Field`]: a vector buffer over the
//! discretization with a fixed number of degrees of freedom per point.
//! A [`FieldSet`] holds exactly one field per [`FieldRole`] and
//! provides the alias-free cross-field operations (copy, accumulate,
//! zero) that the generation rotation is built from.
//!
//! Layout compatibility is checked on every cross-field operation;
//! a mismatch is a caller bug and surfaces as a fatal error.

use nalgebra::DVector;

use crate::error::{ModelError, Result};

/// Section layout of a field: how many points the discretization has
/// and how many degrees of freedom each point carries.
///
/// Two fields are compatible exactly when their layouts are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Number of points (vertices or quadrature points) in the
    /// discretization.
    pub num_points: usize,
    /// Degrees of freedom per point.
    pub dofs_per_point: usize,
}

impl Layout {
    pub fn new(num_points: usize, dofs_per_point: usize) -> Self {
        Self {
            num_points,
            dofs_per_point,
        }
    }

    /// Total number of degrees of freedom in a field with this layout.
    pub fn total_dofs(&self) -> usize {
        self.num_points * self.dofs_per_point
    }
}

/// Role of a field within the explicit time-stepping sequence.
///
/// Roles replace string-keyed lookup: each role names one generation
/// tag and there is exactly one field per role in a [`FieldSet`].
///
/// The discriminant is the slot index inside `FieldSet`; the relative
/// order of `DispIncr`, `Residual`, `LumpedJacobian` is relied on by
/// `FieldSet::solver_views`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum FieldRole {
    /// Displacement at the current time t.
    DispT = 0,
    /// Displacement at the previous time t - dt.
    DispTmdt = 1,
    /// Displacement increment being solved for over [t, t + dt].
    DispIncr = 2,
    /// Residual of the explicit update equation.
    Residual = 3,
    /// Diagonal (lumped) system operator stored as a field.
    LumpedJacobian = 4,
}

impl FieldRole {
    pub const COUNT: usize = 5;

    /// Generation tag used in diagnostics output.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldRole::DispT => "disp(t)",
            FieldRole::DispTmdt => "disp(t-dt)",
            FieldRole::DispIncr => "dispIncr(t->t+dt)",
            FieldRole::Residual => "residual",
            FieldRole::LumpedJacobian => "jacobian",
        }
    }
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A named, typed buffer of per-point values over the discretization.
///
/// Storage is exclusively owned by the field; copying a layout never
/// aliases data.
#[derive(Debug, Clone)]
pub struct Field {
    role: FieldRole,
    layout: Layout,
    data: DVector<f64>,
}

impl Field {
    /// Create a zeroed field with the given role and layout.
    pub fn zeros(role: FieldRole, layout: Layout) -> Self {
        Self {
            role,
            layout,
            data: DVector::zeros(layout.total_dofs()),
        }
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Set every entry to zero, regardless of prior contents.
    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut_slice()
    }

    pub fn vector(&self) -> &DVector<f64> {
        &self.data
    }

    /// Overwrite this field's contents with `src`'s.
    ///
    /// Layouts must match; roles may differ (that is the point of a
    /// generation copy).
    pub fn copy_from(&mut self, src: &Field) -> Result<()> {
        self.check_layout(src)?;
        self.data.copy_from(&src.data);
        Ok(())
    }

    /// Elementwise `self += other`. Mutates the left operand only.
    pub fn add_assign(&mut self, other: &Field) -> Result<()> {
        self.check_layout(other)?;
        self.data += &other.data;
        Ok(())
    }

    fn check_layout(&self, other: &Field) -> Result<()> {
        if self.layout != other.layout {
            return Err(ModelError::LayoutMismatch {
                expected: self.layout,
                found: other.layout,
            });
        }
        Ok(())
    }
}

/// The set of fields owned by one formulation instance.
///
/// Exactly one field per role. No operation here rotates generations
/// by swapping storage: rotation is expressed through `copy` and
/// `add_assign` on named roles, so both displacement buffers hold
/// pre-step values until the commit overwrites them in order.
#[derive(Debug, Default)]
pub struct FieldSet {
    slots: [Option<Field>; FieldRole::COUNT],
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a zeroed field for `role` with the given layout.
    pub fn add(&mut self, role: FieldRole, layout: Layout) -> Result<()> {
        let slot = &mut self.slots[role as usize];
        if slot.is_some() {
            return Err(ModelError::DuplicateField(role));
        }
        *slot = Some(Field::zeros(role, layout));
        Ok(())
    }

    /// Insert a new zeroed field for `role` sharing the layout of the
    /// `source` field, with independent storage.
    pub fn copy_layout(&mut self, role: FieldRole, source: FieldRole) -> Result<()> {
        let layout = self.get(source)?.layout();
        self.add(role, layout)
    }

    pub fn contains(&self, role: FieldRole) -> bool {
        self.slots[role as usize].is_some()
    }

    pub fn get(&self, role: FieldRole) -> Result<&Field> {
        self.slots[role as usize]
            .as_ref()
            .ok_or(ModelError::MissingField(role))
    }

    pub fn get_mut(&mut self, role: FieldRole) -> Result<&mut Field> {
        self.slots[role as usize]
            .as_mut()
            .ok_or(ModelError::MissingField(role))
    }

    pub fn zero(&mut self, role: FieldRole) -> Result<()> {
        self.get_mut(role)?.zero();
        Ok(())
    }

    /// Overwrite the `dst` field with the contents of `src`.
    pub fn copy(&mut self, dst: FieldRole, src: FieldRole) -> Result<()> {
        let (dst, src) = self.disjoint_mut(dst, src)?;
        dst.copy_from(src)
    }

    /// Elementwise `dst += src`. Mutates `dst` only.
    pub fn add_assign(&mut self, dst: FieldRole, src: FieldRole) -> Result<()> {
        let (dst, src) = self.disjoint_mut(dst, src)?;
        dst.add_assign(src)
    }

    /// Borrow the three buffers of the algebraic solve at once:
    /// mutable increment, shared jacobian, shared residual.
    pub fn solver_views(&mut self) -> Result<(&mut Field, &Field, &Field)> {
        // Slot order: DispIncr < Residual < LumpedJacobian.
        let (left, right) = self.slots.split_at_mut(FieldRole::Residual as usize);
        let incr = left[FieldRole::DispIncr as usize]
            .as_mut()
            .ok_or(ModelError::MissingField(FieldRole::DispIncr))?;
        let residual = right[0]
            .as_ref()
            .ok_or(ModelError::MissingField(FieldRole::Residual))?;
        let jacobian = right[1]
            .as_ref()
            .ok_or(ModelError::MissingField(FieldRole::LumpedJacobian))?;
        Ok((incr, jacobian, residual))
    }

    fn disjoint_mut(&mut self, dst: FieldRole, src: FieldRole) -> Result<(&mut Field, &Field)> {
        let (i, j) = (dst as usize, src as usize);
        if i == j {
            return Err(ModelError::AliasedRoles(dst));
        }
        let (dst_slot, src_slot) = if i < j {
            let (lo, hi) = self.slots.split_at_mut(j);
            (&mut lo[i], &hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(i);
            (&mut hi[0], &lo[j])
        };
        let dst = dst_slot.as_mut().ok_or(ModelError::MissingField(dst))?;
        let src = src_slot.as_ref().ok_or(ModelError::MissingField(src))?;
        Ok((dst, src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(4, 2)
    }

    fn filled(role: FieldRole, value: f64) -> Field {
        let mut field = Field::zeros(role, layout());
        for entry in field.as_mut_slice() {
            *entry = value;
        }
        field
    }

    #[test]
    fn zero_is_idempotent() {
        let mut field = filled(FieldRole::DispT, 3.5);
        field.zero();
        assert!(field.as_slice().iter().all(|&v| v == 0.0));
        field.zero();
        assert!(field.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(field.len(), layout().total_dofs());
    }

    #[test]
    fn copy_layout_matches_source_and_is_independent() {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispIncr, layout()).unwrap();
        fields
            .copy_layout(FieldRole::Residual, FieldRole::DispIncr)
            .unwrap();

        let residual = fields.get(FieldRole::Residual).unwrap();
        assert_eq!(residual.layout(), layout());
        assert!(residual.as_slice().iter().all(|&v| v == 0.0));

        // Mutating the source must not touch the new field.
        fields.get_mut(FieldRole::DispIncr).unwrap().as_mut_slice()[0] = 9.0;
        assert_eq!(fields.get(FieldRole::Residual).unwrap().as_slice()[0], 0.0);
    }

    #[test]
    fn add_assign_mutates_left_operand_only() {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispT, layout()).unwrap();
        fields.add(FieldRole::DispIncr, layout()).unwrap();
        fields.get_mut(FieldRole::DispT).unwrap().as_mut_slice()[1] = 1.0;
        fields.get_mut(FieldRole::DispIncr).unwrap().as_mut_slice()[1] = 2.5;

        fields
            .add_assign(FieldRole::DispT, FieldRole::DispIncr)
            .unwrap();

        assert_eq!(fields.get(FieldRole::DispT).unwrap().as_slice()[1], 3.5);
        assert_eq!(fields.get(FieldRole::DispIncr).unwrap().as_slice()[1], 2.5);
    }

    #[test]
    fn layout_mismatch_is_fatal() {
        let mut a = Field::zeros(FieldRole::DispT, Layout::new(4, 2));
        let b = Field::zeros(FieldRole::DispIncr, Layout::new(4, 3));
        let err = a.add_assign(&b).unwrap_err();
        assert!(matches!(err, ModelError::LayoutMismatch { .. }));
    }

    #[test]
    fn duplicate_role_rejected() {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispT, layout()).unwrap();
        let err = fields.add(FieldRole::DispT, layout()).unwrap_err();
        assert_eq!(err, ModelError::DuplicateField(FieldRole::DispT));
    }

    #[test]
    fn aliased_copy_rejected() {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispT, layout()).unwrap();
        let err = fields.copy(FieldRole::DispT, FieldRole::DispT).unwrap_err();
        assert_eq!(err, ModelError::AliasedRoles(FieldRole::DispT));
    }

    #[test]
    fn solver_views_borrow_all_three_buffers() {
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispIncr, layout()).unwrap();
        fields.add(FieldRole::Residual, layout()).unwrap();
        fields.add(FieldRole::LumpedJacobian, layout()).unwrap();

        {
            let (incr, jacobian, residual) = fields.solver_views().unwrap();
            assert_eq!(incr.role(), FieldRole::DispIncr);
            assert_eq!(jacobian.role(), FieldRole::LumpedJacobian);
            assert_eq!(residual.role(), FieldRole::Residual);
            incr.as_mut_slice()[0] = 1.0;
        }
        assert_eq!(fields.get(FieldRole::DispIncr).unwrap().as_slice()[0], 1.0);
    }

    #[test]
    fn generation_rotation_commits_in_order() {
        // disp(t-dt) <- disp(t); disp(t) += incr; incr <- 0.
        let mut fields = FieldSet::new();
        fields.add(FieldRole::DispT, layout()).unwrap();
        fields.add(FieldRole::DispTmdt, layout()).unwrap();
        fields.add(FieldRole::DispIncr, layout()).unwrap();
        fields.get_mut(FieldRole::DispT).unwrap().as_mut_slice()[0] = 10.0;
        fields.get_mut(FieldRole::DispIncr).unwrap().as_mut_slice()[0] = 0.5;

        fields.copy(FieldRole::DispTmdt, FieldRole::DispT).unwrap();
        fields
            .add_assign(FieldRole::DispT, FieldRole::DispIncr)
            .unwrap();
        fields.zero(FieldRole::DispIncr).unwrap();

        assert_eq!(fields.get(FieldRole::DispTmdt).unwrap().as_slice()[0], 10.0);
        assert_eq!(fields.get(FieldRole::DispT).unwrap().as_slice()[0], 10.5);
        assert_eq!(fields.get(FieldRole::DispIncr).unwrap().as_slice()[0], 0.0);
    }
}
