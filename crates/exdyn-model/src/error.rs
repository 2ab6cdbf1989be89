//! Error types for exdyn-model

use thiserror::Error;

use crate::fields::{FieldRole, Layout};

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("missing field {0}")]
    MissingField(FieldRole),

    #[error("field {0} already exists")]
    DuplicateField(FieldRole),

    #[error("layout mismatch: expected {expected:?}, found {found:?}")]
    LayoutMismatch { expected: Layout, found: Layout },

    #[error("field {0} used as both source and destination")]
    AliasedRoles(FieldRole),

    #[error("invalid material property {name}: {value}")]
    InvalidProperty { name: &'static str, value: f64 },

    #[error("invalid scale {name}: {value}")]
    InvalidScale { name: &'static str, value: f64 },
}
