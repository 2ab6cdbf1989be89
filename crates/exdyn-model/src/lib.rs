//! Data model for the explicit elastodynamics engine.
//!
//! This crate owns the discretization-facing data structures shared by
//! the solver and any driver: field buffers with a per-point section
//! layout, the field-generation bookkeeping used by the explicit
//! time-stepping scheme, elastic material property records, and the
//! nondimensionalization scales applied at problem setup.

pub mod error;
pub mod fields;
pub mod nondimensional;
pub mod properties;

pub use error::ModelError;
pub use fields::{Field, FieldRole, FieldSet, Layout};
pub use nondimensional::Nondimensional;
pub use properties::{ElasticProperties, PropertyDb};
