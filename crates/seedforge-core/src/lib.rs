//! Core contracts for Seedforge.
//!
//! This crate defines the typed data model consumed by the synthesis engine,
//! the field classifier and the value type stored in generated rows.

pub mod error;
pub mod schema;
pub mod value;

pub use error::{Error, Result};
pub use schema::{
    ChildField, DataModel, Field, GroupedFields, Model, ParentField, ScalarField,
    UniqueConstraint, group_fields,
};
pub use value::{Row, Value};

/// Current contract version for serialized data models.
pub const DATA_MODEL_VERSION: &str = "0.1";
