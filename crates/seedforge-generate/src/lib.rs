//! Relational synthesis engine for Seedforge.
//!
//! Given a [`seedforge_core::DataModel`] and per-model input specifications,
//! this crate produces deterministic, referentially consistent rows. Parents
//! are resolved (generated or connected) before a row's own fields, identifier
//! fields are stored before anything else, unique constraints are repaired
//! with seeded retries, and children inherit the row's linking columns.

mod engine;
pub mod constraints;
pub mod errors;
pub mod hints;
pub mod inputs;
pub mod logging;
pub mod model;
pub mod output;
pub mod pick;
pub mod plan;
pub mod seed;
pub mod serialize;
pub mod statements;
pub mod store;

pub use constraints::ConstraintTracker;
pub use errors::{BoxError, GenerationError};
pub use hints::{Fingerprint, GenerateFieldOptions};
pub use inputs::{
    ConnectMode, ConnectSource, Count, CountHelper, FieldContext, FieldInput, InputContext,
    ModelRecord, ParentChoice, ParentInput, RowInput, RowInputs, UserModel, UserModels,
};
pub use logging::{LogFormat, init_logging};
pub use model::{GenerateOptions, GenerationReport, ModelReport};
pub use plan::{ClientState, Generated, Plan};
pub use seed::{PathSegment, SeedPath};
pub use statements::{ExecutionSink, MemorySink, to_statements};
pub use store::{RowId, RowState, Store, StoredRow};
