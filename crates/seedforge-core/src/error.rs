use thiserror::Error;

/// Core error type shared across Seedforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A model name was not found in the data model.
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    /// The data model violates an invariant the engine relies on.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// The data model could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by Seedforge crates.
pub type Result<T> = std::result::Result<T, Error>;
