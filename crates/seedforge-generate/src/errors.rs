use thiserror::Error;

/// Error type returned by user callbacks (generators, builders, connect sources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors emitted by the synthesis engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A required parent could not be obtained.
    #[error("cannot resolve relation '{model}.{field}' at '{path}': {reason}")]
    UnresolvableRelation {
        model: String,
        field: String,
        path: String,
        reason: String,
    },
    /// The uniqueness retry budget was spent.
    #[error(
        "unique constraint '{constraint}' on '{model}' still violated at '{path}' after {attempts} attempts"
    )]
    ConstraintExhausted {
        model: String,
        constraint: String,
        path: String,
        attempts: u32,
    },
    /// A user-supplied callback failed.
    #[error("generator failed for '{model}' at '{path}'{}: {source}", field_suffix(.field))]
    Generator {
        model: String,
        path: String,
        field: Option<String>,
        #[source]
        source: BoxError,
    },
    /// The execution sink rejected the emitted statements.
    #[error("execution failed: {0}")]
    Execution(String),
    #[error(transparent)]
    Schema(#[from] seedforge_core::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|field| format!(" (field '{field}')"))
        .unwrap_or_default()
}
