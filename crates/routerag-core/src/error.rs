use std::path::PathBuf;

/// Errors that can occur across routerag.
///
/// Library crates return this type directly; the binary reports it through
/// `miette`, which is why it also derives [`miette::Diagnostic`].
///
/// # Examples
///
/// ```
/// use routerag_core::RouteragError;
///
/// let err = RouteragError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RouteragError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration, including a missing provider credential.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(routerag::config),
        help("check .routerag.toml; `routerag init` writes one with every default")
    )]
    Config(String),

    /// Embedding provider failure: transport, status, malformed or misordered response.
    #[error("embedding error: {0}")]
    #[diagnostic(code(routerag::embedding))]
    Embedding(String),

    /// Completion provider failure.
    #[error("LLM error: {0}")]
    #[diagnostic(code(routerag::llm))]
    Llm(String),

    /// A vector does not have the dimension the index or matrix expects.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index or first row.
        expected: usize,
        /// Dimension that was supplied.
        actual: usize,
    },

    /// A zero-norm row was found where unit vectors are required.
    #[error("row {row} is a zero vector and cannot be normalized")]
    DegenerateVector {
        /// Row position inside the matrix.
        row: usize,
    },

    /// Malformed or stale matrix / index artifact.
    #[error("index error: {0}")]
    #[diagnostic(code(routerag::index), help("rebuild the artifacts with `routerag build`"))]
    Index(String),

    /// SQLite failure while reading or writing the index artifact.
    #[error("database error: {0}")]
    Database(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
