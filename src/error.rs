//! Error types for graph construction, seeding and cutting.

use thiserror::Error;

/// Result type alias for carving operations.
pub type Result<T> = std::result::Result<T, CarvingError>;

/// Errors surfaced by [`GridRag`](crate::GridRag) and [`GridSegmentor`](crate::GridSegmentor).
///
/// Mutating operations validate their inputs completely before writing, so an
/// error always leaves the previous state untouched.
#[derive(Debug, Error)]
pub enum CarvingError {
    /// An array length or grid shape disagrees with the grid or the node/edge count.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A node id is out of range, or a seed value is not representable.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// The operation needs a graph, but none was built or restored yet.
    #[error("no graph: call preprocessing or restore a serialization first")]
    UnpreprocessedState,

    /// Serialized topology is malformed or its counts are inconsistent.
    #[error("malformed serialization: {0}")]
    SerializationFormat(String),

    /// The cut could not be computed.
    #[error("solver failure: {0}")]
    SolverFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CarvingError {
    pub fn shape_mismatch(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        Self::ShapeMismatch {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    pub fn invalid_seed(details: impl Into<String>) -> Self {
        Self::InvalidSeed(details.into())
    }

    pub fn serialization_format(details: impl Into<String>) -> Self {
        Self::SerializationFormat(details.into())
    }

    pub fn solver_failure(details: impl Into<String>) -> Self {
        Self::SolverFailure(details.into())
    }
}
