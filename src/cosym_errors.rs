use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CosymError {
    #[error("Mismatched array length for `{field}`: expected {expected}, got {actual}")]
    MismatchedArrayLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Reflection batch is empty")]
    EmptyReflectionBatch,

    #[error("Invalid coordinate vector length: got {actual}, expected dim * n_pairs = {expected}")]
    CoordinateLength { actual: usize, expected: usize },

    #[error("Invalid weighting scheme: {0} (expected \"count\" or \"standard_error\")")]
    InvalidWeights(String),

    #[error("Embedding dimension must be at least 2, got {0}")]
    InvalidDimension(usize),

    #[error("Worker pool size must be at least 1")]
    InvalidWorkerCount,

    #[error("Invalid unit cell: {0}")]
    InvalidUnitCell(String),

    #[error("Cell reduction did not converge after {0} iterations")]
    ReductionNotConverged(usize),

    #[error("Invalid symmetry operation triplet: {0}")]
    InvalidTriplet(String),

    #[error("Symmetry operation is not invertible: {0}")]
    NonInvertibleOperation(String),

    #[error("Group closure exceeded {limit} operations; the operation set is inconsistent")]
    GroupOrderOverflow { limit: usize },

    #[error("Unable to build the worker pool: {0}")]
    WorkerPool(String),
}
