use arrow::error::ArrowError;
use thiserror::Error;

/// Result type local to colsort-kernel.
pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Debug, Error)]
pub enum KernelError {
    /// Malformed sort request, rejected before synthesis.
    #[error("spec error: {0}")]
    Spec(#[from] colsort_core::error::Error),

    /// Compile, load, lock or cache I/O failure.
    #[error(transparent)]
    Cache(#[from] colsort_cache::CacheError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Budget(#[from] colsort_mem::Error),

    /// The kernel was driven out of order or fed the wrong columns.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("result iterator exhausted after {total} rows")]
    Exhausted { total: usize },
}

impl KernelError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        KernelError::Precondition(msg.into())
    }
}
