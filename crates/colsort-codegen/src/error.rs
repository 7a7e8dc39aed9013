use thiserror::Error;

/// Result type local to colsort-codegen.
pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    /// The request itself is malformed; nothing was emitted.
    #[error("sort spec error: {0}")]
    Spec(#[from] colsort_core::error::Error),

    /// A template violates one of its structural rules.
    #[error("invalid kernel template: {0}")]
    Template(String),

    /// Kernel source text could not be parsed back into a template.
    #[error("kernel source parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
