use std::path::PathBuf;

use thiserror::Error;

/// Result type local to colsort-cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {waited_ms} ms waiting for kernel lock {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    /// Synthesis failed before any source was written.
    #[error("kernel synthesis failed: {0}")]
    Synth(#[from] colsort_codegen::SynthError),

    /// The toolchain rejected the source or produced no artifact.
    #[error("kernel compile failed for {signature}: {reason}")]
    Compile { signature: String, reason: String },

    /// An artifact exists but cannot be loaded.
    #[error("kernel load failed for {signature}: {reason}")]
    Load { signature: String, reason: String },

    #[error("invalid cache configuration: {0}")]
    Config(#[from] colsort_core::error::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
