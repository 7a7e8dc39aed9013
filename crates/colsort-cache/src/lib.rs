#![forbid(unsafe_code)]
//! colsort-cache: signature-keyed compiled kernel cache.
//!
//! `KernelCache::obtain` is the compile & load pipeline: take the signature
//! lock, load `<sig>.kernel` if it is there, otherwise synthesize the source,
//! compile it with the configured [`Toolchain`] and load the result. Loaded
//! modules are memoized per process.
//!
//! Layout of a cache directory:
//! - `<sig>.kernel`: sealed artifact (see [`artifact`])
//! - `<sig>.src`: kernel source, present only while a compile is running
//! - `<sig>.lock`: carries the advisory lock serializing compilation of
//!   `<sig>`; the file persists, the lock lives only while held

pub mod artifact;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod store;
pub mod toolchain;

pub use error::{CacheError, Result};
pub use lock::{SignatureLock, SignatureLockGuard};
pub use pipeline::{KernelCache, LoadedKernel};
pub use store::ArtifactStore;
pub use toolchain::{TemplateCompiler, Toolchain};
