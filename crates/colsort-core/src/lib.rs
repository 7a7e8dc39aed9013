#![forbid(unsafe_code)]
//! colsort-core: sort specifications, column type descriptors, signatures,
//! configuration and hashing shared by every colsort crate.
//!
//! Nothing in here allocates arrays, touches the filesystem or compiles
//! kernels. Higher crates (`colsort-codegen`, `colsort-cache`,
//! `colsort-kernel`) build on these types.

pub mod config;
pub mod describe;
pub mod error;
pub mod hash;
pub mod index;
pub mod prelude;
pub mod signature;
pub mod spec;

/// Crate version, recorded in kernel artifacts for provenance.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
