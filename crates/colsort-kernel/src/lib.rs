#![forbid(unsafe_code)]
//! colsort-kernel: sort engines instantiated from compiled kernel templates.
//!
//! Two engines sit behind [`KernelAbi`]:
//! - [`IndexSorter`] buffers every output column, sorts `ArrayItemIndex`
//!   addresses and gathers rows through them;
//! - [`InPlaceSorter`] handles a single primitive column that is its own
//!   key and sorts the values directly.
//!
//! [`SortArraysKernel`] ties a sort request to the kernel cache and the
//! right engine; [`ResultIterator`] hands the result back in batches.

pub mod column;
pub mod compare;
pub mod context;
pub mod engine;
pub mod error;
pub mod facade;
pub mod factory;
pub mod iterator;
pub mod radix;

pub use context::ExecContext;
pub use engine::{InPlaceSorter, IndexSorter, KernelAbi};
pub use error::{KernelError, Result};
pub use facade::SortArraysKernel;
pub use factory::KernelFactory;
pub use iterator::ResultIterator;
