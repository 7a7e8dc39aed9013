#![forbid(unsafe_code)]
//! colsort: schema-specialized sort kernels for Arrow record batches.
//!
//! A sort request (key fields, output schema, null order, direction) is
//! fingerprinted into a signature, synthesized into a kernel template,
//! compiled once into a checksummed artifact in an on-disk cache, and
//! instantiated as a monomorphized engine. Callers feed batches with
//! `evaluate` and read the sorted rows back through a batched iterator.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use arrow::array::{ArrayRef, Int64Array};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use colsort::{ExecContext, KernelCache, SortArraysKernel, SortConfig, SortSpec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SortConfig::from_env();
//! let cache = KernelCache::open(&config)?;
//! let ctx = ExecContext::from_config(&config);
//!
//! let schema = Arc::new(Schema::new(vec![Field::new("k", DataType::Int64, true)]));
//! let keys = vec![Arc::clone(&schema.fields()[0])];
//! let spec = SortSpec::from_flags(keys, Arc::clone(&schema), false, true)?;
//!
//! let mut kernel = SortArraysKernel::try_new(&cache, &ctx, &spec, config.batch_size)?;
//! kernel.evaluate(&[Arc::new(Int64Array::from(vec![3, 1, 2])) as ArrayRef])?;
//! for batch in kernel.make_result_iterator(schema)? {
//!     println!("{} rows", batch?.num_rows());
//! }
//! # Ok(())
//! # }
//! ```

pub use colsort_cache;
pub use colsort_codegen;
pub use colsort_core;
pub use colsort_kernel;
pub use colsort_mem;

pub use colsort_cache::{CacheError, KernelCache, LoadedKernel, TemplateCompiler, Toolchain};
pub use colsort_codegen::{KernelTemplate, Strategy, SynthError};
pub use colsort_core::prelude::{
    ArrayItemIndex, ColumnType, Direction, NullOrder, Signature, SortConfig, SortSpec,
};
pub use colsort_kernel::{
    ExecContext, KernelAbi, KernelError, KernelFactory, ResultIterator, SortArraysKernel,
};
