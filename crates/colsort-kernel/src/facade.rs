//! `SortArraysKernel`: the one type callers construct.

use std::sync::Arc;

use arrow::array::{ArrayRef, FixedSizeBinaryArray};
use arrow::datatypes::{FieldRef, SchemaRef};
use arrow::record_batch::RecordBatch;

use colsort_cache::{KernelCache, LoadedKernel};
use colsort_codegen::{synthesize, Strategy};
use colsort_core::signature::Signature;
use colsort_core::spec::SortSpec;

use crate::context::ExecContext;
use crate::engine::KernelAbi;
use crate::error::{KernelError, Result};
use crate::factory::KernelFactory;
use crate::iterator::ResultIterator;

/// Sorts buffered batches with a kernel specialized for one schema, key list,
/// null order and direction.
///
/// Construction picks the strategy, computes the signature, obtains the
/// compiled kernel from the cache (synthesizing and compiling it on a miss)
/// and instantiates it. Every other call forwards to that instance.
pub struct SortArraysKernel {
    strategy: Strategy,
    signature: Signature,
    loaded: Arc<LoadedKernel>,
    kernel: Box<dyn KernelAbi>,
}

impl SortArraysKernel {
    pub const NAME: &'static str = "SortArraysToIndicesKernel";

    pub fn try_new(
        cache: &KernelCache,
        ctx: &ExecContext,
        spec: &SortSpec,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 || batch_size > u32::MAX as usize {
            return Err(KernelError::precondition(format!(
                "batch_size {batch_size} is out of range"
            )));
        }
        let strategy = Strategy::select(spec);
        let signature = Signature::of(spec, batch_size);
        let loaded = cache.obtain(&signature, || synthesize(spec, strategy, batch_size))?;
        if loaded.template.strategy != strategy {
            return Err(KernelError::precondition(format!(
                "cached kernel {} uses the {} engine, expected {}",
                loaded.signature,
                loaded.template.strategy.name(),
                strategy.name()
            )));
        }
        let kernel = KernelFactory::new(Arc::clone(&loaded)).make(ctx)?;

        tracing::debug!(
            signature = %signature,
            strategy = strategy.name(),
            keys = spec.keys().len(),
            fields = spec.schema().fields().len(),
            "constructed sort kernel"
        );
        Ok(Self {
            strategy,
            signature,
            loaded,
            kernel,
        })
    }

    /// Resolve `keys` against `schema` and construct the kernel.
    pub fn from_fields(
        cache: &KernelCache,
        ctx: &ExecContext,
        keys: Vec<FieldRef>,
        schema: SchemaRef,
        nulls_first: bool,
        asc: bool,
        batch_size: usize,
    ) -> Result<Self> {
        let spec = SortSpec::from_flags(keys, schema, nulls_first, asc)?;
        Self::try_new(cache, ctx, &spec, batch_size)
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn loaded(&self) -> &LoadedKernel {
        &self.loaded
    }

    pub fn evaluate(&mut self, columns: &[ArrayRef]) -> Result<()> {
        self.kernel.evaluate(columns)
    }

    pub fn evaluate_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.kernel.evaluate(batch.columns())
    }

    pub fn finish(&mut self) -> Result<Option<FixedSizeBinaryArray>> {
        self.kernel.finish()
    }

    pub fn make_result_iterator(&mut self, schema: SchemaRef) -> Result<ResultIterator> {
        self.kernel.make_result_iterator(schema)
    }

    pub fn total_rows(&self) -> usize {
        self.kernel.total_rows()
    }
}

impl std::fmt::Debug for SortArraysKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortArraysKernel")
            .field("strategy", &self.strategy)
            .field("signature", &self.signature.key())
            .field("rows", &self.kernel.total_rows())
            .finish()
    }
}
