//! Batched result iterator.

use std::ops::Range;

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{KernelError, Result};

/// Produces the output columns for one window of the sorted order.
pub(crate) trait BatchEmitter: Send {
    fn emit(&self, rows: Range<usize>) -> Vec<ArrayRef>;
}

/// Pull-based cursor over a finalized kernel. Not restartable; build another
/// iterator from the kernel to read the result again.
pub struct ResultIterator {
    schema: SchemaRef,
    total: usize,
    offset: usize,
    batch_size: usize,
    emitter: Box<dyn BatchEmitter>,
}

impl ResultIterator {
    pub const NAME: &'static str = "SortArraysToIndicesResultIterator";

    pub(crate) fn new(
        schema: SchemaRef,
        total: usize,
        batch_size: usize,
        emitter: Box<dyn BatchEmitter>,
    ) -> Self {
        Self {
            schema,
            total,
            offset: 0,
            batch_size: batch_size.max(1),
            emitter,
        }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn has_next(&self) -> bool {
        self.offset < self.total
    }

    pub fn total_rows(&self) -> usize {
        self.total
    }

    pub fn remaining_rows(&self) -> usize {
        self.total - self.offset
    }

    /// Next `min(batch_size, remaining)` rows as one record batch.
    pub fn next_batch(&mut self) -> Result<RecordBatch> {
        if !self.has_next() {
            return Err(KernelError::Exhausted { total: self.total });
        }
        let len = self.batch_size.min(self.total - self.offset);
        let rows = self.offset..self.offset + len;
        let columns = self.emitter.emit(rows.clone());
        let batch = RecordBatch::try_new(self.schema.clone(), columns)?;
        self.offset += len;
        tracing::trace!(
            start = rows.start,
            rows = len,
            remaining = self.total - self.offset,
            "emitted sorted batch"
        );
        Ok(batch)
    }
}

impl Iterator for ResultIterator {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.has_next().then(|| self.next_batch())
    }
}

impl std::fmt::Debug for ResultIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultIterator")
            .field("total", &self.total)
            .field("offset", &self.offset)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
