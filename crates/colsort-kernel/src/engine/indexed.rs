//! Index-based engine: sorts `ArrayItemIndex` addresses, never the rows.

use std::ops::Range;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, FixedSizeBinaryArray};
use arrow::buffer::Buffer;
use arrow::datatypes::SchemaRef;

use colsort_cache::LoadedKernel;
use colsort_codegen::{KernelTemplate, SortCall, Strategy};
use colsort_core::index::ArrayItemIndex;
use colsort_core::spec::{Direction, NullOrder};
use colsort_mem::Reservation;

use crate::column::{instantiate_column, CachedColumn};
use crate::compare::RowComparator;
use crate::context::ExecContext;
use crate::engine::{check_columns, check_schema, KernelAbi};
use crate::error::{KernelError, Result};
use crate::iterator::{BatchEmitter, ResultIterator};

enum State {
    Accumulating {
        columns: Vec<Box<dyn CachedColumn>>,
        batch_rows: Vec<u32>,
    },
    Finalized(Arc<SortedIndex>),
    /// A finalize attempt failed half-way; the buffered input is gone.
    Failed,
}

/// Finalized state shared by every iterator of one kernel.
struct SortedIndex {
    columns: Vec<Arc<dyn CachedColumn>>,
    indices: Vec<ArrayItemIndex>,
    _reservation: Reservation,
}

/// General engine, one instantiation per null order and direction.
pub struct IndexSorter<const NULLS_FIRST: bool, const ASC: bool> {
    kernel: Arc<LoadedKernel>,
    ctx: ExecContext,
    comparator: RowComparator<NULLS_FIRST, ASC>,
    state: State,
    total_rows: usize,
    nulls_total: usize,
}

impl<const NULLS_FIRST: bool, const ASC: bool> IndexSorter<NULLS_FIRST, ASC> {
    pub fn new(kernel: Arc<LoadedKernel>, ctx: &ExecContext) -> Result<Self> {
        let t = &kernel.template;
        if t.strategy != Strategy::Indexed {
            return Err(KernelError::precondition(format!(
                "kernel {} was built for the {} engine",
                kernel.signature,
                t.strategy.name()
            )));
        }
        if t.policy.null_order != NullOrder::from_nulls_first(NULLS_FIRST)
            || t.policy.direction != Direction::from_asc(ASC)
        {
            return Err(KernelError::precondition(format!(
                "kernel {} policy does not match this instantiation",
                kernel.signature
            )));
        }
        let columns = t
            .fields
            .iter()
            .map(|f| instantiate_column(f.column_type))
            .collect();
        Ok(Self {
            comparator: RowComparator::from_chain(&t.comparator),
            state: State::Accumulating {
                columns,
                batch_rows: Vec::new(),
            },
            kernel,
            ctx: ctx.clone(),
            total_rows: 0,
            nulls_total: 0,
        })
    }

    fn template(&self) -> &KernelTemplate {
        &self.kernel.template
    }

    fn finalize(&mut self) -> Result<Arc<SortedIndex>> {
        if let State::Finalized(sorted) = &self.state {
            return Ok(Arc::clone(sorted));
        }

        let total = self.total_rows;
        let nulls = self.nulls_total;
        let reservation = self
            .ctx
            .reserve(total * ArrayItemIndex::WIDTH, "sort_indices")?;

        let (columns, batch_rows) = match std::mem::replace(&mut self.state, State::Failed) {
            State::Accumulating {
                columns,
                batch_rows,
            } => (columns, batch_rows),
            _ => {
                return Err(KernelError::precondition(
                    "kernel failed during an earlier finalize",
                ))
            }
        };
        let columns: Vec<Arc<dyn CachedColumn>> = columns.into_iter().map(Arc::from).collect();
        let t = &self.kernel.template;

        // Placement pass: arrival order within each category.
        let mut indices = vec![ArrayItemIndex::default(); total];
        let mut valid_at = t.placement.valid.offset(total, nulls);
        let mut null_at = t.placement.null.offset(total, nulls);
        let partition = &columns[t.partition_slot];
        for (batch_id, &rows) in batch_rows.iter().enumerate() {
            for row_id in 0..rows {
                let at = ArrayItemIndex::new(batch_id as u32, row_id);
                if partition.is_null(at) {
                    indices[null_at] = at;
                    null_at += 1;
                } else {
                    indices[valid_at] = at;
                    valid_at += 1;
                }
            }
        }

        // Only the valid run is sorted; the null run stays in arrival order.
        let valid: Range<usize> = t.placement.valid_range(total, nulls);
        let sorted_by_radix = match t.sort_call {
            SortCall::Radix { slot } => columns[slot].radix_sort(&mut indices[valid.clone()]),
            SortCall::Comparison => false,
        };
        if !sorted_by_radix {
            indices[valid.clone()].sort_by(|a, b| self.comparator.compare(&columns, *a, *b));
        }

        tracing::debug!(
            signature = %self.kernel.signature,
            rows = total,
            nulls,
            batches = batch_rows.len(),
            radix = sorted_by_radix,
            "finalized index sort"
        );

        let sorted = Arc::new(SortedIndex {
            columns,
            indices,
            _reservation: reservation,
        });
        self.state = State::Finalized(Arc::clone(&sorted));
        Ok(sorted)
    }
}

impl<const NULLS_FIRST: bool, const ASC: bool> KernelAbi for IndexSorter<NULLS_FIRST, ASC> {
    fn evaluate(&mut self, columns: &[ArrayRef]) -> Result<()> {
        let State::Accumulating {
            columns: cached,
            batch_rows,
        } = &mut self.state
        else {
            return Err(KernelError::precondition(
                "evaluate called after the kernel was finalized",
            ));
        };
        let rows = check_columns(&self.kernel.template, columns)?;
        if rows == 0 {
            return Ok(());
        }
        if batch_rows.len() >= u32::MAX as usize {
            return Err(KernelError::precondition("too many input batches"));
        }
        for (cache, column) in cached.iter_mut().zip(columns) {
            cache.push(column)?;
        }
        batch_rows.push(rows as u32);

        let nulls = columns[self.kernel.template.partition_slot].null_count();
        self.total_rows += rows;
        self.nulls_total += nulls;
        tracing::trace!(
            batch = batch_rows.len() - 1,
            rows,
            nulls,
            total = self.total_rows,
            "buffered batch"
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<FixedSizeBinaryArray>> {
        let sorted = self.finalize()?;
        let mut bytes = Vec::with_capacity(sorted.indices.len() * ArrayItemIndex::WIDTH);
        for at in &sorted.indices {
            bytes.extend_from_slice(&at.to_le_bytes());
        }
        let array = FixedSizeBinaryArray::try_new(
            ArrayItemIndex::WIDTH as i32,
            Buffer::from_vec(bytes),
            None,
        )?;
        Ok(Some(array))
    }

    fn make_result_iterator(&mut self, schema: SchemaRef) -> Result<ResultIterator> {
        check_schema(self.template(), &schema)?;
        let sorted = self.finalize()?;
        let total = sorted.indices.len();
        Ok(ResultIterator::new(
            schema,
            total,
            self.template().batch_size,
            Box::new(IndexedEmitter { sorted }),
        ))
    }

    fn total_rows(&self) -> usize {
        self.total_rows
    }
}

struct IndexedEmitter {
    sorted: Arc<SortedIndex>,
}

impl BatchEmitter for IndexedEmitter {
    fn emit(&self, rows: Range<usize>) -> Vec<ArrayRef> {
        let window = &self.sorted.indices[rows];
        self.sorted
            .columns
            .iter()
            .map(|column| column.gather(window))
            .collect()
    }
}
