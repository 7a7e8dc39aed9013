//! In-place engine: the sole output column is its own key, so values are
//! sorted directly with no index indirection.

use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, FixedSizeBinaryArray, PrimitiveArray, PrimitiveBuilder};
use arrow::datatypes::{ArrowPrimitiveType, DataType, SchemaRef};

use colsort_cache::LoadedKernel;
use colsort_codegen::{SortCall, Strategy};
use colsort_core::spec::{Direction, NullOrder};
use colsort_mem::Reservation;

use crate::context::ExecContext;
use crate::engine::{check_columns, check_schema, KernelAbi};
use crate::error::{KernelError, Result};
use crate::iterator::{BatchEmitter, ResultIterator};
use crate::radix::{radix_sort, SortNative};

enum State {
    Accumulating(Vec<ArrayRef>),
    Finalized(Arc<dyn SortedValues>),
}

/// Erases `T` from the finalized run so the state enum stays non-generic.
trait SortedValues: Send + Sync {
    fn len(&self) -> usize;
    fn emit(&self, rows: Range<usize>) -> ArrayRef;
}

struct SortedRun<T: ArrowPrimitiveType> {
    data_type: DataType,
    values: Vec<T::Native>,
    null_range: Range<usize>,
    _reservation: Reservation,
}

impl<T: ArrowPrimitiveType> SortedValues for SortedRun<T> {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn emit(&self, rows: Range<usize>) -> ArrayRef {
        let mut builder = PrimitiveBuilder::<T>::with_capacity(rows.len())
            .with_data_type(self.data_type.clone());
        let nulls = &self.null_range;
        let mut pos = rows.start;
        while pos < rows.end {
            let end = if nulls.contains(&pos) {
                let end = rows.end.min(nulls.end);
                builder.append_nulls(end - pos);
                end
            } else {
                let end = if pos < nulls.start {
                    rows.end.min(nulls.start)
                } else {
                    rows.end
                };
                builder.append_slice(&self.values[pos..end]);
                end
            };
            pos = end;
        }
        Arc::new(builder.finish())
    }
}

/// Single-column engine over one primitive type, one instantiation per null
/// order and direction.
pub struct InPlaceSorter<T: ArrowPrimitiveType, const NULLS_FIRST: bool, const ASC: bool> {
    kernel: Arc<LoadedKernel>,
    ctx: ExecContext,
    state: State,
    total_rows: usize,
    nulls_total: usize,
    _type: PhantomData<fn() -> T>,
}

impl<T, const NULLS_FIRST: bool, const ASC: bool> InPlaceSorter<T, NULLS_FIRST, ASC>
where
    T: ArrowPrimitiveType,
    T::Native: SortNative,
{
    pub fn new(kernel: Arc<LoadedKernel>, ctx: &ExecContext) -> Result<Self> {
        let t = &kernel.template;
        if t.strategy != Strategy::InPlace {
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
        if !PrimitiveArray::<T>::is_compatible(&t.fields[0].column_type.to_arrow()) {
            return Err(KernelError::precondition(format!(
                "kernel {} sorts {}, not {}",
                kernel.signature,
                t.fields[0].column_type,
                T::DATA_TYPE
            )));
        }
        Ok(Self {
            kernel,
            ctx: ctx.clone(),
            state: State::Accumulating(Vec::new()),
            total_rows: 0,
            nulls_total: 0,
            _type: PhantomData,
        })
    }

    fn finalize(&mut self) -> Result<Arc<dyn SortedValues>> {
        let arrays = match &self.state {
            State::Finalized(run) => return Ok(Arc::clone(run)),
            State::Accumulating(arrays) => arrays,
        };

        let total = self.total_rows;
        let nulls = self.nulls_total;
        let reservation = self
            .ctx
            .reserve(total * std::mem::size_of::<T::Native>(), "sort_values")?;
        let t = &self.kernel.template;
        let data_type = t.fields[0].column_type.to_arrow();

        let mut values: Vec<T::Native> = Vec::with_capacity(total);
        if !arrays.is_empty() {
            let parts: Vec<&dyn Array> = arrays.iter().map(|a| a.as_ref()).collect();
            let merged = arrow::compute::concat(&parts)?;
            let merged = merged
                .as_any()
                .downcast_ref::<PrimitiveArray<T>>()
                .ok_or_else(|| {
                    KernelError::precondition(format!("buffered columns are not {data_type}"))
                })?;
            values.extend_from_slice(merged.values());
            compact_valid::<T, NULLS_FIRST>(&mut values, merged);
        }

        let valid = t.placement.valid_range(total, nulls);
        let run = &mut values[valid];
        match t.sort_call {
            SortCall::Radix { .. } => radix_sort(run),
            SortCall::Comparison if ASC => run.sort_by(SortNative::total_cmp),
            SortCall::Comparison => run.sort_by(|a, b| SortNative::total_cmp(b, a)),
        }

        tracing::debug!(
            signature = %self.kernel.signature,
            rows = total,
            nulls,
            batches = arrays.len(),
            sort_call = ?t.sort_call,
            "finalized in-place sort"
        );

        let run: Arc<dyn SortedValues> = Arc::new(SortedRun::<T> {
            data_type,
            values,
            null_range: t.placement.null_range(total, nulls),
            _reservation: reservation,
        });
        self.state = State::Finalized(Arc::clone(&run));
        Ok(run)
    }
}

/// Stable in-place partition: valid values move to the front (nulls last) or
/// the back (nulls first) of `values`, keeping their relative order. The
/// slots left over for nulls hold stale values and are never read.
fn compact_valid<T: ArrowPrimitiveType, const NULLS_FIRST: bool>(
    values: &mut [T::Native],
    source: &PrimitiveArray<T>,
) {
    if source.null_count() == 0 {
        return;
    }
    if NULLS_FIRST {
        let mut write = values.len();
        for read in (0..values.len()).rev() {
            if source.is_valid(read) {
                write -= 1;
                values[write] = values[read];
            }
        }
    } else {
        let mut write = 0;
        for read in 0..values.len() {
            if source.is_valid(read) {
                values[write] = values[read];
                write += 1;
            }
        }
    }
}

impl<T, const NULLS_FIRST: bool, const ASC: bool> KernelAbi for InPlaceSorter<T, NULLS_FIRST, ASC>
where
    T: ArrowPrimitiveType,
    T::Native: SortNative,
{
    fn evaluate(&mut self, columns: &[ArrayRef]) -> Result<()> {
        let State::Accumulating(arrays) = &mut self.state else {
            return Err(KernelError::precondition(
                "evaluate called after the kernel was finalized",
            ));
        };
        let rows = check_columns(&self.kernel.template, columns)?;
        if rows == 0 {
            return Ok(());
        }
        let nulls = columns[0].null_count();
        arrays.push(Arc::clone(&columns[0]));
        self.total_rows += rows;
        self.nulls_total += nulls;
        tracing::trace!(
            batch = arrays.len() - 1,
            rows,
            nulls,
            total = self.total_rows,
            "buffered batch"
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<FixedSizeBinaryArray>> {
        self.finalize()?;
        Ok(None)
    }

    fn make_result_iterator(&mut self, schema: SchemaRef) -> Result<ResultIterator> {
        check_schema(&self.kernel.template, &schema)?;
        let run = self.finalize()?;
        Ok(ResultIterator::new(
            schema,
            run.len(),
            self.kernel.template.batch_size,
            Box::new(RunEmitter { run }),
        ))
    }

    fn total_rows(&self) -> usize {
        self.total_rows
    }
}

struct RunEmitter {
    run: Arc<dyn SortedValues>,
}

impl BatchEmitter for RunEmitter {
    fn emit(&self, rows: Range<usize>) -> Vec<ArrayRef> {
        vec![self.run.emit(rows)]
    }
}
