//! Instantiate a loaded kernel against the generic engines compiled into
//! this crate.

use std::sync::Arc;

use arrow::datatypes::{
    ArrowPrimitiveType, Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type,
    Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};

use colsort_cache::LoadedKernel;
use colsort_codegen::Strategy;
use colsort_core::describe::ColumnType;
use colsort_core::spec::{Direction, NullOrder};

use crate::context::ExecContext;
use crate::engine::{InPlaceSorter, IndexSorter, KernelAbi};
use crate::error::{KernelError, Result};
use crate::radix::SortNative;

/// The single entry point a loaded kernel module exposes.
#[derive(Debug, Clone)]
pub struct KernelFactory {
    kernel: Arc<LoadedKernel>,
}

impl KernelFactory {
    pub fn new(kernel: Arc<LoadedKernel>) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &LoadedKernel {
        &self.kernel
    }

    /// Build a fresh kernel instance.
    pub fn make(&self, ctx: &ExecContext) -> Result<Box<dyn KernelAbi>> {
        let t = &self.kernel.template;
        let nulls_first = t.policy.null_order == NullOrder::First;
        let asc = t.policy.direction == Direction::Ascending;
        let kernel = Arc::clone(&self.kernel);

        match t.strategy {
            Strategy::Indexed => indexed(kernel, ctx, nulls_first, asc),
            Strategy::InPlace => match t.fields[0].column_type {
                ColumnType::Int8 => in_place::<Int8Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Int16 => in_place::<Int16Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Int32 => in_place::<Int32Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Int64 => in_place::<Int64Type>(kernel, ctx, nulls_first, asc),
                ColumnType::UInt8 => in_place::<UInt8Type>(kernel, ctx, nulls_first, asc),
                ColumnType::UInt16 => in_place::<UInt16Type>(kernel, ctx, nulls_first, asc),
                ColumnType::UInt32 => in_place::<UInt32Type>(kernel, ctx, nulls_first, asc),
                ColumnType::UInt64 => in_place::<UInt64Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Float32 => in_place::<Float32Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Float64 => in_place::<Float64Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Date32 => in_place::<Date32Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Date64 => in_place::<Date64Type>(kernel, ctx, nulls_first, asc),
                ColumnType::Decimal128 { .. } => {
                    in_place::<Decimal128Type>(kernel, ctx, nulls_first, asc)
                }
                other => Err(KernelError::precondition(format!(
                    "no in-place engine for {other} columns"
                ))),
            },
        }
    }
}

fn indexed(
    kernel: Arc<LoadedKernel>,
    ctx: &ExecContext,
    nulls_first: bool,
    asc: bool,
) -> Result<Box<dyn KernelAbi>> {
    Ok(match (nulls_first, asc) {
        (true, true) => Box::new(IndexSorter::<true, true>::new(kernel, ctx)?),
        (true, false) => Box::new(IndexSorter::<true, false>::new(kernel, ctx)?),
        (false, true) => Box::new(IndexSorter::<false, true>::new(kernel, ctx)?),
        (false, false) => Box::new(IndexSorter::<false, false>::new(kernel, ctx)?),
    })
}

fn in_place<T>(
    kernel: Arc<LoadedKernel>,
    ctx: &ExecContext,
    nulls_first: bool,
    asc: bool,
) -> Result<Box<dyn KernelAbi>>
where
    T: ArrowPrimitiveType,
    T::Native: SortNative,
{
    Ok(match (nulls_first, asc) {
        (true, true) => Box::new(InPlaceSorter::<T, true, true>::new(kernel, ctx)?),
        (true, false) => Box::new(InPlaceSorter::<T, true, false>::new(kernel, ctx)?),
        (false, true) => Box::new(InPlaceSorter::<T, false, true>::new(kernel, ctx)?),
        (false, false) => Box::new(InPlaceSorter::<T, false, false>::new(kernel, ctx)?),
    })
}
