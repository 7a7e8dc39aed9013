//! Typed cache containers.
//!
//! A container buffers whole incoming columns of one type and answers the
//! row-level questions a sort needs: null checks, value comparison, radix
//! keys, and gathering rows into a fresh output column with the matching
//! builder.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, GenericByteArray, GenericByteBuilder,
    PrimitiveArray, PrimitiveBuilder,
};
use arrow::datatypes::{
    ArrowPrimitiveType, BinaryType, ByteArrayType, DataType, Date32Type, Date64Type,
    Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    LargeUtf8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type, Utf8Type,
};

use colsort_core::describe::ColumnType;
use colsort_core::index::ArrayItemIndex;

use crate::error::{KernelError, Result};
use crate::radix::{radix_sort_by_key, SortNative};

pub trait CachedColumn: Send + Sync + Debug {
    fn data_type(&self) -> &DataType;

    /// Buffer one incoming column. Its position becomes its batch id.
    fn push(&mut self, array: &ArrayRef) -> Result<()>;

    fn is_null(&self, at: ArrayItemIndex) -> bool;

    /// Ascending comparison of two non-null rows.
    fn cmp_rows(&self, a: ArrayItemIndex, b: ArrayItemIndex) -> Ordering;

    /// Radix sort `rows` (all non-null) ascending by this column. Returns
    /// `false` when the type has no radix key, leaving `rows` untouched.
    fn radix_sort(&self, rows: &mut [ArrayItemIndex]) -> bool;

    /// Build an output column from `rows`, in order.
    fn gather(&self, rows: &[ArrayItemIndex]) -> ArrayRef;
}

fn downcast<'a, A: 'static>(array: &'a ArrayRef, expected: &DataType) -> Result<&'a A> {
    if array.data_type() != expected {
        return Err(KernelError::precondition(format!(
            "expected a {expected} column, got {}",
            array.data_type()
        )));
    }
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        KernelError::precondition(format!("column of type {expected} has an unexpected layout"))
    })
}

/// `PrimitiveColumn<T>`: fixed-width values with a native scalar.
pub struct PrimitiveColumn<T: ArrowPrimitiveType> {
    data_type: DataType,
    batches: Vec<PrimitiveArray<T>>,
}

impl<T: ArrowPrimitiveType> PrimitiveColumn<T> {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            batches: Vec::new(),
        }
    }

    #[inline]
    fn value(&self, at: ArrayItemIndex) -> T::Native {
        self.batches[at.batch()].value(at.row())
    }
}

impl<T: ArrowPrimitiveType> Debug for PrimitiveColumn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveColumn")
            .field("data_type", &self.data_type)
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl<T> CachedColumn for PrimitiveColumn<T>
where
    T: ArrowPrimitiveType,
    T::Native: SortNative,
{
    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn push(&mut self, array: &ArrayRef) -> Result<()> {
        let typed = downcast::<PrimitiveArray<T>>(array, &self.data_type)?;
        self.batches.push(typed.clone());
        Ok(())
    }

    fn is_null(&self, at: ArrayItemIndex) -> bool {
        self.batches[at.batch()].is_null(at.row())
    }

    fn cmp_rows(&self, a: ArrayItemIndex, b: ArrayItemIndex) -> Ordering {
        SortNative::total_cmp(&self.value(a), &self.value(b))
    }

    fn radix_sort(&self, rows: &mut [ArrayItemIndex]) -> bool {
        radix_sort_by_key(rows, |at| self.value(*at).ordered());
        true
    }

    fn gather(&self, rows: &[ArrayItemIndex]) -> ArrayRef {
        let mut builder =
            PrimitiveBuilder::<T>::with_capacity(rows.len()).with_data_type(self.data_type.clone());
        for &at in rows {
            if self.is_null(at) {
                builder.append_null();
            } else {
                builder.append_value(self.value(at));
            }
        }
        Arc::new(builder.finish())
    }
}

/// `ByteColumn<T>`: variable-width strings or binaries.
pub struct ByteColumn<T: ByteArrayType> {
    data_type: DataType,
    batches: Vec<GenericByteArray<T>>,
}

impl<T: ByteArrayType> ByteColumn<T> {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            batches: Vec::new(),
        }
    }

    #[inline]
    fn value(&self, at: ArrayItemIndex) -> &T::Native {
        self.batches[at.batch()].value(at.row())
    }
}

impl<T: ByteArrayType> Debug for ByteColumn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteColumn")
            .field("data_type", &self.data_type)
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl<T> CachedColumn for ByteColumn<T>
where
    T: ByteArrayType,
    T::Native: AsRef<[u8]> + AsRef<T::Native>,
{
    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn push(&mut self, array: &ArrayRef) -> Result<()> {
        let typed = downcast::<GenericByteArray<T>>(array, &self.data_type)?;
        self.batches.push(typed.clone());
        Ok(())
    }

    fn is_null(&self, at: ArrayItemIndex) -> bool {
        self.batches[at.batch()].is_null(at.row())
    }

    fn cmp_rows(&self, a: ArrayItemIndex, b: ArrayItemIndex) -> Ordering {
        let a: &[u8] = <T::Native as AsRef<[u8]>>::as_ref(self.value(a));
        let b: &[u8] = <T::Native as AsRef<[u8]>>::as_ref(self.value(b));
        a.cmp(b)
    }

    fn radix_sort(&self, _rows: &mut [ArrayItemIndex]) -> bool {
        false
    }

    fn gather(&self, rows: &[ArrayItemIndex]) -> ArrayRef {
        let data_bytes = rows
            .iter()
            .filter(|at| !self.is_null(**at))
            .map(|at| <T::Native as AsRef<[u8]>>::as_ref(self.value(*at)).len())
            .sum();
        let mut builder = GenericByteBuilder::<T>::with_capacity(rows.len(), data_bytes);
        for &at in rows {
            if self.is_null(at) {
                builder.append_null();
            } else {
                builder.append_value(self.value(at));
            }
        }
        Arc::new(builder.finish())
    }
}

/// `BooleanColumn`: bit-packed booleans.
#[derive(Debug)]
pub struct BooleanColumn {
    data_type: DataType,
    batches: Vec<BooleanArray>,
}

impl BooleanColumn {
    pub fn new() -> Self {
        Self {
            data_type: DataType::Boolean,
            batches: Vec::new(),
        }
    }

    #[inline]
    fn value(&self, at: ArrayItemIndex) -> bool {
        self.batches[at.batch()].value(at.row())
    }
}

impl Default for BooleanColumn {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedColumn for BooleanColumn {
    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn push(&mut self, array: &ArrayRef) -> Result<()> {
        let typed = downcast::<BooleanArray>(array, &self.data_type)?;
        self.batches.push(typed.clone());
        Ok(())
    }

    fn is_null(&self, at: ArrayItemIndex) -> bool {
        self.batches[at.batch()].is_null(at.row())
    }

    fn cmp_rows(&self, a: ArrayItemIndex, b: ArrayItemIndex) -> Ordering {
        self.value(a).cmp(&self.value(b))
    }

    fn radix_sort(&self, rows: &mut [ArrayItemIndex]) -> bool {
        radix_sort_by_key(rows, |at| self.value(*at).ordered());
        true
    }

    fn gather(&self, rows: &[ArrayItemIndex]) -> ArrayRef {
        let mut builder = BooleanBuilder::with_capacity(rows.len());
        for &at in rows {
            if self.is_null(at) {
                builder.append_null();
            } else {
                builder.append_value(self.value(at));
            }
        }
        Arc::new(builder.finish())
    }
}

/// Instantiate the container a field slot names for `ty`.
pub fn instantiate_column(ty: ColumnType) -> Box<dyn CachedColumn> {
    let dt = ty.to_arrow();
    match ty {
        ColumnType::Boolean => Box::new(BooleanColumn::new()),
        ColumnType::Int8 => Box::new(PrimitiveColumn::<Int8Type>::new(dt)),
        ColumnType::Int16 => Box::new(PrimitiveColumn::<Int16Type>::new(dt)),
        ColumnType::Int32 => Box::new(PrimitiveColumn::<Int32Type>::new(dt)),
        ColumnType::Int64 => Box::new(PrimitiveColumn::<Int64Type>::new(dt)),
        ColumnType::UInt8 => Box::new(PrimitiveColumn::<UInt8Type>::new(dt)),
        ColumnType::UInt16 => Box::new(PrimitiveColumn::<UInt16Type>::new(dt)),
        ColumnType::UInt32 => Box::new(PrimitiveColumn::<UInt32Type>::new(dt)),
        ColumnType::UInt64 => Box::new(PrimitiveColumn::<UInt64Type>::new(dt)),
        ColumnType::Float32 => Box::new(PrimitiveColumn::<Float32Type>::new(dt)),
        ColumnType::Float64 => Box::new(PrimitiveColumn::<Float64Type>::new(dt)),
        ColumnType::Date32 => Box::new(PrimitiveColumn::<Date32Type>::new(dt)),
        ColumnType::Date64 => Box::new(PrimitiveColumn::<Date64Type>::new(dt)),
        ColumnType::Decimal128 { .. } => Box::new(PrimitiveColumn::<Decimal128Type>::new(dt)),
        ColumnType::Utf8 => Box::new(ByteColumn::<Utf8Type>::new(dt)),
        ColumnType::LargeUtf8 => Box::new(ByteColumn::<LargeUtf8Type>::new(dt)),
        ColumnType::Binary => Box::new(ByteColumn::<BinaryType>::new(dt)),
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Int32Array, StringArray};

    use super::*;

    fn at(batch: u32, row: u32) -> ArrayItemIndex {
        ArrayItemIndex::new(batch, row)
    }

    #[test]
    fn primitive_column_compares_across_batches() {
        let mut col = instantiate_column(ColumnType::Int32);
        col.push(&(Arc::new(Int32Array::from(vec![Some(3), None])) as ArrayRef))
            .unwrap();
        col.push(&(Arc::new(Int32Array::from(vec![1])) as ArrayRef))
            .unwrap();
        assert!(col.is_null(at(0, 1)));
        assert_eq!(col.cmp_rows(at(0, 0), at(1, 0)), Ordering::Greater);

        let mut rows = vec![at(0, 0), at(1, 0)];
        assert!(col.radix_sort(&mut rows));
        assert_eq!(rows, vec![at(1, 0), at(0, 0)]);

        let out = col.gather(&[at(1, 0), at(0, 1), at(0, 0)]);
        let out = out.as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(out.iter().collect::<Vec<_>>(), vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn byte_column_has_no_radix_key() {
        let mut col = instantiate_column(ColumnType::Utf8);
        col.push(&(Arc::new(StringArray::from(vec!["b", "a"])) as ArrayRef))
            .unwrap();
        assert_eq!(col.cmp_rows(at(0, 0), at(0, 1)), Ordering::Greater);
        let mut rows = vec![at(0, 0), at(0, 1)];
        assert!(!col.radix_sort(&mut rows));
        assert_eq!(rows, vec![at(0, 0), at(0, 1)]);
    }

    #[test]
    fn push_rejects_a_mismatched_type() {
        let mut col = instantiate_column(ColumnType::Int64);
        let err = col
            .push(&(Arc::new(Int32Array::from(vec![1])) as ArrayRef))
            .unwrap_err();
        assert!(matches!(err, KernelError::Precondition(_)));
    }
}
