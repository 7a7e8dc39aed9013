//! Sort engines behind the kernel ABI.

use arrow::array::{Array, ArrayRef, FixedSizeBinaryArray};
use arrow::datatypes::SchemaRef;

use colsort_codegen::KernelTemplate;

use crate::error::{KernelError, Result};
use crate::iterator::ResultIterator;

pub mod indexed;
pub mod inplace;

pub use indexed::IndexSorter;
pub use inplace::InPlaceSorter;

/// Entry points of an instantiated kernel.
///
/// `evaluate` accepts batches until the first `finish` or
/// `make_result_iterator`; both of those finalize the kernel once and reuse
/// the result afterwards.
pub trait KernelAbi: Send {
    /// Buffer one batch, given as one column per output field.
    fn evaluate(&mut self, columns: &[ArrayRef]) -> Result<()>;

    /// Sorted row addresses (8-byte `ArrayItemIndex` values) for the index
    /// engine, `None` for the in-place engine.
    fn finish(&mut self) -> Result<Option<FixedSizeBinaryArray>>;

    fn make_result_iterator(&mut self, schema: SchemaRef) -> Result<ResultIterator>;

    /// Rows buffered so far.
    fn total_rows(&self) -> usize;
}

/// Validate one incoming batch against the kernel's fields; returns its row count.
pub(crate) fn check_columns(template: &KernelTemplate, columns: &[ArrayRef]) -> Result<usize> {
    if columns.len() != template.fields.len() {
        return Err(KernelError::precondition(format!(
            "expected {} columns, got {}",
            template.fields.len(),
            columns.len()
        )));
    }
    let rows = columns[0].len();
    for (field, column) in template.fields.iter().zip(columns) {
        let expected = field.column_type.to_arrow();
        if column.data_type() != &expected {
            return Err(KernelError::precondition(format!(
                "column '{}' should be {expected}, got {}",
                field.name,
                column.data_type()
            )));
        }
        if column.len() != rows {
            return Err(KernelError::precondition(format!(
                "column '{}' has {} rows, expected {rows}",
                field.name,
                column.len()
            )));
        }
    }
    if rows > u32::MAX as usize {
        return Err(KernelError::precondition(format!(
            "batch of {rows} rows exceeds the addressable row range"
        )));
    }
    Ok(rows)
}

/// The declared output schema must line up with the kernel's fields.
pub(crate) fn check_schema(template: &KernelTemplate, schema: &SchemaRef) -> Result<()> {
    if schema.fields().len() != template.fields.len() {
        return Err(KernelError::precondition(format!(
            "result schema has {} fields, kernel produces {}",
            schema.fields().len(),
            template.fields.len()
        )));
    }
    for (slot, field) in template.fields.iter().zip(schema.fields()) {
        let expected = slot.column_type.to_arrow();
        if field.data_type() != &expected {
            return Err(KernelError::precondition(format!(
                "result field '{}' is {}, kernel produces {expected}",
                field.name(),
                field.data_type()
            )));
        }
    }
    Ok(())
}
