//! Column type describer.
//!
//! Maps an Arrow logical type onto the names a kernel template is
//! instantiated with: the Arrow element type, the cache container, the result
//! builder, and (for fixed-width types) the native scalar type. This is pure
//! data; the generic containers themselves live in `colsort-kernel`.

use arrow_schema::DataType;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column types a sort kernel can be specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Date32,
    Date64,
    Decimal128 { precision: u8, scale: i8 },
    Utf8,
    LargeUtf8,
    Binary,
}

/// Generic container family a column is cached in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    /// `PrimitiveArray<T>` columns with a native scalar.
    Primitive,
    /// Bit-packed `BooleanArray` columns.
    Boolean,
    /// Offset + data `GenericByteArray<T>` columns.
    Bytes,
}

/// Names used when a template is instantiated for one column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Arrow element type, e.g. `Int64Type`.
    pub element: &'static str,
    /// Native scalar for fixed-width types, e.g. `i64`.
    pub native: Option<&'static str>,
    pub container: Container,
}

impl TypeDescriptor {
    /// Cache container type name, e.g. `PrimitiveColumn<Int64Type>`.
    pub fn storage(&self) -> String {
        match self.container {
            Container::Primitive => format!("PrimitiveColumn<{}>", self.element),
            Container::Boolean => "BooleanColumn".to_string(),
            Container::Bytes => format!("ByteColumn<{}>", self.element),
        }
    }

    /// Result builder type name, e.g. `PrimitiveBuilder<Int64Type>`.
    pub fn builder(&self) -> String {
        match self.container {
            Container::Primitive => format!("PrimitiveBuilder<{}>", self.element),
            Container::Boolean => "BooleanBuilder".to_string(),
            Container::Bytes => format!("GenericByteBuilder<{}>", self.element),
        }
    }
}

impl ColumnType {
    pub fn from_arrow(data_type: &DataType) -> Result<Self> {
        let ty = match data_type {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Int8 => ColumnType::Int8,
            DataType::Int16 => ColumnType::Int16,
            DataType::Int32 => ColumnType::Int32,
            DataType::Int64 => ColumnType::Int64,
            DataType::UInt8 => ColumnType::UInt8,
            DataType::UInt16 => ColumnType::UInt16,
            DataType::UInt32 => ColumnType::UInt32,
            DataType::UInt64 => ColumnType::UInt64,
            DataType::Float32 => ColumnType::Float32,
            DataType::Float64 => ColumnType::Float64,
            DataType::Date32 => ColumnType::Date32,
            DataType::Date64 => ColumnType::Date64,
            DataType::Decimal128(precision, scale) => ColumnType::Decimal128 {
                precision: *precision,
                scale: *scale,
            },
            DataType::Utf8 => ColumnType::Utf8,
            DataType::LargeUtf8 => ColumnType::LargeUtf8,
            DataType::Binary => ColumnType::Binary,
            other => {
                return Err(Error::Spec(format!(
                    "column type {other} is not supported by sort kernels"
                )))
            }
        };
        Ok(ty)
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int8 => DataType::Int8,
            ColumnType::Int16 => DataType::Int16,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::UInt8 => DataType::UInt8,
            ColumnType::UInt16 => DataType::UInt16,
            ColumnType::UInt32 => DataType::UInt32,
            ColumnType::UInt64 => DataType::UInt64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Date32 => DataType::Date32,
            ColumnType::Date64 => DataType::Date64,
            ColumnType::Decimal128 { precision, scale } => {
                DataType::Decimal128(*precision, *scale)
            }
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::LargeUtf8 => DataType::LargeUtf8,
            ColumnType::Binary => DataType::Binary,
        }
    }

    pub fn describe(&self) -> TypeDescriptor {
        use Container::*;
        let (element, native, container) = match self {
            ColumnType::Boolean => ("BooleanType", Some("bool"), Boolean),
            ColumnType::Int8 => ("Int8Type", Some("i8"), Primitive),
            ColumnType::Int16 => ("Int16Type", Some("i16"), Primitive),
            ColumnType::Int32 => ("Int32Type", Some("i32"), Primitive),
            ColumnType::Int64 => ("Int64Type", Some("i64"), Primitive),
            ColumnType::UInt8 => ("UInt8Type", Some("u8"), Primitive),
            ColumnType::UInt16 => ("UInt16Type", Some("u16"), Primitive),
            ColumnType::UInt32 => ("UInt32Type", Some("u32"), Primitive),
            ColumnType::UInt64 => ("UInt64Type", Some("u64"), Primitive),
            ColumnType::Float32 => ("Float32Type", Some("f32"), Primitive),
            ColumnType::Float64 => ("Float64Type", Some("f64"), Primitive),
            ColumnType::Date32 => ("Date32Type", Some("i32"), Primitive),
            ColumnType::Date64 => ("Date64Type", Some("i64"), Primitive),
            ColumnType::Decimal128 { .. } => ("Decimal128Type", Some("i128"), Primitive),
            ColumnType::Utf8 => ("Utf8Type", None, Bytes),
            ColumnType::LargeUtf8 => ("LargeUtf8Type", None, Bytes),
            ColumnType::Binary => ("BinaryType", None, Bytes),
        };
        TypeDescriptor {
            element,
            native,
            container,
        }
    }

    /// Fixed-width types have raw bit patterns a radix sort can consume.
    pub fn is_fixed_width(&self) -> bool {
        self.describe().native.is_some()
    }

    /// In-place sorting needs a contiguous native value buffer; booleans are
    /// bit-packed so they go through the index-based engine.
    pub fn supports_in_place(&self) -> bool {
        self.describe().container == Container::Primitive
    }

    /// Canonical type string used in signatures. Independent of Arrow's
    /// `Display` so that upgrading Arrow cannot silently change cache keys.
    pub fn canonical(&self) -> String {
        match self {
            ColumnType::Decimal128 { precision, scale } => {
                format!("decimal128({precision},{scale})")
            }
            other => other.describe().element.trim_end_matches("Type").to_lowercase(),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}
