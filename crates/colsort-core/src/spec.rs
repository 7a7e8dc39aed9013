//! `SortSpec`: what to sort by, and how.
//!
//! A spec is validated once at construction: every key must resolve to
//! exactly one field of the output schema and every output column must have
//! a supported type. Nothing downstream re-checks these.

use std::sync::Arc;

use arrow_schema::{FieldRef, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::describe::ColumnType;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullOrder {
    First,
    Last,
}

impl NullOrder {
    pub fn from_nulls_first(nulls_first: bool) -> Self {
        if nulls_first {
            NullOrder::First
        } else {
            NullOrder::Last
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NullOrder::First => "nulls_first",
            NullOrder::Last => "nulls_last",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn from_asc(asc: bool) -> Self {
        if asc {
            Direction::Ascending
        } else {
            Direction::Descending
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }

    /// Apply this direction to an ascending comparison result.
    #[inline]
    pub fn apply(&self, ord: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}

/// Immutable, validated sort request.
#[derive(Debug, Clone)]
pub struct SortSpec {
    keys: Vec<FieldRef>,
    schema: SchemaRef,
    null_order: NullOrder,
    direction: Direction,
    key_indices: Vec<usize>,
    column_types: Vec<ColumnType>,
}

impl SortSpec {
    /// Resolve `keys` against `schema`.
    ///
    /// Fails with [`Error::Spec`] if the key list is empty, a key name matches
    /// zero or several schema fields, a key's type disagrees with the schema,
    /// or any output column has an unsupported type.
    pub fn new(
        keys: Vec<FieldRef>,
        schema: SchemaRef,
        null_order: NullOrder,
        direction: Direction,
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::Spec("at least one sort key is required".into()));
        }
        if schema.fields().is_empty() {
            return Err(Error::Spec("output schema has no fields".into()));
        }

        let column_types = schema
            .fields()
            .iter()
            .map(|f| {
                ColumnType::from_arrow(f.data_type())
                    .map_err(|e| Error::Spec(format!("field '{}': {e}", f.name())))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut key_indices = Vec::with_capacity(keys.len());
        for key in &keys {
            let matches: Vec<usize> = schema
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| f.name() == key.name())
                .map(|(i, _)| i)
                .collect();
            if matches.len() != 1 {
                return Err(Error::Spec(format!(
                    "sort key '{}' matches {} fields of the output schema, expected exactly one",
                    key.name(),
                    matches.len()
                )));
            }
            let idx = matches[0];
            let expected = schema.field(idx).data_type();
            if key.data_type() != expected {
                return Err(Error::Spec(format!(
                    "sort key '{}' has type {} but the schema field has type {}",
                    key.name(),
                    key.data_type(),
                    expected
                )));
            }
            key_indices.push(idx);
        }

        Ok(Self {
            keys,
            schema,
            null_order,
            direction,
            key_indices,
            column_types,
        })
    }

    /// Convenience for callers that carry the flags as booleans.
    pub fn from_flags(
        keys: Vec<FieldRef>,
        schema: SchemaRef,
        nulls_first: bool,
        asc: bool,
    ) -> Result<Self> {
        Self::new(
            keys,
            schema,
            NullOrder::from_nulls_first(nulls_first),
            Direction::from_asc(asc),
        )
    }

    pub fn keys(&self) -> &[FieldRef] {
        &self.keys
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn schema_ref(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn null_order(&self) -> NullOrder {
        self.null_order
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Schema positions of the keys, in priority order.
    pub fn key_indices(&self) -> &[usize] {
        &self.key_indices
    }

    /// Column type of every output field, in schema order.
    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    /// True when the output is exactly the sole key column.
    pub fn is_single_column(&self) -> bool {
        self.key_indices.len() == 1 && self.column_types.len() == 1
    }
}
