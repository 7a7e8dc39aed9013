//! Structured kernel templates.
//!
//! A template is the complete, type-level description of one specialized
//! kernel. It is what the synthesizer produces, what the cache compiles and
//! seals into an artifact, and what the kernel factory instantiates.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use colsort_core::describe::ColumnType;
use colsort_core::spec::{Direction, NullOrder, SortSpec};

use crate::error::{Result, SynthError};

/// Bumped whenever the meaning of a serialized template changes. Artifacts
/// written under another revision fail to load and get rebuilt.
pub const GENERATOR_REVISION: u32 = 1;

/// Which engine a kernel is built on. Chosen once from the request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Multi-key, out-of-place: sorts `ArrayItemIndex` records.
    Indexed,
    /// Single key that is also the only output column: sorts values directly.
    InPlace,
}

impl Strategy {
    pub fn select(spec: &SortSpec) -> Self {
        if spec.is_single_column() && spec.column_types()[0].supports_in_place() {
            Strategy::InPlace
        } else {
            Strategy::Indexed
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Indexed => "indexed",
            Strategy::InPlace => "in_place",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelPolicy {
    pub null_order: NullOrder,
    pub direction: Direction,
}

/// Per-column fragment: cache container, result builder and field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub slot: usize,
    pub name: String,
    pub column_type: ColumnType,
    pub storage: String,
    pub builder: String,
}

impl FieldSlot {
    pub fn new(slot: usize, name: impl Into<String>, column_type: ColumnType) -> Self {
        let desc = column_type.describe();
        Self {
            slot,
            name: name.into(),
            column_type,
            storage: desc.storage(),
            builder: desc.builder(),
        }
    }
}

/// One link of the composite comparator: compare `slot`; on a tie, defer to
/// `tie_break`. The last link has no tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareStep {
    pub slot: usize,
    pub direction: Direction,
    pub tie_break: Option<Box<CompareStep>>,
}

impl CompareStep {
    /// Slots in the order the chain visits them.
    pub fn slots(&self) -> Vec<usize> {
        let mut out = vec![self.slot];
        let mut cur = &self.tie_break;
        while let Some(step) = cur {
            out.push(step.slot);
            cur = &step.tie_break;
        }
        out
    }

    fn directions(&self) -> Vec<Direction> {
        let mut out = vec![self.direction];
        let mut cur = &self.tie_break;
        while let Some(step) = cur {
            out.push(step.direction);
            cur = &step.tie_break;
        }
        out
    }
}

/// Where a category of rows starts in the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionBase {
    /// Offset 0.
    Front,
    /// Offset `nulls_total`.
    AfterNulls,
    /// Offset `total - nulls_total`.
    Tail,
}

impl RegionBase {
    pub fn offset(&self, total: usize, nulls: usize) -> usize {
        match self {
            RegionBase::Front => 0,
            RegionBase::AfterNulls => nulls,
            RegionBase::Tail => total - nulls,
        }
    }
}

/// Null-partition rule: valid rows and null rows are each written from their
/// base with a running counter, so placement is stable within each category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub valid: RegionBase,
    pub null: RegionBase,
}

impl Placement {
    pub fn for_null_order(null_order: NullOrder) -> Self {
        match null_order {
            NullOrder::First => Placement {
                valid: RegionBase::AfterNulls,
                null: RegionBase::Front,
            },
            NullOrder::Last => Placement {
                valid: RegionBase::Front,
                null: RegionBase::Tail,
            },
        }
    }

    pub fn valid_range(&self, total: usize, nulls: usize) -> Range<usize> {
        let start = self.valid.offset(total, nulls);
        start..start + (total - nulls)
    }

    pub fn null_range(&self, total: usize, nulls: usize) -> Range<usize> {
        let start = self.null.offset(total, nulls);
        start..start + nulls
    }
}

/// How the non-null range is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortCall {
    /// LSD radix over the raw bits of one fixed-width key.
    Radix { slot: usize },
    /// Stable comparison sort driven by the comparator chain.
    Comparison,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelTemplate {
    pub revision: u32,
    pub strategy: Strategy,
    pub policy: KernelPolicy,
    pub batch_size: usize,
    pub fields: Vec<FieldSlot>,
    /// Key slots in priority order.
    pub keys: Vec<usize>,
    /// Slot whose nulls decide the null partition (the first key).
    pub partition_slot: usize,
    pub comparator: CompareStep,
    pub placement: Placement,
    pub sort_call: SortCall,
}

impl KernelTemplate {
    pub fn column_types(&self) -> Vec<ColumnType> {
        self.fields.iter().map(|f| f.column_type).collect()
    }

    /// Check every structural rule a kernel factory relies on.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(SynthError::Template(msg));

        if self.revision != GENERATOR_REVISION {
            return bad(format!(
                "generator revision {} does not match {}",
                self.revision, GENERATOR_REVISION
            ));
        }
        if self.batch_size == 0 {
            return bad("batch_size must be greater than zero".into());
        }
        if self.fields.is_empty() {
            return bad("kernel has no fields".into());
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.slot != i {
                return bad(format!("field '{}' has slot {} at position {i}", field.name, field.slot));
            }
            let desc = field.column_type.describe();
            if field.storage != desc.storage() || field.builder != desc.builder() {
                return bad(format!(
                    "field '{}' storage/builder do not match its type {}",
                    field.name, field.column_type
                ));
            }
        }
        if self.keys.is_empty() {
            return bad("kernel has no keys".into());
        }
        if let Some(k) = self.keys.iter().find(|&&k| k >= self.fields.len()) {
            return bad(format!("key slot {k} is out of range"));
        }
        if self.partition_slot != self.keys[0] {
            return bad("null partition must use the first key".into());
        }
        if self.comparator.slots() != self.keys {
            return bad("comparator chain does not follow the key order".into());
        }
        if self
            .comparator
            .directions()
            .iter()
            .any(|d| *d != self.policy.direction)
        {
            return bad("comparator direction disagrees with the kernel policy".into());
        }
        if self.placement != Placement::for_null_order(self.policy.null_order) {
            return bad("placement disagrees with the null order".into());
        }
        if let SortCall::Radix { slot } = self.sort_call {
            if self.keys.len() != 1 || slot != self.keys[0] {
                return bad("radix sort needs exactly one key".into());
            }
            if self.policy.direction != Direction::Ascending {
                return bad("radix sort only produces ascending order".into());
            }
            if !self.fields[slot].column_type.is_fixed_width() {
                return bad(format!(
                    "radix sort needs a fixed-width key, '{}' is {}",
                    self.fields[slot].name, self.fields[slot].column_type
                ));
            }
        }
        if self.strategy == Strategy::InPlace {
            if self.fields.len() != 1 || self.keys != [0] {
                return bad("in-place kernels sort exactly one column by itself".into());
            }
            if !self.fields[0].column_type.supports_in_place() {
                return bad(format!(
                    "in-place kernels need a primitive column, got {}",
                    self.fields[0].column_type
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_ranges() {
        let first = Placement::for_null_order(NullOrder::First);
        assert_eq!(first.null_range(10, 3), 0..3);
        assert_eq!(first.valid_range(10, 3), 3..10);

        let last = Placement::for_null_order(NullOrder::Last);
        assert_eq!(last.valid_range(10, 3), 0..7);
        assert_eq!(last.null_range(10, 3), 7..10);
    }

    #[test]
    fn compare_step_slots_follow_the_chain() {
        let chain = CompareStep {
            slot: 2,
            direction: Direction::Ascending,
            tie_break: Some(Box::new(CompareStep {
                slot: 0,
                direction: Direction::Ascending,
                tie_break: None,
            })),
        };
        assert_eq!(chain.slots(), vec![2, 0]);
    }
}
