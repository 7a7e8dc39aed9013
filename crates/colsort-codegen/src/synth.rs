//! Kernel synthesis: lower a validated `SortSpec` into a `KernelTemplate`.

use colsort_core::spec::{Direction, SortSpec};

use crate::error::Result;
use crate::source::{render_source, KernelSource};
use crate::template::{
    CompareStep, FieldSlot, KernelPolicy, KernelTemplate, Placement, SortCall, Strategy,
    GENERATOR_REVISION,
};

/// Synthesize the kernel source for `spec` using `strategy`.
///
/// `SortSpec` has already resolved every key to one schema field, so a
/// malformed key reference can never reach this point.
pub fn synthesize(spec: &SortSpec, strategy: Strategy, batch_size: usize) -> Result<KernelSource> {
    let fields = field_slots(spec);
    let keys = spec.key_indices().to_vec();
    let comparator = comparator_chain(&keys, spec.direction());
    let placement = Placement::for_null_order(spec.null_order());
    let sort_call = sort_call(spec, &keys);

    let template = KernelTemplate {
        revision: GENERATOR_REVISION,
        strategy,
        policy: KernelPolicy {
            null_order: spec.null_order(),
            direction: spec.direction(),
        },
        batch_size,
        fields,
        partition_slot: keys[0],
        keys,
        comparator,
        placement,
        sort_call,
    };
    template.validate()?;

    tracing::debug!(
        strategy = strategy.name(),
        fields = template.fields.len(),
        keys = template.keys.len(),
        sort_call = ?template.sort_call,
        "synthesized sort kernel"
    );

    let text = render_source(&template)?;
    Ok(KernelSource { template, text })
}

fn field_slots(spec: &SortSpec) -> Vec<FieldSlot> {
    spec.schema()
        .fields()
        .iter()
        .zip(spec.column_types())
        .enumerate()
        .map(|(slot, (field, ty))| FieldSlot::new(slot, field.name().as_str(), *ty))
        .collect()
}

/// Compare key i; if equal, recurse into key i+1; the last key decides.
fn comparator_chain(keys: &[usize], direction: Direction) -> CompareStep {
    CompareStep {
        slot: keys[0],
        direction,
        tie_break: if keys.len() > 1 {
            Some(Box::new(comparator_chain(&keys[1..], direction)))
        } else {
            None
        },
    }
}

/// Radix for a single ascending fixed-width key, comparison otherwise.
fn sort_call(spec: &SortSpec, keys: &[usize]) -> SortCall {
    let single = keys.len() == 1;
    let asc = spec.direction() == Direction::Ascending;
    if single && asc && spec.column_types()[keys[0]].is_fixed_width() {
        SortCall::Radix { slot: keys[0] }
    } else {
        SortCall::Comparison
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};
    use colsort_core::spec::NullOrder;

    use super::*;
    use crate::template::RegionBase;

    fn spec(fields: Vec<Field>, keys: &[&str], nulls: NullOrder, dir: Direction) -> SortSpec {
        let schema = Arc::new(Schema::new(fields));
        let keys = keys
            .iter()
            .map(|k| Arc::clone(&schema.fields()[schema.index_of(k).unwrap()]))
            .collect();
        SortSpec::new(keys, schema, nulls, dir).unwrap()
    }

    #[test]
    fn multi_key_uses_comparison_and_chains_keys() {
        let s = spec(
            vec![
                Field::new("a", DataType::Int32, true),
                Field::new("b", DataType::Utf8, true),
                Field::new("c", DataType::Float64, true),
            ],
            &["c", "a"],
            NullOrder::Last,
            Direction::Ascending,
        );
        let src = synthesize(&s, Strategy::select(&s), 128).unwrap();
        let t = &src.template;
        assert_eq!(t.strategy, Strategy::Indexed);
        assert_eq!(t.keys, vec![2, 0]);
        assert_eq!(t.comparator.slots(), vec![2, 0]);
        assert_eq!(t.sort_call, SortCall::Comparison);
        assert_eq!(t.partition_slot, 2);
        assert_eq!(t.fields[1].storage, "ByteColumn<Utf8Type>");
    }

    #[test]
    fn single_ascending_fixed_width_key_uses_radix() {
        let s = spec(
            vec![
                Field::new("k", DataType::Int64, true),
                Field::new("v", DataType::Utf8, true),
            ],
            &["k"],
            NullOrder::First,
            Direction::Ascending,
        );
        let src = synthesize(&s, Strategy::select(&s), 128).unwrap();
        assert_eq!(src.template.sort_call, SortCall::Radix { slot: 0 });
        assert_eq!(src.template.placement.valid, RegionBase::AfterNulls);
        assert_eq!(src.template.placement.null, RegionBase::Front);
    }

    #[test]
    fn string_key_never_uses_radix() {
        let s = spec(
            vec![
                Field::new("k", DataType::Utf8, true),
                Field::new("v", DataType::Int32, true),
            ],
            &["k"],
            NullOrder::Last,
            Direction::Ascending,
        );
        let src = synthesize(&s, Strategy::select(&s), 128).unwrap();
        assert_eq!(src.template.sort_call, SortCall::Comparison);
    }

    #[test]
    fn single_column_selects_in_place() {
        let s = spec(
            vec![Field::new("k", DataType::Float32, true)],
            &["k"],
            NullOrder::Last,
            Direction::Descending,
        );
        assert_eq!(Strategy::select(&s), Strategy::InPlace);
        let src = synthesize(&s, Strategy::InPlace, 128).unwrap();
        assert_eq!(src.template.sort_call, SortCall::Comparison);
    }

    #[test]
    fn single_string_column_stays_indexed() {
        let s = spec(
            vec![Field::new("k", DataType::Utf8, true)],
            &["k"],
            NullOrder::Last,
            Direction::Ascending,
        );
        assert_eq!(Strategy::select(&s), Strategy::Indexed);
    }

    #[test]
    fn rendered_source_parses_back() {
        let s = spec(
            vec![
                Field::new("k", DataType::Int64, true),
                Field::new("v", DataType::Utf8, true),
            ],
            &["k", "v"],
            NullOrder::First,
            Direction::Descending,
        );
        let src = synthesize(&s, Strategy::select(&s), 64).unwrap();
        let parsed = crate::source::parse_source(&src.text).unwrap();
        assert_eq!(parsed, src.template);
    }
}
