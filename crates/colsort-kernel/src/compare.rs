//! Composite row comparator.

use std::cmp::Ordering;
use std::sync::Arc;

use colsort_codegen::CompareStep;
use colsort_core::index::ArrayItemIndex;

use crate::column::CachedColumn;

/// Comparator chain instantiated for one null order and direction.
///
/// Key `i` decides unless equal, in which case key `i + 1` does; equal on
/// every key is `Equal`, which a stable sort turns into arrival order.
/// Nulls are placed by `NULLS_FIRST` alone; `ASC` only flips value order.
#[derive(Debug, Clone)]
pub struct RowComparator<const NULLS_FIRST: bool, const ASC: bool> {
    slots: Vec<usize>,
}

impl<const NULLS_FIRST: bool, const ASC: bool> RowComparator<NULLS_FIRST, ASC> {
    pub fn from_chain(chain: &CompareStep) -> Self {
        Self {
            slots: chain.slots(),
        }
    }

    pub fn compare(
        &self,
        columns: &[Arc<dyn CachedColumn>],
        a: ArrayItemIndex,
        b: ArrayItemIndex,
    ) -> Ordering {
        self.compare_from(0, columns, a, b)
    }

    fn compare_from(
        &self,
        depth: usize,
        columns: &[Arc<dyn CachedColumn>],
        a: ArrayItemIndex,
        b: ArrayItemIndex,
    ) -> Ordering {
        let Some(&slot) = self.slots.get(depth) else {
            return Ordering::Equal;
        };
        let column = &columns[slot];
        let ord = match (column.is_null(a), column.is_null(b)) {
            (true, true) => Ordering::Equal,
            (true, false) if NULLS_FIRST => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if NULLS_FIRST => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if ASC => column.cmp_rows(a, b),
            (false, false) => column.cmp_rows(a, b).reverse(),
        };
        match ord {
            Ordering::Equal => self.compare_from(depth + 1, columns, a, b),
            decided => decided,
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use colsort_core::describe::ColumnType;
    use colsort_core::spec::Direction;

    use super::*;
    use crate::column::instantiate_column;

    fn columns() -> Vec<Arc<dyn CachedColumn>> {
        let mut k = instantiate_column(ColumnType::Int32);
        k.push(&(Arc::new(Int32Array::from(vec![Some(1), Some(1), Some(2)])) as ArrayRef))
            .unwrap();
        let mut v = instantiate_column(ColumnType::Utf8);
        v.push(&(Arc::new(StringArray::from(vec![Some("b"), None, Some("a")])) as ArrayRef))
            .unwrap();
        vec![Arc::from(k), Arc::from(v)]
    }

    fn chain(slots: &[usize], direction: Direction) -> CompareStep {
        CompareStep {
            slot: slots[0],
            direction,
            tie_break: (slots.len() > 1).then(|| Box::new(chain(&slots[1..], direction))),
        }
    }

    fn at(row: u32) -> ArrayItemIndex {
        ArrayItemIndex::new(0, row)
    }

    #[test]
    fn second_key_breaks_ties() {
        let cols = columns();
        let cmp = RowComparator::<false, true>::from_chain(&chain(&[0, 1], Direction::Ascending));
        assert_eq!(cmp.compare(&cols, at(0), at(2)), Ordering::Less);
        // equal on key 0; key 1 has a null in row 1, nulls last
        assert_eq!(cmp.compare(&cols, at(0), at(1)), Ordering::Less);
        assert_eq!(cmp.compare(&cols, at(0), at(0)), Ordering::Equal);
    }

    #[test]
    fn null_placement_ignores_direction() {
        let cols = columns();
        let first_desc =
            RowComparator::<true, false>::from_chain(&chain(&[0, 1], Direction::Descending));
        assert_eq!(first_desc.compare(&cols, at(1), at(0)), Ordering::Less);
        assert_eq!(first_desc.compare(&cols, at(2), at(0)), Ordering::Less);
    }
}
