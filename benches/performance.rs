use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use criterion::{criterion_group, criterion_main, Criterion};
use colsort::{ExecContext, KernelCache, SortArraysKernel, SortConfig, SortSpec};

fn make_columns(rows: usize, with_payload: bool) -> Vec<ArrayRef> {
    // fixed-seed LCG keys; every 17th row is null
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let keys: Vec<Option<i64>> = (0..rows)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (i % 17 != 0).then_some((state >> 33) as i64 - (1 << 30))
        })
        .collect();
    let mut cols: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(keys))];
    if with_payload {
        let vals: Vec<String> = (0..rows).map(|i| format!("row-{}", i % 97)).collect();
        cols.push(Arc::new(StringArray::from(vals)));
    }
    cols
}

fn schema(with_payload: bool) -> SchemaRef {
    let mut fields = vec![Field::new("k", DataType::Int64, true)];
    if with_payload {
        fields.push(Field::new("v", DataType::Utf8, true));
    }
    Arc::new(Schema::new(fields))
}

fn run_sort(
    cache: &KernelCache,
    ctx: &ExecContext,
    spec: &SortSpec,
    schema: &SchemaRef,
    batches: &[Vec<ArrayRef>],
) -> usize {
    let mut kernel = SortArraysKernel::try_new(cache, ctx, spec, 4096).unwrap();
    for batch in batches {
        kernel.evaluate(batch).unwrap();
    }
    kernel
        .make_result_iterator(Arc::clone(schema))
        .unwrap()
        .map(|b| b.unwrap().num_rows())
        .sum()
}

fn bench_sort_kernels(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let cache = KernelCache::open(&config).unwrap();
    let ctx = ExecContext::from_config(&config);

    for (name, with_payload, asc) in [
        ("in_place_radix", false, true),
        ("in_place_desc", false, false),
        ("indexed_radix", true, true),
        ("indexed_comparison", true, false),
    ] {
        let schema = schema(with_payload);
        let keys = vec![Arc::clone(&schema.fields()[0])];
        let spec = SortSpec::from_flags(keys, Arc::clone(&schema), false, asc).unwrap();
        let batches: Vec<Vec<ArrayRef>> = (0..16).map(|_| make_columns(4096, with_payload)).collect();

        c.bench_function(name, |b| {
            b.iter(|| run_sort(&cache, &ctx, &spec, &schema, &batches))
        });
    }
}

criterion_group!(sorts, bench_sort_kernels);
criterion_main!(sorts);
