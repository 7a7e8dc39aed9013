//! Compile & load pipeline tests: signature determinism, artifact reuse,
//! eviction of unloadable artifacts, lock release and contention.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use colsort::colsort_cache::{self, SignatureLock};
use colsort::colsort_codegen::synthesize;
use colsort::{
    CacheError, ExecContext, KernelCache, KernelError, Signature, SortArraysKernel, SortConfig,
    SortSpec, Strategy, TemplateCompiler, Toolchain,
};

/// Delegates to the real compiler and counts invocations.
struct CountingToolchain {
    compiles: Arc<AtomicUsize>,
}

impl Toolchain for CountingToolchain {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn compile(&self, signature: &str, source: &str) -> colsort_cache::Result<Vec<u8>> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        TemplateCompiler.compile(signature, source)
    }
}

struct FailingToolchain;

impl Toolchain for FailingToolchain {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn compile(&self, signature: &str, _source: &str) -> colsort_cache::Result<Vec<u8>> {
        Err(CacheError::Compile {
            signature: signature.to_string(),
            reason: "compiler exited with status 1".into(),
        })
    }
}

/// Emits bytes that are not a valid artifact.
struct GarbageToolchain {
    compiles: Arc<AtomicUsize>,
}

impl Toolchain for GarbageToolchain {
    fn name(&self) -> &'static str {
        "garbage"
    }

    fn compile(&self, _signature: &str, _source: &str) -> colsort_cache::Result<Vec<u8>> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(b"not a kernel".to_vec())
    }
}

fn two_column_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("k", DataType::Int64, true),
        Field::new("v", DataType::Utf8, true),
    ]))
}

fn spec(nulls_first: bool, asc: bool) -> SortSpec {
    let schema = two_column_schema();
    let keys = vec![Arc::clone(&schema.fields()[0])];
    SortSpec::from_flags(keys, schema, nulls_first, asc).expect("valid spec")
}

fn obtain(cache: &KernelCache, spec: &SortSpec) -> colsort_cache::Result<Arc<colsort::LoadedKernel>> {
    let signature = Signature::of(spec, 64);
    cache.obtain(&signature, || synthesize(spec, Strategy::select(spec), 64))
}

fn counting_cache(config: &SortConfig) -> (KernelCache, Arc<AtomicUsize>) {
    let compiles = Arc::new(AtomicUsize::new(0));
    let cache = KernelCache::with_toolchain(
        config,
        Box::new(CountingToolchain {
            compiles: Arc::clone(&compiles),
        }),
    )
    .expect("open cache");
    (cache, compiles)
}

fn assert_lock_free(path: std::path::PathBuf) {
    SignatureLock::acquire(path, Duration::from_millis(1), Some(Duration::ZERO))
        .expect("signature lock is free");
}

#[test]
fn test_identical_specs_share_one_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let (cache, compiles) = counting_cache(&config);

    let a = obtain(&cache, &spec(false, true)).unwrap();
    let b = obtain(&cache, &spec(false, true)).unwrap();
    assert_eq!(a.signature, b.signature);
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert_eq!(cache.artifacts().unwrap(), vec![a.signature.clone()]);

    // direction and null order are part of the signature
    let c = obtain(&cache, &spec(false, false)).unwrap();
    let d = obtain(&cache, &spec(true, true)).unwrap();
    assert_ne!(a.signature, c.signature);
    assert_ne!(a.signature, d.signature);
    assert_eq!(cache.artifacts().unwrap().len(), 3);
    assert_eq!(compiles.load(Ordering::SeqCst), 3);
}

#[test]
fn test_artifact_is_reused_across_cache_instances() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());

    let (first, first_compiles) = counting_cache(&config);
    let built = obtain(&first, &spec(false, true)).unwrap();
    assert_eq!(first_compiles.load(Ordering::SeqCst), 1);
    drop(first);

    let (second, second_compiles) = counting_cache(&config);
    let loaded = obtain(&second, &spec(false, true)).unwrap();
    assert_eq!(second_compiles.load(Ordering::SeqCst), 0);
    assert_eq!(built.template, loaded.template);

    // no transient files left behind
    let store = second.store();
    assert!(!store.source_path(&loaded.signature).exists());
    assert_lock_free(store.lock_path(&loaded.signature));
}

#[test]
fn test_corrupt_artifact_is_evicted_and_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let s = spec(true, false);
    let signature = Signature::of(&s, 64);

    {
        let (cache, _) = counting_cache(&config);
        obtain(&cache, &s).unwrap();
    }
    let artifact = dir.path().join(format!("{}.kernel", signature.key()));
    let mut bytes = std::fs::read(&artifact).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&artifact, bytes).unwrap();

    let (cache, compiles) = counting_cache(&config);
    let rebuilt = obtain(&cache, &s).unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert_eq!(rebuilt.template.strategy, Strategy::Indexed);
    assert!(cache.contains(&signature));
}

#[test]
fn test_compile_failure_releases_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default()
        .with_cache_dir(dir.path())
        .with_lock_timeout(Some(Duration::from_millis(200)));
    let s = spec(false, true);
    let signature = Signature::of(&s, 64);

    let failing = KernelCache::with_toolchain(&config, Box::new(FailingToolchain)).unwrap();
    let err = obtain(&failing, &s).unwrap_err();
    assert!(matches!(err, CacheError::Compile { .. }));
    assert!(!failing.contains(&signature));
    assert_lock_free(failing.store().lock_path(&signature.key()));
    assert!(!failing.store().source_path(&signature.key()).exists());

    // the next caller is not blocked by a leftover lock
    let (cache, compiles) = counting_cache(&config);
    obtain(&cache, &s).unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unloadable_output_is_retried_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let s = spec(false, true);
    let signature = Signature::of(&s, 64);

    // seed an unloadable artifact so the first load fails too
    std::fs::write(
        dir.path().join(format!("{}.kernel", signature.key())),
        b"stale",
    )
    .unwrap();

    let compiles = Arc::new(AtomicUsize::new(0));
    let cache = KernelCache::with_toolchain(
        &config,
        Box::new(GarbageToolchain {
            compiles: Arc::clone(&compiles),
        }),
    )
    .unwrap();
    let err = obtain(&cache, &s).unwrap_err();
    assert!(matches!(err, CacheError::Load { .. }));
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert!(!cache.contains(&signature));
}

#[test]
fn test_concurrent_first_use_compiles_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let compiles = Arc::new(AtomicUsize::new(0));

    // one cache per thread: they only share the directory, like processes
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let config = config.clone();
            let compiles = Arc::clone(&compiles);
            thread::spawn(move || {
                let cache = KernelCache::with_toolchain(
                    &config,
                    Box::new(CountingToolchain { compiles }),
                )
                .unwrap();
                obtain(&cache, &spec(true, true)).unwrap().signature.clone()
            })
        })
        .collect();

    let signatures: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(signatures.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shared_cache_instance_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let (cache, compiles) = counting_cache(&config);
    let cache = Arc::new(cache);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || obtain(&cache, &spec(i % 2 == 0, true)).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(compiles.load(Ordering::SeqCst), 2);
}

#[test]
fn test_lock_timeout_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default()
        .with_cache_dir(dir.path())
        .with_lock_timeout(Some(Duration::from_millis(30)));
    let cache = KernelCache::open(&config).unwrap();
    let s = spec(false, true);
    let signature = Signature::of(&s, 64);

    let _held = SignatureLock::acquire(
        cache.store().lock_path(&signature.key()),
        Duration::from_millis(1),
        None,
    )
    .unwrap();
    let err = obtain(&cache, &s).unwrap_err();
    assert!(matches!(err, CacheError::LockTimeout { .. }));
}

#[test]
fn test_evict_forces_recompile() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let (cache, compiles) = counting_cache(&config);
    let s = spec(false, true);
    let signature = Signature::of(&s, 64);

    obtain(&cache, &s).unwrap();
    cache.evict(&signature).unwrap();
    assert!(!cache.contains(&signature));
    obtain(&cache, &s).unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 2);
}

#[test]
fn test_kernels_from_a_warm_cache_sort_correctly() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let schema = Arc::new(Schema::new(vec![Field::new("k", DataType::Int64, true)]));
    let keys = vec![Arc::clone(&schema.fields()[0])];
    let s = SortSpec::from_flags(keys, Arc::clone(&schema), false, true).unwrap();

    for _ in 0..2 {
        let cache = KernelCache::open(&config).unwrap();
        let ctx = ExecContext::from_config(&config);
        let mut kernel = SortArraysKernel::try_new(&cache, &ctx, &s, 8).unwrap();
        kernel
            .evaluate(&[Arc::new(Int64Array::from(vec![Some(2), None, Some(1)])) as ArrayRef])
            .unwrap();
        let batch = kernel
            .make_result_iterator(Arc::clone(&schema))
            .unwrap()
            .next_batch()
            .unwrap();
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(col.iter().collect::<Vec<_>>(), vec![Some(1), Some(2), None]);
        assert_eq!(cache.artifacts().unwrap().len(), 1);
    }
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default().with_cache_dir(dir.path());
    let cache = KernelCache::open(&config).unwrap();
    let err = SortArraysKernel::try_new(&cache, &ExecContext::default(), &spec(false, true), 0)
        .unwrap_err();
    assert!(matches!(err, KernelError::Precondition(_)));

    let bad = SortConfig::default().with_cache_dir(dir.path()).with_batch_size(0);
    assert!(matches!(KernelCache::open(&bad), Err(CacheError::Config(_))));
}

const HOLD_LOCK_ENV: &str = "COLSORT_TEST_HOLD_LOCK";

/// Runs as a child of `test_lock_of_killed_holder_is_released`: takes the
/// lock named in the environment, marks itself ready and waits to be killed.
#[test]
#[ignore]
fn hold_signature_lock_until_killed() {
    let Ok(path) = std::env::var(HOLD_LOCK_ENV) else {
        return;
    };
    let _guard = SignatureLock::acquire(&path, Duration::from_millis(1), None).unwrap();
    std::fs::write(format!("{path}.ready"), b"").unwrap();
    thread::sleep(Duration::from_secs(120));
}

#[test]
fn test_lock_of_killed_holder_is_released() {
    let dir = tempfile::tempdir().unwrap();
    let config = SortConfig::default()
        .with_cache_dir(dir.path())
        .with_lock_timeout(Some(Duration::from_secs(5)));
    let (cache, compiles) = counting_cache(&config);
    let s = spec(false, true);
    let lock_path = cache.store().lock_path(&Signature::of(&s, 64).key());
    let ready = PathBuf::from(format!("{}.ready", lock_path.display()));

    let mut holder = Command::new(std::env::current_exe().unwrap())
        .args(["hold_signature_lock_until_killed", "--exact", "--ignored"])
        .env(HOLD_LOCK_ENV, &lock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(30);
    while !ready.exists() {
        assert!(Instant::now() < deadline, "lock holder never took the lock");
        thread::sleep(Duration::from_millis(10));
    }
    let err = SignatureLock::acquire(&lock_path, Duration::from_millis(1), Some(Duration::from_millis(50)))
        .unwrap_err();
    assert!(matches!(err, CacheError::LockTimeout { .. }));

    // SIGKILL: the holder never runs its guard's Drop
    holder.kill().unwrap();
    holder.wait().unwrap();

    assert!(lock_path.exists());
    obtain(&cache, &s).unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
}
