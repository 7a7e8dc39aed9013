use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::OnceCell;

use colsort_codegen::{KernelSource, KernelTemplate, SynthError};
use colsort_core::config::SortConfig;
use colsort_core::signature::Signature;

use crate::artifact;
use crate::error::{CacheError, Result};
use crate::lock::SignatureLock;
use crate::store::ArtifactStore;
use crate::toolchain::{TemplateCompiler, Toolchain};

/// A kernel module that has been verified and opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedKernel {
    pub signature: String,
    pub template: KernelTemplate,
    pub artifact: PathBuf,
}

/// Compile & load pipeline over one cache directory.
pub struct KernelCache {
    store: ArtifactStore,
    toolchain: Box<dyn Toolchain>,
    lock_poll: Duration,
    lock_timeout: Option<Duration>,
    loaded: Mutex<HashMap<String, Arc<LoadedKernel>>>,
}

static SHARED: OnceCell<KernelCache> = OnceCell::new();

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("root", &self.store.root())
            .field("toolchain", &self.toolchain.name())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl KernelCache {
    pub fn open(config: &SortConfig) -> Result<Self> {
        Self::with_toolchain(config, Box::new(TemplateCompiler))
    }

    pub fn with_toolchain(config: &SortConfig, toolchain: Box<dyn Toolchain>) -> Result<Self> {
        config.validate()?;
        let store = ArtifactStore::open(&config.cache_dir)?;
        tracing::debug!(
            root = %store.root().display(),
            toolchain = toolchain.name(),
            "opened kernel cache"
        );
        Ok(Self {
            store,
            toolchain,
            lock_poll: config.lock_poll(),
            lock_timeout: config.lock_timeout(),
            loaded: Mutex::new(HashMap::new()),
        })
    }

    /// Process-wide cache configured from the environment, opened on first use.
    pub fn shared() -> Result<&'static KernelCache> {
        SHARED.get_or_try_init(|| KernelCache::open(&SortConfig::from_env()))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Return the kernel for `signature`, compiling it first if needed.
    ///
    /// `synthesize` runs only on a miss. The signature lock is held from the
    /// existence check through the final load and released on every path.
    /// An artifact that fails to load is evicted and rebuilt once; if the
    /// rebuilt artifact fails too, the error is returned.
    pub fn obtain<F>(&self, signature: &Signature, synthesize: F) -> Result<Arc<LoadedKernel>>
    where
        F: FnOnce() -> std::result::Result<KernelSource, SynthError>,
    {
        let key = signature.key();
        if let Some(hit) = self.memoized(&key) {
            return Ok(hit);
        }

        let _guard = SignatureLock::acquire(self.store.lock_path(&key), self.lock_poll, self.lock_timeout)?;
        // Another thread may have finished while we waited for the lock.
        if let Some(hit) = self.memoized(&key) {
            return Ok(hit);
        }

        let kernel = match self.load(&key) {
            Ok(Some(kernel)) => {
                tracing::debug!(signature = %key, "kernel cache hit");
                kernel
            }
            Ok(None) => self.build(&key, synthesize)?,
            Err(err @ CacheError::Load { .. }) => {
                tracing::warn!(signature = %key, error = %err, "evicting unloadable kernel artifact");
                self.store.evict(&key)?;
                self.build(&key, synthesize)?
            }
            Err(err) => return Err(err),
        };

        let kernel = Arc::new(kernel);
        self.loaded
            .lock()
            .map_err(|_| CacheError::Load {
                signature: key.clone(),
                reason: "loaded-module table poisoned".into(),
            })?
            .insert(key, Arc::clone(&kernel));
        Ok(kernel)
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.store.contains(&signature.key())
    }

    /// Forget a signature: drop the in-memory module and the on-disk artifact.
    pub fn evict(&self, signature: &Signature) -> Result<()> {
        let key = signature.key();
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.remove(&key);
        }
        let _guard = SignatureLock::acquire(self.store.lock_path(&key), self.lock_poll, self.lock_timeout)?;
        self.store.evict(&key)
    }

    /// Signatures with a committed artifact.
    pub fn artifacts(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    fn memoized(&self, key: &str) -> Option<Arc<LoadedKernel>> {
        self.loaded.lock().ok()?.get(key).cloned()
    }

    fn load(&self, key: &str) -> Result<Option<LoadedKernel>> {
        let Some(bytes) = self.store.read_artifact(key)? else {
            return Ok(None);
        };
        let template = artifact::decode(&bytes).map_err(|e| CacheError::Load {
            signature: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(LoadedKernel {
            signature: key.to_string(),
            template,
            artifact: self.store.artifact_path(key),
        }))
    }

    fn build<F>(&self, key: &str, synthesize: F) -> Result<LoadedKernel>
    where
        F: FnOnce() -> std::result::Result<KernelSource, SynthError>,
    {
        let source = synthesize()?;
        let source_path = self.store.write_source(key, &source.text)?;
        tracing::info!(
            signature = %key,
            source = %source_path.display(),
            toolchain = self.toolchain.name(),
            "compiling sort kernel"
        );

        let compiled = self.toolchain.compile(key, &source.text);
        self.store.remove_source(key)?;
        let bytes = compiled?;
        if bytes.is_empty() {
            return Err(CacheError::Compile {
                signature: key.to_string(),
                reason: format!("toolchain '{}' produced no output", self.toolchain.name()),
            });
        }
        self.store.commit_artifact(key, &bytes)?;

        match self.load(key) {
            Ok(Some(kernel)) => Ok(kernel),
            Ok(None) => Err(CacheError::Load {
                signature: key.to_string(),
                reason: "artifact missing right after commit".into(),
            }),
            Err(err) => {
                self.store.evict(key)?;
                Err(err)
            }
        }
    }
}
