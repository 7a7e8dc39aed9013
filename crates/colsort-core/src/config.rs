//! Kernel configuration that downstream crates can serialize/deserialize.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Output batch size used when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    /// Directory holding compiled kernel artifacts, transient sources and lock files.
    pub cache_dir: PathBuf,

    /// Rows per output batch. Baked into every generated kernel (and so into
    /// its signature).
    pub batch_size: usize,

    /// Hard memory cap (in bytes) for index/value buffers of one kernel context.
    pub mem_cap_bytes: usize,

    /// Sleep between attempts while another caller holds a signature lock.
    pub lock_poll_ms: u64,

    /// Give up waiting for a signature lock after this long. `None` blocks
    /// until the lock is released.
    pub lock_timeout_ms: Option<u64>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("colsort-kernels"),
            batch_size: DEFAULT_BATCH_SIZE,
            mem_cap_bytes: 1024 * 1024 * 1024, // 1 GiB default
            lock_poll_ms: 10,
            lock_timeout_ms: None,
        }
    }
}

impl SortConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `COLSORT_CACHE_DIR`: artifact cache directory
    /// - `COLSORT_BATCH_SIZE`: rows per output batch
    /// - `COLSORT_MEM_CAP_BYTES`: memory cap in bytes
    /// - `COLSORT_LOCK_POLL_MS`: lock retry interval
    /// - `COLSORT_LOCK_TIMEOUT_MS`: lock wait limit
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("COLSORT_CACHE_DIR") {
            if !s.trim().is_empty() {
                cfg.cache_dir = PathBuf::from(s);
            }
        }

        if let Ok(s) = std::env::var("COLSORT_BATCH_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.batch_size = v;
            }
        }

        if let Ok(s) = std::env::var("COLSORT_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("COLSORT_LOCK_POLL_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.lock_poll_ms = v;
            }
        }

        if let Ok(s) = std::env::var("COLSORT_LOCK_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.lock_timeout_ms = Some(v);
            }
        }

        cfg
    }

    /// Builder-style override of the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_mem_cap_bytes(mut self, bytes: usize) -> Self {
        self.mem_cap_bytes = bytes;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout_ms = timeout.map(|d| d.as_millis() as u64);
        self
    }

    pub fn lock_poll(&self) -> Duration {
        Duration::from_millis(self.lock_poll_ms.max(1))
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".into()));
        }
        if self.batch_size > u32::MAX as usize {
            return Err(Error::Config(format!(
                "batch_size {} exceeds the addressable row range",
                self.batch_size
            )));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("cache_dir must not be empty".into()));
        }
        Ok(())
    }

    /// Parse a JSON config document and validate it.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: SortConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = SortConfig::default();
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.lock_timeout(), None);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let cfg = SortConfig::default().with_batch_size(0);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn json_round_trip() {
        let cfg = SortConfig::default()
            .with_cache_dir("/tmp/colsort-test")
            .with_lock_timeout(Some(Duration::from_millis(250)));
        let text = serde_json::to_string(&cfg).unwrap();
        let back = SortConfig::from_json_str(&text).unwrap();
        assert_eq!(back.cache_dir, PathBuf::from("/tmp/colsort-test"));
        assert_eq!(back.lock_timeout(), Some(Duration::from_millis(250)));
    }
}
