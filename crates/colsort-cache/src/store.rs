use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};

pub const ARTIFACT_EXT: &str = "kernel";
pub const SOURCE_EXT: &str = "src";
pub const LOCK_EXT: &str = "lock";

/// Cache directory on the local filesystem, one set of files per signature.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (and create if needed) the cache directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, signature: &str) -> PathBuf {
        self.root.join(format!("{signature}.{ARTIFACT_EXT}"))
    }

    pub fn source_path(&self, signature: &str) -> PathBuf {
        self.root.join(format!("{signature}.{SOURCE_EXT}"))
    }

    pub fn lock_path(&self, signature: &str) -> PathBuf {
        self.root.join(format!("{signature}.{LOCK_EXT}"))
    }

    pub fn write_source(&self, signature: &str, text: &str) -> Result<PathBuf> {
        let p = self.source_path(signature);
        write_file(&p, text.as_bytes())?;
        Ok(p)
    }

    pub fn remove_source(&self, signature: &str) -> Result<()> {
        remove_if_exists(&self.source_path(signature))
    }

    /// Artifact bytes, or `None` when nothing has been compiled yet.
    pub fn read_artifact(&self, signature: &str) -> Result<Option<Vec<u8>>> {
        let p = self.artifact_path(signature);
        match fs::read(&p) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(p, e)),
        }
    }

    /// Publish an artifact. The bytes go to a uniquely named temp file first
    /// and are renamed into place, so readers never observe a partial file.
    pub fn commit_artifact(&self, signature: &str, bytes: &[u8]) -> Result<PathBuf> {
        let tmp = self
            .root
            .join(format!(".{signature}.{}.tmp", uuid::Uuid::new_v4()));
        write_file(&tmp, bytes)?;
        let dst = self.artifact_path(signature);
        if let Err(e) = fs::rename(&tmp, &dst) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::io(dst, e));
        }
        Ok(dst)
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.artifact_path(signature).is_file()
    }

    /// Drop the artifact and any leftover source for `signature`.
    pub fn evict(&self, signature: &str) -> Result<()> {
        remove_if_exists(&self.artifact_path(signature))?;
        remove_if_exists(&self.source_path(signature))
    }

    /// Signatures with a committed artifact, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.root, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                out.push(stem.to_string());
            }
        }
        out.sort();
        Ok(out)
    }
}

fn write_file(p: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let mut f = File::create(p).map_err(|e| CacheError::io(p, e))?;
    f.write_all(bytes).map_err(|e| CacheError::io(p, e))?;
    f.sync_all().map_err(|e| CacheError::io(p, e))?;
    Ok(())
}

fn remove_if_exists(p: &Path) -> Result<()> {
    match fs::remove_file(p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(p, e)),
    }
}
