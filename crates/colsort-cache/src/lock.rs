//! Per-signature exclusive lock.
//!
//! `<sig>.lock` carries an OS advisory lock (`flock`, exclusive). Each
//! acquisition opens its own descriptor, so the lock excludes other threads
//! as well as other processes sharing the cache directory. The kernel drops
//! the lock when its holder exits, so a crashed compile never wedges the
//! signature. The file is never removed, so every holder locks the same
//! inode.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

use crate::error::{CacheError, Result};

#[derive(Debug)]
pub struct SignatureLock;

impl SignatureLock {
    /// Block until the advisory lock on `path` is held, sleeping `poll`
    /// between attempts.
    ///
    /// With `timeout == None` this waits indefinitely; otherwise it returns
    /// `CacheError::LockTimeout` once the limit has passed.
    pub fn acquire(
        path: impl Into<PathBuf>,
        poll: Duration,
        timeout: Option<Duration>,
    ) -> Result<SignatureLockGuard> {
        let path = path.into();
        let started = Instant::now();
        let mut contended = false;
        let mut file = open_lock_file(&path)?;

        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => {
                    if contended {
                        tracing::debug!(
                            lock = %path.display(),
                            waited_ms = started.elapsed().as_millis() as u64,
                            "acquired kernel lock after waiting"
                        );
                    }
                    record_owner(&lock);
                    return Ok(SignatureLockGuard {
                        path,
                        lock: Some(lock),
                    });
                }
                Err((f, errno)) if errno == Errno::EWOULDBLOCK || errno == Errno::EINTR => {
                    file = f;
                    if !contended {
                        tracing::warn!(lock = %path.display(), "kernel lock held elsewhere; waiting");
                        contended = true;
                    }
                    if let Some(limit) = timeout {
                        if started.elapsed() >= limit {
                            return Err(CacheError::LockTimeout {
                                path,
                                waited_ms: started.elapsed().as_millis() as u64,
                            });
                        }
                    }
                    std::thread::sleep(poll);
                }
                Err((_, errno)) => return Err(CacheError::io(path, errno.into())),
            }
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| CacheError::io(path, e))
}

/// Owner pid, informational only.
fn record_owner(lock: &Flock<File>) {
    let mut f: &File = lock;
    let written = f
        .set_len(0)
        .and_then(|_| writeln!(f, "{}", std::process::id()));
    if let Err(e) = written {
        tracing::debug!(error = %e, "could not record kernel lock owner");
    }
}

/// Releases the lock on drop, on every exit path.
pub struct SignatureLockGuard {
    path: PathBuf,
    lock: Option<Flock<File>>,
}

impl std::fmt::Debug for SignatureLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureLockGuard")
            .field("path", &self.path)
            .field("held", &self.lock.is_some())
            .finish()
    }
}

impl SignatureLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SignatureLockGuard {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            // On failure the returned lock closes its descriptor, which
            // releases the flock anyway.
            if let Err((_, errno)) = lock.unlock() {
                tracing::error!(lock = %self.path.display(), error = %errno, "failed to release kernel lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn released_lock_can_be_taken_again_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.lock");
        {
            let g = SignatureLock::acquire(&p, Duration::from_millis(1), None).unwrap();
            assert!(g.path().exists());
        }
        // the file outlives the guard, the lock does not
        assert!(p.exists());
        SignatureLock::acquire(&p, Duration::from_millis(1), Some(Duration::ZERO)).unwrap();
    }

    #[test]
    fn leftover_lock_file_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("stale.lock");
        std::fs::write(&p, "4194303\n").unwrap();
        let g = SignatureLock::acquire(&p, Duration::from_millis(1), Some(Duration::ZERO)).unwrap();
        drop(g);
        let owner = std::fs::read_to_string(&p).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("b.lock");
        let _held = SignatureLock::acquire(&p, Duration::from_millis(1), None).unwrap();
        let err = SignatureLock::acquire(&p, Duration::from_millis(2), Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, CacheError::LockTimeout { .. }));
    }

    #[test]
    fn threads_take_turns() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(dir.path().join("c.lock"));
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&p);
                let inside = Arc::clone(&inside);
                std::thread::spawn(move || {
                    let _g = SignatureLock::acquire(p.as_path(), Duration::from_millis(1), None).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    std::thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
