//! Advisory per-package publish lock.
//!
//! Two publishes of the same package would open competing edits. The lock is a
//! `flock` on `{lock_dir}/{package}.lock`, held for the lifetime of
//! [`PackageLock`] and released by the kernel if the process dies.

use crate::error::{PublishError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Held lock; dropping it releases the lock
#[derive(Debug)]
pub struct PackageLock {
    path: PathBuf,
    package: String,
    /// CRITICAL: the lock lives exactly as long as this handle
    #[cfg(unix)]
    _handle: nix::fcntl::Flock<fs::File>,
    #[cfg(not(unix))]
    _handle: fs::File,
}

impl PackageLock {
    /// Acquire the lock for `package`, waiting up to `timeout`
    pub async fn acquire(lock_dir: &Path, package: &str, timeout: Duration) -> Result<Self> {
        fs::create_dir_all(lock_dir).map_err(|e| PublishError::Lock {
            package: package.to_string(),
            reason: format!("cannot create lock directory {}: {}", lock_dir.display(), e),
        })?;

        let path = lock_dir.join(format!("{}.lock", package));
        let deadline = Instant::now() + timeout;

        loop {
            match Self::try_acquire(&path, package)? {
                Some(lock) => {
                    log::debug!("Acquired publish lock {}", path.display());
                    return Ok(lock);
                }
                None if Instant::now() >= deadline => {
                    return Err(PublishError::Lock {
                        package: package.to_string(),
                        reason: format!(
                            "held by another process ({}) after waiting {:.1}s",
                            path.display(),
                            timeout.as_secs_f64()
                        ),
                    });
                }
                None => {
                    log::debug!("Publish lock {} busy, waiting...", path.display());
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Package the lock is keyed by
    pub fn package(&self) -> &str {
        &self.package
    }

    #[cfg(unix)]
    fn try_acquire(path: &Path, package: &str) -> Result<Option<Self>> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let file = open_lock_file(path, package)?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(mut locked) => {
                write_owner(&mut locked);
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    package: package.to_string(),
                    _handle: locked,
                }))
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, errno)) => Err(PublishError::Lock {
                package: package.to_string(),
                reason: format!("flock error: {}", errno),
            }),
        }
    }

    /// Without flock, the lock file's existence is the lock
    #[cfg(not(unix))]
    fn try_acquire(path: &Path, package: &str) -> Result<Option<Self>> {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                write_owner(&mut file);
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    package: package.to_string(),
                    _handle: file,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(PublishError::Lock {
                package: package.to_string(),
                reason: format!("failed to create lock file: {}", e),
            }),
        }
    }
}

#[cfg(not(unix))]
impl Drop for PackageLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn open_lock_file(path: &Path, package: &str) -> Result<fs::File> {
    fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| PublishError::Lock {
            package: package.to_string(),
            reason: format!("failed to open lock file {}: {}", path.display(), e),
        })
}

/// Record our PID for humans inspecting a stuck lock; best effort
fn write_owner(file: &mut fs::File) {
    let owner = serde_json::json!({
        "pid": std::process::id(),
        "acquired_at": chrono::Utc::now().to_rfc3339(),
    });
    let _ = file.set_len(0);
    let _ = file.write_all(owner.to_string().as_bytes());
    let _ = file.sync_all();
}
