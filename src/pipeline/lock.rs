//! Per-version generation lock.
//!
//! The lock is a file created with `create_new`, so exactly one process
//! holds it at a time. A lock whose mtime is older than the configured
//! staleness threshold belongs to a crashed run and is reclaimed.

use super::CancellationToken;
use crate::config::LockConfig;
use crate::error::{PipelineError, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Held generation lock; the file is removed on drop.
#[derive(Debug)]
pub struct GenerationLock {
    path: PathBuf,
}

impl GenerationLock {
    /// Block until the lock is acquired, the timeout passes, or `cancel` trips.
    pub fn acquire(path: &Path, config: &LockConfig, cancel: &CancellationToken) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let started = Instant::now();
        let mut announced = false;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "pid={}", std::process::id())?;
                    writeln!(file, "acquired={}", chrono::Utc::now().to_rfc3339())?;
                    tracing::debug!(lock = %path.display(), "generation lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            if is_stale(path, config) && reclaim(path, config)? {
                continue;
            }

            let waited = started.elapsed();
            if waited >= config.timeout {
                return Err(PipelineError::LockTimeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            cancel.check()?;

            if !announced {
                tracing::info!(lock = %path.display(), "waiting for another generation to finish");
                announced = true;
            }
            std::thread::sleep(config.retry_interval);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for GenerationLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release generation lock");
        }
    }
}

/// Move a stale lock aside and delete it. Returns `true` when the caller
/// should retry `create_new` right away.
///
/// The lock is renamed to a name unique to this attempt first, so a waiter
/// that lost the race inspects the file it actually took. If that file turns
/// out to be fresh, it was just created by another waiter and is put back.
fn reclaim(path: &Path, config: &LockConfig) -> Result<bool> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut parked_name = path.file_name().unwrap_or_default().to_os_string();
    parked_name.push(format!(".stale-{}-{}", std::process::id(), nanos));
    let parked = path.with_file_name(parked_name);

    match std::fs::rename(path, &parked) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    if !is_stale(&parked, config) {
        tracing::debug!(lock = %path.display(), "lock was reclaimed by another waiter");
        if let Err(e) = std::fs::hard_link(&parked, path) {
            tracing::warn!(lock = %path.display(), error = %e, "failed to restore generation lock");
        }
        std::fs::remove_file(&parked)?;
        return Ok(false);
    }

    tracing::warn!(lock = %path.display(), "reclaiming abandoned generation lock");
    std::fs::remove_file(&parked)?;
    Ok(true)
}

fn is_stale(path: &Path, config: &LockConfig) -> bool {
    let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age > config.stale_after)
}
