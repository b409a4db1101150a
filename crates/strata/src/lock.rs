// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Advisory locks guarding concurrent builds of the same environment.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(test)]
#[path = "./lock_test.rs"]
mod lock_test;

/// Who holds a build lock, written into the lock file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockMetadata {
    pub env_name: String,
    pub project: PathBuf,
    pub pid: u32,
    pub hostname: String,
    pub acquired: DateTime<Utc>,
    pub strata_version: String,
}

impl LockMetadata {
    fn describe(&self) -> String {
        format!(
            "pid {} on {}, building {:?} since {}",
            self.pid,
            self.hostname,
            self.project,
            self.acquired.to_rfc3339()
        )
    }
}

/// How a build lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Held alongside other shared holders, to read an environment such as
    /// a template being cloned.
    Shared,
    /// Sole holder, to create or change an environment.
    Exclusive,
}

/// A lock on one environment name, released on drop.
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
    path: PathBuf,
    mode: LockMode,
}

impl BuildLock {
    /// Take the exclusive lock for `env_name` without waiting.
    ///
    /// Fails with [`Error::EnvironmentLocked`] when another process holds it
    /// in any mode.
    pub fn acquire(lock_dir: &Path, env_name: &str, project: &Path) -> crate::Result<Self> {
        Self::acquire_with(lock_dir, env_name, project, LockMode::Exclusive)
    }

    /// Take a shared lock for `env_name` without waiting.
    ///
    /// Fails with [`Error::EnvironmentLocked`] while an exclusive holder is
    /// building the environment.
    pub fn acquire_shared(lock_dir: &Path, env_name: &str, project: &Path) -> crate::Result<Self> {
        Self::acquire_with(lock_dir, env_name, project, LockMode::Shared)
    }

    pub fn acquire_with(
        lock_dir: &Path,
        env_name: &str,
        project: &Path,
        mode: LockMode,
    ) -> crate::Result<Self> {
        let path = lock_path(lock_dir, env_name);
        let lock_failed = |error: io::Error| Error::LockFailed {
            path: path.clone(),
            error,
        };

        std::fs::create_dir_all(lock_dir).map_err(lock_failed)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_failed)?;

        if let Err(err) = try_lock(&file, mode) {
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(Error::EnvironmentLocked {
                    env_name: env_name.to_string(),
                    holder: read_holder(&path),
                    lock_path: path,
                });
            }
            return Err(lock_failed(err));
        }

        // shared holders leave the exclusive holder's record in place
        if mode == LockMode::Shared {
            tracing::debug!(env = %env_name, path = ?path, "acquired shared build lock");
            return Ok(Self {
                _file: file,
                path,
                mode,
            });
        }

        let metadata = LockMetadata {
            env_name: env_name.to_string(),
            project: project.to_path_buf(),
            pid: std::process::id(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            acquired: Utc::now(),
            strata_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        file.set_len(0).map_err(lock_failed)?;
        serde_yaml::to_writer(&file, &metadata).map_err(|e| lock_failed(io::Error::other(e)))?;

        tracing::debug!(env = %env_name, path = ?path, "acquired build lock");
        Ok(Self {
            _file: file,
            path,
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Read back the metadata recorded when the lock was taken.
    pub fn read_metadata(&self) -> crate::Result<LockMetadata> {
        let yaml = std::fs::read_to_string(&self.path).map_err(|error| Error::ReadFailed {
            path: self.path.clone(),
            error,
        })?;
        serde_yaml::from_str(&yaml).map_err(|e| Error::Io(io::Error::other(e)))
    }
}

/// Lock file used for an environment name.
pub fn lock_path(lock_dir: &Path, env_name: &str) -> PathBuf {
    let file_name: String = env_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    lock_dir.join(format!("{file_name}.lock"))
}

fn read_holder(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|yaml| serde_yaml::from_str::<LockMetadata>(&yaml).ok())
        .map(|metadata| metadata.describe())
        .unwrap_or_else(|| "holder unknown".to_string())
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
    use rustix::fs::{FlockOperation, flock};

    let operation = match mode {
        LockMode::Shared => FlockOperation::NonBlockingLockShared,
        LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
    };
    flock(file, operation).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn try_lock(_file: &File, _mode: LockMode) -> io::Result<()> {
    // TODO: use LockFileEx so concurrent builds are also caught on windows
    Ok(())
}
