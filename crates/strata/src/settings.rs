// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Tool settings, layered from defaults, config files and `STRATA_*` variables.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

#[cfg(test)]
#[path = "./settings_test.rs"]
mod settings_test;

/// System-wide config file, without extension.
const SYSTEM_CONFIG: &str = "/etc/strata/config";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// conda executable used for the system layer.
    pub conda_exe: String,

    /// poetry executable used for the application layer.
    pub poetry_exe: String,

    /// Directory holding per-environment build locks.
    pub lock_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conda_exe: "conda".to_string(),
            poetry_exe: "poetry".to_string(),
            lock_dir: default_lock_dir(),
        }
    }
}

impl Settings {
    /// Load settings from the standard locations.
    ///
    /// Later sources win: `/etc/strata/config.*`, the user config
    /// `<config dir>/strata/config.*`, then `STRATA_*` environment variables.
    pub fn load() -> crate::Result<Self> {
        let mut files = vec![PathBuf::from(SYSTEM_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            files.push(config_dir.join("strata").join("config"));
        }
        Self::load_from(&files, true)
    }

    /// Load settings from the given config files (extensions optional,
    /// missing files skipped), optionally reading the environment too.
    pub fn load_from<P: AsRef<Path>>(files: &[P], read_env: bool) -> crate::Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("conda_exe", defaults.conda_exe)?
            .set_default("poetry_exe", defaults.poetry_exe)?
            .set_default("lock_dir", defaults.lock_dir.to_string_lossy().into_owned())?;

        for file in files {
            let Some(name) = file.as_ref().to_str() else {
                tracing::warn!(path = ?file.as_ref(), "skipping non utf-8 config path");
                continue;
            };
            builder = builder.add_source(File::with_name(name).required(false));
        }

        if read_env {
            builder = builder.add_source(Environment::with_prefix("STRATA"));
        }

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.lock_dir = expand_path(&settings.lock_dir);
        tracing::debug!(?settings, "loaded settings");
        Ok(settings)
    }
}

fn default_lock_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("strata")
        .join("locks")
}

/// Expand `~` and environment variables, leaving the path as written if
/// expansion fails.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => path.to_path_buf(),
    }
}
