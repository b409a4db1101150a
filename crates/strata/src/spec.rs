// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Conda environment files and the base environment they describe.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, TEMPLATE_SUFFIX};

#[cfg(test)]
#[path = "./spec_test.rs"]
mod spec_test;

/// The parts of a conda `environment.yaml` that strata reads.
///
/// Everything else in the file is passed to conda untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvFile {
    /// Environment name, required.
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,

    /// Package specs; entries are strings or nested tables such as `pip:`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<serde_yaml::Value>,

    /// Path to the file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl EnvFile {
    /// Parse an environment file's content. `path` is only used in errors.
    pub fn from_yaml<S: AsRef<str>>(yaml: S, path: &Path) -> crate::Result<Self> {
        let malformed = |reason: String| Error::BaseEnvMalformed {
            path: path.to_path_buf(),
            reason,
        };

        // Stage 1: check the name separately for a precise message
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml.as_ref()).map_err(|e| malformed(e.to_string()))?;
        match value.get("name") {
            None => return Err(malformed("missing 'name' field".to_string())),
            Some(serde_yaml::Value::String(name)) if name.is_empty() => {
                return Err(malformed("'name' must not be empty".to_string()));
            }
            Some(serde_yaml::Value::String(_)) => {}
            Some(_) => return Err(malformed("'name' must be a string".to_string())),
        }

        // Stage 2: the full structure
        serde_yaml::from_value(value).map_err(|e| malformed(e.to_string()))
    }

    /// Load an environment file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;

        let mut file = Self::from_yaml(yaml, path)?;
        file.source_path = Some(path.to_path_buf());
        Ok(file)
    }
}

/// A resolved system-layer environment description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseEnvSpec {
    /// The environment file this came from.
    pub source_path: PathBuf,

    /// The `name` declared inside that file.
    pub declared_name: String,

    /// True when `declared_name` ends in `-base`: the file describes a
    /// template that is cloned once per project.
    pub is_base_template: bool,

    pub channels: Vec<String>,

    /// Flattened package specs, `pip:` entries prefixed with `pip:`.
    pub dependencies: Vec<String>,
}

impl BaseEnvSpec {
    /// Load and interpret the environment file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = EnvFile::load(path)?;
        Ok(Self::from_env_file(file, path))
    }

    pub fn from_env_file(file: EnvFile, source_path: &Path) -> Self {
        let is_base_template = file.name.ends_with(TEMPLATE_SUFFIX);
        Self {
            source_path: source_path.to_path_buf(),
            is_base_template,
            channels: file.channels,
            dependencies: flatten_dependencies(&file.dependencies),
            declared_name: file.name,
        }
    }

    /// The declared name without its `-base` suffix, for templates.
    pub fn template_stem(&self) -> Option<&str> {
        if !self.is_base_template {
            return None;
        }
        self.declared_name.strip_suffix(TEMPLATE_SUFFIX)
    }
}

fn flatten_dependencies(values: &[serde_yaml::Value]) -> Vec<String> {
    let mut flat = Vec::new();
    for value in values {
        match value {
            serde_yaml::Value::String(dep) => flat.push(dep.clone()),
            serde_yaml::Value::Mapping(nested) => {
                for (manager, deps) in nested {
                    let Some(manager) = manager.as_str() else {
                        continue;
                    };
                    let Some(deps) = deps.as_sequence() else {
                        continue;
                    };
                    flat.extend(
                        deps.iter()
                            .filter_map(serde_yaml::Value::as_str)
                            .map(|dep| format!("{manager}:{dep}")),
                    );
                }
            }
            other => {
                if let Ok(rendered) = serde_yaml::to_string(other) {
                    flat.push(rendered.trim().to_string());
                }
            }
        }
    }
    flat
}
