// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Project metadata read from `pyproject.toml` and `poetry.toml`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{Error, MANIFEST_FILENAME, POETRY_CONFIG_FILENAME};

#[cfg(test)]
#[path = "./project_test.rs"]
mod project_test;

/// Everything the engine needs to know about a project, built once per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSpec {
    /// Absolute path of the project root.
    pub path: PathBuf,

    /// Project name from the manifest, used verbatim in environment names.
    pub name: String,

    /// True when `poetry.toml` disables virtualenv creation, meaning the
    /// dependencies go into an externally managed (conda) environment.
    pub requires_system_layer: bool,

    /// Environment file named by `[tool.strata] base_env`, if any.
    /// Overrides the directory tree search.
    pub explicit_base_env: Option<PathBuf>,

    /// Optional dependency groups declared by the project.
    pub extras: Vec<String>,

    /// Entry points declared by the project.
    pub scripts: Vec<String>,
}

impl ProjectSpec {
    /// Check that every requested extra is declared by the project.
    pub fn validate_extras(&self, requested: &[String]) -> crate::Result<()> {
        let unknown: Vec<&str> = requested
            .iter()
            .filter(|e| !self.extras.contains(*e))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }

        let declared = if self.extras.is_empty() {
            "none".to_string()
        } else {
            self.extras.join(", ")
        };
        Err(Error::ManifestMalformed {
            path: self.path.join(MANIFEST_FILENAME),
            reason: format!(
                "unknown extras requested: {} (declared: {declared})",
                unknown.join(", ")
            ),
        })
    }
}

/// Read the project rooted at `project_path`.
pub fn describe<P: AsRef<Path>>(project_path: P) -> crate::Result<ProjectSpec> {
    let path = absolute_project_path(project_path.as_ref())?;
    let manifest_path = path.join(MANIFEST_FILENAME);
    if !manifest_path.is_file() {
        return Err(Error::ManifestNotFound(path));
    }

    let manifest = read_toml(&manifest_path)?;
    let name = manifest_name(&manifest, &manifest_path)?;
    let explicit_base_env = explicit_base_env(&manifest, &manifest_path)?
        .map(|base_env| path.join(base_env));

    let mut extras = table_keys(&manifest, &["tool", "poetry", "extras"]);
    extras.extend(table_keys(&manifest, &["project", "optional-dependencies"]));
    extras.sort();
    extras.dedup();

    let mut scripts = table_keys(&manifest, &["tool", "poetry", "scripts"]);
    scripts.extend(table_keys(&manifest, &["project", "scripts"]));
    scripts.sort();
    scripts.dedup();

    let requires_system_layer = requires_system_layer(&path)?;

    tracing::debug!(
        project = %name,
        path = ?path,
        requires_system_layer,
        "described project"
    );

    Ok(ProjectSpec {
        path,
        name,
        requires_system_layer,
        explicit_base_env,
        extras,
        scripts,
    })
}

/// Absolute form of the project path, without resolving symlinks if the
/// directory does not exist.
fn absolute_project_path(path: &Path) -> crate::Result<PathBuf> {
    match dunce::canonicalize(path) {
        Ok(path) => Ok(path),
        Err(_) => Ok(std::path::absolute(path)?),
    }
}

fn read_toml(path: &Path) -> crate::Result<toml::Table> {
    let content = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
        path: path.to_path_buf(),
        error,
    })?;
    content
        .parse::<toml::Table>()
        .map_err(|e| Error::ManifestMalformed {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })
}

fn lookup<'a>(table: &'a toml::Table, keys: &[&str]) -> Option<&'a toml::Value> {
    let (last, parents) = keys.split_last()?;
    let mut current = table;
    for key in parents {
        current = current.get(*key)?.as_table()?;
    }
    current.get(*last)
}

fn table_keys(table: &toml::Table, keys: &[&str]) -> Vec<String> {
    lookup(table, keys)
        .and_then(toml::Value::as_table)
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

fn manifest_name(manifest: &toml::Table, manifest_path: &Path) -> crate::Result<String> {
    let malformed = |reason: &str| Error::ManifestMalformed {
        path: manifest_path.to_path_buf(),
        reason: reason.to_string(),
    };

    let value = lookup(manifest, &["tool", "poetry", "name"])
        .or_else(|| lookup(manifest, &["project", "name"]))
        .ok_or_else(|| malformed("missing 'name' in [tool.poetry] or [project]"))?;

    match value.as_str() {
        Some("") => Err(malformed("'name' must not be empty")),
        Some(name) => Ok(name.to_string()),
        None => Err(malformed("'name' must be a string")),
    }
}

fn explicit_base_env(manifest: &toml::Table, manifest_path: &Path) -> crate::Result<Option<String>> {
    match lookup(manifest, &["tool", "strata", "base_env"]) {
        None => Ok(None),
        Some(toml::Value::String(path)) => Ok(Some(path.clone())),
        Some(_) => Err(Error::ManifestMalformed {
            path: manifest_path.to_path_buf(),
            reason: "[tool.strata] base_env must be a path string".to_string(),
        }),
    }
}

/// Whether the project's `poetry.toml` turns off virtualenv creation.
///
/// A missing file, table or key all mean the project manages its own
/// virtualenv.
fn requires_system_layer(project_path: &Path) -> crate::Result<bool> {
    let config_path = project_path.join(POETRY_CONFIG_FILENAME);
    if !config_path.is_file() {
        return Ok(false);
    }

    let config = read_toml(&config_path)?;
    match lookup(&config, &["virtualenvs", "create"]) {
        None => Ok(false),
        Some(toml::Value::Boolean(create)) => Ok(!create),
        Some(_) => Err(Error::ManifestMalformed {
            path: config_path,
            reason: "virtualenvs.create must be a boolean".to_string(),
        }),
    }
}
