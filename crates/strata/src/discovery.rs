// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery of the environment file a project inherits.

use std::path::{Path, PathBuf};

use serde::Serialize;

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

use crate::{BaseEnvSpec, ENV_FILENAMES, Error, ProjectSpec};

/// Result of walking up a directory tree looking for a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// The first matching file, nearest to the start directory.
    pub found: Option<PathBuf>,

    /// Every candidate path checked, in the order checked.
    pub trail: Vec<PathBuf>,
}

/// How a project's base environment was (or was not) found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BaseResolution {
    /// The base environment, if any applies.
    pub base: Option<BaseEnvSpec>,

    /// The tree search, when one was performed.
    pub search: Option<SearchOutcome>,
}

/// Walk up from `start`, checking each directory for any of `names`.
///
/// Within a directory the names are checked in the given order. The walk
/// stops at the first match or after the filesystem root. Only the
/// filesystem is read; nothing is cached between calls.
pub fn find_upward<P: AsRef<Path>>(start: P, names: &[&str]) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();
    let mut current = Some(start.as_ref());

    while let Some(dir) = current {
        for name in names {
            let candidate = dir.join(name);
            let is_file = candidate.is_file();
            outcome.trail.push(candidate);
            if is_file {
                outcome.found = outcome.trail.last().cloned();
                return outcome;
            }
        }
        current = dir.parent();
    }

    outcome
}

/// Locate and load the base environment for a project.
///
/// An explicit `base_env` in the manifest is loaded as-is and must exist;
/// otherwise the tree above the project is searched, and finding nothing is
/// a valid result.
pub fn resolve_base_env(project: &ProjectSpec) -> crate::Result<BaseResolution> {
    if let Some(explicit) = &project.explicit_base_env {
        if !explicit.is_file() {
            return Err(Error::BaseEnvNotFound {
                project: project.path.clone(),
                path: explicit.clone(),
            });
        }
        tracing::debug!(path = ?explicit, "using explicit base environment");
        return Ok(BaseResolution {
            base: Some(BaseEnvSpec::load(explicit)?),
            search: None,
        });
    }

    let search = find_upward(&project.path, &ENV_FILENAMES);
    let base = match &search.found {
        Some(path) => {
            tracing::debug!(path = ?path, "discovered base environment");
            Some(BaseEnvSpec::load(path)?)
        }
        None => {
            tracing::debug!(
                checked = search.trail.len(),
                "no environment file above project"
            );
            None
        }
    };

    Ok(BaseResolution {
        base,
        search: Some(search),
    })
}
