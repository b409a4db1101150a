// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Extra environment variables for commands run inside an environment.

use std::path::{Path, PathBuf};

use crate::{DOTENV_FILENAME, Error};

#[cfg(test)]
#[path = "./vars_test.rs"]
mod vars_test;

/// Variables to set for `run`, in file order.
///
/// An explicit file must exist. Without one, the project's `.env` is used
/// when present, and no variables are set otherwise.
pub fn load_vars(project: &Path, explicit: Option<&Path>) -> crate::Result<Vec<(String, String)>> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let dotenv = project.join(DOTENV_FILENAME);
            if !dotenv.is_file() {
                return Ok(Vec::new());
            }
            dotenv
        }
    };

    let vars_error = |error: dotenv::Error| Error::VarsFile {
        path: path.clone(),
        error,
    };
    let iter = dotenv::from_path_iter(&path).map_err(vars_error)?;
    let vars = iter
        .collect::<Result<Vec<_>, _>>()
        .map_err(vars_error)?;

    tracing::debug!(path = ?path, count = vars.len(), "loaded run variables");
    Ok(vars)
}
