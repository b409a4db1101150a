// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for strata operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::Layer;

/// Convenience Result type with strata Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during strata operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// No pyproject.toml in the project directory
    #[error("No pyproject.toml found for project {0:?}")]
    #[diagnostic(
        code(strata::manifest_not_found),
        help("Point --project at a directory containing a pyproject.toml")
    )]
    ManifestNotFound(PathBuf),

    /// pyproject.toml (or its poetry.toml companion) could not be used
    #[error("Invalid project manifest {path:?}: {reason}")]
    #[diagnostic(
        code(strata::manifest_malformed),
        help("A project needs a string 'name' under [tool.poetry] or [project]")
    )]
    ManifestMalformed { path: PathBuf, reason: String },

    /// The base_env named in the manifest does not exist
    #[error("Base environment file {path:?} for project {project:?} does not exist")]
    #[diagnostic(
        code(strata::base_env_not_found),
        help("Check [tool.strata] base_env; relative paths are resolved from the project directory")
    )]
    BaseEnvNotFound { project: PathBuf, path: PathBuf },

    /// Environment file is not valid YAML or has no name
    #[error("Invalid environment file {path:?}: {reason}")]
    #[diagnostic(
        code(strata::base_env_malformed),
        help("Environment files need a top-level 'name' field")
    )]
    BaseEnvMalformed { path: PathBuf, reason: String },

    /// An external tool invocation failed while building
    #[error(
        "Building project {project:?} failed in the {layer} layer: {operation} exited with {}\n{output}",
        display_code(.code)
    )]
    #[diagnostic(
        code(strata::build_failed),
        help("Partially built environments are left in place; remove them manually if needed")
    )]
    Build {
        project: PathBuf,
        layer: Layer,
        operation: String,
        code: Option<i32>,
        output: String,
    },

    /// Another build currently holds the environment lock
    #[error("Environment '{env_name}' is being built by another process ({holder})")]
    #[diagnostic(
        code(strata::environment_locked),
        help(
            "If no other build is running, remove the lock file: {}",
            lock_path.display()
        )
    )]
    EnvironmentLocked {
        env_name: String,
        holder: String,
        lock_path: PathBuf,
    },

    /// Failed to open or lock a lock file
    #[error("Failed to lock {path:?}")]
    #[diagnostic(code(strata::lock_failed))]
    LockFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(strata::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// An external tool could not be started at all
    #[error("Failed to execute '{program}'")]
    #[diagnostic(
        code(strata::spawn_failed),
        help("Make sure the tool is installed or configure its path with STRATA_CONDA_EXE / STRATA_POETRY_EXE")
    )]
    Spawn {
        program: String,
        #[source]
        error: std::io::Error,
    },

    /// A variables file for `run` could not be loaded
    #[error("Failed to load environment variables from {path:?}")]
    #[diagnostic(code(strata::vars_file))]
    VarsFile {
        path: PathBuf,
        #[source]
        error: dotenv::Error,
    },

    /// `run` was invoked without a command
    #[error("Must provide a command to run")]
    #[diagnostic(code(strata::empty_command))]
    EmptyCommand,

    /// Settings could not be loaded
    #[error(transparent)]
    #[diagnostic(code(strata::config_error))]
    Config(#[from] config::ConfigError),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(strata::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status reported for this error.
    ///
    /// Every resolution and build failure kind has its own status so that
    /// callers can tell them apart without parsing messages.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ManifestNotFound(_) => 3,
            Error::ManifestMalformed { .. } => 4,
            Error::BaseEnvNotFound { .. } => 5,
            Error::BaseEnvMalformed { .. } => 6,
            Error::Build {
                layer: Layer::System,
                ..
            } => 7,
            Error::Build {
                layer: Layer::Application,
                ..
            } => 8,
            Error::EnvironmentLocked { .. } => 9,
            _ => 1,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
