// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The interface through which the engine sees and changes named environments.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::plan::ResolvedEnvironment;

/// Which half of a layered install an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Interpreter and native libraries, provisioned by conda.
    System,
    /// The project's own dependencies, installed by poetry.
    Application,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::System => f.write_str("system"),
            Layer::Application => f.write_str("application"),
        }
    }
}

/// Result of one finished external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Exit status, or None if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutcome {
    /// A successful invocation with no output.
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    /// A failed invocation with the given status and error output.
    pub fn failure<S: Into<String>>(code: i32, stderr: S) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Captured output for error reports, stderr last.
    pub fn output(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Named environments and the two package managers that fill them.
///
/// Mutating calls report the tool's exit status through [`ExecOutcome`];
/// an `Err` means the tool could not be run at all.
#[async_trait]
pub trait EnvironmentRegistry: Send + Sync {
    /// Whether a system-layer environment with this name is registered.
    async fn exists(&self, name: &str) -> crate::Result<bool>;

    /// Whether the application package manager already has an environment
    /// for the project at `project`.
    async fn application_env_exists(&self, project: &Path) -> crate::Result<bool>;

    /// Create the environment `name` from the system-layer spec file.
    async fn create(&self, name: &str, spec: &Path) -> crate::Result<ExecOutcome>;

    /// Copy the environment `source`, package for package, into `target`.
    async fn clone_env(&self, source: &str, target: &str) -> crate::Result<ExecOutcome>;

    /// Re-apply a system-layer spec to an existing environment.
    async fn install_system_deps(&self, name: &str, spec: &Path) -> crate::Result<ExecOutcome>;

    /// Install the project's dependencies (and the project itself) into the
    /// resolved environment.
    async fn install_application_deps(
        &self,
        env: &ResolvedEnvironment,
        project: &Path,
        extras: &[String],
    ) -> crate::Result<ExecOutcome>;

    /// Run a command inside the resolved environment, returning its exit code.
    async fn run(
        &self,
        env: &ResolvedEnvironment,
        project: &Path,
        command: &[String],
        vars: &[(String, String)],
    ) -> crate::Result<i32>;
}
