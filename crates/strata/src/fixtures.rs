// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Test doubles and project tree helpers.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Backend, EnvironmentRegistry, ExecOutcome, ResolvedEnvironment};

/// A registry call, as recorded by [`InMemoryRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create {
        name: String,
        spec: PathBuf,
    },
    Clone {
        source: String,
        target: String,
    },
    UpdateSystem {
        name: String,
    },
    InstallApplication {
        env_name: String,
        backend: Backend,
        extras: Vec<String>,
    },
    Run {
        env_name: String,
        command: Vec<String>,
        vars: Vec<(String, String)>,
    },
}

#[derive(Debug, Default)]
struct State {
    environments: HashSet<String>,
    application_envs: HashSet<PathBuf>,
    calls: Vec<Call>,
    failures: HashMap<String, i32>,
    run_exit_code: i32,
}

/// An environment registry that keeps everything in memory.
///
/// A failing `create` still registers the environment, like a real package
/// manager leaving a partial environment behind.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given system-layer environments present.
    pub fn with_environments<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::default();
        registry
            .lock()
            .environments
            .extend(names.into_iter().map(Into::into));
        registry
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make `create` of `name` exit with `code`.
    pub fn fail_create(&self, name: &str, code: i32) {
        self.lock().failures.insert(format!("create:{name}"), code);
    }

    /// Make `clone_env` into `target` exit with `code`.
    pub fn fail_clone(&self, target: &str, code: i32) {
        self.lock().failures.insert(format!("clone:{target}"), code);
    }

    /// Make the application install into `env_name` exit with `code`.
    pub fn fail_install(&self, env_name: &str, code: i32) {
        self.lock()
            .failures
            .insert(format!("install:{env_name}"), code);
    }

    /// Exit code returned by `run`.
    pub fn set_run_exit_code(&self, code: i32) {
        self.lock().run_exit_code = code;
    }

    /// Drop a recorded failure, as if the cause was fixed.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn has_environment(&self, name: &str) -> bool {
        self.lock().environments.contains(name)
    }

    fn outcome(&self, key: &str) -> ExecOutcome {
        match self.lock().failures.get(key) {
            Some(code) => ExecOutcome::failure(*code, format!("{key} failed")),
            None => ExecOutcome::success(),
        }
    }
}

#[async_trait]
impl EnvironmentRegistry for InMemoryRegistry {
    async fn exists(&self, name: &str) -> crate::Result<bool> {
        Ok(self.lock().environments.contains(name))
    }

    async fn application_env_exists(&self, project: &Path) -> crate::Result<bool> {
        Ok(self.lock().application_envs.contains(project))
    }

    async fn create(&self, name: &str, spec: &Path) -> crate::Result<ExecOutcome> {
        let outcome = self.outcome(&format!("create:{name}"));
        let mut state = self.lock();
        state.calls.push(Call::Create {
            name: name.to_string(),
            spec: spec.to_path_buf(),
        });
        state.environments.insert(name.to_string());
        Ok(outcome)
    }

    async fn clone_env(&self, source: &str, target: &str) -> crate::Result<ExecOutcome> {
        let outcome = self.outcome(&format!("clone:{target}"));
        let mut state = self.lock();
        state.calls.push(Call::Clone {
            source: source.to_string(),
            target: target.to_string(),
        });
        if outcome.is_success() {
            state.environments.insert(target.to_string());
        }
        Ok(outcome)
    }

    async fn install_system_deps(&self, name: &str, _spec: &Path) -> crate::Result<ExecOutcome> {
        self.lock().calls.push(Call::UpdateSystem {
            name: name.to_string(),
        });
        Ok(ExecOutcome::success())
    }

    async fn install_application_deps(
        &self,
        env: &ResolvedEnvironment,
        project: &Path,
        extras: &[String],
    ) -> crate::Result<ExecOutcome> {
        let outcome = self.outcome(&format!("install:{}", env.env_name));
        let mut state = self.lock();
        state.calls.push(Call::InstallApplication {
            env_name: env.env_name.clone(),
            backend: env.backend,
            extras: extras.to_vec(),
        });
        if env.backend == Backend::ApplicationOnly {
            state.application_envs.insert(project.to_path_buf());
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        env: &ResolvedEnvironment,
        _project: &Path,
        command: &[String],
        vars: &[(String, String)],
    ) -> crate::Result<i32> {
        let mut state = self.lock();
        state.calls.push(Call::Run {
            env_name: env.env_name.clone(),
            command: command.to_vec(),
            vars: vars.to_vec(),
        });
        Ok(state.run_exit_code)
    }
}

/// Write a minimal poetry project named `name` into `dir`.
///
/// With `system_layer`, a `poetry.toml` disabling virtualenvs is written too.
pub fn write_project(dir: &Path, name: &str, system_layer: bool) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("pyproject.toml"),
        format!(
            r#"[tool.poetry]
name = "{name}"
version = "0.1.0"

[tool.poetry.dependencies]
python = "^3.10"

[tool.poetry.extras]
gpu = []
"#
        ),
    )
    .unwrap();
    if system_layer {
        std::fs::write(dir.join("poetry.toml"), "[virtualenvs]\ncreate = false\n").unwrap();
    }
    dir.to_path_buf()
}

/// Write a conda environment file declaring `name` into `dir`.
pub fn write_env_file(dir: &Path, filename: &str, name: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(filename);
    std::fs::write(
        &path,
        format!(
            r#"name: {name}
channels:
  - conda-forge
dependencies:
  - python=3.10
  - poetry
"#
        ),
    )
    .unwrap();
    path
}
