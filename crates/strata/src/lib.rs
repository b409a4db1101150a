// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! strata - Layered Project Environments
//!
//! This crate resolves, plans and builds the environment a python project runs
//! in. A project either lives in a plain application environment managed by
//! poetry, or in a *layered* environment: a conda environment providing the
//! system layer (interpreter, native libraries) with the project's own
//! dependencies installed on top by poetry.
//!
//! # Overview
//!
//! A project opts into the system layer by disabling virtualenv creation in its
//! `poetry.toml`. The conda environment file is then found by walking up the
//! directory tree from the project, so a single `environment.yaml` at the root
//! of a monorepo can serve every project beneath it.
//!
//! When that file's name ends in `-base` it describes a *template*: it is
//! created once, and every project gets its own clone named after it.
//!
//! # Example
//!
//! ```yaml
//! # monorepo/environment.yaml
//! name: team-base
//! channels:
//!   - conda-forge
//! dependencies:
//!   - python=3.10
//!   - poetry
//! ```
//!
//! ```toml
//! # monorepo/svc-a/poetry.toml
//! [virtualenvs]
//! create = false
//! ```
//!
//! Building `monorepo/svc-a` creates `team-base` if needed, clones it into
//! `team-svc-a` and runs `poetry install` inside the clone.

pub mod discovery;
pub mod engine;
pub mod error;
pub mod lock;
pub mod naming;
pub mod orchestrate;
pub mod plan;
pub mod project;
pub mod registry;
pub mod settings;
pub mod spec;
pub mod tools;
pub mod vars;

#[cfg(test)]
pub mod fixtures;

pub use discovery::{BaseResolution, SearchOutcome, find_upward, resolve_base_env};
pub use engine::{Engine, Resolution};
pub use error::{Error, Result};
pub use lock::{BuildLock, LockMetadata, LockMode};
pub use naming::environment_name;
pub use orchestrate::{BuildOptions, execute};
pub use plan::{Backend, BuildPlan, Operation, PlanStep, ResolvedEnvironment, plan};
pub use project::{ProjectSpec, describe};
pub use registry::{EnvironmentRegistry, ExecOutcome, Layer};
pub use settings::Settings;
pub use spec::{BaseEnvSpec, EnvFile};
pub use tools::ToolRegistry;
pub use vars::load_vars;

/// Project manifest read for every project.
pub const MANIFEST_FILENAME: &str = "pyproject.toml";

/// Companion poetry configuration deciding whether a system layer is needed.
pub const POETRY_CONFIG_FILENAME: &str = "poetry.toml";

/// Recognized conda environment filenames, in lookup order.
pub const ENV_FILENAMES: [&str; 2] = ["environment.yaml", "environment.yml"];

/// Suffix marking an environment file as a template to be cloned per project.
pub const TEMPLATE_SUFFIX: &str = "-base";

/// Variables file picked up by `run` when none is given explicitly.
pub const DOTENV_FILENAME: &str = ".env";
