// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Deciding how to bring a project's environment up to date.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::{BaseEnvSpec, Layer, ProjectSpec};

#[cfg(test)]
#[path = "./plan_test.rs"]
mod plan_test;

/// Whether a system-layer environment underlies the project's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// A poetry-managed virtualenv only.
    ApplicationOnly,
    /// A conda environment with the project installed on top by poetry.
    Layered,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::ApplicationOnly => f.write_str("application-only"),
            Backend::Layered => f.write_str("layered"),
        }
    }
}

/// The environment a build targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvironment {
    pub env_name: String,
    pub backend: Backend,
    /// The template cloned into `env_name`, set only when the clone has not
    /// happened yet.
    pub template_env_name: Option<String>,
}

/// What a build has to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanStep {
    /// Nothing exists yet and there is no template to clone.
    CreateFresh,
    /// Clone `template` into the project's environment, creating the
    /// template first when it does not exist.
    CloneTemplate {
        template: String,
        create_template: bool,
    },
    /// The environment exists: leave the system layer alone and re-run the
    /// application install.
    ReuseAndSync,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::CreateFresh => f.write_str("create fresh"),
            PlanStep::CloneTemplate {
                template,
                create_template: true,
            } => write!(f, "create template '{template}' and clone it"),
            PlanStep::CloneTemplate { template, .. } => write!(f, "clone template '{template}'"),
            PlanStep::ReuseAndSync => f.write_str("reuse and sync"),
        }
    }
}

/// A single registry call made by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateEnvironment { name: String, spec: PathBuf },
    CloneEnvironment { source: String, target: String },
    UpdateSystem { name: String, spec: PathBuf },
    InstallApplication { name: String },
}

impl Operation {
    pub fn layer(&self) -> Layer {
        match self {
            Operation::CreateEnvironment { .. }
            | Operation::CloneEnvironment { .. }
            | Operation::UpdateSystem { .. } => Layer::System,
            Operation::InstallApplication { .. } => Layer::Application,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateEnvironment { name, spec } => {
                write!(f, "create '{name}' from {}", spec.display())
            }
            Operation::CloneEnvironment { source, target } => {
                write!(f, "clone '{source}' into '{target}'")
            }
            Operation::UpdateSystem { name, spec } => {
                write!(f, "update '{name}' from {}", spec.display())
            }
            Operation::InstallApplication { name } => {
                write!(f, "install application dependencies into '{name}'")
            }
        }
    }
}

/// The outcome of planning, consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub project_path: PathBuf,
    pub environment: ResolvedEnvironment,
    /// The system-layer spec file, for layered environments.
    pub system_spec: Option<PathBuf>,
    pub step: PlanStep,
}

impl BuildPlan {
    /// The registry calls this plan makes, in execution order.
    ///
    /// System-layer operations always come first; the application install
    /// is always last. `refresh_system` re-applies the system spec to an
    /// environment that is being reused.
    pub fn operations(&self, refresh_system: bool) -> Vec<Operation> {
        let name = &self.environment.env_name;
        let mut ops = Vec::new();

        match (&self.step, &self.system_spec) {
            (PlanStep::CreateFresh, Some(spec)) => ops.push(Operation::CreateEnvironment {
                name: name.clone(),
                spec: spec.clone(),
            }),
            (PlanStep::CreateFresh, None) => {}
            (
                PlanStep::CloneTemplate {
                    template,
                    create_template,
                },
                spec,
            ) => {
                match spec {
                    Some(spec) if *create_template => ops.push(Operation::CreateEnvironment {
                        name: template.clone(),
                        spec: spec.clone(),
                    }),
                    _ => {}
                }
                ops.push(Operation::CloneEnvironment {
                    source: template.clone(),
                    target: name.clone(),
                });
            }
            (PlanStep::ReuseAndSync, Some(spec)) if refresh_system => {
                ops.push(Operation::UpdateSystem {
                    name: name.clone(),
                    spec: spec.clone(),
                })
            }
            (PlanStep::ReuseAndSync, _) => {}
        }

        ops.push(Operation::InstallApplication { name: name.clone() });
        ops
    }
}

/// Plan the build of `env_name` for a project.
///
/// `exists` reports whether a named environment is already registered. The
/// base environment is ignored for projects that do not require a system
/// layer. An existing environment is always reused, never reconstructed.
pub fn plan<F>(
    project: &ProjectSpec,
    base: Option<&BaseEnvSpec>,
    env_name: &str,
    exists: F,
) -> BuildPlan
where
    F: Fn(&str) -> bool,
{
    let base = base.filter(|_| project.requires_system_layer);
    let backend = match base {
        Some(_) => Backend::Layered,
        None => Backend::ApplicationOnly,
    };

    let step = match base {
        _ if exists(env_name) => PlanStep::ReuseAndSync,
        // a project literally named "base" would clone the template onto
        // itself, so it builds the template's environment directly
        Some(base) if base.is_base_template && base.declared_name != env_name => {
            PlanStep::CloneTemplate {
                template: base.declared_name.clone(),
                create_template: !exists(&base.declared_name),
            }
        }
        _ => PlanStep::CreateFresh,
    };

    let template_env_name = match &step {
        PlanStep::CloneTemplate { template, .. } => Some(template.clone()),
        _ => None,
    };

    tracing::debug!(env = %env_name, %backend, step = %step, "planned build");

    BuildPlan {
        project_path: project.path.clone(),
        environment: ResolvedEnvironment {
            env_name: env_name.to_string(),
            backend,
            template_env_name,
        },
        system_spec: base.map(|b| b.source_path.clone()),
        step,
    }
}
