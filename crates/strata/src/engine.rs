// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The two public operations, `build` and `run`, wired from the pipeline
//! stages.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    BaseEnvSpec, BaseResolution, BuildLock, BuildOptions, BuildPlan, EnvironmentRegistry, Error,
    LockMode, PlanStep, ProjectSpec, ResolvedEnvironment, Settings, describe, environment_name,
    execute, plan, resolve_base_env,
};

#[cfg(test)]
#[path = "./engine_test.rs"]
mod engine_test;

/// Everything known about a project before anything is built.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub project: ProjectSpec,
    pub base: BaseResolution,
    pub plan: BuildPlan,
}

impl Resolution {
    /// The base environment that applies, if any.
    pub fn base_env(&self) -> Option<&BaseEnvSpec> {
        self.base.base.as_ref()
    }

    pub fn environment(&self) -> &ResolvedEnvironment {
        &self.plan.environment
    }
}

/// Builds and runs project environments through a registry.
#[derive(Debug)]
pub struct Engine<R> {
    registry: R,
    lock_dir: PathBuf,
    options: BuildOptions,
}

impl<R> Engine<R>
where
    R: EnvironmentRegistry,
{
    pub fn new(registry: R, settings: &Settings) -> Self {
        Self {
            registry,
            lock_dir: settings.lock_dir.clone(),
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Resolve a project and plan its build without changing anything.
    pub async fn resolve<P: AsRef<Path>>(&self, project_path: P) -> crate::Result<Resolution> {
        let project = describe(project_path)?;
        self.resolve_project(project).await
    }

    /// Bring the project's environment up to date.
    pub async fn build<P: AsRef<Path>>(
        &self,
        project_path: P,
    ) -> crate::Result<ResolvedEnvironment> {
        let (_, env) = self.build_project(project_path.as_ref()).await?;
        Ok(env)
    }

    /// Build the project's environment, then run `command` inside it.
    ///
    /// Returns the command's exit code unchanged. Build locks are released
    /// before the command starts.
    pub async fn run<P: AsRef<Path>>(
        &self,
        project_path: P,
        command: &[String],
        vars: &[(String, String)],
    ) -> crate::Result<i32> {
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let (project, env) = self.build_project(project_path.as_ref()).await?;
        tracing::info!(env = %env.env_name, command = ?command, "running");
        self.registry.run(&env, &project.path, command, vars).await
    }

    async fn build_project(
        &self,
        project_path: &Path,
    ) -> crate::Result<(ProjectSpec, ResolvedEnvironment)> {
        let project = describe(project_path)?;
        project.validate_extras(&self.options.extras)?;

        let resolution = self.resolve_project(project).await?;
        let mut locks = Vec::new();
        self.lock_plan(&resolution.plan, &resolution.project, &mut locks)?;

        // another build may have finished between planning and locking
        let plan = self
            .plan_project(&resolution.project, resolution.base_env())
            .await?;
        self.lock_plan(&plan, &resolution.project, &mut locks)?;

        let env = execute(&plan, &self.registry, &self.options).await?;
        tracing::info!(env = %env.env_name, backend = %env.backend, "environment ready");
        drop(locks);

        Ok((resolution.project, env))
    }

    async fn resolve_project(&self, project: ProjectSpec) -> crate::Result<Resolution> {
        let base = if project.requires_system_layer {
            let base = resolve_base_env(&project)?;
            if base.base.is_none() {
                tracing::warn!(
                    project = %project.name,
                    "project disables virtualenvs but no environment file was found, \
                     using an application-only environment"
                );
            }
            base
        } else {
            if let Some(path) = &project.explicit_base_env {
                tracing::info!(
                    path = ?path,
                    "ignoring base_env, the project does not use a system layer"
                );
            }
            BaseResolution::default()
        };

        let plan = self.plan_project(&project, base.base.as_ref()).await?;
        Ok(Resolution {
            project,
            base,
            plan,
        })
    }

    async fn plan_project(
        &self,
        project: &ProjectSpec,
        base: Option<&BaseEnvSpec>,
    ) -> crate::Result<BuildPlan> {
        let env_name = environment_name(project, base);
        let existing = self.existing_environments(project, base, &env_name).await?;
        Ok(plan(project, base, &env_name, |name| existing.contains(name)))
    }

    /// Which of the environments a plan could touch already exist.
    async fn existing_environments(
        &self,
        project: &ProjectSpec,
        base: Option<&BaseEnvSpec>,
        env_name: &str,
    ) -> crate::Result<HashSet<String>> {
        let mut existing = HashSet::new();
        let Some(base) = base else {
            if self.registry.application_env_exists(&project.path).await? {
                existing.insert(env_name.to_string());
            }
            return Ok(existing);
        };

        let mut names = vec![env_name];
        if base.is_base_template && base.declared_name != env_name {
            names.push(&base.declared_name);
        }
        for name in names {
            if self.registry.exists(name).await? {
                existing.insert(name.to_string());
            }
        }
        Ok(existing)
    }

    /// Take the locks `plan` needs that are not held yet, template first.
    ///
    /// A template is locked exclusively while it is created and shared while
    /// it is cloned, so no clone starts from a template still being built.
    fn lock_plan(
        &self,
        plan: &BuildPlan,
        project: &ProjectSpec,
        locks: &mut Vec<BuildLock>,
    ) -> crate::Result<()> {
        let mut wanted = Vec::new();
        if let PlanStep::CloneTemplate {
            template,
            create_template,
        } = &plan.step
        {
            let mode = if *create_template {
                LockMode::Exclusive
            } else {
                LockMode::Shared
            };
            wanted.push((template.as_str(), mode));
        }
        wanted.push((plan.environment.env_name.as_str(), LockMode::Exclusive));

        for (name, mode) in wanted {
            let path = crate::lock::lock_path(&self.lock_dir, name);
            if let Some(index) = locks.iter().position(|held| held.path() == path) {
                if locks[index].mode() == LockMode::Exclusive || mode == LockMode::Shared {
                    continue;
                }
                // flock conflicts with our own shared lock on another handle
                locks.remove(index);
            }
            locks.push(BuildLock::acquire_with(
                &self.lock_dir,
                name,
                &project.path,
                mode,
            )?);
        }
        Ok(())
    }
}
