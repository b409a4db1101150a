// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Executing a build plan against the environment registry.

use crate::{BuildPlan, EnvironmentRegistry, Error, Operation, ResolvedEnvironment};

#[cfg(test)]
#[path = "./orchestrate_test.rs"]
mod orchestrate_test;

/// Options for executing a build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Extra dependency groups passed to the application installer.
    pub extras: Vec<String>,

    /// Re-apply the system spec when reusing an existing layered environment.
    pub refresh_system: bool,
}

/// Run every operation of `plan`, one at a time and in order.
///
/// The first failing operation stops the build. Nothing already done is
/// rolled back: a failed system step leaves any partial environment on disk
/// and a failed application step leaves the system layer intact.
pub async fn execute<R>(
    plan: &BuildPlan,
    registry: &R,
    options: &BuildOptions,
) -> crate::Result<ResolvedEnvironment>
where
    R: EnvironmentRegistry + ?Sized,
{
    for op in plan.operations(options.refresh_system) {
        tracing::info!(layer = %op.layer(), "{op}");

        let outcome = match &op {
            Operation::CreateEnvironment { name, spec } => registry.create(name, spec).await?,
            Operation::CloneEnvironment { source, target } => {
                registry.clone_env(source, target).await?
            }
            Operation::UpdateSystem { name, spec } => {
                registry.install_system_deps(name, spec).await?
            }
            Operation::InstallApplication { .. } => {
                registry
                    .install_application_deps(
                        &plan.environment,
                        &plan.project_path,
                        &options.extras,
                    )
                    .await?
            }
        };

        if !outcome.is_success() {
            tracing::error!(layer = %op.layer(), code = ?outcome.code, "{op} failed");
            return Err(Error::Build {
                project: plan.project_path.clone(),
                layer: op.layer(),
                operation: op.to_string(),
                code: outcome.code,
                output: outcome.output(),
            });
        }

        let stdout = outcome.stdout.trim();
        if !stdout.is_empty() {
            tracing::debug!(output = %stdout, "{op} finished");
        }
    }

    Ok(plan.environment.clone())
}
