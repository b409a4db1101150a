// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The registry backed by the `conda` and `poetry` command line tools.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Backend, EnvironmentRegistry, Error, ExecOutcome, ResolvedEnvironment, Settings};

#[cfg(test)]
#[path = "./tools_test.rs"]
mod tools_test;

/// Drives conda for the system layer and poetry for the application layer.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    conda: String,
    poetry: String,
}

impl ToolRegistry {
    pub fn new(settings: &Settings) -> Self {
        Self {
            conda: settings.conda_exe.clone(),
            poetry: settings.poetry_exe.clone(),
        }
    }

    fn conda(&self) -> Command {
        Command::new(&self.conda)
    }

    fn poetry(&self, project: &Path) -> Command {
        let mut cmd = Command::new(&self.poetry);
        cmd.current_dir(project);
        cmd
    }

    /// The application installer invocation, as arguments to `program`.
    fn install_args(&self, extras: &[String]) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        for extra in extras {
            args.push("-E".to_string());
            args.push(extra.clone());
        }
        args
    }
}

#[async_trait]
impl EnvironmentRegistry for ToolRegistry {
    async fn exists(&self, name: &str) -> crate::Result<bool> {
        let mut cmd = self.conda();
        cmd.args(["env", "list"]);
        let outcome = capture(&self.conda, cmd).await?;
        if !outcome.is_success() {
            return Err(Error::Io(std::io::Error::other(format!(
                "'{} env list' failed: {}",
                self.conda,
                outcome.output()
            ))));
        }
        Ok(parse_env_list(&outcome.stdout).iter().any(|env| env == name))
    }

    async fn application_env_exists(&self, project: &Path) -> crate::Result<bool> {
        let mut cmd = self.poetry(project);
        cmd.args(["env", "info", "--path"]);
        let outcome = capture(&self.poetry, cmd).await?;
        Ok(outcome.is_success() && !outcome.stdout.trim().is_empty())
    }

    async fn create(&self, name: &str, spec: &Path) -> crate::Result<ExecOutcome> {
        let mut cmd = self.conda();
        cmd.args(["env", "create", "-y", "-n", name, "-f"]).arg(spec);
        capture(&self.conda, cmd).await
    }

    async fn clone_env(&self, source: &str, target: &str) -> crate::Result<ExecOutcome> {
        let mut cmd = self.conda();
        cmd.args(["create", "-y", "-n", target, "--clone", source]);
        capture(&self.conda, cmd).await
    }

    async fn install_system_deps(&self, name: &str, spec: &Path) -> crate::Result<ExecOutcome> {
        let mut cmd = self.conda();
        cmd.args(["env", "update", "-n", name, "-f"]).arg(spec);
        capture(&self.conda, cmd).await
    }

    async fn install_application_deps(
        &self,
        env: &ResolvedEnvironment,
        project: &Path,
        extras: &[String],
    ) -> crate::Result<ExecOutcome> {
        let args = self.install_args(extras);
        match env.backend {
            Backend::Layered => {
                let mut cmd = self.conda();
                cmd.args(["run", "-n", env.env_name.as_str(), "--cwd"])
                    .arg(project)
                    .arg(&self.poetry)
                    .args(&args);
                capture(&self.conda, cmd).await
            }
            Backend::ApplicationOnly => {
                let mut cmd = self.poetry(project);
                cmd.args(&args);
                capture(&self.poetry, cmd).await
            }
        }
    }

    async fn run(
        &self,
        env: &ResolvedEnvironment,
        project: &Path,
        command: &[String],
        vars: &[(String, String)],
    ) -> crate::Result<i32> {
        let (program, mut cmd) = match env.backend {
            Backend::Layered => {
                let mut cmd = self.conda();
                cmd.args(["run", "--no-capture-output", "-n", env.env_name.as_str(), "--cwd"])
                    .arg(project);
                (&self.conda, cmd)
            }
            Backend::ApplicationOnly => {
                let mut cmd = self.poetry(project);
                cmd.arg("run");
                (&self.poetry, cmd)
            }
        };
        cmd.args(command)
            .envs(vars.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        tracing::debug!(env = %env.env_name, ?command, "running command");
        let status = cmd.status().await.map_err(|error| Error::Spawn {
            program: program.clone(),
            error,
        })?;
        Ok(exit_code(status))
    }
}

/// Run a command to completion, capturing its output.
async fn capture<S: AsRef<OsStr>>(program: S, mut cmd: Command) -> crate::Result<ExecOutcome> {
    let program = program.as_ref().to_string_lossy().into_owned();
    tracing::debug!(cmd = ?cmd.as_std(), "spawning process");

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|error| Error::Spawn { program, error })?;

    let outcome = ExecOutcome {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !outcome.stderr.trim().is_empty() {
        tracing::debug!(stderr = %outcome.stderr.trim(), "command stderr");
    }
    Ok(outcome)
}

/// Environment names from `conda env list` output.
///
/// Comment lines are skipped; the first column of every other row is the
/// name. Rows for environments outside the envs directory have only a path.
pub fn parse_env_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| !name.starts_with('/') && *name != "*")
        .map(String::from)
        .collect()
}

/// Exit code of a finished child, mapping signals to 128 + signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
