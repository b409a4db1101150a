// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `strata run` command.

use std::path::PathBuf;

use clap::Args;
use miette::Result;
use strata::BuildOptions;

/// Run a command inside the project's environment
#[derive(Debug, Args)]
pub struct CmdRun {
    #[clap(flatten)]
    pub project: crate::ProjectFlags,

    /// Install an optional dependency group before running (repeatable)
    #[clap(short = 'E', long = "extras", value_name = "NAME")]
    pub extras: Vec<String>,

    /// Load KEY=VALUE variables from FILE instead of the project's .env
    #[clap(short = 'e', long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Command to run, with its arguments
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl CmdRun {
    pub async fn run(&mut self) -> Result<i32> {
        let vars = strata::load_vars(&self.project.path, self.env_file.as_deref())?;
        let engine = self.project.engine(BuildOptions {
            extras: self.extras.clone(),
            refresh_system: false,
        })?;

        let code = engine.run(&self.project.path, &self.command, &vars).await?;
        tracing::debug!(code, "command finished");
        Ok(code)
    }
}
