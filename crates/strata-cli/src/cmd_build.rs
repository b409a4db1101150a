// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `strata build` command.

use clap::Args;
use colored::Colorize;
use miette::Result;
use strata::BuildOptions;

/// Create or update the project's environment
#[derive(Debug, Args)]
pub struct CmdBuild {
    #[clap(flatten)]
    pub project: crate::ProjectFlags,

    /// Install an optional dependency group (repeatable)
    #[clap(short = 'E', long = "extras", value_name = "NAME")]
    pub extras: Vec<String>,

    /// Re-apply the environment file to an existing layered environment
    #[clap(long)]
    pub refresh_system: bool,
}

impl CmdBuild {
    pub async fn run(&mut self) -> Result<i32> {
        let engine = self.project.engine(BuildOptions {
            extras: self.extras.clone(),
            refresh_system: self.refresh_system,
        })?;

        let env = engine.build(&self.project.path).await?;

        println!(
            "{} {} [{}]",
            "Environment ready:".green(),
            env.env_name.bold(),
            env.backend
        );
        if let Some(template) = &env.template_env_name {
            println!("  cloned from {}", template.cyan());
        }

        Ok(0)
    }
}
