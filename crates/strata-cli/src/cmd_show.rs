// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `strata show` command.

use std::fmt::{self, Write};

use clap::{Args, ValueEnum};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use strata::{BuildOptions, Layer, Operation, Resolution};

#[cfg(test)]
#[path = "./cmd_show_test.rs"]
mod cmd_show_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Yaml,
    Json,
}

/// Display how the project's environment resolves, without building it
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    pub project: crate::ProjectFlags,

    /// Show the operations a build with --refresh-system would run
    #[clap(long)]
    pub refresh_system: bool,

    /// Output format
    #[clap(long, value_enum, default_value = "table")]
    pub format: Format,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    resolution: &'a Resolution,
    operations: Vec<Operation>,
}

impl CmdShow {
    pub async fn run(&mut self) -> Result<i32> {
        let engine = self.project.engine(BuildOptions::default())?;
        let resolution = engine.resolve(&self.project.path).await?;
        let operations = resolution.plan.operations(self.refresh_system);

        match self.format {
            Format::Table => {
                let mut out = String::new();
                write_table(&mut out, &resolution, &operations).into_diagnostic()?;
                print!("{out}");
            }
            Format::Yaml => {
                let report = Report {
                    resolution: &resolution,
                    operations,
                };
                print!("{}", serde_yaml::to_string(&report).into_diagnostic()?);
            }
            Format::Json => {
                let report = Report {
                    resolution: &resolution,
                    operations,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).into_diagnostic()?
                );
            }
        }

        Ok(0)
    }
}

/// Render the resolution as the human readable `show` report.
fn write_table(
    out: &mut impl Write,
    resolution: &Resolution,
    operations: &[Operation],
) -> fmt::Result {
    let project = &resolution.project;
    writeln!(out, "{}", "Project:".bold())?;
    writeln!(out)?;
    writeln!(out, "  {} ({})", project.name.cyan(), project.path.display())?;
    let layer = if project.requires_system_layer {
        "required".green()
    } else {
        "not used".dimmed()
    };
    writeln!(out, "  system layer: {layer}")?;
    if !project.extras.is_empty() {
        writeln!(out, "  extras: {}", project.extras.join(", "))?;
    }
    if !project.scripts.is_empty() {
        writeln!(out, "  scripts: {}", project.scripts.join(", "))?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "Base Environment:".bold())?;
    writeln!(out)?;
    match resolution.base_env() {
        Some(base) => {
            let kind = if base.is_base_template {
                " [template]".yellow()
            } else {
                " [shared]".blue()
            };
            writeln!(
                out,
                "  {}{} from {}",
                base.declared_name.cyan(),
                kind,
                base.source_path.display()
            )?;
        }
        None => writeln!(out, "  {}", "(none)".dimmed())?,
    }
    if let Some(search) = &resolution.base.search {
        writeln!(out)?;
        writeln!(out, "  searched:")?;
        for (i, path) in search.trail.iter().enumerate() {
            let marker = if search.found.as_ref() == Some(path) {
                " <- found".green()
            } else {
                "".normal()
            };
            writeln!(
                out,
                "  {}. {}{}",
                i + 1,
                path.display().to_string().dimmed(),
                marker
            )?;
        }
    }
    writeln!(out)?;

    let env = resolution.environment();
    writeln!(out, "{}", "Environment:".bold())?;
    writeln!(out)?;
    writeln!(out, "  {} [{}]", env.env_name.green(), env.backend)?;
    writeln!(out, "  plan: {}", resolution.plan.step)?;
    writeln!(out)?;

    writeln!(out, "{}", "Operations:".bold())?;
    writeln!(out)?;
    for (i, op) in operations.iter().enumerate() {
        let layer = match op.layer() {
            Layer::System => "system".yellow(),
            Layer::Application => "application".cyan(),
        };
        writeln!(out, "  {}. [{}] {}", i + 1, layer, op)?;
    }
    Ok(())
}
