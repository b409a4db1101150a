// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! strata - Layered Project Environments CLI

use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use strata::{BuildOptions, Engine, Settings, ToolRegistry};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

mod cmd_build;
mod cmd_run;
mod cmd_show;

use cmd_build::CmdBuild;
use cmd_run::CmdRun;
use cmd_show::CmdShow;


#[derive(Parser)]
#[clap(
    name = "strata",
    about = "Layered Project Environments",
    version,
    long_about = "Build and run python projects in a conda system layer with poetry on top"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,

    /// Also write logs to FILE
    #[clap(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,
}

impl Logging {
    fn level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::ERROR,
            (false, 0) => LevelFilter::WARN,
            (false, 1) => LevelFilter::INFO,
            (false, 2) => LevelFilter::DEBUG,
            (false, _) => LevelFilter::TRACE,
        }
    }

    fn init(&self) -> Result<()> {
        let file_layer = match &self.log_file {
            Some(path) => {
                let file = std::fs::File::create(path).into_diagnostic()?;
                Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .with(self.level())
            .init();
        Ok(())
    }
}

/// Selects the project a command works on.
#[derive(Parser, Clone, Debug)]
pub struct ProjectFlags {
    /// Project directory containing pyproject.toml
    #[clap(short = 'p', long = "project", env = "STRATA_PROJECT", default_value = ".")]
    pub path: PathBuf,
}

impl ProjectFlags {
    /// An engine over the configured conda and poetry executables.
    pub fn engine(&self, options: BuildOptions) -> Result<Engine<ToolRegistry>> {
        let settings = Settings::load()?;
        let registry = ToolRegistry::new(&settings);
        Ok(Engine::new(registry, &settings).with_options(options))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the project's environment
    Build(CmdBuild),

    /// Run a command inside the project's environment
    Run(CmdRun),

    /// Display how the project's environment resolves
    Show(CmdShow),
}

impl Opt {
    async fn run(self) -> Result<i32> {
        self.logging.init()?;

        match self.cmd {
            Command::Build(mut cmd) => cmd.run().await,
            Command::Run(mut cmd) => cmd.run().await,
            Command::Show(mut cmd) => cmd.run().await,
        }
    }
}

/// Exit status for a failed command.
fn exit_code(report: &miette::Report) -> i32 {
    report
        .downcast_ref::<strata::Error>()
        .map(strata::Error::exit_code)
        .unwrap_or(1)
}

#[tokio::main]
async fn main() {
    let opt = Opt::parse();
    let code = match opt.run().await {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            exit_code(&report)
        }
    };
    std::process::exit(code);
}
