use clap::{Args, Parser, Subcommand};

pub(crate) const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Debug, Parser)]
#[command(name = "cmdscript")]
#[command(about = "Run, resume and check command scripts")]
pub(crate) struct Cli {
    /// Raise the log filter to debug.
    #[arg(long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Run(RunArgs),
    Resume(ResumeArgs),
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "root")]
    pub(crate) root: String,
    #[arg(long = "script", default_value = "main")]
    pub(crate) script: String,
    /// Entity id, decimal or `0x` hex.
    #[arg(long = "entity", default_value = "1")]
    pub(crate) entity: String,
    #[arg(long = "max-steps", default_value_t = DEFAULT_MAX_STEPS)]
    pub(crate) max_steps: usize,
    #[arg(long = "state-out")]
    pub(crate) state_out: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ResumeArgs {
    #[arg(long = "root")]
    pub(crate) root: String,
    #[arg(long = "state-in")]
    pub(crate) state_in: String,
    #[arg(long = "max-steps", default_value_t = DEFAULT_MAX_STEPS)]
    pub(crate) max_steps: usize,
    #[arg(long = "state-out")]
    pub(crate) state_out: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "root")]
    pub(crate) root: String,
}
