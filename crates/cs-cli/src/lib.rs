use std::ffi::OsString;

use clap::Parser;
use cs_core::ScriptError;
use env_logger::Env;

mod builtins;
mod cli_args;
mod error_map;
mod session_ops;
mod source_loader;
mod state_store;

pub(crate) use builtins::{builtin_functions, Transcript};
pub(crate) use cli_args::{CheckArgs, Cli, Mode, ResumeArgs, RunArgs};
pub(crate) use error_map::{emit_error, invalid_argument, json_string, map_cli_io};
pub(crate) use source_loader::{list_script_files, resolve_root};
pub(crate) use state_store::{load_state_bytes, save_runtime_state};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.format_timestamp(None).try_init();
}

fn run(cli: Cli) -> Result<i32, ScriptError> {
    match cli.command {
        Mode::Run(args) => session_ops::run_script(args),
        Mode::Resume(args) => session_ops::resume_script(args),
        Mode::Check(args) => session_ops::check_scripts(args),
    }
}

#[cfg(test)]
mod tests;
