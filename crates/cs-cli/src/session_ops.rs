use std::path::{Path, PathBuf};
use std::sync::Arc;

use cs_api::{
    check_script, create_runtime_from_dir, resume_runtime, run_until_idle, start,
    CreateRuntimeOptions, ResumeRuntimeOptions, RunOutcome, RunReport,
};
use cs_core::{EntityId, ScriptError};
use cs_parser::DirectorySource;
use cs_runtime::{EntityResolver, PassThroughResolver, ScriptRuntime};

use crate::{
    builtin_functions, invalid_argument, json_string, list_script_files, load_state_bytes,
    resolve_root, save_runtime_state, CheckArgs, ResumeArgs, RunArgs, Transcript,
};

pub(crate) fn run_script(args: RunArgs) -> Result<i32, ScriptError> {
    let root = resolve_root(&args.root)?;
    let entity = parse_entity(&args.entity)?;
    let transcript = Transcript::default();

    let runtime = create_runtime_from_dir(&root, runtime_options(&transcript))?;
    let thread = start(&runtime, entity, &args.script)?;
    let report = run_until_idle(&runtime, thread, args.max_steps)?;

    finish_session(&runtime, report, &transcript, args.state_out)
}

pub(crate) fn resume_script(args: ResumeArgs) -> Result<i32, ScriptError> {
    let root = resolve_root(&args.root)?;
    let state = load_state_bytes(Path::new(&args.state_in))?;
    let transcript = Transcript::default();

    let runtime = resume_runtime(
        Arc::new(DirectorySource::new(root)),
        ResumeRuntimeOptions {
            create: runtime_options(&transcript),
            state,
        },
    )?;

    let mut reports = Vec::new();
    for thread in runtime.invocations() {
        reports.push(run_until_idle(&runtime, thread, args.max_steps)?);
    }

    finish_session(&runtime, merge_reports(&reports), &transcript, args.state_out)
}

pub(crate) fn check_scripts(args: CheckArgs) -> Result<i32, ScriptError> {
    let root = resolve_root(&args.root)?;
    let source = DirectorySource::new(&root);
    let names = list_script_files(&root)?;

    let mut failed = 0usize;
    for name in &names {
        match check_script(&source, name) {
            Ok(parsed) => println!("CHECK:{}:OK:{}", name, parsed.runnable_count()),
            Err(error) => {
                failed += 1;
                log::warn!("{}: {}", name, error);
                println!("CHECK:{}:ERROR:{}", name, error.code());
            }
        }
    }

    println!("CHECKED:{}", names.len());
    println!("FAILED:{}", failed);
    Ok(if failed == 0 { 0 } else { 1 })
}

pub(crate) fn parse_entity(text: &str) -> Result<EntityId, ScriptError> {
    PassThroughResolver
        .lookup(text)
        .ok_or_else(|| invalid_argument(format!("Not a valid entity id: \"{}\"", text)))
}

/// Step total across invocations; the outcome is the least settled one.
pub(crate) fn merge_reports(reports: &[RunReport]) -> RunReport {
    let steps = reports.iter().map(|report| report.steps).sum();
    let outcome = if reports
        .iter()
        .any(|report| report.outcome == RunOutcome::StepLimit)
    {
        RunOutcome::StepLimit
    } else if reports
        .iter()
        .any(|report| report.outcome == RunOutcome::Idle)
    {
        RunOutcome::Idle
    } else {
        RunOutcome::Finished
    };
    RunReport { steps, outcome }
}

fn runtime_options(transcript: &Transcript) -> CreateRuntimeOptions {
    CreateRuntimeOptions {
        functions: Some(Arc::new(builtin_functions(transcript))),
        ..CreateRuntimeOptions::default()
    }
}

fn finish_session(
    runtime: &ScriptRuntime,
    report: RunReport,
    transcript: &Transcript,
    state_out: Option<String>,
) -> Result<i32, ScriptError> {
    let state_out = state_out.map(PathBuf::from);
    if let Some(path) = &state_out {
        save_runtime_state(path, runtime)?;
    }

    println!("RESULT:OK");
    println!("EVENT:{}", event_name(report.outcome));
    println!("STEPS:{}", report.steps);
    for text in transcript.take() {
        println!("TEXT_JSON:{}", json_string(&text));
    }
    for (name, value) in runtime.globals() {
        println!("GLOBAL:{}={}", name, json_string(&value));
    }
    match state_out {
        Some(path) => println!("STATE_OUT:{}", path.display()),
        None => println!("STATE_OUT:NONE"),
    }
    Ok(0)
}

fn event_name(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Finished => "FINISHED",
        RunOutcome::Idle => "IDLE",
        RunOutcome::StepLimit => "STEP_LIMIT",
    }
}
