use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use cs_core::{EntityId, ErrorKind, ScriptError};
use cs_parser::{parse_script, DirectorySource, MemorySource, ParsedScript, ScriptSource};
use cs_runtime::{
    EntityResolver, FunctionLibrary, RuntimeOptions, ScriptRuntime, StepSignal, ThreadHandle,
    Translator,
};

/// Host collaborators; anything left `None` falls back to the runtime's
/// empty or pass-through default.
#[derive(Clone, Default)]
pub struct CreateRuntimeOptions {
    pub functions: Option<Arc<dyn FunctionLibrary>>,
    pub entities: Option<Arc<dyn EntityResolver>>,
    pub translator: Option<Arc<dyn Translator>>,
}

#[derive(Clone)]
pub struct ResumeRuntimeOptions {
    pub create: CreateRuntimeOptions,
    pub state: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    /// Parked on an external call or no longer live.
    Idle,
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub steps: usize,
    pub outcome: RunOutcome,
}

pub fn create_runtime(source: Arc<dyn ScriptSource>, options: CreateRuntimeOptions) -> ScriptRuntime {
    ScriptRuntime::new(RuntimeOptions {
        source,
        functions: options.functions,
        entities: options.entities,
        translator: options.translator,
    })
}

/// Runtime reading `<root>/commands/<name>.<ext>`.
pub fn create_runtime_from_dir(
    root: impl Into<PathBuf>,
    options: CreateRuntimeOptions,
) -> Result<ScriptRuntime, ScriptError> {
    let source = DirectorySource::new(root);
    if !source.commands_dir().is_dir() {
        return Err(ScriptError::new(
            ErrorKind::InvalidArgument,
            format!(
                "Script root has no commands directory: {}",
                source.commands_dir().display()
            ),
        ));
    }
    Ok(create_runtime(Arc::new(source), options))
}

/// Runtime over in-memory scripts keyed by file name (`"main.ini"`).
pub fn create_runtime_from_map(
    scripts: BTreeMap<String, String>,
    options: CreateRuntimeOptions,
) -> ScriptRuntime {
    create_runtime(Arc::new(MemorySource::new(scripts)), options)
}

pub fn resume_runtime(
    source: Arc<dyn ScriptSource>,
    options: ResumeRuntimeOptions,
) -> Result<ScriptRuntime, ScriptError> {
    let runtime = create_runtime(source, options.create);
    runtime.load_from_slice(&options.state)?;
    Ok(runtime)
}

/// Starts `script_name` on `entity`.
pub fn start(
    runtime: &ScriptRuntime,
    entity: EntityId,
    script_name: &str,
) -> Result<ThreadHandle, ScriptError> {
    if script_name.trim().is_empty() {
        return Err(ScriptError::new(
            ErrorKind::InvalidArgument,
            "Script name must not be empty.",
        ));
    }
    runtime.start_invocation(entity, script_name)
}

/// Steps `thread` until it finishes, goes idle, or `max_steps` steps ran.
pub fn run_until_idle(
    runtime: &ScriptRuntime,
    thread: ThreadHandle,
    max_steps: usize,
) -> Result<RunReport, ScriptError> {
    if max_steps == 0 {
        return Err(ScriptError::new(
            ErrorKind::InvalidArgument,
            "max_steps must be at least 1.",
        ));
    }

    for steps in 1..=max_steps {
        let outcome = match runtime.step_invocation(thread)? {
            StepSignal::Pending => continue,
            StepSignal::Idle => RunOutcome::Idle,
            StepSignal::Finished => RunOutcome::Finished,
        };
        log::debug!("invocation {} {:?} after {} steps", thread, outcome, steps);
        return Ok(RunReport { steps, outcome });
    }

    log::warn!("invocation {} hit the {} step limit", thread, max_steps);
    Ok(RunReport {
        steps: max_steps,
        outcome: RunOutcome::StepLimit,
    })
}

/// Parses a script without running it.
pub fn check_script(source: &dyn ScriptSource, name: &str) -> Result<ParsedScript, ScriptError> {
    parse_script(source, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_runtime::{Completion, FunctionCall, FunctionTable};

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    const HERO: EntityId = EntityId(7);

    #[test]
    fn run_until_idle_finishes_simple_script() {
        let runtime = create_runtime_from_map(
            map(&[("main.ini", "set $x 2\ninc $x 3\nset $global#x $x\n")]),
            CreateRuntimeOptions::default(),
        );
        let thread = start(&runtime, HERO, "main").expect("start should pass");
        let report = run_until_idle(&runtime, thread, 100).expect("run should pass");
        assert_eq!(
            report,
            RunReport {
                steps: 4,
                outcome: RunOutcome::Finished
            }
        );
        assert_eq!(runtime.global("x").as_deref(), Some("5.000000"));
    }

    #[test]
    fn run_until_idle_stops_at_step_limit() {
        let runtime = create_runtime_from_map(
            map(&[("main.ini", "[top]\ninc $global#n\ngoto top\n")]),
            CreateRuntimeOptions::default(),
        );
        let thread = start(&runtime, HERO, "main").expect("start should pass");
        let report = run_until_idle(&runtime, thread, 10).expect("run should pass");
        assert_eq!(report.outcome, RunOutcome::StepLimit);
        assert_eq!(runtime.global("n").as_deref(), Some("5.000000"));

        let error = run_until_idle(&runtime, thread, 0).expect_err("zero steps");
        assert_eq!(error.code(), "API_INVALID_ARGUMENT");
    }

    #[test]
    fn run_until_idle_reports_parked_calls() {
        let functions = FunctionTable::new().with("sleep", |_call: &FunctionCall| Ok(Completion::Pending));
        let runtime = create_runtime_from_map(
            map(&[("main.ini", "sleep 1\nset $global#woke yes\n")]),
            CreateRuntimeOptions {
                functions: Some(Arc::new(functions)),
                ..CreateRuntimeOptions::default()
            },
        );
        let thread = start(&runtime, HERO, "main").expect("start should pass");
        let report = run_until_idle(&runtime, thread, 100).expect("run should pass");
        assert_eq!(report.outcome, RunOutcome::Idle);

        let frame = runtime.frame_of(thread).expect("frame");
        runtime.complete_call(frame, "").expect("complete");
        let report = run_until_idle(&runtime, thread, 100).expect("run should pass");
        assert_eq!(report.outcome, RunOutcome::Finished);
        assert_eq!(runtime.global("woke").as_deref(), Some("yes"));
    }

    #[test]
    fn resume_runtime_continues_from_saved_state() {
        let scripts = map(&[("main.ini", "set $n 1\ninc $n\nset $global#n $n\n")]);
        let runtime = create_runtime_from_map(scripts.clone(), CreateRuntimeOptions::default());
        let thread = start(&runtime, HERO, "main").expect("start should pass");
        runtime.step_invocation(thread).expect("step");
        let state = runtime.save_to_vec().expect("save");

        let resumed = resume_runtime(
            Arc::new(MemorySource::new(scripts)),
            ResumeRuntimeOptions {
                create: CreateRuntimeOptions::default(),
                state,
            },
        )
        .expect("resume should pass");
        let report = run_until_idle(&resumed, thread, 100).expect("run should pass");
        assert_eq!(report.outcome, RunOutcome::Finished);
        assert_eq!(resumed.global("n").as_deref(), Some("2.000000"));
    }

    #[test]
    fn resume_runtime_rejects_garbage() {
        let error = resume_runtime(
            Arc::new(MemorySource::default()),
            ResumeRuntimeOptions {
                create: CreateRuntimeOptions::default(),
                state: vec![1, 2],
            },
        )
        .err()
        .expect("garbage should fail");
        assert_eq!(error.code(), "SAVE_CORRUPT");
    }

    #[test]
    fn create_runtime_from_dir_requires_commands_dir() {
        let root = std::env::temp_dir().join("cs-api-missing-root-for-test");
        let error = create_runtime_from_dir(&root, CreateRuntimeOptions::default())
            .err()
            .expect("missing dir should fail");
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn start_rejects_blank_names_and_reports_parse_errors() {
        let runtime = create_runtime_from_map(
            map(&[("empty.ini", "; nothing\n")]),
            CreateRuntimeOptions::default(),
        );
        let error = start(&runtime, HERO, " ").expect_err("blank");
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
        let error = start(&runtime, HERO, "empty").expect_err("empty");
        assert_eq!(error.code(), "PARSE_NO_EXECUTABLE_COMMANDS");
    }

    #[test]
    fn check_script_returns_parsed_records() {
        let source = MemorySource::new(map(&[("main.json", r#"{"cmd":[[":","top"],["goto","top"]]}"#)]));
        let parsed = check_script(&source, "main").expect("check should pass");
        assert_eq!(parsed.runnable_count(), 1);
        assert_eq!(parsed.goto_labels.get("top"), Some(&0));
    }
}
