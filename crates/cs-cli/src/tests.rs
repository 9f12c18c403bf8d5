use super::*;
use cs_api::{RunOutcome, RunReport};
use cs_parser::DirectorySource;
use cs_runtime::{RuntimeOptions, ScriptRuntime};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_script(root: &Path, file_name: &str, text: &str) {
    let path = root.join("commands").join(file_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent should be created");
    }
    fs::write(path, text).expect("script should be written");
}

fn scripts_root(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::create_dir_all(dir.path().join("commands")).expect("commands dir");
    for (name, text) in files {
        write_script(dir.path(), name, text);
    }
    dir
}

fn cli(args: &[&str]) -> i32 {
    let mut argv = vec!["cmdscript"];
    argv.extend_from_slice(args);
    run_cli_from_args(argv)
}

fn load_saved(root: &Path, state: &Path) -> ScriptRuntime {
    let runtime = ScriptRuntime::new(RuntimeOptions::new(Arc::new(DirectorySource::new(root))));
    let bytes = fs::read(state).expect("state should exist");
    runtime.load_from_slice(&bytes).expect("state should load");
    runtime
}

#[test]
fn run_mode_executes_script_and_writes_state() {
    let dir = scripts_root(&[(
        "main.ini",
        "set $n 2\ninc $n 3\nset $global#total $n\nmsg done\n",
    )]);
    let root = dir.path().to_string_lossy().to_string();
    let state = dir.path().join("out").join("state.bin");
    let state_arg = state.to_string_lossy().to_string();

    let code = cli(&["run", "--root", &root, "--state-out", &state_arg]);
    assert_eq!(code, 0);

    let saved = load_saved(dir.path(), &state);
    assert_eq!(saved.global("total").as_deref(), Some("5.000000"));
    assert!(saved.invocations().is_empty());
}

#[test]
fn resume_mode_finishes_a_waiting_script() {
    let dir = scripts_root(&[(
        "main.ini",
        "set $global#stage before\nwait\nset $global#stage after\n",
    )]);
    let root = dir.path().to_string_lossy().to_string();
    let first = dir.path().join("first.bin");
    let second = dir.path().join("second.bin");
    let first_arg = first.to_string_lossy().to_string();
    let second_arg = second.to_string_lossy().to_string();

    assert_eq!(
        cli(&["run", "--root", &root, "--entity", "0x2a", "--state-out", &first_arg]),
        0
    );
    let parked = load_saved(dir.path(), &first);
    assert_eq!(parked.global("stage").as_deref(), Some("before"));
    assert_eq!(parked.invocations().len(), 1);

    assert_eq!(
        cli(&[
            "resume",
            "--root",
            &root,
            "--state-in",
            &first_arg,
            "--state-out",
            &second_arg,
        ]),
        0
    );
    let resumed = load_saved(dir.path(), &second);
    assert_eq!(resumed.global("stage").as_deref(), Some("after"));
    assert!(resumed.invocations().is_empty());
}

#[test]
fn check_mode_reports_broken_scripts() {
    let dir = scripts_root(&[
        ("main.ini", "[top]\ngoto top\n"),
        ("nested/child.json", r#"{"cmd":[["set","$x","1"]]}"#),
        ("notes.txt", "ignored"),
    ]);
    let root = dir.path().to_string_lossy().to_string();
    assert_eq!(cli(&["check", "--root", &root]), 0);

    let names = list_script_files(dir.path()).expect("scan should pass");
    assert_eq!(names, vec!["main.ini".to_string(), "nested/child.json".to_string()]);

    write_script(dir.path(), "broken.json", "{\"cmd\": [");
    assert_eq!(cli(&["check", "--root", &root]), 1);
}

#[test]
fn errors_map_to_non_zero_exit_codes() {
    let dir = scripts_root(&[("main.ini", "set $x 1\n")]);
    let root = dir.path().to_string_lossy().to_string();

    assert_eq!(cli(&["run", "--root", &root, "--script", "missing"]), 1);
    assert_eq!(cli(&["run", "--root", &root, "--entity", "zero"]), 1);
    assert_eq!(cli(&["run", "--root", &root, "--max-steps", "0"]), 1);

    let missing_state = dir.path().join("nope.bin").to_string_lossy().to_string();
    assert_eq!(
        cli(&["resume", "--root", &root, "--state-in", &missing_state]),
        1
    );

    let garbage = dir.path().join("garbage.bin");
    fs::write(&garbage, [9u8, 9, 9]).expect("garbage written");
    let garbage_arg = garbage.to_string_lossy().to_string();
    assert_eq!(
        cli(&["resume", "--root", &root, "--state-in", &garbage_arg]),
        1
    );

    assert_ne!(cli(&["run"]), 0);
    assert_ne!(cli(&["unknown-mode"]), 0);
}

#[test]
fn resolve_root_requires_commands_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path().to_string_lossy().to_string();
    let error = resolve_root(&root).expect_err("missing commands dir");
    assert_eq!(error.code(), "API_INVALID_ARGUMENT");

    let file = dir.path().join("plain");
    fs::write(&file, "x").expect("file written");
    let error = resolve_root(&file.to_string_lossy()).expect_err("file root");
    assert_eq!(error.code(), "API_INVALID_ARGUMENT");

    fs::create_dir_all(dir.path().join("commands")).expect("commands dir");
    let resolved = resolve_root(&root).expect("root should resolve");
    assert!(resolved.is_absolute());
}

#[test]
fn merge_reports_prefers_least_settled_outcome() {
    let finished = RunReport {
        steps: 3,
        outcome: RunOutcome::Finished,
    };
    let idle = RunReport {
        steps: 2,
        outcome: RunOutcome::Idle,
    };
    let limited = RunReport {
        steps: 10,
        outcome: RunOutcome::StepLimit,
    };

    assert_eq!(
        session_ops::merge_reports(&[]),
        RunReport {
            steps: 0,
            outcome: RunOutcome::Finished
        }
    );
    assert_eq!(session_ops::merge_reports(&[finished, idle]).outcome, RunOutcome::Idle);
    let merged = session_ops::merge_reports(&[finished, idle, limited]);
    assert_eq!(merged.steps, 15);
    assert_eq!(merged.outcome, RunOutcome::StepLimit);
}

#[test]
fn parse_entity_accepts_decimal_and_hex() {
    assert_eq!(session_ops::parse_entity("7").expect("decimal").0, 7);
    assert_eq!(session_ops::parse_entity("0x10").expect("hex").0, 16);
    assert!(session_ops::parse_entity("0").is_err());
}
