use std::sync::Arc;

use cs_runtime::{Completion, FunctionCall, FunctionTable};
use parking_lot::Mutex;

/// Text emitted by `msg` during one CLI session.
#[derive(Debug, Clone, Default)]
pub(crate) struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    pub(crate) fn push(&self, line: String) {
        self.lines.lock().push(line);
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

/// Functions available to scripts run from the command line:
/// `msg` records its arguments, `strlen` measures them and `wait` parks
/// the invocation until the next `resume`.
pub(crate) fn builtin_functions(transcript: &Transcript) -> FunctionTable {
    let sink = transcript.clone();
    FunctionTable::new()
        .with("msg", move |call: &FunctionCall| {
            let text = call.args.join(" ");
            log::info!("{}: {}", call.invocation, text);
            sink.push(text);
            Ok(Completion::Ready(String::new()))
        })
        .with("strlen", |call: &FunctionCall| {
            let length = call.args.join(" ").chars().count();
            Ok(Completion::Ready(length.to_string()))
        })
        .with("wait", |_call: &FunctionCall| Ok(Completion::Pending))
}

#[cfg(test)]
mod builtins_tests {
    use super::*;
    use cs_runtime::{FrameHandle, FunctionLibrary, ThreadHandle};

    fn call(name: &str, args: &[&str]) -> FunctionCall {
        FunctionCall {
            invocation: ThreadHandle::from_raw(1),
            frame: FrameHandle::from_raw(1),
            entity: None,
            name: name.to_string(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }

    #[test]
    fn msg_records_joined_arguments() {
        let transcript = Transcript::default();
        let functions = builtin_functions(&transcript);
        let completion = functions
            .dispatch(&call("msg", &["hello", "there"]))
            .expect("msg should dispatch");
        assert_eq!(completion, Completion::Ready(String::new()));
        assert_eq!(transcript.take(), vec!["hello there".to_string()]);
        assert!(transcript.take().is_empty());
    }

    #[test]
    fn strlen_and_wait_complete_as_expected() {
        let functions = builtin_functions(&Transcript::default());
        assert_eq!(
            functions.dispatch(&call("STRLEN", &["héllo"])).expect("strlen"),
            Completion::Ready("5".to_string())
        );
        assert_eq!(
            functions.dispatch(&call("wait", &[])).expect("wait"),
            Completion::Pending
        );
    }
}
