use std::fmt;

use cs_core::{format_float, smart_equals, to_number_lenient, to_number_strict, ErrorKind, ScriptError};
use cs_parser::label_key;

use super::lifecycle::ScriptRuntime;
use super::scope::SELF_TOKEN;
use super::step::{Flow, LineContext};
use crate::context::{PendingCall, Readiness};
use crate::host::{Completion, FunctionCall};

/// Marks `set $var resultfrom <function> <args...>`.
pub const RESULT_FROM: &str = "resultfrom";
pub const ENDSUB: &str = "endsub";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Set,
    If,
    Goto,
    Gosub,
    Call,
    Return,
    Inc,
    Cat,
    EndSub,
    BeginSub,
    CallArg,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        let command = match name.to_ascii_lowercase().as_str() {
            "set" => Self::Set,
            "if" => Self::If,
            "goto" => Self::Goto,
            "gosub" => Self::Gosub,
            "call" => Self::Call,
            "return" => Self::Return,
            "inc" => Self::Inc,
            "cat" => Self::Cat,
            ENDSUB => Self::EndSub,
            "beginsub" => Self::BeginSub,
            "callarg" => Self::CallArg,
            _ => return None,
        };
        Some(command)
    }
}

impl LineContext {
    fn warn(&self, message: impl fmt::Display) {
        log::warn!("{}: {}", self.source, message);
    }

    fn token(&self, index: usize) -> &str {
        self.tokens.get(index).map(String::as_str).unwrap_or_default()
    }
}

/// Applies one of `+ - * / &`. Arithmetic reads both sides leniently and
/// formats the result with six decimals.
pub fn apply_operator(operator: &str, left: &str, right: &str) -> Result<String, String> {
    if operator == "&" {
        return Ok(format!("{}{}", left, right));
    }
    let (left, right) = (to_number_lenient(left), to_number_lenient(right));
    let value = match operator {
        "+" => left + right,
        "-" => left - right,
        "*" => left * right,
        "/" if right == 0.0 => return Err("division by zero".to_string()),
        "/" => left / right,
        other => return Err(format!("unknown operator \"{}\"", other)),
    };
    Ok(format_float(value))
}

/// Evaluates an IF condition; `None` for an unknown operator.
pub fn compare(operator: &str, left: &str, right: &str) -> Option<bool> {
    let numeric = |test: fn(f64, f64) -> bool| {
        Some(test(to_number_lenient(left), to_number_lenient(right)))
    };
    match operator {
        "=" | "==" | "&=" => Some(smart_equals(left, right)),
        "!=" | "<>" | "&!" => Some(!smart_equals(left, right)),
        ">" => numeric(|a, b| a > b),
        ">=" => numeric(|a, b| a >= b),
        "<" => numeric(|a, b| a < b),
        "<=" => numeric(|a, b| a <= b),
        _ => None,
    }
}

impl ScriptRuntime {
    pub(crate) fn execute_line(&self, line: &LineContext) -> Result<Flow, ScriptError> {
        let Some(first) = line.tokens.first() else {
            return Ok(Flow::Next);
        };
        let name = self.resolve_name(&line.scope, first);

        let Some(command) = Command::from_name(&name) else {
            return Ok(self.run_external(line, name, &line.tokens[1..], None));
        };
        let flow = match command {
            Command::Set => self.run_set(line),
            Command::If => self.run_if(line),
            Command::Goto => self.run_goto(line),
            Command::Gosub => self.run_gosub(line),
            Command::Call => return self.run_call(line),
            Command::Return => Flow::JumpTo(line.line_count),
            Command::Inc => self.run_inc(line),
            Command::Cat => self.run_cat(line),
            Command::EndSub => self.run_endsub(line),
            Command::BeginSub => self.run_beginsub(line),
            Command::CallArg => self.run_callarg(line),
        };
        Ok(flow)
    }

    fn run_set(&self, line: &LineContext) -> Flow {
        let tokens = &line.tokens;
        if tokens.len() >= 3 && tokens[2].eq_ignore_ascii_case(RESULT_FROM) {
            let Some(function) = tokens.get(3) else {
                line.warn("set ... resultfrom needs a function name");
                return Flow::Next;
            };
            let name = self.resolve_name(&line.scope, function);
            return self.run_external(line, name, &tokens[4..], Some(tokens[1].clone()));
        }

        let value = match tokens.len() {
            3 => self.resolve_token(&line.scope, &tokens[2]),
            5 => {
                let left = self.resolve_token(&line.scope, &tokens[2]);
                let right = self.resolve_token(&line.scope, &tokens[4]);
                match apply_operator(&tokens[3], &left, &right) {
                    Ok(value) => value,
                    Err(message) => {
                        line.warn(format_args!("set {}: {}", tokens[1], message));
                        return Flow::Next;
                    }
                }
            }
            count => {
                line.warn(format_args!("set expects 3 or 5 tokens, got {}", count));
                return Flow::Next;
            }
        };
        self.assign_token(&line.scope, &tokens[1], value);
        Flow::Next
    }

    fn run_if(&self, line: &LineContext) -> Flow {
        if line.tokens.len() != 5 {
            line.warn(format_args!("if expects 5 tokens, got {}", line.tokens.len()));
            return Flow::Next;
        }
        let left = self.resolve_token(&line.scope, line.token(1));
        let right = self.resolve_token(&line.scope, line.token(3));
        let Some(holds) = compare(line.token(2), &left, &right) else {
            line.warn(format_args!("unknown comparison \"{}\"", line.token(2)));
            return Flow::Next;
        };
        if !holds {
            return Flow::Next;
        }
        self.jump_to_label(line, line.token(4))
    }

    fn run_goto(&self, line: &LineContext) -> Flow {
        if line.tokens.len() != 2 {
            line.warn(format_args!("goto expects 2 tokens, got {}", line.tokens.len()));
            return Flow::Next;
        }
        self.jump_to_label(line, line.token(1))
    }

    /// Lands on the label line itself; the scan then skips it.
    fn jump_to_label(&self, line: &LineContext, token: &str) -> Flow {
        let key = label_key(&self.resolve_name(&line.scope, token));
        let target = self
            .frames
            .with(line.frame, |context| context.goto_labels.get(&key).copied())
            .flatten();
        match target {
            Some(index) => Flow::JumpTo(index),
            None => {
                line.warn(format_args!("label \"{}\" not found", key));
                Flow::Next
            }
        }
    }

    fn run_gosub(&self, line: &LineContext) -> Flow {
        if line.tokens.len() != 2 {
            line.warn(format_args!("gosub expects 2 tokens, got {}", line.tokens.len()));
            return Flow::Next;
        }
        let key = label_key(&self.resolve_name(&line.scope, line.token(1)));
        let entry = self
            .frames
            .with_mut(line.frame, |context| {
                let entry = context.gosub_labels.get(&key).copied()?;
                context.return_stack.push(line.index);
                Some(entry)
            })
            .flatten();
        match entry {
            Some(index) => Flow::JumpTo(index + 1),
            None => {
                line.warn(format_args!("subroutine \"{}\" not found", key));
                Flow::Next
            }
        }
    }

    fn run_endsub(&self, line: &LineContext) -> Flow {
        let popped = self
            .frames
            .with_mut(line.frame, |context| context.return_stack.pop())
            .flatten();
        match popped {
            Some(index) => Flow::JumpTo(index + 1),
            None => {
                line.warn("endsub without a matching gosub");
                Flow::Next
            }
        }
    }

    /// Straight-line execution never enters a subroutine body.
    fn run_beginsub(&self, line: &LineContext) -> Flow {
        let following = self
            .frames
            .with(line.frame, |context| {
                context
                    .records
                    .get(line.index + 1..)
                    .map(<[_]>::to_vec)
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        for (offset, handle) in following.into_iter().enumerate() {
            let is_end = self
                .records
                .with(handle, |record| record.first_token_is(ENDSUB))
                .unwrap_or(false);
            if is_end {
                return Flow::JumpTo(line.index + 1 + offset + 1);
            }
        }
        line.warn("beginsub without a matching endsub");
        Flow::Next
    }

    fn run_call(&self, line: &LineContext) -> Result<Flow, ScriptError> {
        if line.tokens.len() < 2 {
            line.warn("call needs a script name");
            return Ok(Flow::Next);
        }
        let name = self.resolve_name(&line.scope, line.token(1));
        let args = self.resolve_tokens(&line.scope, &line.tokens[2..]);

        self.move_cursor(line.frame, line.index + 1);
        match self.push_frame(line.thread, &name, args) {
            Ok(_) => Ok(Flow::Called),
            Err(error) => {
                log::error!("{}: call \"{}\" failed: {}", line.source, name, error);
                Err(ScriptError::with_source(
                    ErrorKind::CallFailed,
                    format!("call \"{}\" failed: {}", name, error),
                    line.source.clone(),
                ))
            }
        }
    }

    fn run_inc(&self, line: &LineContext) -> Flow {
        if line.tokens.len() < 2 {
            line.warn("inc needs a variable");
            return Flow::Next;
        }
        let amount = match line.tokens.get(2) {
            None => 1.0,
            Some(token) => {
                let text = self.resolve_name(&line.scope, token);
                match to_number_strict(&text) {
                    Some(amount) => amount,
                    None => {
                        line.warn(format_args!("inc amount \"{}\" is not a number", text));
                        return Flow::Next;
                    }
                }
            }
        };
        let current = to_number_lenient(&self.resolve_token(&line.scope, line.token(1)));
        self.assign_token(&line.scope, line.token(1), format_float(current + amount));
        Flow::Next
    }

    fn run_cat(&self, line: &LineContext) -> Flow {
        if line.tokens.len() < 3 {
            line.warn("cat needs a variable and a value");
            return Flow::Next;
        }
        let mut value = self.resolve_token(&line.scope, line.token(1));
        for piece in self.resolve_tokens(&line.scope, &line.tokens[2..]) {
            value.push_str(&piece);
        }
        self.assign_token(&line.scope, line.token(1), value);
        Flow::Next
    }

    fn run_callarg(&self, line: &LineContext) -> Flow {
        if line.tokens.len() != 3 {
            line.warn(format_args!("callarg expects 3 tokens, got {}", line.tokens.len()));
            return Flow::Next;
        }
        let text = self.resolve_name(&line.scope, line.token(1));
        let index = to_number_strict(&text)
            .filter(|index| *index >= 0.0 && index.fract() == 0.0)
            .map(|index| index as usize);
        let argument = index.and_then(|index| {
            self.frames
                .with(line.frame, |context| context.call_args.get(index).cloned())
                .flatten()
        });
        match argument {
            Some(value) => {
                self.assign_token(&line.scope, line.token(2), value);
            }
            None => line.warn(format_args!("call argument \"{}\" out of range", text)),
        }
        Flow::Next
    }

    /// Hands a non-builtin command to the function library. `assign_to`
    /// receives the result once it is known.
    fn run_external(
        &self,
        line: &LineContext,
        name: String,
        arg_tokens: &[String],
        assign_to: Option<String>,
    ) -> Flow {
        let call = FunctionCall {
            invocation: line.thread,
            frame: line.frame,
            entity: self.resolve_external_reference(line.thread, SELF_TOKEN),
            name,
            args: self.resolve_tokens(&line.scope, arg_tokens),
        };

        match self.functions.dispatch(&call) {
            Ok(Completion::Ready(value)) => {
                self.frames.with_mut(line.frame, |context| {
                    context.most_recent_result = value.clone();
                });
                if let Some(token) = assign_to {
                    self.assign_token(&line.scope, &token, value);
                }
                Flow::Next
            }
            Ok(Completion::Pending) => {
                self.frames.with_mut(line.frame, |context| {
                    context.current_line = line.index + 1;
                    context.readiness = Readiness::NotReady;
                    context.pending_call = Some(PendingCall {
                        function: call.name.clone(),
                        origin: line.source.clone(),
                        assign_to,
                    });
                });
                log::debug!("{}: waiting on {}", line.source, call.name);
                Flow::Park
            }
            Err(error) => {
                line.warn(format_args!("command \"{}\" failed: {}", call.name, error));
                Flow::Next
            }
        }
    }
}

#[cfg(test)]
mod commands_tests {
    use super::*;

    #[test]
    fn arithmetic_is_float_formatted() {
        assert_eq!(apply_operator("+", "1", "2").as_deref(), Ok("3.000000"));
        assert_eq!(apply_operator("-", "", "2").as_deref(), Ok("-2.000000"));
        assert_eq!(apply_operator("*", "1.5", "2").as_deref(), Ok("3.000000"));
        assert_eq!(apply_operator("/", "7", "2").as_deref(), Ok("3.500000"));
        assert_eq!(apply_operator("&", "ab", "cd").as_deref(), Ok("abcd"));
        assert!(apply_operator("/", "1", "0").is_err());
        assert!(apply_operator("%", "1", "2").is_err());
    }

    #[test]
    fn comparisons_follow_operator_families() {
        assert_eq!(compare("==", "1", "1.0"), Some(true));
        assert_eq!(compare("=", "", "1"), Some(false));
        assert_eq!(compare("&=", "1", "1.0"), Some(true));
        assert_eq!(compare("&=", "Bob", "bob"), Some(true));
        assert_eq!(compare("&!", "a", "A"), Some(false));
        assert_eq!(compare("&!", "abc", "1"), Some(true));
        assert_eq!(compare("<>", "abc", "ABC"), Some(false));
        assert_eq!(compare(">", "10", "9"), Some(true));
        assert_eq!(compare("<=", "", "0"), Some(true));
        assert_eq!(compare("=>", "1", "1"), None);
    }

    #[test]
    fn command_names_are_case_insensitive() {
        assert_eq!(Command::from_name("SeT"), Some(Command::Set));
        assert_eq!(Command::from_name("ENDSUB"), Some(Command::EndSub));
        assert_eq!(Command::from_name("msg"), None);
    }
}
