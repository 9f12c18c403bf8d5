use std::fmt::Display;

use cs_core::{ErrorKind, ScriptError};

pub(crate) fn json_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn emit_error(error: ScriptError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code());
    println!("ERROR_MSG_JSON:{}", json_string(&error.message));
    if let Some(source_ref) = &error.source_ref {
        println!("ERROR_AT:{}", source_ref);
    }
    1
}

pub(crate) fn map_cli_io(context: &str, error: impl Display) -> ScriptError {
    ScriptError::new(ErrorKind::CliIo, format!("{}: {}", context, error))
}

pub(crate) fn invalid_argument(message: impl Into<String>) -> ScriptError {
    ScriptError::new(ErrorKind::InvalidArgument, message)
}
