use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    FileNotFound,
    ReadFailed,
    MalformedJson,
    NoExecutableCommands,
    StaleHandle,
    BrokenParent,
    CorruptSave,
    SaveVersion,
    SaveWrite,
    CallFailed,
    FunctionMissing,
    InvalidArgument,
    CliIo,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::FileNotFound => "PARSE_FILE_NOT_FOUND",
            Self::ReadFailed => "PARSE_READ_FAILED",
            Self::MalformedJson => "PARSE_MALFORMED_JSON",
            Self::NoExecutableCommands => "PARSE_NO_EXECUTABLE_COMMANDS",
            Self::StaleHandle => "STORE_STALE_HANDLE",
            Self::BrokenParent => "STORE_BROKEN_PARENT",
            Self::CorruptSave => "SAVE_CORRUPT",
            Self::SaveVersion => "SAVE_VERSION",
            Self::SaveWrite => "SAVE_WRITE",
            Self::CallFailed => "ENGINE_CALL_FAILED",
            Self::FunctionMissing => "ENGINE_FUNCTION_MISSING",
            Self::InvalidArgument => "API_INVALID_ARGUMENT",
            Self::CliIo => "CLI_IO",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}: {message}", kind.code())]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub source_ref: Option<SourceRef>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source_ref: None,
        }
    }

    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source_ref: SourceRef) -> Self {
        Self {
            kind,
            message: message.into(),
            source_ref: Some(source_ref),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
