mod commands;
mod frame_stack;
mod lifecycle;
mod scope;
mod snapshot;
mod step;

pub use commands::{apply_operator, compare, ENDSUB, RESULT_FROM};
pub use lifecycle::{ObjectCounts, RuntimeOptions, ScriptRuntime, StepSignal};
pub use scope::{
    classify_token, TokenRef, VarScope, RESULT_TOKEN, SCOPE_SEPARATOR, SCOPE_SIGIL, SELF_TOKEN,
};
pub use snapshot::SAVE_FORMAT_VERSION;
