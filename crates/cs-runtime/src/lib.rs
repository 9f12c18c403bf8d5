pub mod context;
mod engine;
pub mod globals;
pub mod host;
pub mod persist;
pub mod store;

pub use context::{
    FrameContext, FrameHandle, PendingCall, Readiness, RecordHandle, TargetContext,
    TargetHandle, ThreadContext, ThreadHandle, VarMap,
};
pub use engine::{
    apply_operator, classify_token, compare, ObjectCounts, RuntimeOptions, ScriptRuntime,
    StepSignal, TokenRef, VarScope, ENDSUB, RESULT_FROM, RESULT_TOKEN, SAVE_FORMAT_VERSION,
    SCOPE_SEPARATOR, SCOPE_SIGIL, SELF_TOKEN,
};
pub use globals::GlobalVars;
pub use host::{
    Completion, EmptyFunctionLibrary, EntityResolver, FunctionCall, FunctionLibrary,
    FunctionTable, NativeFunction, PassThroughResolver, PassThroughTranslator, Translator,
};
pub use store::{Handle, HandleStore};
