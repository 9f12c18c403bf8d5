use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cs_core::{EntityId, ErrorKind, ScriptError};

use crate::context::{FrameHandle, ThreadHandle};

/// One external command or `resultfrom` call, with every token resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub invocation: ThreadHandle,
    pub frame: FrameHandle,
    pub entity: Option<EntityId>,
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Ready(String),
    /// The host finishes the call later through `ScriptRuntime::complete_call`.
    Pending,
}

pub trait FunctionLibrary: Send + Sync {
    fn dispatch(&self, call: &FunctionCall) -> Result<Completion, ScriptError>;
}

#[derive(Debug, Default)]
pub struct EmptyFunctionLibrary;

impl FunctionLibrary for EmptyFunctionLibrary {
    fn dispatch(&self, call: &FunctionCall) -> Result<Completion, ScriptError> {
        Err(ScriptError::new(
            ErrorKind::FunctionMissing,
            format!("No function library registered for \"{}\".", call.name),
        ))
    }
}

pub type NativeFunction =
    Arc<dyn Fn(&FunctionCall) -> Result<Completion, ScriptError> + Send + Sync>;

/// Function library backed by closures, keyed case-insensitively.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: BTreeMap<String, NativeFunction>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&FunctionCall) -> Result<Completion, ScriptError> + Send + Sync + 'static,
    {
        self.functions
            .insert(name.to_lowercase(), Arc::new(function));
    }

    pub fn with<F>(mut self, name: &str, function: F) -> Self
    where
        F: Fn(&FunctionCall) -> Result<Completion, ScriptError> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionLibrary for FunctionTable {
    fn dispatch(&self, call: &FunctionCall) -> Result<Completion, ScriptError> {
        let function = self
            .functions
            .get(&call.name.to_lowercase())
            .ok_or_else(|| {
                ScriptError::new(
                    ErrorKind::FunctionMissing,
                    format!("Function \"{}\" is not registered.", call.name),
                )
            })?;
        function(call)
    }
}

/// Maps persisted entity ids onto live ones and script text onto entities.
pub trait EntityResolver: Send + Sync {
    /// Re-resolves an id read from a save; `None` when the entity is gone.
    fn remap(&self, stable_id: EntityId) -> Option<EntityId>;

    /// Interprets resolved script text as an entity reference.
    fn lookup(&self, text: &str) -> Option<EntityId>;
}

/// Keeps ids as they are and reads decimal or `0x` hex text as ids.
#[derive(Debug, Default)]
pub struct PassThroughResolver;

impl EntityResolver for PassThroughResolver {
    fn remap(&self, stable_id: EntityId) -> Option<EntityId> {
        Some(stable_id)
    }

    fn lookup(&self, text: &str) -> Option<EntityId> {
        let text = text.trim();
        let parsed = match text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => text.parse::<u64>().ok(),
        };
        parsed.filter(|id| *id != 0).map(EntityId)
    }
}

pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> String;
}

#[derive(Debug, Default)]
pub struct PassThroughTranslator;

impl Translator for PassThroughTranslator {
    fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}
