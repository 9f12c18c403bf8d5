use std::sync::Arc;

use cs_core::{CommandRecord, EntityId, ErrorKind, ScriptError};
use cs_parser::ScriptSource;

use crate::context::{
    FrameContext, FrameHandle, TargetContext, TargetHandle, ThreadContext, ThreadHandle, VarMap,
};
use crate::globals::GlobalVars;
use crate::host::{
    EmptyFunctionLibrary, EntityResolver, FunctionLibrary, PassThroughResolver,
    PassThroughTranslator, Translator,
};
use crate::store::HandleStore;

#[derive(Clone)]
pub struct RuntimeOptions {
    pub source: Arc<dyn ScriptSource>,
    pub functions: Option<Arc<dyn FunctionLibrary>>,
    pub entities: Option<Arc<dyn EntityResolver>>,
    pub translator: Option<Arc<dyn Translator>>,
}

impl RuntimeOptions {
    pub fn new(source: Arc<dyn ScriptSource>) -> Self {
        Self {
            source,
            functions: None,
            entities: None,
            translator: None,
        }
    }
}

/// What a step call tells the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSignal {
    /// A line ran or a frame was popped; call again.
    Pending,
    /// Nothing runnable right now (waiting on an external call, or the
    /// handle is no longer live).
    Idle,
    /// The invocation's call stack emptied and it has been removed.
    Finished,
}

pub struct ScriptRuntime {
    pub(crate) source: Arc<dyn ScriptSource>,
    pub(crate) functions: Arc<dyn FunctionLibrary>,
    pub(crate) entities: Arc<dyn EntityResolver>,
    pub(crate) translator: Arc<dyn Translator>,
    pub(crate) targets: HandleStore<TargetContext>,
    pub(crate) threads: HandleStore<ThreadContext>,
    pub(crate) frames: HandleStore<FrameContext>,
    pub(crate) records: HandleStore<CommandRecord>,
    pub(crate) globals: GlobalVars,
}

impl ScriptRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            source: options.source,
            functions: options
                .functions
                .unwrap_or_else(|| Arc::new(EmptyFunctionLibrary)),
            entities: options
                .entities
                .unwrap_or_else(|| Arc::new(PassThroughResolver)),
            translator: options
                .translator
                .unwrap_or_else(|| Arc::new(PassThroughTranslator)),
            targets: HandleStore::new("target"),
            threads: HandleStore::new("thread"),
            frames: HandleStore::new("frame"),
            records: HandleStore::new("command"),
            globals: GlobalVars::new(),
        }
    }

    /// Starts `script_name` on `entity`, reusing the entity's target context
    /// when one exists.
    pub fn start_invocation(
        &self,
        entity: EntityId,
        script_name: &str,
    ) -> Result<ThreadHandle, ScriptError> {
        let (target, created) = self.targets.find_or_create(
            |context| context.entity == Some(entity),
            || TargetContext::new(entity),
        );
        let thread = self
            .threads
            .create(ThreadContext::new(target, script_name));

        if let Err(error) = self.push_frame(thread, script_name, Vec::new()) {
            log::error!(
                "failed to start \"{}\" on entity {}: {}",
                script_name,
                entity,
                error
            );
            self.threads.destroy(thread);
            if created {
                self.targets
                    .destroy_if(target, |context| context.threads.is_empty());
            }
            return Err(error);
        }

        let attached = self
            .targets
            .with_mut(target, |context| context.threads.push(thread));
        if attached.is_none() {
            self.cleanup(thread);
            return Err(ScriptError::new(
                ErrorKind::StaleHandle,
                format!("Target context {} vanished while starting.", target),
            ));
        }

        log::debug!(
            "started \"{}\" on entity {} as invocation {}",
            script_name,
            entity,
            thread
        );
        Ok(thread)
    }

    /// Cancels an invocation: detaches it from its target and drops its
    /// frames. Unknown handles are ignored.
    pub fn cleanup(&self, thread: ThreadHandle) {
        let Some(context) = self.threads.destroy(thread) else {
            return;
        };
        self.targets.with_mut(context.target, |target| {
            target.threads.retain(|handle| *handle != thread)
        });
        for frame in context.frames {
            self.destroy_frame(frame);
        }
        log::debug!("invocation {} ({}) cleaned up", thread, context.script_name);
    }

    /// Drops every context and every global variable.
    pub fn reset(&self) {
        self.records.clear_all();
        self.frames.clear_all();
        self.threads.clear_all();
        self.targets.clear_all();
        self.globals.clear();
    }

    /// Hands out one invocation nobody has claimed, now or before a save.
    pub fn claim_next_invocation(&self) -> Option<ThreadHandle> {
        self.threads.update_first(|handle, context| {
            if context.claimed || context.was_claimed {
                return None;
            }
            context.claimed = true;
            context.was_claimed = true;
            Some(handle)
        })
    }

    pub fn target_for(&self, entity: EntityId) -> Option<TargetHandle> {
        self.targets
            .find(|context| context.entity == Some(entity))
    }

    pub fn invocations_for(&self, entity: EntityId) -> Vec<ThreadHandle> {
        self.target_for(entity)
            .and_then(|target| self.targets.with(target, |context| context.threads.clone()))
            .unwrap_or_default()
    }

    pub fn invocations(&self) -> Vec<ThreadHandle> {
        self.threads.handles()
    }

    pub fn frame_of(&self, thread: ThreadHandle) -> Option<FrameHandle> {
        self.threads.with(thread, ThreadContext::top_frame).flatten()
    }

    pub fn is_live(&self, thread: ThreadHandle) -> bool {
        self.threads.contains(thread)
    }

    pub fn target(&self, handle: TargetHandle) -> Option<TargetContext> {
        self.targets.get(handle)
    }

    pub fn thread(&self, handle: ThreadHandle) -> Option<ThreadContext> {
        self.threads.get(handle)
    }

    pub fn frame(&self, handle: FrameHandle) -> Option<FrameContext> {
        self.frames.get(handle)
    }

    pub fn global(&self, name: &str) -> Option<String> {
        self.globals.get(&name.to_lowercase())
    }

    pub fn set_global(&self, name: &str, value: impl Into<String>) -> String {
        self.globals.set(&name.to_lowercase(), value.into())
    }

    pub fn globals(&self) -> VarMap {
        self.globals.snapshot()
    }

    pub fn object_counts(&self) -> ObjectCounts {
        ObjectCounts {
            targets: self.targets.len(),
            threads: self.threads.len(),
            frames: self.frames.len(),
            records: self.records.len(),
            globals: self.globals.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectCounts {
    pub targets: usize,
    pub threads: usize,
    pub frames: usize,
    pub records: usize,
    pub globals: usize,
}
