use std::collections::BTreeMap;

use cs_core::{CommandRecord, Dialect, EntityId, LabelMap, SourceRef};
use serde::{Deserialize, Serialize};

use crate::store::Handle;

pub type TargetHandle = Handle<TargetContext>;
pub type ThreadHandle = Handle<ThreadContext>;
pub type FrameHandle = Handle<FrameContext>;
pub type RecordHandle = Handle<CommandRecord>;

pub type VarMap = BTreeMap<String, String>;

/// Per-entity state. Outlives the invocations it hosts and is only dropped
/// by a full reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetContext {
    /// `None` once the host can no longer resolve the entity.
    pub entity: Option<EntityId>,
    pub vars: VarMap,
    pub threads: Vec<ThreadHandle>,
}

impl TargetContext {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity: Some(entity),
            vars: VarMap::new(),
            threads: Vec::new(),
        }
    }
}

/// Per-invocation state: one resumable script run on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadContext {
    pub target: TargetHandle,
    pub script_name: String,
    pub vars: VarMap,
    /// Call stack, innermost frame last.
    pub frames: Vec<FrameHandle>,
    #[serde(skip)]
    pub claimed: bool,
    pub was_claimed: bool,
}

impl ThreadContext {
    pub fn new(target: TargetHandle, script_name: impl Into<String>) -> Self {
        Self {
            target,
            script_name: script_name.into(),
            vars: VarMap::new(),
            frames: Vec::new(),
            claimed: false,
            was_claimed: false,
        }
    }

    pub fn top_frame(&self) -> Option<FrameHandle> {
        self.frames.last().copied()
    }
}

/// Whether the cursor of a frame is known to sit on a runnable line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// Cursor moved since the last scan.
    #[default]
    NotReady,
    Ready,
    /// No runnable line at or after the cursor.
    Exhausted,
}

/// An external call the frame is waiting on. Persisted only so a load can
/// finish it with an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCall {
    pub function: String,
    pub origin: SourceRef,
    /// Variable token receiving the result (`set ... resultfrom`).
    pub assign_to: Option<String>,
}

/// Per-call-level state: one script body with its cursor and locals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameContext {
    pub thread: ThreadHandle,
    pub script_name: String,
    pub dialect: Dialect,
    pub records: Vec<RecordHandle>,
    pub current_line: usize,
    pub vars: VarMap,
    pub call_args: Vec<String>,
    pub goto_labels: LabelMap,
    pub gosub_labels: LabelMap,
    pub return_stack: Vec<usize>,
    pub most_recent_result: String,
    #[serde(skip)]
    pub readiness: Readiness,
    pub pending_call: Option<PendingCall>,
}

impl FrameContext {
    pub fn is_exhausted(&self) -> bool {
        self.current_line >= self.records.len()
    }
}
