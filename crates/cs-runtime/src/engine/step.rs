use cs_core::{ErrorKind, ScriptError, SourceRef};

use super::frame_stack::stale_frame;
use super::lifecycle::{ScriptRuntime, StepSignal};
use super::scope::ScopeContext;
use crate::context::{FrameHandle, Readiness, ThreadHandle};

/// Everything a command handler needs about the line being executed.
#[derive(Debug, Clone)]
pub(crate) struct LineContext {
    pub thread: ThreadHandle,
    pub frame: FrameHandle,
    /// Index of the line in the frame's record list.
    pub index: usize,
    pub line_count: usize,
    pub source: SourceRef,
    pub tokens: Vec<String>,
    pub scope: ScopeContext,
}

/// Where the cursor goes after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    JumpTo(usize),
    /// Waiting on an external completion; the cursor already moved past the
    /// line.
    Park,
    /// A callee frame was pushed on top; the caller's cursor already moved.
    Called,
}

impl ScriptRuntime {
    /// Executes at most one runnable line of `frame`.
    ///
    /// Stale frames, frames waiting on a callee and frames parked on an
    /// external call report `Idle`. An exhausted frame is popped instead.
    pub fn step(&self, frame: FrameHandle) -> Result<StepSignal, ScriptError> {
        if !self.frames.contains(frame) {
            return Ok(StepSignal::Idle);
        }
        let thread = self.thread_of(frame)?;
        if self.frame_of(thread) != Some(frame) {
            return Ok(StepSignal::Idle);
        }
        let parked = self
            .frames
            .with(frame, |context| context.pending_call.is_some())
            .ok_or_else(|| stale_frame(frame))?;
        if parked {
            return Ok(StepSignal::Idle);
        }

        if self.ensure_ready(frame)? == Readiness::Exhausted {
            return self.pop_frame(thread, frame);
        }

        let line = self.load_line(thread, frame)?;
        let Some(line) = line else {
            return Ok(StepSignal::Pending);
        };

        log::trace!("{}: {}", line.source, line.tokens.join(" "));
        match self.execute_line(&line)? {
            Flow::Next => self.move_cursor(frame, line.index + 1),
            Flow::JumpTo(index) => self.move_cursor(frame, index),
            Flow::Park => return Ok(StepSignal::Idle),
            Flow::Called => {}
        }
        Ok(StepSignal::Pending)
    }

    /// Steps the innermost frame of `thread`.
    pub fn step_invocation(&self, thread: ThreadHandle) -> Result<StepSignal, ScriptError> {
        if !self.threads.contains(thread) {
            return Ok(StepSignal::Idle);
        }
        match self.frame_of(thread) {
            Some(frame) => self.step(frame),
            None => {
                log::error!("invocation {} has an empty call stack", thread);
                self.cleanup(thread);
                Ok(StepSignal::Finished)
            }
        }
    }

    /// Finishes an external call that answered `Completion::Pending`.
    pub fn complete_call(&self, frame: FrameHandle, result: &str) -> Result<(), ScriptError> {
        let pending = self
            .frames
            .with_mut(frame, |context| {
                let pending = context.pending_call.take();
                if pending.is_some() {
                    context.most_recent_result = result.to_string();
                }
                pending
            })
            .ok_or_else(|| stale_frame(frame))?;
        let Some(pending) = pending else {
            return Err(ScriptError::new(
                ErrorKind::InvalidArgument,
                format!("Frame {} is not waiting on an external call.", frame),
            ));
        };

        log::debug!("{}: {} completed", pending.origin, pending.function);
        if let Some(token) = pending.assign_to {
            let thread = self.thread_of(frame)?;
            let scope = ScopeContext {
                thread,
                frame: Some(frame),
                origin: pending.origin.to_string(),
            };
            self.assign_token(&scope, &token, result.to_string());
        }
        Ok(())
    }

    pub(crate) fn move_cursor(&self, frame: FrameHandle, index: usize) {
        self.frames.with_mut(frame, |context| {
            context.current_line = index.min(context.records.len());
            context.readiness = Readiness::NotReady;
        });
    }

    /// Snapshot of the current line. A dangling record is skipped and
    /// reported as `None`.
    fn load_line(
        &self,
        thread: ThreadHandle,
        frame: FrameHandle,
    ) -> Result<Option<LineContext>, ScriptError> {
        let (index, line_count, record, script) = self
            .frames
            .with(frame, |context| {
                (
                    context.current_line,
                    context.records.len(),
                    context.records.get(context.current_line).copied(),
                    context.script_name.clone(),
                )
            })
            .ok_or_else(|| stale_frame(frame))?;

        let record = record.and_then(|handle| {
            self.records
                .with(handle, |record| (record.line_number, record.tokens.clone()))
        });
        let Some((line_number, tokens)) = record else {
            log::error!("{}: frame {} lost command record {}", script, frame, index);
            self.move_cursor(frame, index + 1);
            return Ok(None);
        };

        let source = SourceRef::new(script, line_number);
        Ok(Some(LineContext {
            thread,
            frame,
            index,
            line_count,
            scope: ScopeContext {
                thread,
                frame: Some(frame),
                origin: source.to_string(),
            },
            source,
            tokens,
        }))
    }
}
