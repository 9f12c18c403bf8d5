use cs_core::{CommandRecord, ErrorKind, ScriptError};
use cs_parser::parse_script;

use super::lifecycle::{ScriptRuntime, StepSignal};
use crate::context::{FrameContext, FrameHandle, Readiness, ThreadHandle, VarMap};

pub(super) fn stale_frame(frame: FrameHandle) -> ScriptError {
    ScriptError::new(
        ErrorKind::StaleHandle,
        format!("Frame context {} is not live.", frame),
    )
}

impl ScriptRuntime {
    /// Parses `script_name` and pushes it as the new innermost frame of
    /// `thread`.
    pub(crate) fn push_frame(
        &self,
        thread: ThreadHandle,
        script_name: &str,
        call_args: Vec<String>,
    ) -> Result<FrameHandle, ScriptError> {
        let parsed = parse_script(self.source.as_ref(), script_name)?;
        let records = parsed
            .records
            .into_iter()
            .map(|record| self.records.create(record))
            .collect::<Vec<_>>();

        let frame = self.frames.create(FrameContext {
            thread,
            script_name: parsed.name,
            dialect: parsed.dialect,
            records,
            current_line: 0,
            vars: VarMap::new(),
            call_args,
            goto_labels: parsed.goto_labels,
            gosub_labels: parsed.gosub_labels,
            return_stack: Vec::new(),
            most_recent_result: String::new(),
            readiness: Readiness::NotReady,
            pending_call: None,
        });

        let pushed = self
            .threads
            .with_mut(thread, |context| context.frames.push(frame));
        if pushed.is_none() {
            self.destroy_frame(frame);
            return Err(ScriptError::new(
                ErrorKind::StaleHandle,
                format!("Thread context {} is not live.", thread),
            ));
        }

        log::trace!("pushed frame {} ({}) on invocation {}", frame, script_name, thread);
        Ok(frame)
    }

    pub(crate) fn destroy_frame(&self, frame: FrameHandle) {
        if let Some(context) = self.frames.destroy(frame) {
            for record in context.records {
                self.records.destroy(record);
            }
        }
    }

    /// The owning thread of `frame`, checked for liveness.
    pub(crate) fn thread_of(&self, frame: FrameHandle) -> Result<ThreadHandle, ScriptError> {
        let thread = self
            .frames
            .with(frame, |context| context.thread)
            .ok_or_else(|| stale_frame(frame))?;
        if !self.threads.contains(thread) {
            log::error!("frame {} points at dead invocation {}", frame, thread);
            return Err(ScriptError::new(
                ErrorKind::BrokenParent,
                format!("Frame {} belongs to missing thread {}.", frame, thread),
            ));
        }
        Ok(thread)
    }

    /// Moves the cursor forward to the next runnable line if the frame has
    /// not been scanned since it last moved.
    pub(crate) fn ensure_ready(&self, frame: FrameHandle) -> Result<Readiness, ScriptError> {
        let (readiness, start) = self
            .frames
            .with(frame, |context| (context.readiness, context.current_line))
            .ok_or_else(|| stale_frame(frame))?;
        if readiness != Readiness::NotReady {
            return Ok(readiness);
        }

        let mut line = start;
        let readiness = loop {
            let handle = self
                .frames
                .with(frame, |context| context.records.get(line).copied())
                .ok_or_else(|| stale_frame(frame))?;
            let Some(handle) = handle else {
                break Readiness::Exhausted;
            };
            match self.records.with(handle, CommandRecord::is_runnable) {
                Some(true) => break Readiness::Ready,
                Some(false) => line += 1,
                None => {
                    log::error!("frame {} references missing command record {}", frame, handle);
                    line += 1;
                }
            }
        };
        self.frames.with_mut(frame, |context| {
            context.current_line = line.min(context.records.len());
            context.readiness = readiness;
        });
        Ok(readiness)
    }

    /// Pops `frame` and any exhausted frames beneath it. Finishes the
    /// invocation when the stack empties.
    pub(crate) fn pop_frame(
        &self,
        thread: ThreadHandle,
        frame: FrameHandle,
    ) -> Result<StepSignal, ScriptError> {
        let removed = self.threads.with_mut(thread, |context| {
            let was_top = context.top_frame() == Some(frame);
            context.frames.retain(|handle| *handle != frame);
            was_top
        });
        match removed {
            None => {
                self.destroy_frame(frame);
                return Ok(StepSignal::Idle);
            }
            Some(false) => log::error!("frame {} popped while not on top of {}", frame, thread),
            Some(true) => {}
        }
        self.destroy_frame(frame);

        loop {
            let Some(top) = self.frame_of(thread) else {
                log::debug!("invocation {} finished", thread);
                self.cleanup(thread);
                return Ok(StepSignal::Finished);
            };

            match self.ensure_ready(top) {
                Ok(Readiness::Exhausted) => {
                    self.threads.with_mut(thread, |context| {
                        context.frames.retain(|handle| *handle != top)
                    });
                    self.destroy_frame(top);
                }
                Ok(_) => return Ok(StepSignal::Pending),
                Err(error) => {
                    log::error!("dropping unusable frame {}: {}", top, error);
                    self.threads.with_mut(thread, |context| {
                        context.frames.retain(|handle| *handle != top)
                    });
                }
            }
        }
    }
}
