use std::collections::BTreeSet;
use std::io::{Read, Write};

use cs_core::{ErrorKind, ScriptError};

use super::lifecycle::ScriptRuntime;
use crate::context::{FrameHandle, ThreadHandle};
use crate::persist::{RecordReader, RecordWriter};

pub const SAVE_FORMAT_VERSION: u32 = 1;

impl ScriptRuntime {
    /// Writes every table and the global map to `out` and hands it back.
    pub fn save<W: Write>(&self, out: W) -> Result<W, ScriptError> {
        let mut writer = RecordWriter::new(out);
        writer.write_u32(SAVE_FORMAT_VERSION)?;
        self.targets.save_all(&mut writer)?;
        self.threads.save_all(&mut writer)?;
        self.frames.save_all(&mut writer)?;
        self.records.save_all(&mut writer)?;
        self.globals.save_all(&mut writer)?;
        writer.flush()?;

        let counts = self.object_counts();
        log::debug!(
            "saved {} targets, {} invocations, {} frames, {} records, {} globals",
            counts.targets,
            counts.threads,
            counts.frames,
            counts.records,
            counts.globals
        );
        Ok(writer.into_inner())
    }

    pub fn save_to_vec(&self) -> Result<Vec<u8>, ScriptError> {
        self.save(Vec::new())
    }

    /// Replaces all state with the stream in `input`. On failure the runtime
    /// is left empty.
    pub fn load<R: Read>(&self, input: R) -> Result<(), ScriptError> {
        self.reset();
        if let Err(error) = self.load_tables(input) {
            log::error!("save rejected: {}", error);
            self.reset();
            return Err(error);
        }
        self.repair_after_load();
        Ok(())
    }

    pub fn load_from_slice(&self, bytes: &[u8]) -> Result<(), ScriptError> {
        self.load(bytes)
    }

    fn load_tables<R: Read>(&self, input: R) -> Result<(), ScriptError> {
        let mut reader = RecordReader::new(input);
        let version = reader.read_u32()?;
        if version != SAVE_FORMAT_VERSION {
            return Err(ScriptError::new(
                ErrorKind::SaveVersion,
                format!(
                    "Save format {} is not supported (expected {}).",
                    version, SAVE_FORMAT_VERSION
                ),
            ));
        }
        self.targets.load_all(&mut reader)?;
        self.threads.load_all(&mut reader)?;
        self.frames.load_all(&mut reader)?;
        self.records.load_all(&mut reader)?;
        self.globals.load_all(&mut reader)?;
        Ok(())
    }

    /// Re-resolves entities and drops whatever no longer hangs together.
    fn repair_after_load(&self) {
        self.remap_entities();
        self.drop_orphan_threads();
        self.drop_orphan_frames();
        self.drop_orphan_records();
        self.finish_interrupted_calls();

        let counts = self.object_counts();
        log::debug!(
            "loaded {} targets, {} invocations, {} frames, {} records, {} globals",
            counts.targets,
            counts.threads,
            counts.frames,
            counts.records,
            counts.globals
        );
    }

    fn remap_entities(&self) {
        for target in self.targets.handles() {
            let Some(Some(stable_id)) = self.targets.with(target, |context| context.entity) else {
                continue;
            };
            let remapped = self.entities.remap(stable_id);
            let orphaned = self
                .targets
                .with_mut(target, |context| {
                    context.entity = remapped;
                    if remapped.is_none() {
                        std::mem::take(&mut context.threads)
                    } else {
                        Vec::new()
                    }
                })
                .unwrap_or_default();

            if remapped.is_none() {
                log::error!(
                    "entity {} of target {} no longer resolves; dropping {} invocation(s)",
                    stable_id,
                    target,
                    orphaned.len()
                );
                for thread in orphaned {
                    self.cleanup(thread);
                }
            }
        }
    }

    fn drop_orphan_threads(&self) {
        for thread in self.threads.handles() {
            let Some((target, empty)) = self
                .threads
                .with(thread, |context| (context.target, context.frames.is_empty()))
            else {
                continue;
            };
            let listed = self
                .targets
                .with(target, |context| context.threads.contains(&thread));
            match listed {
                None => {
                    log::error!("invocation {} points at missing target {}", thread, target);
                    self.cleanup(thread);
                }
                Some(_) if empty => {
                    log::error!("invocation {} has no frames", thread);
                    self.cleanup(thread);
                }
                Some(false) => {
                    self.targets
                        .with_mut(target, |context| context.threads.push(thread));
                }
                Some(true) => {}
            }
        }

        for target in self.targets.handles() {
            let listed = self
                .targets
                .with(target, |context| context.threads.clone())
                .unwrap_or_default();
            let live: Vec<ThreadHandle> = listed
                .into_iter()
                .filter(|thread| self.threads.contains(*thread))
                .collect();
            self.targets
                .with_mut(target, |context| context.threads = live);
        }
    }

    fn drop_orphan_frames(&self) {
        for frame in self.frames.handles() {
            let Some(thread) = self.frames.with(frame, |context| context.thread) else {
                continue;
            };
            let stacked = self
                .threads
                .with(thread, |context| context.frames.contains(&frame))
                .unwrap_or(false);
            if !stacked {
                log::error!("frame {} is not on the stack of invocation {}", frame, thread);
                self.destroy_frame(frame);
            }
        }

        for thread in self.threads.handles() {
            let stack = self
                .threads
                .with(thread, |context| context.frames.clone())
                .unwrap_or_default();
            let live: Vec<FrameHandle> = stack
                .into_iter()
                .filter(|frame| self.frames.contains(*frame))
                .collect();
            if live.is_empty() {
                log::error!("invocation {} lost every frame", thread);
                self.cleanup(thread);
            } else {
                self.threads
                    .with_mut(thread, |context| context.frames = live);
            }
        }
    }

    fn drop_orphan_records(&self) {
        let mut referenced = BTreeSet::new();
        for frame in self.frames.handles() {
            if let Some(records) = self.frames.with(frame, |context| context.records.clone()) {
                referenced.extend(records);
            }
        }
        for record in self.records.handles() {
            if !referenced.contains(&record) {
                self.records.destroy(record);
            }
        }
    }

    /// Calls parked at save time finish with an empty result.
    fn finish_interrupted_calls(&self) {
        for frame in self.frames.handles() {
            let waiting = self
                .frames
                .with(frame, |context| context.pending_call.is_some())
                .unwrap_or(false);
            if !waiting {
                continue;
            }
            if let Err(error) = self.complete_call(frame, "") {
                log::error!("frame {}: interrupted call not finished: {}", frame, error);
            }
        }
    }
}
