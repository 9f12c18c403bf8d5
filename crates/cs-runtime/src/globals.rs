use std::io::{Read, Write};

use cs_core::ScriptError;
use parking_lot::RwLock;

use crate::context::VarMap;
use crate::persist::{RecordReader, RecordWriter};

/// Process-wide `$global#name` variables behind their own lock.
#[derive(Debug, Default)]
pub struct GlobalVars {
    vars: RwLock<VarMap>,
}

impl GlobalVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.vars.read().contains_key(name)
    }

    pub fn set(&self, name: &str, value: String) -> String {
        self.vars.write().insert(name.to_string(), value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> VarMap {
        self.vars.read().clone()
    }

    pub fn clear(&self) {
        self.vars.write().clear();
    }

    pub fn save_all<W: Write>(&self, out: &mut RecordWriter<W>) -> Result<(), ScriptError> {
        let vars = self.vars.read();
        out.write_len(vars.len())?;
        for (name, value) in vars.iter() {
            out.write_payload(name)?;
            out.write_payload(value)?;
        }
        Ok(())
    }

    pub fn load_all<R: Read>(&self, input: &mut RecordReader<R>) -> Result<usize, ScriptError> {
        self.clear();
        let count = input.read_u32()?;
        let mut loaded = VarMap::new();
        for _ in 0..count {
            let name: String = input.read_payload()?;
            let value: String = input.read_payload()?;
            loaded.insert(name, value);
        }
        let len = loaded.len();
        *self.vars.write() = loaded;
        Ok(len)
    }
}

#[cfg(test)]
mod globals_tests {
    use super::*;

    #[test]
    fn set_returns_stored_value_and_overwrites() {
        let globals = GlobalVars::new();
        assert_eq!(globals.set("count", "1".to_string()), "1");
        assert_eq!(globals.set("count", "2".to_string()), "2");
        assert_eq!(globals.get("count").as_deref(), Some("2"));
        assert!(globals.has("count"));
        assert!(!globals.has("other"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let globals = GlobalVars::new();
        globals.set("a", "1".to_string());
        globals.set("b", "two words".to_string());

        let mut writer = RecordWriter::new(Vec::new());
        globals.save_all(&mut writer).expect("save");
        let bytes = writer.into_inner();

        let restored = GlobalVars::new();
        restored.set("stale", "x".to_string());
        let count = restored
            .load_all(&mut RecordReader::new(bytes.as_slice()))
            .expect("load");
        assert_eq!(count, 2);
        assert_eq!(restored.snapshot(), globals.snapshot());
    }
}
