use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use cs_core::ScriptError;
use cs_runtime::ScriptRuntime;

use crate::{invalid_argument, map_cli_io};

pub(crate) fn save_runtime_state(path: &Path, runtime: &ScriptRuntime) -> Result<(), ScriptError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|error| map_cli_io("create state dir", error))?;

    let file = File::create(path).map_err(|error| map_cli_io("write state", error))?;
    runtime.save(BufWriter::new(file))?;
    Ok(())
}

pub(crate) fn load_state_bytes(path: &Path) -> Result<Vec<u8>, ScriptError> {
    if !path.exists() {
        return Err(invalid_argument(format!(
            "State file does not exist: {}",
            path.display()
        )));
    }
    fs::read(path).map_err(|error| map_cli_io("read state", error))
}
