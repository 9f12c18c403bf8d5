use std::path::{Path, PathBuf};

use cs_core::{Dialect, ScriptError};
use cs_parser::COMMANDS_DIR;
use walkdir::WalkDir;

use crate::{invalid_argument, map_cli_io};

/// Absolute script root that contains a `commands` directory.
pub(crate) fn resolve_root(root: &str) -> Result<PathBuf, ScriptError> {
    let path = PathBuf::from(root);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|error| map_cli_io("current dir", error))?
            .join(path)
    };

    if !absolute.is_dir() {
        return Err(invalid_argument(format!(
            "root is not a directory: {}",
            absolute.display()
        )));
    }
    if !absolute.join(COMMANDS_DIR).is_dir() {
        return Err(invalid_argument(format!(
            "root has no {} directory: {}",
            COMMANDS_DIR,
            absolute.display()
        )));
    }
    Ok(absolute)
}

/// Script file names under `<root>/commands`, relative and `/`-separated.
pub(crate) fn list_script_files(root: &Path) -> Result<Vec<String>, ScriptError> {
    let commands_dir = root.join(COMMANDS_DIR);
    let mut names = Vec::new();

    for entry in WalkDir::new(&commands_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(Dialect::from_extension)
            .is_some();
        if !supported {
            continue;
        }

        let relative = path
            .strip_prefix(&commands_dir)
            .map_err(|error| map_cli_io("scan commands", error))?
            .to_string_lossy()
            .replace('\\', "/");
        names.push(relative);
    }

    Ok(names)
}
