use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use cs_core::{Dialect, ErrorKind, ScriptError, DIALECT_PREFERENCE};

/// Subdirectory of the script root holding command scripts.
pub const COMMANDS_DIR: &str = "commands";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedScript {
    pub file_name: String,
    pub dialect: Dialect,
    pub text: String,
}

pub trait ScriptSource: Send + Sync {
    fn load(&self, name: &str) -> Result<LocatedScript, ScriptError>;
}

/// File names to try for `name`: the name itself when it already carries a
/// supported extension, otherwise one candidate per dialect in preference
/// order.
pub fn candidate_file_names(name: &str) -> Vec<(String, Dialect)> {
    if let Some(dialect) = explicit_dialect(name) {
        return vec![(name.to_string(), dialect)];
    }
    DIALECT_PREFERENCE
        .iter()
        .map(|dialect| (format!("{}.{}", name, dialect.extension()), *dialect))
        .collect()
}

fn explicit_dialect(name: &str) -> Option<Dialect> {
    let (_, extension) = name.rsplit_once('.')?;
    Dialect::from_extension(extension)
}

fn not_found(name: &str, searched: &str) -> ScriptError {
    ScriptError::new(
        ErrorKind::FileNotFound,
        format!("Script \"{}\" not found in {}.", name, searched),
    )
}

/// Reads scripts from `<root>/commands/<name>.<ext>`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.root.join(COMMANDS_DIR)
    }
}

impl ScriptSource for DirectorySource {
    fn load(&self, name: &str) -> Result<LocatedScript, ScriptError> {
        let commands_dir = self.commands_dir();
        for (file_name, dialect) in candidate_file_names(name) {
            let path = commands_dir.join(&file_name);
            match fs::read_to_string(&path) {
                Ok(text) => {
                    return Ok(LocatedScript {
                        file_name,
                        dialect,
                        text,
                    })
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(ScriptError::new(
                        ErrorKind::ReadFailed,
                        format!("Failed to read {}: {}", path.display(), error),
                    ))
                }
            }
        }
        Err(not_found(name, &commands_dir.display().to_string()))
    }
}

/// In-memory scripts keyed by file name, e.g. `"main.ini"`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new(files: BTreeMap<String, String>) -> Self {
        Self { files }
    }

    pub fn insert(&mut self, file_name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(file_name.into(), text.into());
    }
}

impl ScriptSource for MemorySource {
    fn load(&self, name: &str) -> Result<LocatedScript, ScriptError> {
        candidate_file_names(name)
            .into_iter()
            .find_map(|(file_name, dialect)| {
                self.files.get(&file_name).map(|text| LocatedScript {
                    file_name: file_name.clone(),
                    dialect,
                    text: text.clone(),
                })
            })
            .ok_or_else(|| not_found(name, "memory source"))
    }
}
