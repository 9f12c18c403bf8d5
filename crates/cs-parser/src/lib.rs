mod json;
mod labels;
mod line;
mod source;

pub use json::{parse_json_script, JSON_LABEL_MARKER};
pub use labels::{build_label_maps, label_key, BEGINSUB};
pub use line::{parse_line_script, tokenize_line};
pub use source::{
    candidate_file_names, DirectorySource, LocatedScript, MemorySource, ScriptSource, COMMANDS_DIR,
};

use cs_core::{CommandRecord, Dialect, ErrorKind, LabelMap, ScriptError};

/// A tokenized script ready to be loaded into a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScript {
    pub name: String,
    pub dialect: Dialect,
    pub records: Vec<CommandRecord>,
    pub goto_labels: LabelMap,
    pub gosub_labels: LabelMap,
}

impl ParsedScript {
    pub fn runnable_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.is_runnable())
            .count()
    }
}

/// Locates `name` through `source` and parses it with the dialect implied by
/// the file it resolved to.
pub fn parse_script(source: &dyn ScriptSource, name: &str) -> Result<ParsedScript, ScriptError> {
    let located = source.load(name)?;
    parse_text(name, located.dialect, &located.text)
}

pub fn parse_text(name: &str, dialect: Dialect, text: &str) -> Result<ParsedScript, ScriptError> {
    let records = match dialect {
        Dialect::Line => parse_line_script(text),
        Dialect::Json => parse_json_script(name, text)?,
    };

    if !records.iter().any(CommandRecord::is_runnable) {
        return Err(ScriptError::new(
            ErrorKind::NoExecutableCommands,
            format!("Script \"{}\" has no executable commands.", name),
        ));
    }

    let (goto_labels, gosub_labels) = build_label_maps(name, &records);
    log::debug!(
        "parsed {} ({:?}): {} records, {} labels, {} subroutines",
        name,
        dialect,
        records.len(),
        goto_labels.len(),
        gosub_labels.len()
    );

    Ok(ParsedScript {
        name: name.to_string(),
        dialect,
        records,
        goto_labels,
        gosub_labels,
    })
}
