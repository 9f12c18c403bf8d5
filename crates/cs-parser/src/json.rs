use cs_core::{CommandRecord, ErrorKind, ScriptError, SourceRef};
use serde_json::Value as JsonValue;

/// Marker used by the structured dialect for `[":", "name"]` label entries.
pub const JSON_LABEL_MARKER: &str = ":";

pub fn parse_json_script(script_name: &str, text: &str) -> Result<Vec<CommandRecord>, ScriptError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let document: JsonValue = serde_json::from_str(text).map_err(|error| {
        ScriptError::with_source(
            ErrorKind::MalformedJson,
            error.to_string(),
            SourceRef::new(script_name, error.line()),
        )
    })?;

    let Some(commands) = document.get("cmd").and_then(JsonValue::as_array) else {
        return Err(ScriptError::new(
            ErrorKind::MalformedJson,
            format!("Script \"{}\" has no \"cmd\" array.", script_name),
        ));
    };

    let mut records = Vec::new();
    for (index, entry) in commands.iter().enumerate() {
        let line_number = index + 1;
        let Some(fields) = entry.as_array() else {
            return Err(ScriptError::with_source(
                ErrorKind::MalformedJson,
                format!("Entry {} of \"cmd\" is not an array.", line_number),
                SourceRef::new(script_name, line_number),
            ));
        };
        let tokens = fields.iter().map(json_field_to_string).collect::<Vec<_>>();
        if tokens.is_empty() {
            continue;
        }
        records.push(CommandRecord::new(line_number, normalize_label(tokens)));
    }

    Ok(records)
}

fn json_field_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(flag) => flag.to_string(),
        JsonValue::Number(number) => number.to_string(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn normalize_label(tokens: Vec<String>) -> Vec<String> {
    match tokens.as_slice() {
        [marker, name] if marker == JSON_LABEL_MARKER && !name.trim().is_empty() => {
            vec![format!("[{}]", name.trim())]
        }
        _ => tokens,
    }
}
