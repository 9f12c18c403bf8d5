use cs_core::{CommandRecord, LabelMap};

/// Keyword that opens a subroutine body.
pub const BEGINSUB: &str = "beginsub";

/// Canonical lookup key for a label or subroutine name. Label names are
/// matched case-insensitively and may be written with or without brackets.
pub fn label_key(name: &str) -> String {
    let trimmed = name.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner.trim().to_lowercase()
}

/// Builds the GOTO map (label line index) and the GOSUB map (index of the
/// `beginsub` line itself) in one pass. The first declaration of a name wins.
pub fn build_label_maps(script_name: &str, records: &[CommandRecord]) -> (LabelMap, LabelMap) {
    let mut goto_labels = LabelMap::new();
    let mut gosub_labels = LabelMap::new();

    for (index, record) in records.iter().enumerate() {
        if let Some(name) = record.label_name() {
            let key = label_key(name);
            if goto_labels.contains_key(&key) {
                log::warn!(
                    "{}:{}: duplicate label \"{}\" ignored",
                    script_name,
                    record.line_number,
                    name
                );
            } else {
                goto_labels.insert(key, index);
            }
            continue;
        }

        if record.first_token_is(BEGINSUB) {
            let Some(name) = record.tokens.get(1) else {
                log::warn!(
                    "{}:{}: beginsub without a name",
                    script_name,
                    record.line_number
                );
                continue;
            };
            let key = label_key(name);
            if gosub_labels.contains_key(&key) {
                log::warn!(
                    "{}:{}: duplicate subroutine \"{}\" ignored",
                    script_name,
                    record.line_number,
                    name
                );
            } else {
                gosub_labels.insert(key, index);
            }
        }
    }

    (goto_labels, gosub_labels)
}

#[cfg(test)]
mod label_tests {
    use super::*;

    fn record(line_number: usize, tokens: &[&str]) -> CommandRecord {
        CommandRecord::new(
            line_number,
            tokens.iter().map(|token| token.to_string()).collect(),
        )
    }

    #[test]
    fn label_key_strips_brackets_and_case() {
        assert_eq!(label_key("[Loop]"), "loop");
        assert_eq!(label_key(" loop "), "loop");
        assert_eq!(label_key("[ Two Words ]"), "two words");
    }

    #[test]
    fn maps_point_at_declaring_lines() {
        let records = vec![
            record(1, &["[start]"]),
            record(2, &["gosub", "greet"]),
            record(4, &["BeginSub", "Greet"]),
            record(5, &["endsub"]),
            record(6, &["[start]"]),
        ];
        let (goto_labels, gosub_labels) = build_label_maps("main", &records);
        assert_eq!(goto_labels.get("start"), Some(&0));
        assert_eq!(goto_labels.len(), 1);
        assert_eq!(gosub_labels.get("greet"), Some(&2));
    }
}
