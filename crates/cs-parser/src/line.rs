use std::sync::OnceLock;

use cs_core::CommandRecord;
use regex::Regex;

fn label_line_regex() -> &'static Regex {
    static LABEL_LINE: OnceLock<Regex> = OnceLock::new();
    LABEL_LINE.get_or_init(|| {
        Regex::new(r"^\s*\[\s*([^\[\]]*?)\s*\]\s*(?:;.*)?$").expect("label line regex must compile")
    })
}

/// Splits one physical line into tokens.
///
/// Whitespace separates tokens. `"..."` is one token with `""` standing for
/// a literal quote; `[...]` is one token including its brackets. An unquoted,
/// unbracketed `;` ends the line.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch == ';' {
            break;
        }

        if ch == '"' {
            chars.next();
            let mut token = String::new();
            while let Some(next) = chars.next() {
                if next == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        token.push('"');
                        continue;
                    }
                    break;
                }
                token.push(next);
            }
            tokens.push(token);
            continue;
        }

        if ch == '[' {
            let mut token = String::new();
            for next in chars.by_ref() {
                token.push(next);
                if next == ']' {
                    break;
                }
            }
            tokens.push(token);
            continue;
        }

        let mut token = String::new();
        let mut comment = false;
        while let Some(&next) = chars.peek() {
            if next.is_whitespace() {
                break;
            }
            if next == ';' {
                comment = true;
                break;
            }
            token.push(next);
            chars.next();
        }
        tokens.push(token);
        if comment {
            break;
        }
    }

    tokens
}

/// Tokenizes a whole line-dialect script. Blank and comment-only lines
/// produce no record but still advance the line counter.
pub fn parse_line_script(text: &str) -> Vec<CommandRecord> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if let Some(captures) = label_line_regex().captures(line) {
            let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            if !name.is_empty() {
                records.push(CommandRecord::new(line_number, vec![format!("[{}]", name)]));
                continue;
            }
        }

        let tokens = tokenize_line(line);
        if tokens.is_empty() {
            continue;
        }
        records.push(CommandRecord::new(line_number, tokens));
    }

    records
}

#[cfg(test)]
mod line_tests {
    use super::*;

    fn words(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|token| token.to_string()).collect()
    }

    #[test]
    fn whitespace_separates_tokens() {
        assert_eq!(tokenize_line("  set\t$x   1 "), words(&["set", "$x", "1"]));
        assert!(tokenize_line("   ").is_empty());
    }

    #[test]
    fn quoted_span_is_one_token_with_escaped_quotes() {
        assert_eq!(
            tokenize_line(r#"set $msg "say ""hi"" now""#),
            words(&["set", "$msg", r#"say "hi" now"#])
        );
        assert_eq!(tokenize_line(r#"set $x """#), words(&["set", "$x", ""]));
        assert_eq!(tokenize_line(r#"set $x "a ; b""#), words(&["set", "$x", "a ; b"]));
    }

    #[test]
    fn bracket_span_keeps_brackets() {
        assert_eq!(
            tokenize_line("goto [my label] ; trailing"),
            words(&["goto", "[my label]"])
        );
        assert_eq!(tokenize_line("x [a;b]"), words(&["x", "[a;b]"]));
    }

    #[test]
    fn semicolon_truncates_the_line() {
        assert_eq!(tokenize_line("inc $x; bump"), words(&["inc", "$x"]));
        assert!(tokenize_line("; whole line").is_empty());
    }

    #[test]
    fn records_keep_source_line_numbers() {
        let records = parse_line_script("; header\n\nset $x 1\r\n  [ top ]  ; label\ninc $x\n");
        let lines = records
            .iter()
            .map(|record| record.line_number)
            .collect::<Vec<_>>();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(records[1].tokens, words(&["[top]"]));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let records = parse_line_script("\u{feff}set $x 1");
        assert_eq!(records[0].tokens, words(&["set", "$x", "1"]));
    }
}
