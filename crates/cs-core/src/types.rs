use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Script name plus 1-based source line, used to tag diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub script: String,
    pub line: usize,
}

impl SourceRef {
    pub fn new(script: impl Into<String>, line: usize) -> Self {
        Self {
            script: script.into(),
            line,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.script, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dialect {
    /// One command per physical line, `[label]` declarations, `;` comments.
    Line,
    /// A `{"cmd": [[...], ...]}` document.
    Json,
}

impl Dialect {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Line => "ini",
            Self::Json => "json",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "ini" => Some(Self::Line),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Lookup order used when a script name carries no extension.
pub const DIALECT_PREFERENCE: [Dialect; 2] = [Dialect::Line, Dialect::Json];

/// Host-side stable identifier of a simulation entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// One parsed, tokenized, non-blank source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub line_number: usize,
    pub tokens: Vec<String>,
}

impl CommandRecord {
    pub fn new(line_number: usize, tokens: Vec<String>) -> Self {
        Self {
            line_number,
            tokens,
        }
    }

    pub fn label_name(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [only] => label_inner(only),
            _ => None,
        }
    }

    pub fn is_label(&self) -> bool {
        self.label_name().is_some()
    }

    pub fn is_runnable(&self) -> bool {
        !self.tokens.is_empty() && !self.is_label() && !self.tokens[0].starts_with(';')
    }

    pub fn first_token_is(&self, keyword: &str) -> bool {
        self.tokens
            .first()
            .map(|token| token.eq_ignore_ascii_case(keyword))
            .unwrap_or(false)
    }
}

/// Returns the name inside a canonical `[name]` token.
pub fn label_inner(token: &str) -> Option<&str> {
    let inner = token.strip_prefix('[')?.strip_suffix(']')?;
    let inner = inner.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

/// Label name to record index.
pub type LabelMap = BTreeMap<String, usize>;
