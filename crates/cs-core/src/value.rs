use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance used when two floating point operands are compared for equality.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// A script value after literal classification.
///
/// Script variables are stored as plain strings; this type only exists while
/// a comparison or arithmetic operator needs to look at what the text means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Classifies `text` as boolean literal, integer, float, hex integer or
    /// plain string, in that order. The empty string is `None`.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::None;
        }
        if text.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(value) = text.parse::<i64>() {
            return Self::Int(value);
        }
        if let Some(value) = parse_finite_float(text) {
            return Self::Float(value);
        }
        if let Some(value) = parse_hex(text) {
            return Self::Int(value);
        }
        Self::String(text.to_string())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::String(value) => !value.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::None => Some(0.0),
            Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::String(_) => None,
        }
    }

    /// Type-coercing equality shared by `IF` and host helpers.
    pub fn smart_eq(&self, other: &Self) -> bool {
        match (self.is_truthy(), other.is_truthy()) {
            (false, false) => return true,
            (true, false) | (false, true) => return false,
            (true, true) => {}
        }

        match (self, other) {
            (Self::String(left), Self::String(right)) => {
                match (coerce_number(left), coerce_number(right)) {
                    (Some(left), Some(right)) => numbers_equal(left, right),
                    _ => left.to_lowercase() == right.to_lowercase(),
                }
            }
            (Self::String(text), number) | (number, Self::String(text)) => {
                match (coerce_number(text), number.as_number()) {
                    (Some(left), Some(right)) => numbers_equal(left, right),
                    _ => false,
                }
            }
            (left, right) => match (left.as_number(), right.as_number()) {
                (Some(left), Some(right)) => numbers_equal(left, right),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => f.write_str(&format_float(*value)),
            Self::String(value) => f.write_str(value),
        }
    }
}

pub fn smart_equals(left: &str, right: &str) -> bool {
    Value::parse(left).smart_eq(&Value::parse(right))
}

/// Numeric reading of a variable: empty or non-numeric text counts as zero.
pub fn to_number_lenient(text: &str) -> f64 {
    Value::parse(text)
        .as_number()
        .or_else(|| coerce_number(text))
        .unwrap_or(0.0)
}

/// Numeric reading that reports text which is not a number at all.
pub fn to_number_strict(text: &str) -> Option<f64> {
    match Value::parse(text) {
        Value::String(text) => coerce_number(&text),
        other => other.as_number(),
    }
}

/// Fixed six-decimal rendering used for every computed number.
pub fn format_float(value: f64) -> String {
    format!("{:.6}", value)
}

fn numbers_equal(left: f64, right: f64) -> bool {
    (left - right).abs() < FLOAT_EPSILON
}

fn coerce_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_finite_float(trimmed).or_else(|| parse_hex(trimmed).map(|value| value as f64))
}

fn parse_finite_float(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_hex(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))?;
    let value = i64::from_str_radix(digits, 16).ok()?;
    Some(if negative { -value } else { value })
}
