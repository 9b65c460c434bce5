//! Canonical scalar coercion for loosely-typed upstream values.
//!
//! Every function here accepts an arbitrary [`serde_json::Value`] and returns
//! a canonical representation, or `None` (or a default) when the input does
//! not fit. Nothing in this module returns an error: malformed crawler and
//! third-party data degrades to "absent".
//!
//! # Canonical forms
//!
//! - Strings: trimmed, empty becomes `None`, numbers become their decimal form
//! - Dates: `YYYY-MM-DD`
//! - Timestamps: `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC, millisecond precision)
//! - Epoch numbers are milliseconds

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Trimmed string, or `None` for empty strings and non-scalar values.
///
/// Numbers become their decimal string form (`12` → `"12"`, `1.5` → `"1.5"`).
/// Booleans, arrays, objects and `null` yield `None`.
pub fn normalize_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(number_to_string(n)),
        _ => None,
    }
}

/// [`normalize_string`], upper-cased.
pub fn normalize_uppercase(value: &Value) -> Option<String> {
    normalize_string(value).map(|s| s.to_uppercase())
}

/// Calendar date as `YYYY-MM-DD`.
///
/// Accepts epoch milliseconds, RFC 3339 instants (converted to the UTC day),
/// `YYYY-MM-DD`, naive `YYYY-MM-DD[T ]HH:MM:SS[.fff]` (read as UTC), and
/// `DD/MM/YYYY`. The slash form is matched literally on its first ten
/// characters and reassembled without calendar validation.
pub fn normalize_date(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => epoch_millis(n).map(|dt| dt.format("%Y-%m-%d").to_string()),
        Value::String(s) => {
            let s = s.trim();
            if let Some(reassembled) = reassemble_slash_date(s) {
                return Some(reassembled);
            }
            parse_instant(s).map(|dt| dt.format("%Y-%m-%d").to_string())
        }
        _ => None,
    }
}

/// Full ISO-8601 instant, or the trimmed original when it is not a date.
///
/// Opaque timestamps supplied by external systems are preserved rather than
/// dropped. Only empty strings and non-scalar values yield `None`.
pub fn normalize_timestamp(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => epoch_millis(n).map(format_instant),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            match parse_instant(s) {
                Some(dt) => Some(format_instant(dt)),
                None => Some(s.to_string()),
            }
        }
        _ => None,
    }
}

/// Render an instant in the canonical timestamp form.
pub fn format_instant(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

const TRUE_TOKENS: &[&str] = &[
    "true",
    "1",
    "yes",
    "y",
    "s",
    "sim",
    "on",
    "ativo",
    "ativa",
    "habilitado",
    "habilitada",
    "verdadeiro",
];

const FALSE_TOKENS: &[&str] = &[
    "false",
    "0",
    "no",
    "n",
    "nao",
    "off",
    "inativo",
    "inativa",
    "desabilitado",
    "desabilitada",
    "falso",
];

/// Tri-state boolean: `Some(true)`, `Some(false)`, or `None` when unrecognized.
///
/// Tokens are compared case- and diacritic-insensitively, so `"NÃO"` and
/// `"nao"` are the same token. Unrecognized input is `None`, never `false`.
pub fn parse_boolean_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => {
            let token = fold_text(s);
            if TRUE_TOKENS.contains(&token.as_str()) {
                Some(true)
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Integer for required-count contexts: invalid input is `0`.
pub fn parse_integer(value: &Value) -> i64 {
    parse_optional_integer(value).unwrap_or(0)
}

/// Integer truncated toward zero, or `None` when the input is not numeric.
pub fn parse_optional_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => number_to_integer(n),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(i) = s.parse::<i64>() {
                return Some(i);
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }
        _ => None,
    }
}

/// Opaque JSON column: decode JSON-encoded strings, keep everything else.
///
/// A string that does not decode is kept as a string. `null`, empty strings
/// and strings that decode to `null` are `None`.
pub fn parse_json_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Null) => None,
                Ok(decoded) => Some(decoded),
                Err(_) => Some(Value::String(s.to_string())),
            }
        }
        other => Some(other.clone()),
    }
}

/// Decode a byte buffer holding UTF-8 JSON.
pub fn parse_json_bytes(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice(bytes).ok()
}

/// Diacritic-stripped, lower-cased, whitespace-collapsed text.
///
/// `"  Polo  PASSÍVO "` → `"polo passivo"`.
pub fn fold_text(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Helpers ──

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 => {
            (f as i64).to_string()
        }
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn number_to_integer(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

fn epoch_millis(n: &Number) -> Option<DateTime<Utc>> {
    let ms = number_to_integer(n)?;
    DateTime::from_timestamp_millis(ms)
}

/// `DD/MM/YYYY` prefix → `YYYY-MM-DD`.
fn reassemble_slash_date(s: &str) -> Option<String> {
    let head = s.get(..10)?;
    let bytes = head.as_bytes();
    let digits_at = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if bytes[2] != b'/' || bytes[5] != b'/' {
        return None;
    }
    if !(digits_at(0..2) && digits_at(3..5) && digits_at(6..10)) {
        return None;
    }
    Some(format!("{}-{}-{}", &head[6..10], &head[3..5], &head[0..2]))
}

/// Parse any of the accepted date/instant string forms as a UTC instant.
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    // Offset without colon, as emitted by some databases: 2024-01-31 10:00:00+0000
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
