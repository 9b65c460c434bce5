//! Untyped store rows and column lookup.

use serde_json::{Map, Value};

use crate::normalize::{normalize_string, normalize_timestamp};

/// An untyped key/value row as returned by the store.
pub type RawRecord = Map<String, Value>;

/// First column among `keys` that is present in `row`, even if `null`.
pub fn first_present<'a>(row: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| row.get(*k))
}

/// First column among `keys` that normalizes to a non-empty string.
pub fn first_string(row: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| row.get(*k).and_then(normalize_string))
}

/// First column among `keys` that normalizes to a timestamp.
pub fn first_timestamp(row: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| row.get(*k).and_then(normalize_timestamp))
}

/// First non-null column among `keys`.
pub fn first_value<'a>(row: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| row.get(*k).filter(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> RawRecord {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn presence_not_truthiness() {
        let r = row(json!({"a": null, "b": "x"}));
        assert_eq!(first_present(&r, &["a", "b"]), Some(&Value::Null));
        assert_eq!(first_value(&r, &["a", "b"]), Some(&json!("x")));
        assert_eq!(first_present(&r, &["c"]), None);
    }

    #[test]
    fn first_string_skips_blank() {
        let r = row(json!({"a": "  ", "b": 12}));
        assert_eq!(first_string(&r, &["a", "b"]), Some("12".into()));
    }
}
