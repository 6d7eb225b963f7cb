//! Field coercion from untyped containers.
//!
//! Every function here pulls one field out of a JSON value, a string, or a
//! raw byte buffer and turns it into the type the [`Channel`](crate::models::Channel)
//! wants. Absence is never an error: an absent, null, or empty field comes
//! back as [`MISSING_VALUE`] (or `false` / an empty map for presence flags
//! and mappings). A [`CoercionFailure`] is returned only when a value is
//! present but has a shape that cannot be coerced at all; the builder then
//! decides whether that is a warning or an abort.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Placeholder stored in string fields whose source data was absent.
pub const MISSING_VALUE: &str = "N/A";

/// Marker the capture consumer writes for SQL NULL cells.
pub const NULL_MARKER: &str = "NULL";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionFailure {
    #[error("field '{field}' expected {expected}, found {found}")]
    WrongShape {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' is not valid UTF-8: {reason}")]
    InvalidUtf8 { field: String, reason: String },
}

/// True when a coerced string holds no real data.
pub fn is_missing(value: &str) -> bool {
    value.is_empty() || value == MISSING_VALUE
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_shape(field: &str, expected: &'static str, found: &Value) -> CoercionFailure {
    CoercionFailure::WrongShape {
        field: field.to_string(),
        expected,
        found: json_kind(found),
    }
}

/// Coerce an optional JSON value to a scalar string. `Ok(None)` means absent.
fn scalar(value: Option<&Value>, field: &str) -> Result<Option<String>, CoercionFailure> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(wrong_shape(field, "a scalar", other)),
    }
}

/// Read a string field. Empty strings count as absent.
pub fn json_string(container: &Value, field: &str) -> Result<String, CoercionFailure> {
    Ok(match scalar(container.get(field), field)? {
        Some(s) if !s.is_empty() => s,
        _ => MISSING_VALUE.to_string(),
    })
}

/// Read a free-text field. Unlike [`json_string`], an empty string is kept
/// as-is; only absence yields the sentinel.
pub fn json_text(container: &Value, field: &str) -> Result<String, CoercionFailure> {
    Ok(scalar(container.get(field), field)?.unwrap_or_else(|| MISSING_VALUE.to_string()))
}

/// Whether a field carries a usable value.
pub fn json_presence(container: &Value, field: &str) -> Result<bool, CoercionFailure> {
    match container.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => Ok(!s.is_empty()),
        Some(Value::Number(_)) => Ok(true),
        Some(other) => Err(wrong_shape(field, "a scalar", other)),
    }
}

/// Read a nested mapping of name → url, keeping only `recognized` names.
///
/// Entries may be plain strings or objects carrying a `url` key (the shape
/// the YouTube API uses for thumbnails). Unrecognized names are skipped
/// silently.
pub fn json_mapping(
    container: &Value,
    field: &str,
    recognized: &[&str],
) -> Result<BTreeMap<String, String>, CoercionFailure> {
    let mut out = BTreeMap::new();
    let entries = match container.get(field) {
        None | Some(Value::Null) => return Ok(out),
        Some(Value::Object(entries)) => entries,
        Some(other) => return Err(wrong_shape(field, "an object", other)),
    };

    for name in recognized {
        let Some(entry) = entries.get(*name) else {
            continue;
        };
        let url = match entry {
            Value::Object(_) => scalar(entry.get("url"), &format!("{}.{}.url", field, name))?,
            other => scalar(Some(other), &format!("{}.{}", field, name))?,
        };
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            out.insert((*name).to_string(), url);
        }
    }

    Ok(out)
}

/// Normalize raw text for a string field: empty becomes the sentinel.
pub fn text_value(raw: &str) -> String {
    if raw.is_empty() {
        MISSING_VALUE.to_string()
    } else {
        raw.to_string()
    }
}

/// Decode a raw byte buffer as UTF-8 text.
pub fn bytes_value(field: &str, raw: &[u8]) -> Result<String, CoercionFailure> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| CoercionFailure::InvalidUtf8 {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

/// A value type that can sit in a flat list or key/value source.
pub trait RawField {
    /// The value as text, `None` when absent. Empty strings are kept.
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure>;

    /// JSON rendition of the raw value, attached to diagnostics.
    fn payload(&self) -> Value;

    /// Coerce to a string, yielding [`MISSING_VALUE`] when absent or empty.
    fn coerce(&self, field: &str) -> Result<String, CoercionFailure> {
        Ok(match self.raw_text(field)? {
            Some(text) => text_value(&text),
            None => MISSING_VALUE.to_string(),
        })
    }
}

impl RawField for str {
    fn raw_text(&self, _field: &str) -> Result<Option<String>, CoercionFailure> {
        Ok(Some(self.to_string()))
    }

    fn payload(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl RawField for String {
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure> {
        self.as_str().raw_text(field)
    }

    fn payload(&self) -> Value {
        self.as_str().payload()
    }
}

impl RawField for [u8] {
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure> {
        bytes_value(field, self).map(Some)
    }

    fn payload(&self) -> Value {
        Value::String(String::from_utf8_lossy(self).into_owned())
    }
}

impl RawField for Vec<u8> {
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure> {
        self.as_slice().raw_text(field)
    }

    fn payload(&self) -> Value {
        self.as_slice().payload()
    }
}

/// JSON cells: scalars are read as text, `null` is absent, and objects or
/// arrays fail coercion for that field only.
impl RawField for Value {
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure> {
        scalar(Some(self), field)
    }

    fn payload(&self) -> Value {
        self.clone()
    }
}

impl<T: RawField + ?Sized> RawField for &T {
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure> {
        (**self).raw_text(field)
    }

    fn payload(&self) -> Value {
        (**self).payload()
    }
}

/// `None` is SQL NULL or an absent cell.
impl<T: RawField> RawField for Option<T> {
    fn raw_text(&self, field: &str) -> Result<Option<String>, CoercionFailure> {
        match self {
            Some(inner) => inner.raw_text(field),
            None => Ok(None),
        }
    }

    fn payload(&self) -> Value {
        self.as_ref().map(RawField::payload).unwrap_or(Value::Null)
    }
}
