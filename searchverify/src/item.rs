//! Result items returned by the provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, VerifyError};

/// Presence of a field inside a [`ResultItem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// The key does not exist along the path.
    Absent,
    /// The key exists and holds `null`.
    Null,
    /// The key exists with a value.
    Present(&'a Value),
}

impl<'a> FieldValue<'a> {
    /// Returns the value when present.
    #[must_use]
    pub const fn value(self) -> Option<&'a Value> {
        match self {
            Self::Present(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the key is missing.
    #[must_use]
    pub const fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// One record returned by a search or follow-up endpoint.
///
/// No schema is assumed. Fields are read through dotted paths such as
/// `owner.login`, and every read reports whether the field was absent, null
/// or present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultItem(Map<String, Value>);

impl ResultItem {
    /// Wraps a JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Converts a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(VerifyError::Serialization(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Reads a dotted path.
    ///
    /// A `null` anywhere along the path yields [`FieldValue::Null`]; a missing
    /// key or a non-object intermediate yields [`FieldValue::Absent`].
    #[must_use]
    pub fn field(&self, path: &str) -> FieldValue<'_> {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return FieldValue::Absent;
        };
        let mut current = match self.0.get(first) {
            Some(v) => v,
            None => return FieldValue::Absent,
        };

        for segment in segments {
            current = match current {
                Value::Null => return FieldValue::Null,
                Value::Object(map) => match map.get(segment) {
                    Some(v) => v,
                    None => return FieldValue::Absent,
                },
                _ => return FieldValue::Absent,
            };
        }

        if current.is_null() {
            FieldValue::Null
        } else {
            FieldValue::Present(current)
        }
    }

    /// Reads a dotted path as a string.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.field(path).value().and_then(Value::as_str)
    }

    /// Short label for reports: `full_name`, then `name`, then `login`, then `id`.
    #[must_use]
    pub fn label(&self) -> String {
        ["full_name", "name", "login", "title", "url"]
            .iter()
            .find_map(|key| self.get_str(key))
            .map(str::to_string)
            .or_else(|| self.0.get("id").map(ToString::to_string))
            .unwrap_or_else(|| "<unnamed>".to_string())
    }

    /// Borrows the underlying object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts back into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ResultItem {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

pub(crate) const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
