//! The response envelope and the result objects handed back to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level wrapper of every API response.
///
/// Only `data` matters for success. The side fields are kept as raw JSON and
/// read through lenient views, so an oddly shaped warning or cursor never
/// fails an otherwise valid response.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub warnings: Option<Value>,
    #[serde(default)]
    pub pagination: Option<Value>,
    #[serde(default)]
    pub errors: Option<Value>,
}

impl Envelope {
    /// Every warning entry, whatever its shape.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        match self.warnings.take() {
            Some(Value::Array(items)) => items.into_iter().map(Warning::from_value).collect(),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => vec![Warning::from_value(other)],
        }
    }

    pub fn take_pagination(&mut self) -> Option<Pagination> {
        self.pagination.take().and_then(Pagination::from_value)
    }

    /// The first readable entry of `errors`.
    pub fn first_error(&self) -> Option<ErrorEntry> {
        match self.errors.as_ref()? {
            Value::Array(items) => items.first().and_then(ErrorEntry::from_value),
            other => ErrorEntry::from_value(other),
        }
    }
}

/// Text of a scalar; `None` for null and containers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

/// A non-fatal notice attached to a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Warning {
    /// Read one `warnings` entry. Entries that are not objects become the
    /// message text.
    pub(crate) fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                id: map.get("id").and_then(scalar_text),
                message: map.get("message").and_then(scalar_text).unwrap_or_default(),
                url: map.get("url").and_then(scalar_text),
            },
            Value::String(message) => Self {
                id: None,
                message,
                url: None,
            },
            other => Self {
                id: None,
                message: other.to_string(),
                url: None,
            },
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.url.as_deref().unwrap_or(""))
    }
}

/// Cursor metadata for list endpoints.
///
/// The typed fields are a best-effort reading; `raw` is the object exactly
/// as received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    pub ending_before: Option<String>,
    pub starting_after: Option<String>,
    pub limit: Option<u64>,
    pub order: Option<String>,
    pub previous_uri: Option<String>,
    pub next_uri: Option<String>,
    pub raw: Map<String, Value>,
}

impl Pagination {
    /// `None` unless `value` is an object.
    pub(crate) fn from_value(value: Value) -> Option<Self> {
        let Value::Object(raw) = value else {
            return None;
        };
        let text = |key: &str| raw.get(key).and_then(scalar_text);
        let limit = raw.get("limit").and_then(|v| match v {
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_u64(),
        });
        Some(Self {
            ending_before: text("ending_before"),
            starting_after: text("starting_after"),
            limit,
            order: text("order"),
            previous_uri: text("previous_uri"),
            next_uri: text("next_uri"),
            raw,
        })
    }
}

/// One entry of an `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ErrorEntry {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                id: map.get("id").and_then(scalar_text),
                message: map.get("message").and_then(scalar_text),
                url: map.get("url").and_then(scalar_text),
            }),
            Value::String(message) => Some(Self {
                message: Some(message.clone()),
                ..Self::default()
            }),
            _ => None,
        }
    }
}

/// `data` as a single record or an ordered sequence of records.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiData<T> {
    One(T),
    Many(Vec<T>),
}

/// A decoded response: the records plus the envelope metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiObject<T> {
    pub data: ApiData<T>,
    pub warnings: Vec<Warning>,
    pub pagination: Option<Pagination>,
}

impl<T> ApiObject<T> {
    /// The single record, if `data` was an object.
    pub fn one(&self) -> Option<&T> {
        match &self.data {
            ApiData::One(item) => Some(item),
            ApiData::Many(_) => None,
        }
    }

    /// The records, if `data` was an array.
    pub fn many(&self) -> Option<&[T]> {
        match &self.data {
            ApiData::One(_) => None,
            ApiData::Many(items) => Some(items),
        }
    }

    pub fn into_one(self) -> Option<T> {
        match self.data {
            ApiData::One(item) => Some(item),
            ApiData::Many(_) => None,
        }
    }

    /// All records in order; a single record becomes a one-element vector.
    pub fn into_vec(self) -> Vec<T> {
        match self.data {
            ApiData::One(item) => vec![item],
            ApiData::Many(items) => items,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
