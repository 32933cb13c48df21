//! Request parameters and their flat query-string encoding.
//!
//! # Design
//! `Params` is a JSON object. Mutating requests send it verbatim as a JSON
//! body, which is lossless. GET requests flatten it into `key=value` pairs
//! using the bracket-suffix convention, so nested values survive a trip
//! through a query string:
//!
//! ```text
//! {"a": {"b": 1}, "c": ["x", "y"]}   ->   a[b]=1&c[]=x&c[]=y
//! ```
//!
//! Key names are percent-encoded individually and the structural brackets
//! are left literal, so a `[` inside a key can never be mistaken for
//! structure. `decode_query` performs the server-side reconstruction; scalars
//! come back as strings, `null` as the empty string, and empty containers
//! are dropped. Two shapes have no unambiguous flat form and are not
//! reconstructed element-for-element:
//! - a sequence nested directly inside a sequence (`a[][]`);
//! - a sequence of objects whose keys never repeat, since a new element only
//!   starts when a key already seen comes again
//!   (`[{"a": 1}, {"b": 2}]` decodes as `[{"a": 1, "b": 2}]`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Everything except RFC 3986 unreserved characters.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Named request parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// JSON body encoding used for POST and PUT.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(&self.0).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Flatten `params` into a query string (no leading `?`).
pub fn encode_query(params: &Params) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params.iter() {
        flatten(encode_component(key), value, &mut pairs);
    }
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(format!("{prefix}[{}]", encode_component(key)), child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(format!("{prefix}[]"), item, out);
            }
        }
        Value::String(s) => out.push((prefix, encode_component(s))),
        Value::Null => out.push((prefix, String::new())),
        scalar => out.push((prefix, encode_component(&scalar.to_string()))),
    }
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Rebuild nested parameters from a bracket-convention query string.
pub fn decode_query(query: &str) -> Params {
    let mut root = Value::Object(Map::new());
    for pair in query.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let (head, parts) = parse_key(raw_key);
        if head.is_empty() {
            continue;
        }
        let mut path = Vec::with_capacity(parts.len() + 1);
        path.push(KeyPart::Name(head));
        path.extend(parts);
        assign(&mut root, &path, decode_component(raw_value));
    }
    match root {
        Value::Object(map) => Params(map),
        _ => Params::default(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum KeyPart {
    Name(String),
    Append,
}

fn parse_key(raw: &str) -> (String, Vec<KeyPart>) {
    let (head, mut rest) = match raw.find('[') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };
    let mut parts = Vec::new();
    while let Some(open) = rest.strip_prefix('[') {
        let Some(close) = open.find(']') else { break };
        let inner = &open[..close];
        parts.push(if inner.is_empty() {
            KeyPart::Append
        } else {
            KeyPart::Name(decode_component(inner))
        });
        rest = &open[close + 1..];
    }
    (decode_component(head), parts)
}

fn assign(slot: &mut Value, path: &[KeyPart], value: String) {
    let Some((first, rest)) = path.split_first() else {
        *slot = Value::String(value);
        return;
    };
    match first {
        KeyPart::Name(name) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let child = map.entry(name.clone()).or_insert(Value::Null);
                assign(child, rest, value);
            }
        }
        KeyPart::Append => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                // `a[][x]=..` continues the last element until `x` repeats.
                let reuse = matches!(rest.first(), Some(KeyPart::Name(_)))
                    && items
                        .last()
                        .is_some_and(|last| last.is_object() && !path_taken(last, rest));
                if !reuse {
                    items.push(Value::Null);
                }
                if let Some(last) = items.last_mut() {
                    assign(last, rest, value);
                }
            }
        }
    }
}

fn path_taken(value: &Value, path: &[KeyPart]) -> bool {
    match path.split_first() {
        None => true,
        Some((KeyPart::Name(name), rest)) => value
            .as_object()
            .and_then(|map| map.get(name))
            .is_some_and(|child| path_taken(child, rest)),
        Some((KeyPart::Append, _)) => false,
    }
}
