//! Node model: the tagged payload stored behind every handle, plus an owned
//! `Value` tree used for import/export and structural comparison.
//!
//! Numbers keep their integer/floating distinction (`Int` vs `Float`) from the
//! moment they are parsed or built, and that tag never changes. Objects are
//! `Vec<(String, _)>` so insertion order is preserved without pulling in an
//! ordered-map dependency; lookups are linear, which is fine for the object
//! sizes scripting hosts produce.

use crate::store::Handle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a node. Fixed at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }

    /// Int and Float are both JSON numbers.
    pub fn is_number(self) -> bool {
        matches!(self, Kind::Int | Kind::Float)
    }

    /// Object and Array hold child handles.
    pub fn is_container(self) -> bool {
        matches!(self, Kind::Array | Kind::Object)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a node owned by the store. Container variants refer to their
/// children by handle; each listed child holds one attachment reference.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Handle>),
    /// Key-value pairs in insertion order. Keys are unique.
    Object(Vec<(String, Handle)>),
}

impl NodeData {
    pub fn kind(&self) -> Kind {
        match self {
            NodeData::Null => Kind::Null,
            NodeData::Bool(_) => Kind::Bool,
            NodeData::Int(_) => Kind::Int,
            NodeData::Float(_) => Kind::Float,
            NodeData::String(_) => Kind::String,
            NodeData::Array(_) => Kind::Array,
            NodeData::Object(_) => Kind::Object,
        }
    }

    /// Child handles in stored order (empty for scalars).
    pub fn children(&self) -> Vec<Handle> {
        match self {
            NodeData::Array(items) => items.clone(),
            NodeData::Object(pairs) => pairs.iter().map(|(_, h)| *h).collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn into_children(self) -> Vec<Handle> {
        match self {
            NodeData::Array(items) => items,
            NodeData::Object(pairs) => pairs.into_iter().map(|(_, h)| h).collect(),
            _ => Vec::new(),
        }
    }
}

/// An owned JSON tree, detached from any store.
///
/// Produced by `Document::export` and consumed by `Document::import`. Two
/// values compare equal when they have the same kinds, the same scalars, and
/// the same object pairs in the same order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    /// Look up a key in an object value. Returns `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 above i64::MAX and true floats both land here
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(mut value: Value) -> Self {
        match &mut value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(std::mem::take(s)),
            Value::Array(items) => serde_json::Value::Array(
                std::mem::take(items).into_iter().map(Into::into).collect(),
            ),
            Value::Object(pairs) => {
                let mut map = serde_json::Map::new();
                for (k, v) in std::mem::take(pairs) {
                    map.insert(k, v.into());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

/// Dropping a deep tree must not recurse once per level, so children are
/// moved onto a heap stack and dropped one at a time.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = match self {
            Value::Array(items) if !items.is_empty() => std::mem::take(items),
            Value::Object(pairs) if !pairs.is_empty() => {
                std::mem::take(pairs).into_iter().map(|(_, v)| v).collect()
            }
            _ => return,
        };
        while let Some(mut value) = pending.pop() {
            match &mut value {
                Value::Array(items) => pending.append(items),
                Value::Object(pairs) => {
                    pending.extend(std::mem::take(pairs).into_iter().map(|(_, v)| v))
                }
                _ => {}
            }
        }
    }
}
