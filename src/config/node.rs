//! Typed configuration tree
//!
//! A `ConfigNode` maps keys to `Value`s, and a `Value` is exactly one of a
//! scalar, a list of scalars, or a nested node. Parsed JSON and TOML are
//! converted into this tree once, at load time; everything downstream
//! works on the tagged variant instead of inspecting raw documents.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A leaf value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// Borrow the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// A configuration value: scalar, ordered list of scalars, or nested node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Node(ConfigNode),
}

impl Value {
    pub fn as_node(&self) -> Option<&ConfigNode> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Node(_) => "table",
        }
    }

    /// Convert a JSON value, rejecting shapes the tree cannot hold.
    ///
    /// `path` is the dotted key path of `json`, used in the error.
    pub fn from_json(json: serde_json::Value, path: &str) -> Result<Self, InvalidValue> {
        match json {
            serde_json::Value::Object(map) => {
                let mut node = ConfigNode::new();
                for (key, value) in map {
                    let child_path = join_path(path, &key);
                    node.insert(key, Value::from_json(value, &child_path)?);
                }
                Ok(Value::Node(node))
            }
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    match Value::from_json(item, &item_path)? {
                        Value::Scalar(s) => list.push(s),
                        other => {
                            return Err(InvalidValue::new(
                                item_path,
                                format!("lists may only hold scalars, found a {}", other.kind()),
                            ))
                        }
                    }
                }
                Ok(Value::List(list))
            }
            serde_json::Value::String(s) => Ok(Value::Scalar(Scalar::String(s))),
            serde_json::Value::Bool(b) => Ok(Value::Scalar(Scalar::Bool(b))),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Scalar(Scalar::Integer(i)))
                } else if let Some(x) = n.as_f64() {
                    Ok(Value::Scalar(Scalar::Float(x)))
                } else {
                    Err(InvalidValue::new(path, format!("number {} is out of range", n)))
                }
            }
            serde_json::Value::Null => Err(InvalidValue::new(path, "null is not a valid value")),
        }
    }

    /// Convert a TOML value. Datetimes become strings.
    pub fn from_toml(toml: toml::Value, path: &str) -> Result<Self, InvalidValue> {
        match toml {
            toml::Value::String(s) => Ok(Value::Scalar(Scalar::String(s))),
            toml::Value::Integer(i) => Ok(Value::Scalar(Scalar::Integer(i))),
            toml::Value::Float(f) => Ok(Value::Scalar(Scalar::Float(f))),
            toml::Value::Boolean(b) => Ok(Value::Scalar(Scalar::Bool(b))),
            toml::Value::Datetime(dt) => Ok(Value::Scalar(Scalar::String(dt.to_string()))),
            toml::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    match Value::from_toml(item, &item_path)? {
                        Value::Scalar(s) => list.push(s),
                        other => {
                            return Err(InvalidValue::new(
                                item_path,
                                format!("lists may only hold scalars, found a {}", other.kind()),
                            ))
                        }
                    }
                }
                Ok(Value::List(list))
            }
            toml::Value::Table(table) => {
                let mut node = ConfigNode::new();
                for (key, value) in table {
                    let child_path = join_path(path, &key);
                    node.insert(key, Value::from_toml(value, &child_path)?);
                }
                Ok(Value::Node(node))
            }
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(i.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(b.into())
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(items: Vec<Scalar>) -> Self {
        Value::List(items)
    }
}

impl From<ConfigNode> for Value {
    fn from(node: ConfigNode) -> Self {
        Value::Node(node)
    }
}

/// A mapping from string keys to configuration values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigNode {
    entries: BTreeMap<String, Value>,
}

impl ConfigNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a node from a JSON object
    pub fn from_json(json: serde_json::Value) -> Result<Self, InvalidValue> {
        match Value::from_json(json, "")? {
            Value::Node(node) => Ok(node),
            other => Err(InvalidValue::new(
                "",
                format!("expected a table at the top level, found a {}", other.kind()),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Get a value by dot-separated path
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_node()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_node(&self, key: &str) -> Option<&ConfigNode> {
        self.get(key).and_then(Value::as_node)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Render as a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl IntoIterator for ConfigNode {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigNode {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ConfigNode {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut node = ConfigNode::new();
        for (k, v) in iter {
            node.insert(k, v);
        }
        node
    }
}

/// A document shape the configuration tree cannot represent
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid value at `{path}`: {reason}")]
pub struct InvalidValue {
    pub path: String,
    pub reason: String,
}

impl InvalidValue {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: if path.is_empty() { "<root>".to_string() } else { path },
            reason: reason.into(),
        }
    }
}

pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}
