//! Command-line overrides (`--set key.path=value`)
//!
//! Each assignment becomes a path of nested tables ending in the value.
//! The value is read as JSON when it parses (`["-O3"]`, `true`, `4`),
//! otherwise as a plain string.

use super::node::{ConfigNode, InvalidValue, Value};
use super::merge::{merge, MergePolicy};

/// Override parsing errors
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("override `{0}` must have the form key.path=value")]
    MissingEquals(String),

    #[error("override `{0}` has an empty key segment")]
    EmptyKey(String),

    #[error("override `{assignment}`: {source}")]
    InvalidValue {
        assignment: String,
        #[source]
        source: InvalidValue,
    },
}

/// Parse one `key.path=value` assignment into a node
pub fn parse_assignment(assignment: &str) -> Result<ConfigNode, OverrideError> {
    let (path, raw) = assignment
        .split_once('=')
        .ok_or_else(|| OverrideError::MissingEquals(assignment.to_string()))?;

    let keys: Vec<&str> = path.trim().split('.').collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(OverrideError::EmptyKey(assignment.to_string()));
    }

    let mut value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(json, path).map_err(|source| OverrideError::InvalidValue {
            assignment: assignment.to_string(),
            source,
        })?,
        Err(_) => Value::from(raw),
    };

    for key in keys.iter().skip(1).rev() {
        value = Value::Node(ConfigNode::new().with(*key, value));
    }

    Ok(ConfigNode::new().with(keys[0], value))
}

/// Parse every assignment and combine them, later assignments winning
pub fn parse_overrides<S: AsRef<str>>(assignments: &[S]) -> Result<ConfigNode, OverrideError> {
    assignments.iter().try_fold(ConfigNode::new(), |acc, a| {
        Ok(merge(acc, parse_assignment(a.as_ref())?, MergePolicy::OVERLAY))
    })
}
