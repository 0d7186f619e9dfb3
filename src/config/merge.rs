//! Configuration merge logic
//!
//! Two independent switches govern a merge of `src` into `dist`:
//! - `overwrite`: a key already present in `dist` may be replaced
//! - `mix`: when both sides hold a table at the same key, merge the tables
//!   recursively instead of replacing one with the other
//!
//! Lists are never merged element-wise; they are replaced wholesale.

use super::node::{ConfigNode, Value};

/// Merge policy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergePolicy {
    pub overwrite: bool,
    pub mix: bool,
}

impl MergePolicy {
    /// Existing keys win, tables are replaced (the baseline)
    pub const KEEP: Self = Self::new(false, false);

    /// Incoming keys win, tables are replaced wholesale
    pub const REPLACE: Self = Self::new(true, false);

    /// Incoming keys win, tables present on both sides are composed
    pub const OVERLAY: Self = Self::new(true, true);

    pub const fn new(overwrite: bool, mix: bool) -> Self {
        Self { overwrite, mix }
    }
}

/// Merge `src` into `dist` and return the result.
///
/// For every key of `src`:
/// 1. present in `dist` without `overwrite`: `dist` keeps its value
/// 2. present in `dist`, `mix` set, and both values are tables: recurse
/// 3. otherwise the `src` value replaces whatever `dist` held
///
/// Kind mismatches (table vs scalar) fall through to case 3.
pub fn merge(mut dist: ConfigNode, src: ConfigNode, policy: MergePolicy) -> ConfigNode {
    for (key, src_value) in src {
        match dist.get_mut(&key) {
            Some(_) if !policy.overwrite => {}
            Some(Value::Node(dist_node)) if policy.mix && src_value.is_node() => {
                if let Value::Node(src_node) = src_value {
                    let current = std::mem::take(dist_node);
                    *dist_node = merge(current, src_node, policy);
                }
            }
            Some(slot) => *slot = src_value,
            None => {
                dist.insert(key, src_value);
            }
        }
    }
    dist
}

/// Merge multiple layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: impl IntoIterator<Item = ConfigNode>) -> ConfigNode {
    layers
        .into_iter()
        .fold(ConfigNode::new(), |acc, layer| merge(acc, layer, MergePolicy::OVERLAY))
}
