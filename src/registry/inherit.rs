//! `extends` resolution
//!
//! A unit may name base units in `extends`. A base is itself resolved
//! against its own bases before it is layered under the unit. Cycles and
//! names that are not units in the same file are errors.

use std::collections::HashMap;

use crate::config::{merge_layers, ConfigNode, Value};
use crate::unit::EXTENDS_KEY;

use super::RegistryError;

pub(super) struct Inheritance<'a> {
    table: HashMap<&'a str, &'a ConfigNode>,
}

impl<'a> Inheritance<'a> {
    pub(super) fn new(entries: &'a [(String, ConfigNode)]) -> Self {
        Self {
            table: entries.iter().map(|(name, node)| (name.as_str(), node)).collect(),
        }
    }

    /// Resolved base contexts of `unit`, highest precedence first
    pub(super) fn bases_of(&self, unit: &str) -> Result<Vec<ConfigNode>, RegistryError> {
        let Some(own) = self.table.get(unit) else {
            return Ok(Vec::new());
        };

        let mut chain = vec![unit.to_string()];
        extends_of(unit, own)?
            .into_iter()
            .map(|base| self.resolve(unit, &base, &mut chain))
            .collect()
    }

    fn resolve(&self, child: &str, name: &str, chain: &mut Vec<String>) -> Result<ConfigNode, RegistryError> {
        let own = self.table.get(name).ok_or_else(|| RegistryError::UnknownBase {
            unit: child.to_string(),
            base: name.to_string(),
        })?;

        if chain.iter().any(|n| n == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(RegistryError::InheritanceCycle { chain: cycle });
        }

        chain.push(name.to_string());
        let bases = extends_of(name, own)?
            .into_iter()
            .map(|base| self.resolve(name, &base, chain))
            .collect::<Result<Vec<_>, _>>()?;
        chain.pop();

        let mut resolved = merge_layers(bases.into_iter().rev().chain([(*own).clone()]));
        resolved.remove(EXTENDS_KEY);
        Ok(resolved)
    }
}

/// Base names listed by a unit, in declaration order
fn extends_of(unit: &str, own: &ConfigNode) -> Result<Vec<String>, RegistryError> {
    let invalid = || RegistryError::InvalidExtends {
        unit: unit.to_string(),
    };

    match own.get(EXTENDS_KEY) {
        None => Ok(Vec::new()),
        Some(Value::List(items)) => items
            .iter()
            .map(|s| s.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(value) => value
            .as_str()
            .map(|s| vec![s.to_string()])
            .ok_or_else(invalid),
    }
}
