//! Build units
//!
//! A unit is one named build target. It owns its resolved configuration
//! context and answers two kinds of query against it: compiler/linker flags
//! per toolchain, and the concrete source files its patterns select.
//!
//! Recognized keys in a unit context:
//! - `flags`: table of toolchain (`c`, `cpp`, `ld`) to list of flag strings
//! - `sources`: list of glob patterns
//! - `tools`: table of toolchain to program name
//! - `build_dir`, `output`: strings
//!
//! Other keys are kept in the context untouched.

use std::path::PathBuf;

use tracing::debug;

use crate::config::{merge_layers, BuiltinDefaults, ConfigNode, Scalar, Value};
use crate::sources::{Expand, ExpandError};
use crate::toolchain::{InvalidToolchain, Toolchain};

/// Key listing base units in a unit's own table
pub const EXTENDS_KEY: &str = "extends";

/// Unit construction and query errors
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("unit `{unit}`: {source}")]
    InvalidToolchain {
        unit: String,
        #[source]
        source: InvalidToolchain,
    },

    #[error("unit `{unit}`: `{key}` {reason}")]
    InvalidSection {
        unit: String,
        key: String,
        reason: String,
    },

    #[error("unit `{unit}`: bad source pattern `{pattern}`: {source}")]
    SourcePattern {
        unit: String,
        pattern: String,
        #[source]
        source: ExpandError,
    },

    #[error("unit `{unit}`: cannot read sources for `{pattern}`: {source}")]
    SourceWalk {
        unit: String,
        pattern: String,
        #[source]
        source: ExpandError,
    },
}

/// One named build target
#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    context: ConfigNode,
    completed: bool,
}

impl Unit {
    /// Create a unit from an already resolved context.
    ///
    /// The context is validated eagerly so that lookups later cannot hit
    /// an unknown toolchain or a malformed section.
    pub fn new(name: impl Into<String>, context: ConfigNode) -> Result<Self, UnitError> {
        let unit = Self {
            name: name.into(),
            context,
            completed: false,
        };
        unit.validate()?;
        debug!(unit = %unit.name, sources = unit.source_patterns().len(), "unit ready");
        Ok(unit)
    }

    /// Compose a unit's context from its layers and create it.
    ///
    /// `bases` are already resolved base contexts, highest precedence first.
    pub fn resolve(
        name: impl Into<String>,
        own: ConfigNode,
        bases: Vec<ConfigNode>,
        defaults: &BuiltinDefaults,
        overrides: &ConfigNode,
    ) -> Result<Self, UnitError> {
        let name = name.into();

        let layers = std::iter::once(defaults.to_node(&name))
            .chain(bases.into_iter().rev())
            .chain([own, overrides.clone()]);

        let mut context = merge_layers(layers);
        context.remove(EXTENDS_KEY);

        Self::new(name, context)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved context (read-only)
    pub fn context(&self) -> &ConfigNode {
        &self.context
    }

    /// Flags for a toolchain given by name.
    ///
    /// Unknown names fail with `InvalidToolchain`; a recognized toolchain the
    /// unit does not configure yields an empty list.
    pub fn flags_for(&self, toolchain: &str) -> Result<Vec<String>, InvalidToolchain> {
        let toolchain: Toolchain = toolchain.parse()?;
        Ok(self.flags(toolchain))
    }

    /// Flags for a toolchain, in declaration order
    pub fn flags(&self, toolchain: Toolchain) -> Vec<String> {
        self.context
            .get_node("flags")
            .and_then(|flags| flags.get(toolchain.as_str()))
            .and_then(Value::as_list)
            .map(|items| items.iter().map(Scalar::to_string).collect())
            .unwrap_or_default()
    }

    /// Source patterns as declared
    pub fn source_patterns(&self) -> Vec<&str> {
        self.context
            .get("sources")
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Scalar::as_str).collect())
            .unwrap_or_default()
    }

    /// Expand every source pattern and concatenate the results.
    ///
    /// Order follows pattern declaration order, then the expander's order
    /// within each pattern. A file matched by two patterns appears twice.
    pub fn sources(&self, glob: &dyn Expand) -> Result<Vec<PathBuf>, UnitError> {
        let mut files = Vec::new();
        for pattern in self.source_patterns() {
            let matched = glob.expand(pattern).map_err(|source| {
                let unit = self.name.clone();
                let pattern = pattern.to_string();
                match source {
                    ExpandError::InvalidPattern { .. } => UnitError::SourcePattern { unit, pattern, source },
                    ExpandError::Walk { .. } => UnitError::SourceWalk { unit, pattern, source },
                }
            })?;
            files.extend(matched);
        }
        Ok(files)
    }

    /// Program used for a toolchain
    pub fn tool(&self, toolchain: Toolchain) -> String {
        self.context
            .get_node("tools")
            .and_then(|tools| tools.get(toolchain.as_str()))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                let defaults = BuiltinDefaults::default();
                match toolchain {
                    Toolchain::C => defaults.c_compiler,
                    Toolchain::Cpp => defaults.cpp_compiler,
                    Toolchain::Ld => defaults.linker,
                }
            })
    }

    /// Output directory, relative to the build root
    pub fn build_dir(&self) -> String {
        self.context
            .get("build_dir")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| BuiltinDefaults::default().build_dir)
    }

    /// Artifact file name
    pub fn output(&self) -> &str {
        self.context
            .get("output")
            .and_then(Value::as_str)
            .unwrap_or(&self.name)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Mark the build finished. Returns false if it already was.
    pub fn mark_completed(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        true
    }

    fn validate(&self) -> Result<(), UnitError> {
        if let Some(flags) = self.context.get("flags") {
            let flags = flags.as_node().ok_or_else(|| self.invalid("flags", "must be a table"))?;
            for (key, value) in flags {
                self.check_toolchain(key)?;
                let items = value
                    .as_list()
                    .ok_or_else(|| self.invalid(&format!("flags.{}", key), "must be a list"))?;
                if items.iter().any(|s| s.as_str().is_none()) {
                    return Err(self.invalid(&format!("flags.{}", key), "must only hold strings"));
                }
            }
        }

        if let Some(sources) = self.context.get("sources") {
            let items = sources
                .as_list()
                .ok_or_else(|| self.invalid("sources", "must be a list of patterns"))?;
            if items.iter().any(|s| s.as_str().is_none()) {
                return Err(self.invalid("sources", "must only hold strings"));
            }
        }

        if let Some(tools) = self.context.get("tools") {
            let tools = tools.as_node().ok_or_else(|| self.invalid("tools", "must be a table"))?;
            for (key, value) in tools {
                self.check_toolchain(key)?;
                if value.as_str().map_or(true, str::is_empty) {
                    return Err(self.invalid(&format!("tools.{}", key), "must be a program name"));
                }
            }
        }

        for key in ["build_dir", "output"] {
            if let Some(value) = self.context.get(key) {
                if value.as_str().map_or(true, str::is_empty) {
                    return Err(self.invalid(key, "must be a non-empty string"));
                }
            }
        }

        Ok(())
    }

    fn check_toolchain(&self, key: &str) -> Result<Toolchain, UnitError> {
        key.parse().map_err(|source| UnitError::InvalidToolchain {
            unit: self.name.clone(),
            source,
        })
    }

    fn invalid(&self, key: &str, reason: &str) -> UnitError {
        UnitError::InvalidSection {
            unit: self.name.clone(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
