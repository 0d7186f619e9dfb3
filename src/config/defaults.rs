//! Built-in unit defaults (lowest layer)
//!
//! Hardcoded defaults merged under every unit's own settings.

use serde::{Deserialize, Serialize};

use super::node::ConfigNode;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// C compiler driver (default: "cc")
    pub c_compiler: String,

    /// C++ compiler driver (default: "c++")
    pub cpp_compiler: String,

    /// Linker driver (default: "c++", so mixed C/C++ units link)
    pub linker: String,

    /// Output directory relative to the config file (default: "build")
    pub build_dir: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            c_compiler: "cc".to_string(),
            cpp_compiler: "c++".to_string(),
            linker: "c++".to_string(),
            build_dir: "build".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to a config node for merging under `unit`
    pub fn to_node(&self, unit: &str) -> ConfigNode {
        ConfigNode::new()
            .with(
                "tools",
                ConfigNode::new()
                    .with("c", self.c_compiler.as_str())
                    .with("cpp", self.cpp_compiler.as_str())
                    .with("ld", self.linker.as_str()),
            )
            .with("build_dir", self.build_dir.as_str())
            .with("output", unit)
    }
}
