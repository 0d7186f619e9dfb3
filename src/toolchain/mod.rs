//! Toolchain identifiers
//!
//! A toolchain names one stage of a unit build: compiling C sources,
//! compiling C++ sources, or linking. Only these three are recognized;
//! anything else is a programming or configuration error reported
//! eagerly as `InvalidToolchain`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A recognized build stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toolchain {
    /// C compiler
    C,
    /// C++ compiler
    Cpp,
    /// Linker
    Ld,
}

impl Toolchain {
    /// All recognized toolchains, in build order
    pub const ALL: [Toolchain; 3] = [Toolchain::C, Toolchain::Cpp, Toolchain::Ld];

    /// Config key for this toolchain
    pub fn as_str(&self) -> &'static str {
        match self {
            Toolchain::C => "c",
            Toolchain::Cpp => "cpp",
            Toolchain::Ld => "ld",
        }
    }

    /// Compiler toolchain for a source file, by extension
    ///
    /// `.c` is C; `.cc`, `.cpp`, `.cxx`, `.c++` and uppercase `.C` are C++.
    pub fn for_source(path: &Path) -> Option<Toolchain> {
        match path.extension()?.to_str()? {
            "c" => Some(Toolchain::C),
            "C" | "cc" | "cpp" | "cxx" | "c++" | "CC" | "CPP" | "CXX" => Some(Toolchain::Cpp),
            _ => None,
        }
    }

    /// Whether this toolchain compiles sources (as opposed to linking)
    pub fn is_compiler(&self) -> bool {
        !matches!(self, Toolchain::Ld)
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Toolchain {
    type Err = InvalidToolchain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Toolchain::C),
            "cpp" => Ok(Toolchain::Cpp),
            "ld" => Ok(Toolchain::Ld),
            other => Err(InvalidToolchain(other.to_string())),
        }
    }
}

/// A toolchain name outside `{c, cpp, ld}`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid toolchain `{0}` (expected one of: c, cpp, ld)")]
pub struct InvalidToolchain(pub String);
