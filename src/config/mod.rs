//! Configuration model, merge and loading
//!
//! Every unit's context is composed from up to four layers, lowest first:
//! 1. Built-in defaults
//! 2. Bases named in `extends` (earlier bases win over later ones)
//! 3. The unit's own table in the build file
//! 4. CLI overrides (`--set`)
//!
//! Each layer is merged over the previous one with overwrite and mix on,
//! so tables such as `flags` compose key by key while lists and scalars
//! from the higher layer win.

mod defaults;
mod loader;
mod merge;
mod node;
mod overrides;

pub use defaults::BuiltinDefaults;
pub use loader::{
    load, parse_str, ConfigError, ConfigFormat, ConfigOrigin, ConfigSource, LoadedConfig,
    ParseError, DEFAULT_CONFIG_FILE,
};
pub use merge::{merge, merge_layers, MergePolicy};
pub use node::{ConfigNode, InvalidValue, Scalar, Value};
pub use overrides::{parse_assignment, parse_overrides, OverrideError};
