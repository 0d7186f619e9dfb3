//! unitbuild - build configuration driver
//!
//! Reads a build file of named units, layers each unit's settings over
//! built-in defaults, inherited base units and command-line overrides, and
//! compiles and links every unit. One failing unit does not stop the rest;
//! the result is a per-unit `BuildReport`.

pub mod config;
pub mod invoke;
pub mod mock;
pub mod registry;
pub mod signal;
pub mod sources;
pub mod summary;
pub mod toolchain;
pub mod unit;

pub use config::{merge, ConfigNode, MergePolicy, Scalar, Value};
pub use invoke::{DryRunInvoker, Invoker, ProcessInvoker, ToolError};
pub use registry::{BuildError, BuildOptions, LoadOptions, Registry, RegistryError};
pub use signal::{CancelToken, SignalHandler};
pub use sources::{Expand, FsGlob};
pub use summary::{BuildReport, UnitOutcome, UnitStatus};
pub use toolchain::{InvalidToolchain, Toolchain};
pub use unit::{Unit, UnitError};
