//! Unit registry
//!
//! Loads a build file, resolves one `Unit` per top-level key in file order,
//! and drives `build_all`. A failing unit never stops the others unless
//! fail-fast is requested; the aggregate result is a `BuildReport`.

mod build;
mod inherit;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::config::{self, BuiltinDefaults, ConfigError, ConfigNode, ConfigSource};
use crate::invoke::Invoker;
use crate::signal::CancelToken;
use crate::sources::FsGlob;
use crate::summary::{BuildReport, UnitOutcome};
use crate::unit::{Unit, UnitError};

pub use build::{unit_dir, BuildError};

use inherit::Inheritance;

/// Registry construction errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("duplicate unit name `{0}`")]
    DuplicateUnitName(String),

    #[error("unit `{unit}` extends unknown unit `{base}`")]
    UnknownBase { unit: String, base: String },

    #[error("inheritance cycle: {}", .chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    #[error("unit `{unit}`: `extends` must be a unit name or a list of unit names")]
    InvalidExtends { unit: String },

    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// Layers applied around every unit's own table
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Lowest layer
    pub defaults: BuiltinDefaults,
    /// Highest layer (`--set key=value`)
    pub overrides: ConfigNode,
}

/// Options for one `build_all` run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Units built concurrently; 1 is sequential, 0 picks the CPU count
    pub jobs: usize,
    /// Stop starting new units after the first failure
    pub fail_fast: bool,
    /// Shared with the interrupt handler
    pub cancel: CancelToken,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            fail_fast: false,
            cancel: CancelToken::new(),
        }
    }
}

/// All units of one build file
#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    units: Vec<Unit>,
    index: BTreeMap<String, usize>,
    config_sources: Vec<ConfigSource>,
}

impl Registry {
    /// Load a build file with no overrides
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        Self::load_with(path, &LoadOptions::default())
    }

    /// Load a build file. Sources resolve relative to its directory.
    pub fn load_with(path: &Path, options: &LoadOptions) -> Result<Self, RegistryError> {
        let loaded = config::load(path)?;

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut registry = Self::from_entries(root, loaded.entries, options)?;
        registry.config_sources.insert(1, loaded.source);
        Ok(registry)
    }

    /// Build a registry from already parsed entries, in order
    pub fn from_entries(
        root: impl Into<PathBuf>,
        entries: Vec<(String, ConfigNode)>,
        options: &LoadOptions,
    ) -> Result<Self, RegistryError> {
        let mut index = BTreeMap::new();
        for (position, (name, _)) in entries.iter().enumerate() {
            if index.insert(name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateUnitName(name.clone()));
            }
        }

        let inheritance = Inheritance::new(&entries);
        let bases = entries
            .iter()
            .map(|(name, _)| inheritance.bases_of(name))
            .collect::<Result<Vec<_>, _>>()?;

        let units = entries
            .into_iter()
            .zip(bases)
            .map(|((name, own), bases)| Unit::resolve(name, own, bases, &options.defaults, &options.overrides))
            .collect::<Result<Vec<_>, _>>()?;

        let mut config_sources = vec![ConfigSource::builtin()];
        if !options.overrides.is_empty() {
            config_sources.push(ConfigSource::cli());
        }

        let root = root.into();
        info!(root = %root.display(), units = units.len(), "registry loaded");

        Ok(Self {
            root,
            units,
            index,
            config_sources,
        })
    }

    /// Units in file order
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.index.get(name).map(|&i| &self.units[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(Unit::name).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Directory sources and outputs resolve against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem expander rooted at the build file's directory
    pub fn glob(&self) -> FsGlob {
        FsGlob::new(&self.root)
    }

    /// Configuration layers, lowest precedence first
    pub fn config_sources(&self) -> &[ConfigSource] {
        &self.config_sources
    }

    /// Build every unit.
    ///
    /// Each unit is attempted independently. Units that complete are
    /// marked completed; failures are collected into the report, in file
    /// order, and never propagate as an error.
    pub fn build_all(&mut self, invoker: &dyn Invoker, options: &BuildOptions) -> BuildReport {
        let start = Instant::now();
        let glob = self.glob();
        let root = self.root.as_path();
        let token = &options.cancel;

        let run = |unit: &Unit| -> UnitOutcome {
            if token.is_cancelled() {
                debug!(unit = unit.name(), "skipped");
                return UnitOutcome::skipped(unit.name());
            }
            let outcome = build::run_unit(unit, root, &glob, invoker);
            if options.fail_fast && !outcome.is_completed() && token.cancel() {
                info!(unit = unit.name(), "fail-fast: not starting remaining units");
            }
            outcome
        };

        let outcomes: Vec<UnitOutcome> = if options.jobs == 1 || self.units.len() <= 1 {
            self.units.iter().map(&run).collect()
        } else {
            match ThreadPoolBuilder::new().num_threads(options.jobs).build() {
                Ok(pool) => pool.install(|| self.units.par_iter().map(&run).collect()),
                Err(e) => {
                    warn!(error = %e, "cannot start worker pool, building sequentially");
                    self.units.iter().map(&run).collect()
                }
            }
        };

        for (unit, outcome) in self.units.iter_mut().zip(&outcomes) {
            if outcome.is_completed() {
                unit.mark_completed();
            }
        }

        let report = BuildReport::from_outcomes(outcomes, start.elapsed().as_millis() as u64)
            .with_config_sources(self.config_sources.clone());
        info!(status = ?report.status, build_id = %report.build_id, "{}", report.human_summary);
        report
    }
}
