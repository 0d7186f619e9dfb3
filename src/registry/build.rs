//! Per-unit build step
//!
//! Resolve sources, compile them grouped by toolchain, then link every
//! object into the unit's artifact. Any error stops the unit; other units
//! are unaffected.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::invoke::{object_path, CompileRequest, Invoker, LinkRequest, ToolError};
use crate::sources::Expand;
use crate::summary::{FailureKind, UnitOutcome};
use crate::toolchain::Toolchain;
use crate::unit::{Unit, UnitError};

/// Why a single unit did not build
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Sources(#[from] UnitError),

    #[error("no compiler for source {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("patterns {0:?} matched no files")]
    NoSources(Vec<String>),

    #[error("compile failed: {0}")]
    Compile(#[source] ToolError),

    #[error("link failed: {0}")]
    Link(#[source] ToolError),
}

impl BuildError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BuildError::Sources(UnitError::SourceWalk { .. }) => FailureKind::SourceWalk,
            BuildError::Sources(_) => FailureKind::SourcePattern,
            BuildError::UnsupportedSource(_) => FailureKind::UnsupportedSource,
            BuildError::NoSources(_) => FailureKind::NoSources,
            BuildError::Compile(_) => FailureKind::Compile,
            BuildError::Link(_) => FailureKind::Link,
        }
    }

    /// Message plus captured tool stderr, if any
    pub fn detail(&self) -> String {
        match self {
            BuildError::Compile(ToolError::Failed { stderr, .. })
            | BuildError::Link(ToolError::Failed { stderr, .. })
                if !stderr.is_empty() =>
            {
                format!("{}\n{}", self, stderr)
            }
            _ => self.to_string(),
        }
    }
}

/// Directory holding a unit's objects and artifact
pub fn unit_dir(root: &Path, unit: &Unit) -> PathBuf {
    root.join(unit.build_dir()).join(unit.name())
}

/// Build one unit and describe the result
pub(super) fn run_unit(unit: &Unit, root: &Path, glob: &dyn Expand, invoker: &dyn Invoker) -> UnitOutcome {
    let start = Instant::now();
    info!(unit = unit.name(), "building");

    let sources = match unit.sources(glob) {
        Ok(sources) => distinct_sources(unit, root, sources),
        Err(e) => return failed(unit, BuildError::from(e), 0, start),
    };

    match compile_and_link(unit, root, &sources, invoker) {
        Ok((objects, artifact)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            info!(unit = unit.name(), artifact = %artifact.display(), duration_ms, "completed");
            UnitOutcome::completed(unit.name(), sources.len(), objects, artifact, duration_ms)
        }
        Err(e) => failed(unit, e, sources.len(), start),
    }
}

fn object_dir(root: &Path, unit: &Unit) -> PathBuf {
    unit_dir(root, unit).join("obj")
}

/// Keep the first source for each object; later repeats are not rebuilt
fn distinct_sources(unit: &Unit, root: &Path, sources: Vec<PathBuf>) -> Vec<PathBuf> {
    let object_dir = object_dir(root, unit);
    let mut seen = HashSet::new();

    sources
        .into_iter()
        .filter(|source| {
            let first = seen.insert(object_path(&object_dir, root, source));
            if !first {
                debug!(unit = unit.name(), source = %source.display(), "skipping repeated source");
            }
            first
        })
        .collect()
}

fn failed(unit: &Unit, err: BuildError, source_count: usize, start: Instant) -> UnitOutcome {
    warn!(unit = unit.name(), error = %err, "unit failed");
    UnitOutcome::failed(
        unit.name(),
        err.kind(),
        err.detail(),
        source_count,
        start.elapsed().as_millis() as u64,
    )
}

fn compile_and_link(
    unit: &Unit,
    root: &Path,
    sources: &[PathBuf],
    invoker: &dyn Invoker,
) -> Result<(Vec<PathBuf>, PathBuf), BuildError> {
    if sources.is_empty() {
        let patterns = unit.source_patterns().iter().map(|p| p.to_string()).collect();
        return Err(BuildError::NoSources(patterns));
    }

    let toolchains = sources
        .iter()
        .map(|source| Toolchain::for_source(source).ok_or_else(|| BuildError::UnsupportedSource(source.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let object_dir = object_dir(root, unit);

    // Objects keep the order of their sources regardless of toolchain
    let mut objects: Vec<Option<PathBuf>> = vec![None; sources.len()];

    for toolchain in Toolchain::ALL.into_iter().filter(Toolchain::is_compiler) {
        let indices: Vec<usize> = (0..sources.len()).filter(|&i| toolchains[i] == toolchain).collect();
        if indices.is_empty() {
            continue;
        }

        let group: Vec<PathBuf> = indices.iter().map(|&i| sources[i].clone()).collect();
        let tool = unit.tool(toolchain);
        let flags = unit.flags(toolchain);
        debug!(unit = unit.name(), %toolchain, %tool, sources = group.len(), "compiling");

        let compiled = invoker
            .compile(&CompileRequest {
                unit: unit.name(),
                toolchain,
                tool: &tool,
                sources: &group,
                flags: &flags,
                root,
                object_dir: &object_dir,
            })
            .map_err(BuildError::Compile)?;

        for (&i, object) in indices.iter().zip(compiled) {
            objects[i] = Some(object);
        }
    }

    let objects: Vec<PathBuf> = objects.into_iter().flatten().collect();
    let tool = unit.tool(Toolchain::Ld);
    let flags = unit.flags(Toolchain::Ld);
    let output = unit_dir(root, unit).join(unit.output());

    let artifact = invoker
        .link(&LinkRequest {
            unit: unit.name(),
            tool: &tool,
            objects: &objects,
            flags: &flags,
            output: &output,
        })
        .map_err(BuildError::Link)?;

    Ok((objects, artifact))
}
