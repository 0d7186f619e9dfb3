//! Per-unit build outcomes and failure taxonomy

use std::path::PathBuf;

use serde::Serialize;

/// Final state of one unit in a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// Compiled and linked
    Completed,
    /// A build step failed
    Failed,
    /// Never started (fail-fast or interrupt)
    Skipped,
}

/// Failure kind - categorizes why a unit did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// A source pattern was invalid
    SourcePattern,
    /// A directory under a source pattern could not be read
    SourceWalk,
    /// A matched source has no compiler toolchain
    UnsupportedSource,
    /// Patterns matched no files at all
    NoSources,
    /// The compiler failed
    Compile,
    /// The linker failed
    Link,
    /// The build was cancelled before the unit started
    Cancelled,
}

impl FailureKind {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::SourcePattern => "Source pattern error",
            FailureKind::SourceWalk => "Source directory unreadable",
            FailureKind::UnsupportedSource => "Unsupported source file",
            FailureKind::NoSources => "No source files matched",
            FailureKind::Compile => "Compilation failed",
            FailureKind::Link => "Linking failed",
            FailureKind::Cancelled => "Cancelled",
        }
    }
}

/// Outcome of one unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub name: String,

    pub status: UnitStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Failure detail, including tool stderr when there is any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Number of source files the unit resolved to
    pub source_count: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    pub duration_ms: u64,
}

impl UnitOutcome {
    pub fn completed(
        name: impl Into<String>,
        source_count: usize,
        objects: Vec<PathBuf>,
        artifact: PathBuf,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            status: UnitStatus::Completed,
            failure_kind: None,
            reason: None,
            source_count,
            objects,
            artifact: Some(artifact),
            duration_ms,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
        source_count: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            status: UnitStatus::Failed,
            failure_kind: Some(kind),
            reason: Some(reason.into()),
            source_count,
            objects: Vec::new(),
            artifact: None,
            duration_ms,
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: UnitStatus::Skipped,
            failure_kind: Some(FailureKind::Cancelled),
            reason: None,
            source_count: 0,
            objects: Vec::new(),
            artifact: None,
            duration_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == UnitStatus::Completed
    }
}
