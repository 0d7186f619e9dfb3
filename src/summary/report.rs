//! Build report (report.json)

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

use super::outcome::{UnitOutcome, UnitStatus};
use crate::config::ConfigSource;

/// Schema version for report.json
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for report.json
pub const REPORT_SCHEMA_ID: &str = "unitbuild/report@1";

/// Aggregate build status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Every unit completed
    Success,
    /// At least one unit failed
    Failed,
    /// Nothing failed, but some units never ran
    Cancelled,
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ExitCode {
    /// All units completed
    Success = 0,
    /// One or more units failed
    UnitsFailed = 1,
    /// The configuration could not be loaded
    Config = 2,
    /// Interrupted before all units ran
    Cancelled = 130,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// Report of one `build_all` run
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub schema_version: u32,

    pub schema_id: String,

    /// Unique id for this build invocation
    pub build_id: String,

    pub created_at: DateTime<Utc>,

    pub status: BuildStatus,

    pub exit_code: i32,

    /// Configuration layers that produced the units
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_sources: Vec<ConfigSource>,

    /// One entry per unit, in configuration order
    pub units: Vec<UnitOutcome>,

    pub units_completed: usize,

    pub units_failed: usize,

    pub units_skipped: usize,

    /// Wall-clock duration of the whole build in milliseconds
    pub duration_ms: u64,

    pub human_summary: String,
}

impl BuildReport {
    /// Aggregate unit outcomes into a report
    pub fn from_outcomes(units: Vec<UnitOutcome>, duration_ms: u64) -> Self {
        let count = |status| units.iter().filter(|u| u.status == status).count();
        let units_completed = count(UnitStatus::Completed);
        let units_failed = count(UnitStatus::Failed);
        let units_skipped = count(UnitStatus::Skipped);

        let (status, exit_code) = if units_failed > 0 {
            (BuildStatus::Failed, ExitCode::UnitsFailed)
        } else if units_skipped > 0 {
            (BuildStatus::Cancelled, ExitCode::Cancelled)
        } else {
            (BuildStatus::Success, ExitCode::Success)
        };

        let human_summary =
            Self::generate_human_summary(status, units.len(), units_completed, units_failed, units_skipped);

        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            build_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            status,
            exit_code: exit_code.as_i32(),
            config_sources: Vec::new(),
            units,
            units_completed,
            units_failed,
            units_skipped,
            duration_ms,
            human_summary,
        }
    }

    /// Attach configuration provenance
    pub fn with_config_sources(mut self, sources: Vec<ConfigSource>) -> Self {
        self.config_sources = sources;
        self
    }

    fn generate_human_summary(
        status: BuildStatus,
        unit_count: usize,
        completed: usize,
        failed: usize,
        skipped: usize,
    ) -> String {
        match status {
            BuildStatus::Success if unit_count == 0 => "No units to build".to_string(),
            BuildStatus::Success => format!("Build succeeded: {}/{} units completed", completed, unit_count),
            BuildStatus::Failed => format!(
                "Build failed: {} completed, {} failed, {} skipped",
                completed, failed, skipped
            ),
            BuildStatus::Cancelled => format!("Build cancelled: {} unit(s) skipped", skipped),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }

    /// Names of units that failed, in configuration order
    pub fn failed_units(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| u.status == UnitStatus::Failed)
            .map(|u| u.name.as_str())
            .collect()
    }

    pub fn unit(&self, name: &str) -> Option<&UnitOutcome> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Multi-line listing of every unit and its outcome
    pub fn to_human(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            match unit.status {
                UnitStatus::Completed => {
                    out.push_str(&format!("  ok      {} ({} sources)\n", unit.name, unit.source_count));
                }
                UnitStatus::Failed => {
                    let kind = unit.failure_kind.map(|k| k.description()).unwrap_or("Failed");
                    out.push_str(&format!("  FAILED  {}: {}\n", unit.name, kind));
                    if let Some(reason) = &unit.reason {
                        for line in reason.lines() {
                            out.push_str(&format!("          {}\n", line));
                        }
                    }
                }
                UnitStatus::Skipped => {
                    out.push_str(&format!("  skipped {}\n", unit.name));
                }
            }
        }
        out.push_str(&self.human_summary);
        if !self.is_success() && self.units_failed > 0 {
            out.push_str(&format!("\nFailed units: {}", self.failed_units().join(", ")));
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}
