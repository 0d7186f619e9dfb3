//! Build outcomes and the aggregate report

mod outcome;
mod report;

pub use outcome::{FailureKind, UnitOutcome, UnitStatus};
pub use report::{BuildReport, BuildStatus, ExitCode, REPORT_SCHEMA_ID, REPORT_SCHEMA_VERSION};
