//! Failure Injection for the mock invoker
//!
//! Failures are keyed by unit name and build stage.

use std::collections::HashMap;
use std::time::Duration;

/// Build stage a failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Compile,
    Link,
}

/// Failure configuration for one unit stage
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Exit status to report (None = killed by signal)
    pub status: Option<i32>,
    /// Captured stderr to report
    pub stderr: String,
    /// Fail only when compiling a source whose file name matches
    pub source_name: Option<String>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that exits with `status`
    pub fn exit(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stderr: stderr.into(),
            source_name: None,
            delay: None,
            fail_count: None,
        }
    }

    /// Create a config that simulates a tool killed by a signal
    pub fn killed() -> Self {
        Self {
            status: None,
            stderr: String::new(),
            source_name: None,
            delay: None,
            fail_count: None,
        }
    }

    /// Restrict the failure to one source file name
    pub fn for_source(mut self, file_name: impl Into<String>) -> Self {
        self.source_name = Some(file_name.into());
        self
    }

    /// Add a delay before responding
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock invoker
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-(unit, stage) failure configs
    configs: HashMap<(String, Stage), FailureConfig>,
    /// Call counts per (unit, stage) for fail_count tracking
    call_counts: HashMap<(String, Stage), u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for a unit stage
    pub fn inject(&mut self, unit: impl Into<String>, stage: Stage, config: FailureConfig) {
        let key = (unit.into(), stage);
        self.call_counts.insert(key.clone(), 0);
        self.configs.insert(key, config);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Check whether a unit stage should fail.
    ///
    /// `source_name` is the file name being compiled, if any; configs
    /// restricted to another source do not fire.
    pub fn check(&mut self, unit: &str, stage: Stage, source_name: Option<&str>) -> Option<&FailureConfig> {
        let key = (unit.to_string(), stage);
        let config = self.configs.get(&key)?;

        if let Some(wanted) = &config.source_name {
            if source_name != Some(wanted.as_str()) {
                return None;
            }
        }

        let count = self.call_counts.entry(key).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config)
    }
}
