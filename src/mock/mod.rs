//! Mock invoker
//!
//! An in-process `Invoker` for tests: it records every command it is asked
//! to run, never touches the filesystem, and fails on demand through a
//! `FailureInjector`.

mod failure;

use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use crate::invoke::{CompileRequest, Invoker, LinkRequest, ToolCommand, ToolError};

pub use failure::{FailureConfig, FailureInjector, Stage};

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub unit: String,
    pub stage: Stage,
    pub command: ToolCommand,
}

/// Recording invoker with failure injection
#[derive(Debug, Default)]
pub struct MockInvoker {
    injector: Mutex<FailureInjector>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a unit stage fail
    pub fn fail(&self, unit: impl Into<String>, stage: Stage, config: FailureConfig) {
        if let Ok(mut injector) = self.injector.lock() {
            injector.inject(unit, stage, config);
        }
    }

    /// All calls so far, in invocation order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls made for one unit
    pub fn calls_for(&self, unit: &str) -> Vec<MockCall> {
        self.calls().into_iter().filter(|c| c.unit == unit).collect()
    }

    fn invoke(
        &self,
        unit: &str,
        stage: Stage,
        source_name: Option<&str>,
        command: ToolCommand,
    ) -> Result<(), ToolError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                unit: unit.to_string(),
                stage,
                command: command.clone(),
            });
        }

        let failure = self
            .injector
            .lock()
            .ok()
            .and_then(|mut injector| injector.check(unit, stage, source_name).cloned());

        match failure {
            Some(config) => {
                if let Some(delay) = config.delay {
                    thread::sleep(delay);
                }
                Err(ToolError::Failed {
                    command,
                    status: config.status,
                    stderr: config.stderr,
                })
            }
            None => Ok(()),
        }
    }
}

impl Invoker for MockInvoker {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
        let mut objects = Vec::with_capacity(request.sources.len());
        for source in request.sources {
            let file_name = source.file_name().map(|n| n.to_string_lossy().into_owned());
            self.invoke(
                request.unit,
                Stage::Compile,
                file_name.as_deref(),
                request.command_for(source),
            )?;
            objects.push(request.object_for(source));
        }
        Ok(objects)
    }

    fn link(&self, request: &LinkRequest<'_>) -> Result<PathBuf, ToolError> {
        self.invoke(request.unit, Stage::Link, None, request.command())?;
        Ok(request.output.to_path_buf())
    }
}
