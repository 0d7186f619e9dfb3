//! Compiler and linker invocation
//!
//! The registry hands each unit's resolved sources and flags to an
//! `Invoker`. `ProcessInvoker` runs real subprocesses, one compile per
//! source and one link per unit; `DryRunInvoker` only records and logs the
//! commands it would run.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info};

use crate::toolchain::Toolchain;

/// A fully formed tool command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Compile every source of one toolchain for a unit
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub unit: &'a str,
    pub toolchain: Toolchain,
    pub tool: &'a str,
    pub sources: &'a [PathBuf],
    pub flags: &'a [String],
    /// Directory sources are named relative to when deriving object names
    pub root: &'a Path,
    pub object_dir: &'a Path,
}

impl CompileRequest<'_> {
    /// Object file for one source
    pub fn object_for(&self, source: &Path) -> PathBuf {
        object_path(self.object_dir, self.root, source)
    }

    /// Command line compiling one source
    pub fn command_for(&self, source: &Path) -> ToolCommand {
        ToolCommand::new(self.tool)
            .args(self.flags.iter().cloned())
            .arg("-c")
            .arg(source.to_string_lossy())
            .arg("-o")
            .arg(self.object_for(source).to_string_lossy())
    }
}

/// Link a unit's objects into its artifact
#[derive(Debug, Clone)]
pub struct LinkRequest<'a> {
    pub unit: &'a str,
    pub tool: &'a str,
    pub objects: &'a [PathBuf],
    pub flags: &'a [String],
    pub output: &'a Path,
}

impl LinkRequest<'_> {
    pub fn command(&self) -> ToolCommand {
        ToolCommand::new(self.tool)
            .args(self.objects.iter().map(|o| o.to_string_lossy().into_owned()))
            .args(self.flags.iter().cloned())
            .arg("-o")
            .arg(self.output.to_string_lossy())
    }
}

/// Tool invocation errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("`{command}` failed ({})", exit_text(.status))]
    Failed {
        command: ToolCommand,
        status: Option<i32>,
        stderr: String,
    },

    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: ToolCommand,
        #[source]
        source: io::Error,
    },

    #[error("cannot create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn exit_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Compiler/linker collaborator
pub trait Invoker: Sync {
    /// Compile sources, returning one object path per source in order
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<PathBuf>, ToolError>;

    /// Link objects, returning the artifact path
    fn link(&self, request: &LinkRequest<'_>) -> Result<PathBuf, ToolError>;
}

/// Runs the compiler and linker as subprocesses
#[derive(Debug, Default, Clone)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, command: ToolCommand) -> Result<(), ToolError> {
        debug!(%command, "running");
        let output = Command::new(&command.program)
            .args(&command.args)
            .output();

        let output = match output {
            Ok(output) => output,
            Err(source) => return Err(ToolError::Spawn { command, source }),
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                command,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            })
        }
    }
}

impl Invoker for ProcessInvoker {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
        let mut objects = Vec::with_capacity(request.sources.len());
        for source in request.sources {
            let object = request.object_for(source);
            if let Some(parent) = object.parent() {
                create_dir(parent)?;
            }
            self.run(request.command_for(source))?;
            objects.push(object);
        }
        Ok(objects)
    }

    fn link(&self, request: &LinkRequest<'_>) -> Result<PathBuf, ToolError> {
        if let Some(parent) = request.output.parent() {
            create_dir(parent)?;
        }
        self.run(request.command())?;
        Ok(request.output.to_path_buf())
    }
}

/// Logs and records commands without running them
#[derive(Debug, Default)]
pub struct DryRunInvoker {
    commands: Mutex<Vec<ToolCommand>>,
}

impl DryRunInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands seen so far, in invocation order
    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, unit: &str, command: ToolCommand) {
        info!(unit, %command, "dry run");
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

impl Invoker for DryRunInvoker {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
        Ok(request
            .sources
            .iter()
            .map(|source| {
                self.record(request.unit, request.command_for(source));
                request.object_for(source)
            })
            .collect())
    }

    fn link(&self, request: &LinkRequest<'_>) -> Result<PathBuf, ToolError> {
        self.record(request.unit, request.command());
        Ok(request.output.to_path_buf())
    }
}

/// Object path for `source` under `object_dir`.
///
/// The source's directory layout relative to `root` is mirrored below
/// `object_dir`, so distinct sources never share an object. Components that
/// climb out of `root` are spelled `@up`.
pub fn object_path(object_dir: &Path, root: &Path, source: &Path) -> PathBuf {
    let rel = source.strip_prefix(root).unwrap_or(source);

    let mut object = object_dir.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => object.push(part),
            Component::ParentDir => object.push(PARENT_DIR_COMPONENT),
            _ => {}
        }
    }

    let mut name = object.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".o");
    object.set_file_name(name);
    object
}

/// Stand-in for `..` inside the object tree
const PARENT_DIR_COMPONENT: &str = "@up";

fn create_dir(path: &Path) -> Result<(), ToolError> {
    fs::create_dir_all(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_object_path_mirrors_source_tree() {
        let obj = object_path(
            Path::new("/p/build/app/obj"),
            Path::new("/p"),
            Path::new("/p/src/net/tcp.c"),
        );
        assert_eq!(obj, PathBuf::from("/p/build/app/obj/src/net/tcp.c.o"));
    }

    #[test]
    fn test_object_path_nested_and_flat_names_differ() {
        let object_dir = Path::new("/p/build/app/obj");
        let nested = object_path(object_dir, Path::new("/p"), Path::new("/p/src/net/io.c"));
        let flat = object_path(object_dir, Path::new("/p"), Path::new("/p/src/net_io.c"));

        assert_ne!(nested, flat);
        assert_eq!(flat, PathBuf::from("/p/build/app/obj/src/net_io.c.o"));
    }

    #[test]
    fn test_object_path_outside_root() {
        let obj = object_path(Path::new("obj"), Path::new("/p"), Path::new("../vendor/z.c"));
        assert_eq!(obj, PathBuf::from("obj/@up/vendor/z.c.o"));
    }

    #[test]
    fn test_compile_command_shape() {
        let sources = vec![PathBuf::from("/p/a.c")];
        let flags = strings(&["-O2", "-Wall"]);
        let request = CompileRequest {
            unit: "app",
            toolchain: Toolchain::C,
            tool: "cc",
            sources: &sources,
            flags: &flags,
            root: Path::new("/p"),
            object_dir: Path::new("/p/build/app/obj"),
        };

        let command = request.command_for(&sources[0]);
        assert_eq!(command.program, "cc");
        assert_eq!(
            command.args,
            strings(&["-O2", "-Wall", "-c", "/p/a.c", "-o", "/p/build/app/obj/a.c.o"])
        );
    }

    #[test]
    fn test_link_command_shape() {
        let objects = vec![PathBuf::from("a.o"), PathBuf::from("b.o")];
        let flags = strings(&["-lm"]);
        let request = LinkRequest {
            unit: "app",
            tool: "c++",
            objects: &objects,
            flags: &flags,
            output: Path::new("build/app/app"),
        };

        assert_eq!(request.command().to_string(), "c++ a.o b.o -lm -o build/app/app");
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let command = ToolCommand::new("cc").arg("-DNAME=a b").arg("");
        assert_eq!(command.to_string(), "cc '-DNAME=a b' ''");
    }

    #[test]
    fn test_dry_run_records_without_touching_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let object_dir = dir.path().join("build/app/obj");
        let sources = vec![dir.path().join("a.c"), dir.path().join("b.c")];
        let flags = strings(&["-g"]);
        let invoker = DryRunInvoker::new();

        let objects = invoker
            .compile(&CompileRequest {
                unit: "app",
                toolchain: Toolchain::C,
                tool: "cc",
                sources: &sources,
                flags: &flags,
                root: dir.path(),
                object_dir: &object_dir,
            })
            .unwrap();

        assert_eq!(objects, vec![object_dir.join("a.c.o"), object_dir.join("b.c.o")]);
        assert_eq!(invoker.commands().len(), 2);
        assert!(!object_dir.exists());
    }

    #[test]
    fn test_failed_error_message() {
        let err = ToolError::Failed {
            command: ToolCommand::new("cc").arg("x.c"),
            status: Some(1),
            stderr: "x.c: error".to_string(),
        };
        assert_eq!(err.to_string(), "`cc x.c` failed (exit status 1)");
    }

    #[test]
    fn test_spawn_error_for_missing_program() {
        let invoker = ProcessInvoker::new();
        let err = invoker
            .run(ToolCommand::new("unitbuild-no-such-compiler-xyz"))
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failed() {
        let invoker = ProcessInvoker::new();
        let err = invoker.run(ToolCommand::new("false")).unwrap_err();
        match err {
            ToolError::Failed { status, .. } => assert_eq!(status, Some(1)),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
