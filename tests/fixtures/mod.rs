//! Test fixtures
//!
//! - `sample/`: a checked-in project with a TOML build file and C/C++ sources
//! - `Project`: a scratch project in a temp directory

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Directory of the checked-in sample project
pub fn sample_project_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample")
}

/// Build file of the sample project
pub fn sample_config_path() -> PathBuf {
    sample_project_path().join("build.toml")
}

/// Scratch project on disk
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Project with `build.json` holding `config`
    pub fn with_config(config: serde_json::Value) -> Self {
        let project = Self::new();
        project.write("build.json", &config.to_string());
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("build.json")
    }

    /// Write a file, creating parent directories
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        fs::write(&path, contents).expect("Failed to write fixture file");
        path
    }

    /// Create empty source files
    pub fn touch(&self, files: &[&str]) -> &Self {
        for file in files {
            self.write(file, "");
        }
        self
    }
}
