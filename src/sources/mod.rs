//! Source pattern expansion
//!
//! Expands glob-style source patterns against the filesystem. `*` and `?`
//! stay within one path component, `**` crosses directories, and `[...]`
//! and `{a,b}` work as in globset. Matches come back sorted by file name
//! within each directory so the same tree always yields the same order.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Characters that make a path component a pattern rather than a literal
const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Errors from pattern expansion
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("invalid glob pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("cannot walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Filesystem glob collaborator
pub trait Expand: Sync {
    /// Expand one pattern into matching file paths, in a stable order.
    ///
    /// A pattern that matches nothing yields an empty list, not an error.
    fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>, ExpandError>;
}

/// Expands patterns relative to a root directory on disk
#[derive(Debug, Clone)]
pub struct FsGlob {
    root: PathBuf,
}

impl FsGlob {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Expand for FsGlob {
    fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>, ExpandError> {
        if pattern.trim().is_empty() {
            return Err(ExpandError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        // Reject bad syntax even when the wildcard part is never reached
        compile(pattern, pattern)?;

        let (prefix, rest) = split_literal_prefix(pattern);
        let base = self.root.join(&prefix);

        let Some(rest) = rest else {
            let matched = base.is_file();
            trace!(pattern, path = %base.display(), matched, "literal source");
            return Ok(if matched { vec![base] } else { Vec::new() });
        };

        if !base.is_dir() {
            debug!(pattern, base = %base.display(), "pattern base does not exist");
            return Ok(Vec::new());
        }

        let matcher = compile(&rest, pattern)?;
        let max_depth = if rest.contains("**") {
            usize::MAX
        } else {
            rest.split('/').count()
        };

        let mut matches = Vec::new();
        for entry in WalkDir::new(&base)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry.map_err(|source| ExpandError::Walk {
                path: base.clone(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(rel_path) = entry.path().strip_prefix(&base) else {
                continue;
            };

            if matcher.is_match(rel_path) {
                matches.push(entry.into_path());
            }
        }

        debug!(pattern, count = matches.len(), "expanded source pattern");
        Ok(matches)
    }
}

fn compile(glob: &str, pattern: &str) -> Result<GlobMatcher, ExpandError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| ExpandError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.kind().to_string(),
        })
}

/// Split `pattern` into the directory prefix with no glob syntax and the
/// remaining pattern (`None` when the whole pattern is literal).
fn split_literal_prefix(pattern: &str) -> (PathBuf, Option<String>) {
    let mut prefix = PathBuf::new();
    let mut components = Path::new(pattern).components();

    while let Some(component) = components.next() {
        let is_glob = match component {
            Component::Normal(part) => part.to_string_lossy().contains(GLOB_META),
            _ => false,
        };

        if is_glob {
            let rest: Vec<String> = std::iter::once(component)
                .chain(components)
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            return (prefix, Some(rest.join("/")));
        }

        prefix.push(component);
    }

    (prefix, None)
}
