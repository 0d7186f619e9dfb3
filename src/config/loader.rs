//! Configuration file loading
//!
//! Reads a build file (JSON, or TOML when the extension says so) into an
//! ordered list of `(unit name, ConfigNode)` entries. Top-level order is
//! kept as written so builds run in a deterministic order; duplicate names
//! are passed through for the registry to reject.

use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::node::{ConfigNode, InvalidValue, Value};

/// Default build file name
pub const DEFAULT_CONFIG_FILE: &str = "build.json";

/// Serialized form of a build file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension (JSON unless `.toml`)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config layer with provenance
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    pub fn builtin() -> Self {
        Self {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }
    }

    pub fn cli() -> Self {
        Self {
            origin: ConfigOrigin::Cli,
            path: None,
            digest: None,
        }
    }
}

/// A parsed build file
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Where the file was read from
    pub source: ConfigSource,

    /// Unit entries in file order (may contain duplicate names)
    pub entries: Vec<(String, ConfigNode)>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Why build file contents could not be turned into units
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    InvalidValue(#[from] InvalidValue),

    #[error("unit `{unit}` must be a table, found a {found}")]
    NotATable { unit: String, found: &'static str },
}

/// Read and parse a build file
pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    let format = ConfigFormat::from_path(path);
    let entries = parse_str(&contents, format).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), ?format, units = entries.len(), "loaded build file");

    Ok(LoadedConfig {
        source: ConfigSource {
            origin: ConfigOrigin::File,
            path: Some(path.to_string_lossy().to_string()),
            digest: Some(digest),
        },
        entries,
    })
}

/// Parse build file contents into ordered unit entries
pub fn parse_str(contents: &str, format: ConfigFormat) -> Result<Vec<(String, ConfigNode)>, ParseError> {
    let raw: Vec<(String, Value)> = match format {
        ConfigFormat::Json => {
            let OrderedEntries(entries) = serde_json::from_str::<OrderedEntries<serde_json::Value>>(contents)?;
            entries
                .into_iter()
                .map(|(name, v)| Value::from_json(v, &name).map(|v| (name, v)))
                .collect::<Result<_, _>>()?
        }
        ConfigFormat::Toml => {
            let OrderedEntries(entries) = toml::from_str::<OrderedEntries<toml::Value>>(contents)?;
            entries
                .into_iter()
                .map(|(name, v)| Value::from_toml(v, &name).map(|v| (name, v)))
                .collect::<Result<_, _>>()?
        }
    };

    raw.into_iter()
        .map(|(name, value)| match value {
            Value::Node(node) => Ok((name, node)),
            other => Err(ParseError::NotATable {
                unit: name,
                found: other.kind(),
            }),
        })
        .collect()
}

/// Top-level table read entry by entry, in document order, keeping duplicates
struct OrderedEntries<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedEntries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = OrderedEntries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of build units")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}
