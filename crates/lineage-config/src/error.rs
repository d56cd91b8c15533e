//! Errors raised while loading, checking or writing lineage configuration.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::DEPTH_CAP;

/// What was being done to a config path when I/O failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
    CreateDir,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::CreateDir => "create directory",
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot {action} '{path}': {source}")]
    Io {
        action: FileAction,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid lineage config: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot render lineage config as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("no home directory, so ~/.lineage is unavailable")]
    NoHomeDir,

    /// A traversal depth outside `1..=DEPTH_CAP`
    #[error("{key} must be between 1 and {cap}, got {value}")]
    DepthOutOfRange {
        key: &'static str,
        value: usize,
        cap: usize,
    },

    #[error("graph.default_depth ({default_depth}) exceeds graph.max_depth ({max_depth})")]
    DefaultAboveMax {
        default_depth: usize,
        max_depth: usize,
    },

    #[error("{0} must not be empty")]
    EmptyValue(&'static str),
}

impl ConfigError {
    pub fn io(action: FileAction, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Accept `value` only inside `1..=DEPTH_CAP`.
    pub(crate) fn check_depth(key: &'static str, value: usize) -> Result<(), Self> {
        if (1..=DEPTH_CAP).contains(&value) {
            Ok(())
        } else {
            Err(Self::DepthOutOfRange {
                key,
                value,
                cap: DEPTH_CAP,
            })
        }
    }

    /// Key of the offending setting, when there is one
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::DepthOutOfRange { key, .. } => Some(*key),
            Self::DefaultAboveMax { .. } => Some("graph.default_depth"),
            Self::EmptyValue(key) => Some(*key),
            _ => None,
        }
    }
}
