use std::path::PathBuf;

use thiserror::Error;

/// A parameter set rejected before any simulation work starts.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid parameter `{name}` = {value}: {reason}")]
pub struct InvalidParameter {
    pub name: String,
    pub value: String,
    pub reason: &'static str,
}

impl InvalidParameter {
    pub fn new(name: impl Into<String>, value: impl ToString, reason: &'static str) -> Self {
        Self { name: name.into(), value: value.to_string(), reason }
    }
}

/// Failure to load a parameter file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed parameter file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] InvalidParameter),
}
