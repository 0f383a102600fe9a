use engine::config::ConfigValidationError;
use engine::errors::{ManifestError, ResourceError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the command-line front end and its sandbox device.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or deserialized
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration loaded but failed validation
    #[error("invalid configuration:\n{}", format_validation(.0))]
    Invalid(Vec<ConfigValidationError>),

    /// Reading or writing sandbox state failed
    #[error("sandbox I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sandbox state file is corrupt
    #[error("corrupt sandbox state in {}: {source}", .path.display())]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An overlay package payload could not be read
    #[error("invalid overlay package: {0}")]
    Package(#[from] toml::de::Error),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A bundle directory is unusable
    #[error("bundle {}: {reason}", .path.display())]
    Bundle { path: PathBuf, reason: String },
}

fn format_validation(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
