//! Error types for manifest parsing, asset access, package installation and
//! the apply pipeline.
//!
//! Step-local errors are never swallowed by the pipeline: every variant of
//! [`ApplyError`] fails the whole apply and is translated into a terminal
//! `Failed` status before it reaches any observer.

use crate::model::ResourceKind;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Installer status reported for a successful install or uninstall.
pub const STATUS_SUCCESS: i32 = 0;
/// Generic installer failure.
pub const STATUS_FAILURE: i32 = 1;
/// Status reported when no completion arrived within the configured bound.
pub const STATUS_TIMEOUT: i32 = -1000;

/// Errors raised while reading a theme manifest.
///
/// A missing or malformed manifest is recoverable when listing bundles (the
/// bundle is skipped) and fatal when a single bundle is requested.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The bundle carries no manifest asset
    #[error("bundle '{package_id}' has no theme manifest")]
    Missing { package_id: String },

    /// The manifest could not be read from the bundle
    #[error("failed to read manifest of '{package_id}': {source}")]
    Unreadable {
        package_id: String,
        #[source]
        source: AssetError,
    },

    /// The manifest is not well-formed markup
    #[error("malformed manifest in '{package_id}'{}: {reason}", position_suffix(.position))]
    Malformed {
        package_id: String,
        /// Byte offset of the error, when known
        position: Option<u64>,
        reason: String,
    },
}

fn position_suffix(position: &Option<u64>) -> String {
    match position {
        Some(position) => format!(" at byte {position}"),
        None => String::new(),
    }
}

/// Errors raised by a bundle asset source.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A declared asset is absent from the bundle
    #[error("asset '{path}' not found in bundle")]
    NotFound { path: String },

    /// The requested path is absolute or walks out of the bundle root
    #[error("asset path '{path}' escapes the bundle")]
    InvalidPath { path: String },

    /// The asset exists but could not be read
    #[error("failed to read asset '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }
}

/// Errors reported by the installer protocol adapter.
#[derive(Debug, Clone, Error)]
pub enum InstallerError {
    /// The installer completed with a non-success status code
    #[error("installer reported status {code}{}", package_suffix(.package_id))]
    Failed {
        code: i32,
        package_id: Option<String>,
    },

    /// No completion arrived within the configured bound
    #[error("installer did not complete within {after:?}")]
    Timeout { after: Duration },

    /// The installer refused the submission outright
    #[error("installer rejected the request: {reason}")]
    Rejected { reason: String },

    /// The completion side went away without reporting a result
    #[error("installer dropped the completion handler without a result")]
    Abandoned,
}

fn package_suffix(package_id: &Option<String>) -> String {
    match package_id {
        Some(package_id) => format!(" for '{package_id}'"),
        None => String::new(),
    }
}

impl InstallerError {
    /// Integer failure code, using [`STATUS_TIMEOUT`] for timeouts.
    pub fn code(&self) -> i32 {
        match self {
            InstallerError::Failed { code, .. } => *code,
            InstallerError::Timeout { .. } => STATUS_TIMEOUT,
            InstallerError::Rejected { .. } | InstallerError::Abandoned => STATUS_FAILURE,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InstallerError::Timeout { .. })
    }
}

/// Errors raised while swapping an OS-level resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The OS facility refused the new resource
    #[error("{resource} rejected: {reason}")]
    Rejected {
        resource: ResourceKind,
        reason: String,
    },

    /// An image asset could not be decoded
    #[error("failed to decode image '{asset}': {source}")]
    Decode {
        asset: String,
        #[source]
        source: image::ImageError,
    },

    /// A filesystem operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ResourceError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ResourceError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn rejected(resource: ResourceKind, reason: impl Into<String>) -> Self {
        ResourceError::Rejected {
            resource,
            reason: reason.into(),
        }
    }
}

/// Direction of an overlay toggle, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Enable,
    Disable,
}

impl std::fmt::Display for OverlayAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayAction::Enable => write!(f, "enable"),
            OverlayAction::Disable => write!(f, "disable"),
        }
    }
}

/// The overlay manager refused to toggle a package.
#[derive(Debug, Clone, Error)]
#[error("failed to {action} overlay '{package_id}': {reason}")]
pub struct OverlayError {
    pub package_id: String,
    pub action: OverlayAction,
    pub reason: String,
}

impl OverlayError {
    pub fn new(package_id: impl Into<String>, enabled: bool, reason: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            action: if enabled {
                OverlayAction::Enable
            } else {
                OverlayAction::Disable
            },
            reason: reason.into(),
        }
    }
}

/// Pipeline-level error. Any of these fails the whole apply.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Another apply or overlay removal holds the pipeline
    #[error("another theme operation is already running")]
    Busy,

    /// The caller cancelled the run
    #[error("theme apply was cancelled")]
    Cancelled,

    /// A declared asset is missing or unreadable
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Install or uninstall failed or timed out
    #[error("installer failure for '{subject}': {source}")]
    Installer {
        subject: String,
        #[source]
        source: InstallerError,
    },

    /// An installed package lacks the trusted theme overlay marker
    #[error("package '{package_id}' installed for '{target_id}' is not a verified theme overlay")]
    UnverifiedOverlay {
        target_id: String,
        package_id: String,
    },

    /// An OS-level resource swap was rejected
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The overlay manager refused a toggle
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// The worker running the pipeline stopped without a result
    #[error("apply worker stopped unexpectedly: {0}")]
    Aborted(String),
}

impl ApplyError {
    pub fn installer(subject: impl Into<String>, source: InstallerError) -> Self {
        ApplyError::Installer {
            subject: subject.into(),
            source,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ApplyError::Busy)
    }
}

// Result type alias for convenience
pub type EngineResult<T> = Result<T, ApplyError>;
