//! Installer protocol adapter.
//!
//! Package installers report completion through callbacks that may fire on
//! any thread. The adapter collapses that into a single awaited call:
//!
//! 1. a one-shot completion slot is registered under a fresh
//!    [`OperationToken`],
//! 2. the operation is submitted to the [`PackageInstaller`] together with a
//!    [`CompletionSink`],
//! 3. the caller waits on the slot, bounded by the configured timeout.
//!
//! Dispatching a completion removes its slot, so a token can complete at most
//! once. A completion that arrives after the timeout finds no slot and is
//! dropped.

mod adapter;
mod registry;

pub use adapter::InstallerAdapter;
pub use registry::{CompletionRegistry, CompletionSink};

use crate::errors::InstallerError;
use std::fmt;

/// Unique key correlating a submitted operation with its completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationToken(String);

impl OperationToken {
    pub fn install() -> Self {
        Self(format!("install_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn uninstall(package_id: &str) -> Self {
        Self(format!(
            "uninstall_{}_{}",
            package_id,
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result reported by the installer for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCompletion {
    pub token: OperationToken,
    /// Package the operation acted on, when the installer knows it
    pub package_id: Option<String>,
    pub status_code: i32,
}

impl InstallCompletion {
    pub fn new(token: OperationToken, package_id: Option<String>, status_code: i32) -> Self {
        Self {
            token,
            package_id,
            status_code,
        }
    }
}

/// Package installer: the OS facility behind the adapter.
///
/// Submission must return promptly. The outcome is reported later, from any
/// thread, through [`CompletionSink::complete`].
pub trait PackageInstaller: Send + Sync {
    fn submit_install(
        &self,
        token: &OperationToken,
        payload: Vec<u8>,
        sink: CompletionSink,
    ) -> Result<(), InstallerError>;

    fn submit_uninstall(
        &self,
        token: &OperationToken,
        package_id: &str,
        sink: CompletionSink,
    ) -> Result<(), InstallerError>;
}
