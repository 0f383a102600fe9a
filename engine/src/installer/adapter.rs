use super::registry::PendingCompletion;
use super::{CompletionRegistry, CompletionSink, InstallCompletion, OperationToken, PackageInstaller};
use crate::errors::{InstallerError, STATUS_FAILURE, STATUS_SUCCESS};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Presents install and uninstall as awaited calls with a bounded wait.
#[derive(Clone)]
pub struct InstallerAdapter {
    facility: Arc<dyn PackageInstaller>,
    registry: Arc<CompletionRegistry>,
    timeout: Duration,
}

impl InstallerAdapter {
    pub fn new(facility: Arc<dyn PackageInstaller>, timeout: Duration) -> Self {
        Self {
            facility,
            registry: Arc::new(CompletionRegistry::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn sink(&self) -> CompletionSink {
        CompletionSink::new(self.registry.clone())
    }

    /// Installs a packaged overlay and returns the installed package id.
    pub async fn install(&self, payload: Vec<u8>) -> Result<String, InstallerError> {
        let token = OperationToken::install();
        log::debug!("Submitting install {} ({} bytes)", token, payload.len());

        let completion = self
            .run(token, |token, sink| {
                self.facility.submit_install(token, payload, sink)
            })
            .await?;

        if completion.status_code != STATUS_SUCCESS {
            return Err(InstallerError::Failed {
                code: completion.status_code,
                package_id: completion.package_id,
            });
        }

        let package_id = completion.package_id.ok_or(InstallerError::Failed {
            code: STATUS_FAILURE,
            package_id: None,
        })?;
        log::info!("Installed package {}", package_id);
        Ok(package_id)
    }

    pub async fn uninstall(&self, package_id: &str) -> Result<(), InstallerError> {
        let token = OperationToken::uninstall(package_id);
        log::debug!("Submitting uninstall {}", token);

        let completion = self
            .run(token, |token, sink| {
                self.facility.submit_uninstall(token, package_id, sink)
            })
            .await?;

        if completion.status_code == STATUS_SUCCESS {
            log::info!("Uninstalled package {}", package_id);
            Ok(())
        } else {
            Err(InstallerError::Failed {
                code: completion.status_code,
                package_id: Some(package_id.to_string()),
            })
        }
    }

    async fn run<F>(&self, token: OperationToken, submit: F) -> Result<InstallCompletion, InstallerError>
    where
        F: FnOnce(&OperationToken, CompletionSink) -> Result<(), InstallerError>,
    {
        // Register before submitting so an immediate completion is not lost
        let mut pending = PendingCompletion::register(self.registry.clone(), token.clone());
        let receiver = pending.take_receiver().ok_or(InstallerError::Abandoned)?;

        submit(&token, self.sink())?;

        match timeout(self.timeout, receiver).await {
            Ok(Ok(completion)) => Ok(completion),
            Ok(Err(_)) => Err(InstallerError::Abandoned),
            Err(_) => {
                log::error!(
                    "Installer operation {} timed out after {:?}",
                    token,
                    self.timeout
                );
                Err(InstallerError::Timeout {
                    after: self.timeout,
                })
            }
        }
    }
}

impl std::fmt::Debug for InstallerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallerAdapter")
            .field("timeout", &self.timeout)
            .field("pending", &self.registry.pending_count())
            .finish()
    }
}
