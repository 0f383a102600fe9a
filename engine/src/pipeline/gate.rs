use crate::errors::ApplyError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Pipeline ownership token.
///
/// Holds a single permit; whoever owns it may mutate overlay and resource
/// state. The permit is released when the run reaches its terminal state and
/// drops it.
pub(crate) struct PipelineGate {
    semaphore: Arc<Semaphore>,
}

impl PipelineGate {
    pub(crate) fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Takes the permit without waiting.
    pub(crate) fn try_acquire(&self) -> Result<OwnedSemaphorePermit, ApplyError> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => Err(ApplyError::Busy),
            Err(TryAcquireError::Closed) => {
                Err(ApplyError::Aborted("theme manager is shutting down".to_string()))
            }
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Drop for PipelineGate {
    fn drop(&mut self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy_until_release() {
        let gate = PipelineGate::new();
        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_acquire().unwrap_err().is_busy());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_ok());
    }
}
