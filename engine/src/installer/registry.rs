use super::{InstallCompletion, OperationToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Pending completion slots keyed by operation token.
#[derive(Debug, Default)]
pub struct CompletionRegistry {
    pending: Mutex<HashMap<OperationToken, oneshot::Sender<InstallCompletion>>>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slot for `token`. A second registration for the same token
    /// replaces the first, whose receiver then observes a closed channel.
    pub fn register(&self, token: OperationToken) -> oneshot::Receiver<InstallCompletion> {
        let (sender, receiver) = oneshot::channel();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.insert(token.clone(), sender).is_some() {
            log::warn!("Replaced pending completion slot for {}", token);
        }
        receiver
    }

    /// Removes the slot without firing it.
    pub fn unregister(&self, token: &OperationToken) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }

    /// Fires the slot registered for the completion's token. Returns false
    /// when no slot is waiting.
    pub fn dispatch(&self, completion: InstallCompletion) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&completion.token);

        match sender {
            Some(sender) => {
                let token = completion.token.clone();
                if sender.send(completion).is_err() {
                    log::debug!("Waiter for {} is gone, completion dropped", token);
                    return false;
                }
                true
            }
            None => {
                log::debug!(
                    "No pending operation for {}, completion ignored",
                    completion.token
                );
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle given to a package installer for reporting completions.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    registry: Arc<CompletionRegistry>,
}

impl CompletionSink {
    pub fn new(registry: Arc<CompletionRegistry>) -> Self {
        Self { registry }
    }

    /// Reports the outcome of an operation. Safe to call from any thread;
    /// only the first completion for a token is delivered.
    pub fn complete(&self, completion: InstallCompletion) -> bool {
        self.registry.dispatch(completion)
    }
}

/// Registered slot that unregisters itself when dropped unfired.
pub(crate) struct PendingCompletion {
    registry: Arc<CompletionRegistry>,
    token: OperationToken,
    receiver: Option<oneshot::Receiver<InstallCompletion>>,
}

impl PendingCompletion {
    pub(crate) fn register(registry: Arc<CompletionRegistry>, token: OperationToken) -> Self {
        let receiver = registry.register(token.clone());
        Self {
            registry,
            token,
            receiver: Some(receiver),
        }
    }

    pub(crate) fn take_receiver(&mut self) -> Option<oneshot::Receiver<InstallCompletion>> {
        self.receiver.take()
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if self.registry.unregister(&self.token) {
            log::debug!("Released unfired completion slot for {}", self.token);
        }
    }
}
