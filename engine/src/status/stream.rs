use super::{Delivery, StatusChannel, StatusListener, SubscriptionHandle};
use crate::model::ApplyStatus;
use std::sync::Arc;

/// Listener forwarding events into a flume channel.
struct Forwarder {
    sender: flume::Sender<ApplyStatus>,
    from_sequence: u64,
}

impl StatusListener for Forwarder {
    fn on_status(&self, status: &ApplyStatus) -> Delivery {
        if status.sequence < self.from_sequence {
            return Delivery::Consumed;
        }
        match self.sender.send(status.clone()) {
            Ok(()) => Delivery::Consumed,
            Err(_) => Delivery::Detached,
        }
    }
}

/// Owned stream of status events read from a [`StatusChannel`].
///
/// Dropping the stream unsubscribes its listener.
pub struct StatusStream {
    channel: StatusChannel,
    handle: SubscriptionHandle,
    receiver: flume::Receiver<ApplyStatus>,
}

impl StatusStream {
    /// Subscribes to the whole retained backlog.
    pub fn subscribe(channel: &StatusChannel) -> Self {
        Self::subscribe_from(channel, 0)
    }

    /// Subscribes to events with `sequence >= from_sequence`.
    pub fn subscribe_from(channel: &StatusChannel, from_sequence: u64) -> Self {
        let (sender, receiver) = flume::unbounded();
        let handle = channel.subscribe(Arc::new(Forwarder {
            sender,
            from_sequence,
        }));
        Self {
            channel: channel.clone(),
            handle,
            receiver,
        }
    }

    pub async fn recv(&mut self) -> Option<ApplyStatus> {
        self.receiver.recv_async().await.ok()
    }

    pub fn try_recv(&mut self) -> Option<ApplyStatus> {
        self.receiver.try_recv().ok()
    }

    /// Blocking receive for callers outside the async runtime.
    pub fn recv_blocking(&mut self) -> Option<ApplyStatus> {
        self.receiver.recv().ok()
    }

    /// Reads events until a terminal one arrives and returns it.
    pub async fn wait_for_terminal(&mut self) -> Option<ApplyStatus> {
        while let Some(status) = self.recv().await {
            if status.is_terminal() {
                return Some(status);
            }
        }
        None
    }

    /// Events already delivered but not yet read.
    pub fn drain_ready(&mut self) -> Vec<ApplyStatus> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for StatusStream {
    fn drop(&mut self) {
        self.channel.unsubscribe(&self.handle);
    }
}

impl std::fmt::Debug for StatusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStream")
            .field("listener", &self.handle.id())
            .field("ready", &self.receiver.len())
            .finish()
    }
}
