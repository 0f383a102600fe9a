//! Status distribution.
//!
//! The pipeline publishes [`ApplyStatus`] events into a [`StatusChannel`];
//! any number of [`StatusListener`]s drain it. Each listener has its own
//! cursor into the queue, so a listener that defers an event holds back only
//! itself. An event leaves the queue once every live listener has consumed
//! it. A listener subscribing late starts at the oldest retained event.

mod channel;
mod stream;

pub use channel::{Liveness, StatusChannel, SubscriptionHandle};
pub use stream::StatusStream;

use crate::model::ApplyStatus;

/// Answer of a listener to an offered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event was taken; offer the next one
    Consumed,
    /// Not ready; offer the same event again on a later drain pass
    Deferred,
    /// The listener is gone and should be removed
    Detached,
}

/// Observer of status events.
///
/// Called from whichever thread runs the drain pass, never while the channel
/// lock is held. A panicking listener is treated as detached.
pub trait StatusListener: Send + Sync {
    fn on_status(&self, status: &ApplyStatus) -> Delivery;
}

impl<F> StatusListener for F
where
    F: Fn(&ApplyStatus) -> Delivery + Send + Sync,
{
    fn on_status(&self, status: &ApplyStatus) -> Delivery {
        self(status)
    }
}
