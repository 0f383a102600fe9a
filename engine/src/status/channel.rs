use super::{Delivery, StatusListener};
use crate::model::ApplyStatus;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Registration state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Dead,
}

#[derive(Debug)]
struct LivenessFlag(AtomicBool);

impl LivenessFlag {
    fn live() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    fn get(&self) -> Liveness {
        if self.0.load(Ordering::Acquire) {
            Liveness::Live
        } else {
            Liveness::Dead
        }
    }

    fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Returned by [`StatusChannel::subscribe`].
///
/// Unsubscribing only flips the listener to [`Liveness::Dead`]; the slot is
/// purged on the next drain pass.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    liveness: Arc<LivenessFlag>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.get()
    }

    pub fn is_live(&self) -> bool {
        self.liveness() == Liveness::Live
    }
}

struct ListenerSlot {
    id: u64,
    listener: Arc<dyn StatusListener>,
    liveness: Arc<LivenessFlag>,
    /// Sequence of the next event to offer
    cursor: u64,
}

struct ChannelState {
    queue: VecDeque<Arc<ApplyStatus>>,
    slots: Vec<ListenerSlot>,
    /// Sequence assigned to the next published event
    next_sequence: u64,
    next_listener_id: u64,
}

impl ChannelState {
    fn oldest_sequence(&self) -> u64 {
        self.queue
            .front()
            .map(|event| event.sequence)
            .unwrap_or(self.next_sequence)
    }

    fn purge_dead(&mut self) {
        self.slots.retain(|slot| {
            let live = slot.liveness.get() == Liveness::Live;
            if !live {
                log::debug!("Purging status listener {}", slot.id);
            }
            live
        });
    }

    /// Drops queue entries every live listener has moved past. With no live
    /// listener the backlog is kept for the next subscriber.
    fn trim_consumed(&mut self) {
        let Some(min_cursor) = self.slots.iter().map(|slot| slot.cursor).min() else {
            return;
        };
        while self
            .queue
            .front()
            .is_some_and(|event| event.sequence < min_cursor)
        {
            self.queue.pop_front();
        }
    }
}

struct Inner {
    state: Mutex<ChannelState>,
    drain_lock: Mutex<()>,
    dirty: AtomicBool,
}

/// Durable multi-listener FIFO of status events.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct StatusChannel {
    inner: Arc<Inner>,
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ChannelState {
                    queue: VecDeque::new(),
                    slots: Vec::new(),
                    next_sequence: 1,
                    next_listener_id: 1,
                }),
                drain_lock: Mutex::new(()),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps the event with the next sequence number, enqueues it and runs
    /// a drain pass. Returns the assigned sequence.
    pub fn publish(&self, mut status: ApplyStatus) -> u64 {
        let sequence = {
            let mut state = self.state();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            status.sequence = sequence;
            state.queue.push_back(Arc::new(status));
            sequence
        };
        self.drain();
        sequence
    }

    /// Registers a listener starting at the oldest retained event.
    pub fn subscribe(&self, listener: Arc<dyn StatusListener>) -> SubscriptionHandle {
        let handle = {
            let mut state = self.state();
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            let cursor = state.oldest_sequence();
            let liveness = LivenessFlag::live();
            state.slots.push(ListenerSlot {
                id,
                listener,
                liveness: liveness.clone(),
                cursor,
            });
            log::debug!("Status listener {} subscribed at sequence {}", id, cursor);
            SubscriptionHandle { id, liveness }
        };
        self.drain();
        handle
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        handle.liveness.kill();
    }

    /// Sequence the next published event will carry.
    pub fn next_sequence(&self) -> u64 {
        self.state().next_sequence
    }

    /// Number of events still waiting for at least one listener.
    pub fn backlog(&self) -> usize {
        self.state().queue.len()
    }

    pub fn listener_count(&self) -> usize {
        self.state()
            .slots
            .iter()
            .filter(|slot| slot.liveness.get() == Liveness::Live)
            .count()
    }

    /// Offers pending events to every live listener.
    ///
    /// Runs on publish and subscribe; call it directly to retry listeners
    /// that deferred. Only one thread drains at a time; a request arriving
    /// while another thread drains is picked up by that thread.
    pub fn drain(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        loop {
            let guard = match self.inner.drain_lock.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
            while self.inner.dirty.swap(false, Ordering::SeqCst) {
                self.drain_pass();
            }
            drop(guard);
            if !self.inner.dirty.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn drain_pass(&self) {
        let work = {
            let mut state = self.state();
            state.purge_dead();
            let work: Vec<_> = state
                .slots
                .iter()
                .map(|slot| {
                    let pending: Vec<Arc<ApplyStatus>> = state
                        .queue
                        .iter()
                        .filter(|event| event.sequence >= slot.cursor)
                        .cloned()
                        .collect();
                    (
                        slot.id,
                        slot.listener.clone(),
                        slot.liveness.clone(),
                        pending,
                    )
                })
                .collect();
            work
        };

        let mut advanced = Vec::with_capacity(work.len());
        for (id, listener, liveness, pending) in work {
            let mut next_cursor = None;
            for event in pending {
                if liveness.get() == Liveness::Dead {
                    break;
                }
                match catch_unwind(AssertUnwindSafe(|| listener.on_status(&event))) {
                    Ok(Delivery::Consumed) => next_cursor = Some(event.sequence + 1),
                    Ok(Delivery::Deferred) => break,
                    Ok(Delivery::Detached) => {
                        log::debug!("Status listener {} detached", id);
                        liveness.kill();
                        break;
                    }
                    Err(_) => {
                        log::warn!("Status listener {} panicked and was removed", id);
                        liveness.kill();
                        break;
                    }
                }
            }
            if let Some(cursor) = next_cursor {
                advanced.push((id, cursor));
            }
        }

        let mut state = self.state();
        for (id, cursor) in advanced {
            if let Some(slot) = state.slots.iter_mut().find(|slot| slot.id == id) {
                slot.cursor = slot.cursor.max(cursor);
            }
        }
        state.purge_dead();
        state.trim_consumed();
    }
}

impl std::fmt::Debug for StatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("StatusChannel")
            .field("backlog", &state.queue.len())
            .field("listeners", &state.slots.len())
            .field("next_sequence", &state.next_sequence)
            .finish()
    }
}
