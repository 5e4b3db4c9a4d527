//! Single-slot, latest-wins handoff between threads.
//!
//! The pyramid worker publishes finished results at its own pace while the
//! render thread drains at frame rate, and only the most recent value
//! matters. A bounded(1) channel with overwrite-on-full gives that without
//! ever blocking the render thread.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Publishing half of a [`latest_slot`].
pub struct LatestPublisher<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

/// Consuming half of a [`latest_slot`].
pub struct LatestConsumer<T> {
    receiver: Receiver<T>,
}

/// Creates a connected publisher/consumer pair around a single slot.
pub fn latest_slot<T>() -> (LatestPublisher<T>, LatestConsumer<T>) {
    let (sender, receiver) = bounded(1);
    (
        LatestPublisher {
            sender,
            receiver: receiver.clone(),
        },
        LatestConsumer { receiver },
    )
}

impl<T> LatestPublisher<T> {
    /// Stores `value` in the slot, discarding any unconsumed predecessor.
    pub fn publish(&self, mut value: T) {
        loop {
            match self.sender.try_send(value) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    // Evict the stale value and retry; the consumer may race
                    // us for it, which is fine either way.
                    let _ = self.receiver.try_recv();
                    value = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl<T> LatestConsumer<T> {
    /// Takes the current value, if any, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}
