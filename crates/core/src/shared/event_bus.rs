use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Multi-subscriber FIFO event bus.
///
/// Every subscriber owns its own channel, so events published from one
/// thread arrive at each subscriber in publish order. Publishing never
/// blocks: when a bounded subscriber queue is full the event is dropped
/// for that subscriber and counted. Subscribers whose receiver has been
/// dropped are pruned on the next publish.
pub struct EventBus<T> {
    inner: Arc<BusInner<T>>,
}

struct BusInner<T> {
    subscribers: Mutex<Vec<Sender<T>>>,
    capacity: Option<usize>,
    dropped: AtomicU64,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> EventBus<T> {
    /// Each subscriber queue holds at most `capacity` undelivered events.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                capacity,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = match self.inner.capacity {
            Some(cap) => crossbeam_channel::bounded(cap),
            None => crossbeam_channel::unbounded(),
        };
        self.lock().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber. Returns how many
    /// subscribers accepted it.
    pub fn publish(&self, event: T) -> usize {
        let mut subscribers = self.lock();
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Events discarded because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<T>>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
