//! Event queues -- outgoing and deferred FIFOs shared by the UI caller and
//! the sender task.
//!
//! Both queues sit behind one mutex so `drain` and `promote` are atomic with
//! respect to each other and to concurrent enqueues. Enqueue wakes the
//! sender through a `Notify`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tabcollab_protocol::Record;
use tokio::sync::Notify;

/// What to do when a queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming event.
    #[default]
    DropNewest,
    /// Evict the oldest queued event to make room.
    DropOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue full ({capacity} events)")]
pub struct QueueFull {
    pub capacity: usize,
}

/// Outcome of an accepted enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Accepted after evicting the oldest event.
    DroppedOldest,
}

#[derive(Default)]
struct Queues {
    outgoing: VecDeque<Record>,
    deferred: VecDeque<Record>,
}

pub struct EventQueues {
    inner: Mutex<Queues>,
    notify: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl EventQueues {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(Queues::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            overflow,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        // Queue contents stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append to the outgoing queue and wake the sender.
    pub fn enqueue(&self, event: Record) -> Result<Enqueued, QueueFull> {
        let outcome = {
            let mut queues = self.lock();
            push_bounded(&mut queues.outgoing, event, self.capacity, self.overflow)?
        };
        self.notify.notify_one();
        Ok(outcome)
    }

    /// Append to the deferred queue. Deferred events wait for `promote`.
    pub fn enqueue_deferred(&self, event: Record) -> Result<Enqueued, QueueFull> {
        let mut queues = self.lock();
        push_bounded(&mut queues.deferred, event, self.capacity, self.overflow)
    }

    /// Move every deferred event, in order, to the end of the outgoing
    /// queue. Returns how many moved. Not subject to capacity.
    pub fn promote(&self) -> usize {
        let moved = {
            let mut queues = self.lock();
            let Queues { outgoing, deferred } = &mut *queues;
            let moved = deferred.len();
            outgoing.extend(deferred.drain(..));
            moved
        };
        if moved > 0 {
            self.notify.notify_one();
        }
        moved
    }

    /// Take everything currently in the outgoing queue.
    pub fn drain(&self) -> Vec<Record> {
        self.lock().outgoing.drain(..).collect()
    }

    /// Discard both queues.
    pub fn clear(&self) {
        let mut queues = self.lock();
        queues.outgoing.clear();
        queues.deferred.clear();
    }

    pub fn outgoing_len(&self) -> usize {
        self.lock().outgoing.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.lock().deferred.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait until an enqueue or promote signals new outgoing work. A signal
    /// sent while nobody waits is kept for the next call.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

fn push_bounded(
    queue: &mut VecDeque<Record>,
    event: Record,
    capacity: usize,
    overflow: OverflowPolicy,
) -> Result<Enqueued, QueueFull> {
    if queue.len() < capacity {
        queue.push_back(event);
        return Ok(Enqueued::Queued);
    }
    match overflow {
        OverflowPolicy::DropNewest => {
            tracing::warn!(capacity, kind = %event.kind, "queue full, event rejected");
            Err(QueueFull { capacity })
        }
        OverflowPolicy::DropOldest => {
            if let Some(evicted) = queue.pop_front() {
                tracing::warn!(capacity, kind = %evicted.kind, "queue full, oldest event evicted");
            }
            queue.push_back(event);
            Ok(Enqueued::DroppedOldest)
        }
    }
}
