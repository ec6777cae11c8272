//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! emit(event)
//!     │
//!     ├──► [inbox 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)          └─────► panic caught & isolated
//!     ├──► [inbox 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [inbox N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit` returns immediately.
//! - **Overflow**: when a subscriber's inbox is full, the *oldest*
//!   undelivered event for that subscriber is dropped and the drop is
//!   recorded. Other subscribers are unaffected.
//! - **Per-subscriber FIFO**: each subscriber sees surviving events in
//!   emission order. No cross-subscriber ordering.
//! - **At-most-once**: delivery is best-effort; nothing is retried.
//! - **Isolation**: a slow or panicking subscriber only affects itself.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::event::Event;

/// Event subscriber.
///
/// Each subscriber gets a dedicated worker task and a bounded inbox;
/// `on_event` runs on the worker, never in the publisher's context.
/// Panics are caught and isolated.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Short name used in drop diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Inbox capacity for this subscriber. On overflow the oldest
    /// undelivered event is dropped.
    fn queue_capacity(&self) -> usize {
        64
    }
}

struct Inbox {
    name: &'static str,
    queue: Mutex<VecDeque<Arc<Event>>>,
    capacity: usize,
    wakeup: Notify,
    dropped: AtomicU64,
}

impl Inbox {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Event>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: Arc<Event>) {
        {
            let mut queue = self.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    subscriber = self.name,
                    dropped,
                    "inbox full; dropped oldest undelivered event"
                );
            }
            queue.push_back(event);
        }
        self.wakeup.notify_one();
    }

    fn pop(&self) -> Option<Arc<Event>> {
        self.lock().pop_front()
    }
}

struct Shared {
    inboxes: Vec<Arc<Inbox>>,
    closed: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Fan-out coordinator for lifecycle events. Cheap to clone; all clones
/// publish into the same subscriber set.
#[derive(Clone)]
pub struct Emitter {
    shared: Arc<Shared>,
}

impl Emitter {
    /// Registers the subscribers and spawns one worker task per
    /// subscriber. Workers run until [`shutdown`](Emitter::shutdown).
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let mut inboxes = Vec::with_capacity(subscribers.len());
        let mut workers = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let inbox = Arc::new(Inbox {
                name: subscriber.name(),
                queue: Mutex::new(VecDeque::new()),
                capacity: subscriber.queue_capacity().max(1),
                wakeup: Notify::new(),
                dropped: AtomicU64::new(0),
            });
            inboxes.push(Arc::clone(&inbox));
            workers.push(tokio::spawn(worker(subscriber, inbox, Arc::clone(&closed))));
        }

        Self {
            shared: Arc::new(Shared {
                inboxes,
                closed,
                workers: Mutex::new(workers),
            }),
        }
    }

    /// Publishes an event to every subscriber's inbox. Never blocks.
    pub fn emit(&self, event: Event) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        let event = Arc::new(event);
        for inbox in &self.shared.inboxes {
            inbox.push(Arc::clone(&event));
        }
    }

    /// Number of events dropped so far for the named subscriber.
    pub fn dropped(&self, subscriber: &str) -> u64 {
        self.shared
            .inboxes
            .iter()
            .find(|inbox| inbox.name == subscriber)
            .map(|inbox| inbox.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Stops accepting events, wakes every worker, and waits for them to
    /// drain their inboxes and exit.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);
        for inbox in &self.shared.inboxes {
            inbox.wakeup.notify_one();
        }
        let workers = {
            let mut guard = self
                .shared
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            let _ = handle.await;
        }
    }
}

async fn worker(subscriber: Arc<dyn Subscribe>, inbox: Arc<Inbox>, closed: Arc<AtomicBool>) {
    loop {
        while let Some(event) = inbox.pop() {
            let delivery = subscriber.on_event(event.as_ref());
            if AssertUnwindSafe(delivery).catch_unwind().await.is_err() {
                tracing::error!(
                    subscriber = inbox.name,
                    event = event.kind(),
                    "subscriber panicked while handling event"
                );
            }
        }
        if closed.load(Ordering::Acquire) {
            break;
        }
        inbox.wakeup.notified().await;
    }
}
