//! Single-thread callback delivery.
//!
//! Any thread may enqueue a callback; one dedicated thread runs them in
//! arrival order. Used when completions must reach the embedder on a
//! thread of its choosing rather than a lookup worker.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

type Event = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct State {
    events: VecDeque<Event>,
    aborted: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until an event is ready or the queue is aborted.
    fn next(&self) -> Option<Event> {
        let mut state = self.lock();
        loop {
            if state.aborted {
                return None;
            }
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// FIFO queue of callbacks drained by one delivery thread.
///
/// Events from a single producer run in the order that producer enqueued
/// them. After [`abort`](Self::abort) nothing more runs: undelivered events
/// are dropped and later enqueues are ignored.
pub struct EventQueue {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl EventQueue {
    /// Spawns the delivery thread.
    pub fn start(name: &str) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&worker))?;
        tracing::debug!(thread = name, "started event delivery thread");
        Ok(Self {
            shared,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Queues `event` for the delivery thread. Returns `false` if the queue
    /// was aborted and the event was dropped.
    pub fn enqueue(&self, event: impl FnOnce() + Send + 'static) -> bool {
        let mut state = self.shared.lock();
        if state.aborted {
            tracing::trace!("event queue aborted, dropping event");
            return false;
        }
        state.events.push_back(Box::new(event));
        drop(state);
        self.shared.condvar.notify_one();
        true
    }

    /// Stops delivery and joins the delivery thread. An event that is
    /// already running finishes first. Idempotent.
    ///
    /// Called from the delivery thread itself, this stops delivery without
    /// joining.
    pub fn abort(&self) {
        let dropped = {
            let mut state = self.shared.lock();
            state.aborted = true;
            std::mem::take(&mut state.events)
        };
        self.shared.condvar.notify_all();
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "dropping undelivered events");
        }
        drop(dropped);

        if self.is_delivery_thread() {
            return;
        }
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::error!("event delivery thread panicked");
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.lock().aborted
    }

    /// Whether the caller is running on the delivery thread.
    pub fn is_delivery_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.shared.lock().events.len()
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.abort();
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("EventQueue")
            .field("pending", &state.events.len())
            .field("aborted", &state.aborted)
            .finish()
    }
}

fn run(shared: &Shared) {
    while let Some(event) = shared.next() {
        if panic::catch_unwind(AssertUnwindSafe(event)).is_err() {
            tracing::error!("event callback panicked");
        }
    }
    tracing::debug!("event delivery thread exiting");
}
