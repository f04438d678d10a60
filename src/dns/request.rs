//! Request completion bookkeeping.
//!
//! A resolution request ends exactly once: either its callback runs with the
//! result, or the caller orphans it and the callback is dropped unrun. The
//! two sides race through a single compare-and-swap on the request state;
//! whoever moves it out of `PENDING` owns the outcome and the loser does
//! nothing. The callback is never invoked while a lock is held, so it may
//! freely start or orphan other requests.

use crate::base::neterror::NetError;
use crate::dns::address::Addresses;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback receiving the outcome of an asynchronous resolution.
pub type OnDone = Box<dyn FnOnce(Result<Addresses, NetError>) + Send + 'static>;

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const ORPHANED: u8 = 2;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Completed,
    Orphaned,
}

/// Shared completion slot of one request.
pub(crate) struct Completion {
    name: Box<str>,
    state: AtomicU8,
    on_done: Mutex<Option<OnDone>>,
}

impl Completion {
    pub(crate) fn new(name: &str, on_done: OnDone) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: AtomicU8::new(PENDING),
            on_done: Mutex::new(Some(on_done)),
        })
    }

    /// Delivers `result` unless the request was already completed or
    /// orphaned. Returns whether this call delivered it.
    pub(crate) fn complete(&self, result: Result<Addresses, NetError>) -> bool {
        if self
            .state
            .compare_exchange(PENDING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(name = %self.name, "discarding result of finished request");
            return false;
        }
        let on_done = self.take_callback();
        if let Some(on_done) = on_done {
            on_done(result);
        }
        true
    }

    /// Suppresses the callback if it has not fired yet. Returns whether this
    /// call did the suppressing.
    pub(crate) fn orphan(&self) -> bool {
        if self
            .state
            .compare_exchange(PENDING, ORPHANED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        tracing::debug!(name = %self.name, "orphaned resolution request");
        drop(self.take_callback());
        true
    }

    pub(crate) fn state(&self) -> RequestState {
        match self.state.load(Ordering::Acquire) {
            PENDING => RequestState::Pending,
            COMPLETED => RequestState::Completed,
            _ => RequestState::Orphaned,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state() == RequestState::Pending
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn take_callback(&self) -> Option<OnDone> {
        self.on_done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Caller's handle on an in-flight resolution.
///
/// Dropping the handle does not cancel the request; call
/// [`orphan`](Self::orphan) to stop the callback from firing. A timeout is
/// built by racing the request against a timer and orphaning on expiry.
#[must_use = "a request can only be orphaned through its handle"]
pub struct RequestHandle {
    completion: Arc<Completion>,
}

impl RequestHandle {
    pub(crate) fn new(completion: Arc<Completion>) -> Self {
        Self { completion }
    }

    /// Detaches interest in the result. Idempotent and non-blocking: an
    /// in-flight lookup runs to the end but its result is dropped. Returns
    /// `true` if this call prevented the callback, `false` if the request
    /// had already completed or been orphaned.
    pub fn orphan(&self) -> bool {
        self.completion.orphan()
    }

    pub fn state(&self) -> RequestState {
        self.completion.state()
    }

    pub fn name(&self) -> &str {
        self.completion.name()
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::address::ResolvedAddress;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    fn counting(calls: &Arc<AtomicUsize>) -> OnDone {
        let calls = Arc::clone(calls);
        Box::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn one_address() -> Addresses {
        vec![ResolvedAddress::new("127.0.0.1:80".parse().unwrap())]
    }

    #[test]
    fn test_complete_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let completion = Completion::new("example.com", counting(&calls));

        assert!(completion.complete(Ok(one_address())));
        assert!(!completion.complete(Ok(one_address())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(completion.state(), RequestState::Completed);
    }

    #[test]
    fn test_orphan_before_completion_suppresses_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let completion = Completion::new("example.com", counting(&calls));
        let handle = RequestHandle::new(Arc::clone(&completion));

        assert!(handle.orphan());
        assert!(!handle.orphan());
        assert!(!completion.complete(Ok(one_address())));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), RequestState::Orphaned);
    }

    #[test]
    fn test_orphan_after_completion_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let completion = Completion::new("example.com", counting(&calls));
        let handle = RequestHandle::new(Arc::clone(&completion));

        assert!(completion.complete(Err(NetError::lookup_failed("example.com", "nope"))));
        assert!(!handle.orphan());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), RequestState::Completed);
    }

    #[test]
    fn test_callback_may_orphan_from_inside() {
        let other = Completion::new("other", Box::new(|_| panic!("orphaned")));
        let other_handle = RequestHandle::new(Arc::clone(&other));
        let completion = Completion::new(
            "example.com",
            Box::new(move |_| {
                assert!(other_handle.orphan());
            }),
        );
        assert!(completion.complete(Ok(one_address())));
        assert_eq!(other.state(), RequestState::Orphaned);
    }

    #[test]
    fn test_race_has_exactly_one_winner() {
        for _ in 0..200 {
            let calls = Arc::new(AtomicUsize::new(0));
            let completion = Completion::new("race", counting(&calls));
            let handle = RequestHandle::new(Arc::clone(&completion));
            let barrier = Arc::new(Barrier::new(2));

            let completer = {
                let barrier = Arc::clone(&barrier);
                let completion = Arc::clone(&completion);
                thread::spawn(move || {
                    barrier.wait();
                    completion.complete(Ok(one_address()))
                })
            };
            barrier.wait();
            let orphaned = handle.orphan();
            let completed = completer.join().unwrap();

            assert!(orphaned ^ completed);
            assert_eq!(calls.load(Ordering::SeqCst), usize::from(completed));
        }
    }
}
