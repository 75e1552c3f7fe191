/**
 * `Call` — the handle for one submitted export request.
 *
 * A call starts `Pending` and completes exactly once, to `Succeeded`,
 * `Failed`, or `Cancelled`. The first completion wins. Later attempts,
 * such as a worker finishing an exchange whose call was already
 * cancelled, are ignored.
 *
 * Waiting uses a `Mutex` + `Condvar` pair: the
 * completing side stores the outcome and notifies; waiters block with or
 * without a timeout.
 */
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::TransportError;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/**
 * Why a call was completed locally without touching the network.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The sender's snapshot is disabled (no URL, bad URL, switched off).
    Disabled,
    /// Building the request failed locally, e.g. compression I/O error.
    AssemblyFailed,
}

/**
 * Final result of a call.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The collector answered with a 2xx status.
    Delivered { status: u16 },
    /// Nothing was sent; reported as a success to callers.
    Skipped(SkipReason),
    Failed(TransportError),
    Cancelled,
}

impl CallOutcome {
    /// `true` for delivered and skipped calls.
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Delivered { .. } | CallOutcome::Skipped(_))
    }

    pub fn state(&self) -> CallState {
        match self {
            CallOutcome::Delivered { .. } | CallOutcome::Skipped(_) => CallState::Succeeded,
            CallOutcome::Failed(_) => CallState::Failed,
            CallOutcome::Cancelled => CallState::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

type Callback = Box<dyn FnOnce(&CallOutcome) + Send>;

struct Slot {
    outcome: Option<CallOutcome>,
    callbacks: Vec<Callback>,
}

struct Shared {
    id: u64,
    slot: Mutex<Slot>,
    condvar: Condvar,
}

/**
 * Cancellable handle for an in-flight (or already finished) request.
 *
 * Cloning a `Call` yields another handle to the same request.
 */
#[derive(Clone)]
pub struct Call {
    shared: Arc<Shared>,
}

impl Call {
    pub(crate) fn pending() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed),
                slot: Mutex::new(Slot {
                    outcome: None,
                    callbacks: Vec::new(),
                }),
                condvar: Condvar::new(),
            }),
        }
    }

    fn completed(outcome: CallOutcome) -> Self {
        let call = Self::pending();
        call.complete(outcome);
        call
    }

    /**
     * A no-op call, already succeeded, used when no network action is
     * taken. The reason stays visible through `outcome()`.
     */
    pub fn skipped(reason: SkipReason) -> Self {
        Self::completed(CallOutcome::Skipped(reason))
    }

    /// An already-failed call.
    pub fn failed(error: TransportError) -> Self {
        Self::completed(CallOutcome::Failed(error))
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /**
     * Stores `outcome` if the call is still pending, wakes waiters and
     * runs registered callbacks. Returns `false` when the call had
     * already completed.
     */
    pub(crate) fn complete(&self, outcome: CallOutcome) -> bool {
        let callbacks = {
            let mut slot = self.lock();
            if slot.outcome.is_some() {
                return false;
            }
            slot.outcome = Some(outcome.clone());
            self.shared.condvar.notify_all();
            std::mem::take(&mut slot.callbacks)
        };

        /* Callbacks run outside the lock so they may inspect the call. */
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    /**
     * Cancels the call. A worker that has not picked it up yet skips it; a
     * worker mid-exchange has its eventual result discarded.
     *
     * Returns `false` when the call had already completed.
     */
    pub fn cancel(&self) -> bool {
        self.complete(CallOutcome::Cancelled)
    }

    pub fn state(&self) -> CallState {
        self.lock()
            .outcome
            .as_ref()
            .map_or(CallState::Pending, CallOutcome::state)
    }

    pub fn is_done(&self) -> bool {
        self.lock().outcome.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == CallState::Cancelled
    }

    /// The outcome, if the call has completed.
    pub fn outcome(&self) -> Option<CallOutcome> {
        self.lock().outcome.clone()
    }

    /**
     * Blocks until the call completes.
     */
    pub fn wait(&self) -> CallOutcome {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = &slot.outcome {
                return outcome.clone();
            }
            slot = self
                .shared
                .condvar
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /**
     * Blocks until the call completes or `timeout` elapses.
     *
     * # Returns
     * `Some(outcome)` if the call completed in time, `None` otherwise.
     */
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CallOutcome> {
        let guard = self.lock();
        let (guard, _) = self
            .shared
            .condvar
            .wait_timeout_while(guard, timeout, |slot| slot.outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);

        guard.outcome.clone()
    }

    /**
     * Registers a completion callback.
     *
     * If the call already completed, `callback` runs immediately on the
     * current thread. Otherwise it runs on whichever thread completes the
     * call (usually a dispatcher worker).
     */
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&CallOutcome) + Send + 'static,
    {
        let mut slot = self.lock();
        match slot.outcome.clone() {
            Some(outcome) => {
                drop(slot);
                callback(&outcome);
            }
            None => slot.callbacks.push(Box::new(callback)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}
