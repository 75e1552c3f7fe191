/**
 * Bounded worker pool that executes outbound requests.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌───────────────┐   zero-capacity channel   ┌───────────────────┐
 *  │  Submitter    │ ────────── Job ─────────► │  Worker threads   │
 *  │  (send call)  │  (rendezvous handoff)     │  0..=max_requests │
 *  └───────────────┘                           └────────┬──────────┘
 *                                                       │
 *                                               Exchange::execute()
 *                                                       │
 *                                                ┌──────▼──────┐
 *                                                │  Collector   │
 *                                                └─────────────┘
 * ```
 *
 * The handoff channel has no buffer. A submission either meets an idle
 * worker, spawns a new one while the pool is below `max_requests`, or
 * blocks the submitter until a worker frees up. The pool never queues
 * requests in memory. A slow collector slows the producer instead.
 *
 * Idle workers retire after `WORKER_KEEP_ALIVE`. Shutdown stops new
 * submissions and lets idle workers exit right away. `await_termination`
 * waits for busy ones, and `cancel_all` abandons whatever is left.
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, SendTimeoutError, Sender, TrySendError};

use super::call::{Call, CallOutcome};
use super::request::OutboundRequest;
use crate::error::{SubmitError, TransportError};
use crate::protocol::constants::WORKER_KEEP_ALIVE;

/// How often a blocked submitter re-checks for shutdown or a retired worker.
const SATURATION_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Exchange — the seam that actually talks to the network
// ---------------------------------------------------------------------------

/**
 * Performs one request/response exchange on the calling (worker) thread.
 *
 * Returns the HTTP status on any completed exchange, including non-2xx.
 */
pub trait Exchange: Send + Sync + 'static {
    fn execute(&self, request: &OutboundRequest) -> Result<u16, TransportError>;
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

struct Job {
    request: OutboundRequest,
    call: Call,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

struct PoolState {
    workers: usize,
    spawned: u64,
}

struct Inner {
    name: String,
    max_requests: usize,
    keep_alive: Duration,
    exchange: Arc<dyn Exchange>,

    jobs_tx: Sender<Job>,
    jobs_rx: Receiver<Job>,

    /// Dropped on shutdown, which disconnects `shutdown_rx` and wakes
    /// every idle worker.
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    accepting: AtomicBool,

    pool: Mutex<PoolState>,
    terminated: Condvar,

    /// Calls submitted and not yet finished, keyed by call id.
    outstanding: Mutex<HashMap<u64, Call>>,
}

/**
 * Handle to a bounded, non-buffering worker pool. Cheap to clone.
 */
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /**
     * Creates a dispatcher with no workers. Threads are spawned on demand
     * by `submit`.
     *
     * # Arguments
     * * `name` — used in worker thread names.
     * * `max_requests` — maximum concurrent exchanges (at least 1).
     * * `exchange` — performs the network I/O.
     */
    pub fn new(name: impl Into<String>, max_requests: usize, exchange: Arc<dyn Exchange>) -> Self {
        Self::with_keep_alive(name, max_requests, exchange, WORKER_KEEP_ALIVE)
    }

    pub(crate) fn with_keep_alive(
        name: impl Into<String>,
        max_requests: usize,
        exchange: Arc<dyn Exchange>,
        keep_alive: Duration,
    ) -> Self {
        let (jobs_tx, jobs_rx) = crossbeam_channel::bounded(0);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);

        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                max_requests: max_requests.max(1),
                keep_alive,
                exchange,
                jobs_tx,
                jobs_rx,
                shutdown_tx: Mutex::new(Some(shutdown_tx)),
                shutdown_rx,
                accepting: AtomicBool::new(true),
                pool: Mutex::new(PoolState {
                    workers: 0,
                    spawned: 0,
                }),
                terminated: Condvar::new(),
                outstanding: Mutex::new(HashMap::new()),
            }),
        }
    }

    /**
     * Hands `request` to a worker and returns its `Call`.
     *
     * Blocks while every worker is busy and the pool is at
     * `max_requests`. That blocking is the backpressure.
     *
     * # Errors
     * `SubmitError::ShutDown` once `shutdown` has been called (including
     * while this submitter was blocked), `SubmitError::Spawn` if the OS
     * refused a new worker thread.
     */
    pub fn submit(&self, request: OutboundRequest) -> Result<Call, SubmitError> {
        if !self.is_accepting() {
            return Err(SubmitError::ShutDown);
        }

        let call = Call::pending();
        self.inner.track(&call);

        let mut job = Job {
            request,
            call: call.clone(),
        };

        loop {
            /*
             * Step 1: an idle worker blocked in `recv` takes the job
             * immediately through the rendezvous channel.
             */
            job = match self.inner.jobs_tx.try_send(job) {
                Ok(()) => return Ok(call),
                Err(TrySendError::Full(job)) => job,
                Err(TrySendError::Disconnected(_)) => return self.inner.reject(&call),
            };

            /*
             * Step 2: no idle worker. Grow the pool if allowed; the new
             * worker starts with this job.
             */
            job = match self.try_spawn(job) {
                Ok(None) => return Ok(call),
                Ok(Some(job)) => job,
                Err(err) => {
                    self.inner.untrack(&call);
                    call.complete(CallOutcome::Failed(TransportError::Rejected(err.to_string())));
                    return Err(err);
                }
            };

            /*
             * Step 3: saturated. Block until a worker frees up, waking
             * periodically so shutdown (or a retired worker) is noticed.
             */
            tracing::trace!(dispatcher = %self.inner.name, "pool saturated, submitter blocked");
            job = match self.inner.jobs_tx.send_timeout(job, SATURATION_POLL) {
                Ok(()) => return Ok(call),
                Err(SendTimeoutError::Timeout(job)) => job,
                Err(SendTimeoutError::Disconnected(_)) => return self.inner.reject(&call),
            };

            if !self.is_accepting() {
                return self.inner.reject(&call);
            }
        }
    }

    /**
     * Spawns a worker seeded with `job` if the pool has room.
     *
     * Returns the job back when the pool is already at its maximum.
     */
    fn try_spawn(&self, job: Job) -> Result<Option<Job>, SubmitError> {
        let mut pool = self.inner.pool();
        if pool.workers >= self.inner.max_requests {
            return Ok(Some(job));
        }

        pool.spawned += 1;
        let thread_name = format!("courier-dispatch-{}-{}", self.inner.name, pool.spawned);
        let inner = Arc::clone(&self.inner);

        thread::Builder::new()
            .name(thread_name)
            .spawn(move || Inner::run_worker(inner, job))
            .map_err(SubmitError::Spawn)?;

        pool.workers += 1;
        tracing::debug!(dispatcher = %self.inner.name, workers = pool.workers, "worker spawned");
        Ok(None)
    }

    /**
     * Stops accepting submissions. Idle workers exit immediately, busy
     * ones after their current exchange. Blocked submitters give up
     * within one poll interval.
     */
    pub fn shutdown(&self) {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner
            .shutdown_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /**
     * Blocks until every worker thread has exited, or `grace` elapses.
     *
     * # Returns
     * `true` if the pool drained in time.
     */
    pub fn await_termination(&self, grace: Duration) -> bool {
        let pool = self.inner.pool();
        let (pool, _) = self
            .inner
            .terminated
            .wait_timeout_while(pool, grace, |state| state.workers > 0)
            .unwrap_or_else(PoisonError::into_inner);
        pool.workers == 0
    }

    /**
     * Cancels every outstanding call. Returns how many were cancelled.
     */
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Call> = {
            let mut outstanding = self.inner.outstanding();
            outstanding.drain().map(|(_, call)| call).collect()
        };
        drained.iter().filter(|call| call.cancel()).count()
    }

    /**
     * Shutdown, wait up to `grace` for in-flight work, then force-cancel
     * the remainder.
     *
     * # Returns
     * `true` if everything finished within the grace window.
     */
    pub fn shutdown_gracefully(&self, grace: Duration) -> bool {
        self.shutdown();
        if self.await_termination(grace) {
            return true;
        }

        let cancelled = self.cancel_all();
        tracing::warn!(
            dispatcher = %self.inner.name,
            cancelled,
            "grace window elapsed, cancelled outstanding requests"
        );
        false
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Calls submitted and not yet finished or cancelled.
    pub fn in_flight(&self) -> usize {
        self.inner.outstanding().len()
    }

    pub fn worker_count(&self) -> usize {
        self.inner.pool().workers
    }

    pub fn max_requests(&self) -> usize {
        self.inner.max_requests
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl Inner {
    /**
     * Worker thread body: run the seed job, then keep taking jobs until
     * shutdown or `keep_alive` of idleness.
     */
    fn run_worker(inner: Arc<Inner>, first: Job) {
        inner.run_job(first);

        loop {
            select! {
                recv(inner.jobs_rx) -> msg => match msg {
                    Ok(job) => inner.run_job(job),
                    Err(_) => break,
                },
                recv(inner.shutdown_rx) -> _ => break,
                default(inner.keep_alive) => break,
            }
        }

        inner.retire_worker();
    }

    fn run_job(&self, job: Job) {
        /* Cancelled before we got to it. */
        if job.call.is_done() {
            self.untrack(&job.call);
            return;
        }

        /*
         * Guard the exchange with catch_unwind so a panic in the HTTP
         * stack fails this call instead of killing the worker.
         */
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.exchange.execute(&job.request)
        }));

        let outcome = match result {
            Ok(Ok(status)) if (200..300).contains(&status) => CallOutcome::Delivered { status },
            Ok(Ok(status)) => CallOutcome::Failed(TransportError::Status(status)),
            Ok(Err(err)) => CallOutcome::Failed(err),
            Err(_) => {
                tracing::error!(dispatcher = %self.name, "exchange panicked, request failed");
                CallOutcome::Failed(TransportError::Panicked)
            }
        };

        tracing::trace!(dispatcher = %self.name, call = job.call.id(), ?outcome, "exchange finished");
        self.untrack(&job.call);
        job.call.complete(outcome);
    }

    fn retire_worker(&self) {
        let mut pool = self.pool();
        pool.workers = pool.workers.saturating_sub(1);
        tracing::debug!(dispatcher = %self.name, workers = pool.workers, "worker retired");
        if pool.workers == 0 {
            self.terminated.notify_all();
        }
    }

    fn reject(&self, call: &Call) -> Result<Call, SubmitError> {
        self.untrack(call);
        call.complete(CallOutcome::Failed(TransportError::Rejected(
            SubmitError::ShutDown.to_string(),
        )));
        Err(SubmitError::ShutDown)
    }

    fn track(&self, call: &Call) {
        self.outstanding().insert(call.id(), call.clone());
    }

    fn untrack(&self, call: &Call) {
        self.outstanding().remove(&call.id());
    }

    fn pool(&self) -> MutexGuard<'_, PoolState> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outstanding(&self) -> MutexGuard<'_, HashMap<u64, Call>> {
        self.outstanding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
