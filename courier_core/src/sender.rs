/**
 * `HttpSender` — the transport's public face: send, reconfigure, close.
 *
 * Lifecycle:
 * 1. `HttpSender::init(config, prefix)` resolves the first snapshot and,
 *    if it is enabled, gets or builds the managed client for its identity.
 * 2. `send(payload)` assembles a POST on the calling thread and submits it
 *    to the client's dispatcher. It may block under backpressure.
 * 3. `update_configs(changes)` re-resolves the snapshot. When URL,
 *    credentials, or TLS material change, it retires the old client
 *    before a new one is built.
 * 4. `close()` retires the client registered under the current identity.
 *
 * Snapshot and client are held in `arc-swap` cells. Senders read them
 * without locking, and updates replace them whole. Renewal, `close`, and a
 * send that has to build its own client all run under the configuration
 * mutex. A retired identity is therefore never republished by this sender.
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::config::{Config, SenderConfig, SenderKeys};
use crate::error::{BuildError, TransportError};
use crate::protocol::constants::{SENDER_NAME, SHUTDOWN_GRACE};
use crate::protocol::types::EncodedPayload;
use crate::transport::request::assemble;
use crate::transport::{Call, ClientRegistry, ManagedClient, SkipReason};

pub struct HttpSender {
    prefix: String,
    keys: SenderKeys,
    registry: Arc<ClientRegistry>,

    /// Local copy of the configuration. The mutex also serializes
    /// `update_configs` calls.
    config: Mutex<Config>,

    snapshot: ArcSwap<SenderConfig>,
    client: ArcSwapOption<ManagedClient>,
    closed: AtomicBool,
}

impl HttpSender {
    /**
     * Creates a sender for `prefix` backed by the process-wide registry.
     *
     * # Errors
     * `BuildError` if the snapshot is enabled and its client cannot be
     * built (malformed TLS material). A disabled snapshot is not an error.
     */
    pub fn init(config: Config, prefix: &str) -> Result<Self, BuildError> {
        Self::init_with_registry(config, prefix, ClientRegistry::global())
    }

    /**
     * Same as `init`, with an explicit registry. Senders only share
     * clients with senders using the same registry.
     */
    pub fn init_with_registry(
        config: Config,
        prefix: &str,
        registry: Arc<ClientRegistry>,
    ) -> Result<Self, BuildError> {
        let keys = SenderKeys::new(prefix);
        let snapshot = SenderConfig::resolve(&config, &keys);

        let client = if snapshot.is_enabled() {
            Some(registry.get_or_build(&snapshot)?)
        } else {
            tracing::info!(prefix, url = snapshot.url(), "sender disabled");
            None
        };

        Ok(Self {
            prefix: prefix.to_string(),
            keys,
            registry,
            config: Mutex::new(config),
            snapshot: ArcSwap::from_pointee(snapshot),
            client: ArcSwapOption::new(client),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &'static str {
        SENDER_NAME
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /**
     * Sends one encoded batch and returns its `Call`.
     *
     * Never fails synchronously:
     * - disabled sender → already-succeeded `Skipped(Disabled)` call, no
     *   network contact;
     * - local assembly failure → `Skipped(AssemblyFailed)`;
     * - retired or closed client → failed call (`Rejected`);
     * - network errors → reported later through the call.
     *
     * Blocks while the client's dispatcher is saturated.
     */
    pub fn send(&self, payload: EncodedPayload) -> Call {
        if self.closed.load(Ordering::SeqCst) {
            return Call::failed(closed_error());
        }

        let (snapshot, client) = match self.route() {
            Ok(Some(route)) => route,
            Ok(None) => return Call::skipped(SkipReason::Disabled),
            Err(err) => return Call::failed(err),
        };

        let request = match assemble(&snapshot, payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(prefix = %self.prefix, error = %err, "request assembly failed, batch skipped");
                return Call::skipped(SkipReason::AssemblyFailed);
            }
        };

        match client.submit(request) {
            Ok(call) => call,
            Err(err) => Call::failed(err.into()),
        }
    }

    /**
     * `true` when the current snapshot is enabled: the URL parsed and both
     * enable switches are on.
     */
    pub fn is_available(&self) -> bool {
        self.snapshot.load().is_enabled()
    }

    /**
     * Merges `changes` into the local configuration and applies them.
     *
     * When a decisive field (URL, username, password, TLS CA/cert/key)
     * changed, the client under the previous identity is retired first:
     * removed from the registry, drained for up to the grace window, then
     * cancelled. A replacement is built for the new snapshot if it is
     * enabled.
     *
     * # Errors
     * `BuildError` if the replacement client cannot be built. The new
     * snapshot stays in effect; later sends retry the build.
     */
    pub fn update_configs<I, K, V>(&self, changes: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.update_configs(changes);

        let next = Arc::new(SenderConfig::resolve(&config, &self.keys));
        let previous = self.snapshot.load_full();
        let renew = previous.requires_renewal(&next);

        /*
         * Clear the client before publishing the new snapshot so no send
         * pairs the new snapshot with the old client. Lazy builds in `route`
         * wait on the configuration lock held here until the renewal is done.
         */
        if renew {
            self.client.store(None);
        }
        self.snapshot.store(next.clone());

        if renew {
            tracing::info!(prefix = %self.prefix, from = %previous.identity(), to = %next.identity(), "renewing transport client");
            self.registry.retire(&previous.identity(), SHUTDOWN_GRACE);
        }

        if next.is_enabled() && self.client.load().is_none() && !self.closed.load(Ordering::SeqCst) {
            let client = self.registry.get_or_build(&next).inspect_err(|err| {
                tracing::warn!(prefix = %self.prefix, error = %err, "failed to build renewed transport client");
            })?;
            self.client.store(Some(client));
        }

        Ok(())
    }

    /**
     * Retires the client registered under the current identity: stop
     * accepting, wait up to one second, cancel the rest. Later sends fail
     * with `Rejected`.
     *
     * The client is shared by identity, so this also affects any other
     * sender resolving to the same identity.
     */
    pub fn close(&self) {
        let _config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::SeqCst);
        self.client.store(None);

        let identity = self.snapshot.load().identity();
        self.registry.retire(&identity, SHUTDOWN_GRACE);
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Arc<SenderConfig> {
        self.snapshot.load_full()
    }

    /// Client currently held by this sender, if any.
    pub fn client(&self) -> Option<Arc<ManagedClient>> {
        self.client.load_full()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /**
     * The snapshot and client one send goes through, or `None` when the
     * sender is disabled.
     *
     * The fast path takes the held client when it belongs to the current
     * snapshot. Otherwise (first send after a failed renewal build, after a
     * switch from disabled, or while a renewal is running) the client is
     * built under the configuration lock. That way it never republishes an
     * identity a renewal or `close` has just retired.
     */
    fn route(&self) -> Result<Option<(Arc<SenderConfig>, Arc<ManagedClient>)>, TransportError> {
        let snapshot = self.snapshot.load_full();
        if !snapshot.is_enabled() {
            return Ok(None);
        }
        if let Some(client) = self.client.load_full() {
            if *client.identity() == snapshot.identity() {
                return Ok(Some((snapshot, client)));
            }
        }

        let _config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error());
        }

        /* Under the lock the snapshot and the held client agree. */
        let snapshot = self.snapshot.load_full();
        if !snapshot.is_enabled() {
            return Ok(None);
        }
        if let Some(client) = self.client.load_full() {
            return Ok(Some((snapshot, client)));
        }

        let client = self.registry.get_or_build(&snapshot).map_err(|err| {
            tracing::warn!(prefix = %self.prefix, error = %err, "transport client unavailable");
            TransportError::Rejected(err.to_string())
        })?;
        self.client.store(Some(client.clone()));
        Ok(Some((snapshot, client)))
    }
}

fn closed_error() -> TransportError {
    TransportError::Rejected("sender is closed".into())
}
