/**
 * `ClientRegistry` — managed clients keyed by `Identity`.
 *
 * Guarantees at most one published client per identity. Building a client
 * (agent, timeouts, TLS parsing) happens outside the lock. Only the
 * "is one already published? if not, publish mine" decision is serialized,
 * by a single mutex. Identities change on configuration events, not per
 * request, so contention on that mutex is negligible.
 *
 * Clients are shared without reference counting. Retiring an identity
 * tears its client down for every sender using it.
 */
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use super::client::ManagedClient;
use super::http::prepare_client;
use crate::config::SenderConfig;
use crate::error::BuildError;
use crate::protocol::types::Identity;

// ---------------------------------------------------------------------------
// Process-wide default
// ---------------------------------------------------------------------------

static GLOBAL_REGISTRY: OnceLock<Arc<ClientRegistry>> = OnceLock::new();

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<Identity, Arc<ManagedClient>>>,
}

impl ClientRegistry {
    /**
     * Creates an isolated registry. Senders built with it never share
     * clients with senders using any other registry.
     */
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /**
     * The registry shared by every sender created with `HttpSender::init`.
     */
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.get_or_init(ClientRegistry::new).clone()
    }

    pub fn get(&self, identity: &Identity) -> Option<Arc<ManagedClient>> {
        self.lock().get(identity).cloned()
    }

    /**
     * Returns the client published for `config`'s identity, building and
     * publishing one if none exists.
     *
     * If another thread publishes first while this one is building, the
     * freshly built client is dropped unpublished and the winner is
     * returned.
     *
     * # Errors
     * `BuildError` from client construction (TLS material, credential).
     */
    pub fn get_or_build(&self, config: &SenderConfig) -> Result<Arc<ManagedClient>, BuildError> {
        let identity = config.identity();
        if let Some(existing) = self.get(&identity) {
            return Ok(existing);
        }

        /*
         * Expensive and fallible: done without holding the lock.
         */
        let prepared = prepare_client(config)?;

        let mut clients = self.lock();
        if let Some(existing) = clients.get(&identity) {
            tracing::debug!(identity = %identity, "client published concurrently, discarding ours");
            return Ok(existing.clone());
        }

        let client = Arc::new(ManagedClient::publish(prepared));
        clients.insert(identity, client.clone());
        tracing::info!(
            identity = %client.identity(),
            client = client.id(),
            max_requests = config.max_requests(),
            "transport client published"
        );
        Ok(client)
    }

    /**
     * Unpublishes the client for `identity` without shutting it down.
     */
    pub fn remove(&self, identity: &Identity) -> Option<Arc<ManagedClient>> {
        self.lock().remove(identity)
    }

    /**
     * Removes the client for `identity`, stops it from accepting work,
     * waits up to `grace` for in-flight requests, then cancels the rest.
     *
     * The entry is gone before draining starts, so a replacement can be
     * published as soon as this returns.
     *
     * # Returns
     * `true` if a client was registered under `identity`.
     */
    pub fn retire(&self, identity: &Identity, grace: Duration) -> bool {
        let Some(client) = self.remove(identity) else {
            return false;
        };

        let drained = client.shutdown(grace);
        tracing::info!(identity = %identity, client = client.id(), drained, "transport client retired");
        true
    }

    /**
     * Retires every registered client.
     */
    pub fn close_all(&self, grace: Duration) {
        let clients: Vec<_> = self.lock().drain().collect();
        for (identity, client) in clients {
            let drained = client.shutdown(grace);
            tracing::info!(identity = %identity, client = client.id(), drained, "transport client retired");
        }
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.lock().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Identity, Arc<ManagedClient>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
