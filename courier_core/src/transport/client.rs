/**
 * `ManagedClient` — one published HTTP agent plus its dispatcher.
 *
 * Shared read-only by every sender whose snapshot resolves to the same
 * `Identity`, for as long as it stays in the registry.
 */
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::call::Call;
use super::dispatcher::Dispatcher;
use super::http::{HttpExchange, PreparedClient};
use super::request::OutboundRequest;
use crate::error::SubmitError;
use crate::protocol::types::Identity;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

pub struct ManagedClient {
    id: u64,
    identity: Identity,
    dispatcher: Dispatcher,
}

impl ManagedClient {
    /**
     * Attaches a dispatcher to a prepared agent. Called by the registry
     * only once it has decided to publish this client.
     */
    pub(crate) fn publish(prepared: PreparedClient) -> Self {
        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        let exchange = Arc::new(HttpExchange::new(prepared.agent));
        let dispatcher = Dispatcher::new(id.to_string(), prepared.max_requests, exchange);

        Self {
            id,
            identity: prepared.identity,
            dispatcher,
        }
    }

    /// Process-unique id, distinct for every client ever published.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /**
     * Submits an assembled request. May block under backpressure.
     */
    pub fn submit(&self, request: OutboundRequest) -> Result<Call, SubmitError> {
        self.dispatcher.submit(request)
    }

    pub fn is_accepting(&self) -> bool {
        self.dispatcher.is_accepting()
    }

    /**
     * Stop accepting, wait up to `grace`, then cancel what is left.
     */
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.dispatcher.shutdown_gracefully(grace)
    }
}

impl fmt::Debug for ManagedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedClient")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("max_requests", &self.dispatcher.max_requests())
            .finish()
    }
}
