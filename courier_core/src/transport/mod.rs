/**
 * Transport layer — everything related to *how* payloads are delivered:
 * - `request` — assembly of an outbound POST (headers, gzip)
 * - `call` — the async handle returned for each submission
 * - `dispatcher` — bounded, non-buffering worker pool (backpressure)
 * - `http` — `ureq` agent construction (timeouts, auth, TLS) and exchange
 * - `client` — a published agent + dispatcher pair
 * - `registry` — publish-once cache of clients keyed by identity
 */

pub mod call;
pub mod client;
pub mod dispatcher;
pub mod http;
pub mod registry;
pub mod request;

pub use call::{Call, CallOutcome, CallState, SkipReason};
pub use client::ManagedClient;
pub use dispatcher::{Dispatcher, Exchange};
pub use http::{prepare_client, HttpExchange, PreparedClient};
pub use registry::ClientRegistry;
pub use request::OutboundRequest;
