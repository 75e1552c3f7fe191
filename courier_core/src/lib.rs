/*!
 * Courier Core — the telemetry export transport engine.
 *
 * Delivers already-encoded trace/metric batches to a remote collector over
 * HTTP POST. End users should depend on the `courier` facade crate, which
 * re-exports this crate and adds the logging addon.
 *
 * # Module structure
 *
 * - `config/` — layered key/value store and immutable `SenderConfig` snapshots
 * - `protocol/` — what goes on the wire: payload, identity, headers, defaults
 * - `transport/` — how it gets there: request assembly, calls, the bounded
 *   dispatcher, `ureq` clients and the client registry
 * - `sender` — `HttpSender`: init, send, hot reconfiguration, close
 * - `error` — error enums
 *
 * # Quick start
 *
 * ```ignore
 * use courier_core::{Config, EncodedPayload, HttpSender};
 *
 * let config = Config::new()
 *     .with("reporter.outputServer.bootstrapServer", "http://collector:9411")
 *     .with("reporter.tracing.sender.url", "/api/v2/spans");
 *
 * let sender = HttpSender::init(config, "reporter.tracing.sender")?;
 * let call = sender.send(EncodedPayload::json(encoded_spans));
 * call.on_complete(|outcome| println!("export finished: {outcome:?}"));
 *
 * sender.close();
 * ```
 */

pub mod config;
pub mod error;
pub mod protocol;
pub mod sender;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use config::{Config, SenderConfig, SenderKeys};
pub use error::{BuildError, SubmitError, TransportError};
pub use protocol::types::{EncodedPayload, Identity};
pub use sender::HttpSender;
pub use transport::{
    Call, CallOutcome, CallState, ClientRegistry, Dispatcher, Exchange, ManagedClient,
    OutboundRequest, SkipReason,
};
