/*!
 * Courier — telemetry export transport.
 *
 * This is the crate users should depend on. It re-exports the core
 * transport API and provides the logging addon.
 *
 * # Quick start
 *
 * ```ignore
 * fn main() -> Result<(), courier::BuildError> {
 *     courier::logging::install();
 *
 *     let config = courier::Config::new()
 *         .with("reporter.outputServer.bootstrapServer", "http://collector:9411")
 *         .with("reporter.tracing.sender.url", "/api/v2/spans");
 *
 *     let sender = courier::HttpSender::init(config, "reporter.tracing.sender")?;
 *     let outcome = sender.send(courier::EncodedPayload::json(b"[]".to_vec())).wait();
 *     tracing::info!(?outcome, "export finished");
 *
 *     sender.close();
 *     Ok(())
 * }
 * ```
 */

pub mod logging;

// ---------------------------------------------------------------------------
// Re-exports from courier_core — the public surface area
// ---------------------------------------------------------------------------

pub use courier_core::{
    BuildError, Call, CallOutcome, CallState, ClientRegistry, Config, EncodedPayload,
    HttpSender, Identity, ManagedClient, SenderConfig, SkipReason, TransportError,
};

/// Configuration key names and defaults.
pub use courier_core::protocol::constants;
