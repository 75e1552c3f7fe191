/**
 * Minimal harness for the courier transport.
 *
 * Point it at any HTTP endpoint that accepts POSTs (a Zipkin collector,
 * or `nc -lk 9411`) and run:
 *
 *   cargo run -p courier_demo -- http://127.0.0.1:9411
 *   cargo run -p courier_demo -- http://127.0.0.1:9411 --no-compress
 *   cargo run -p courier_demo -- http://127.0.0.1:9411 --auth agent:secret
 *
 * Set `RUST_LOG=courier_core=debug` to watch clients being published,
 * renewed and retired.
 */
use std::time::Duration;

use courier::constants::{BOOTSTRAP_SERVERS, OUTPUT_SERVER};
use courier::{Config, EncodedPayload, HttpSender};

const PREFIX: &str = "reporter.tracing.sender";

const SPANS: &str = r#"[{"traceId":"5af7183fb1d4cf5f","id":"5af7183fb1d4cf5f","name":"demo","timestamp":1700000000000000,"duration":1200,"localEndpoint":{"serviceName":"courier-demo"}}]"#;

fn main() {
    courier::logging::install();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let server = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "http://127.0.0.1:9411".to_string());
    let compress = !args.iter().any(|a| a == "--no-compress");
    let auth = args
        .iter()
        .position(|a| a == "--auth")
        .and_then(|i| args.get(i + 1))
        .and_then(|pair| pair.split_once(':'));

    /*
     * Wire the configuration by hand: shared bootstrap server plus a
     * relative per-sender path.
     */
    let mut config = Config::new()
        .with(BOOTSTRAP_SERVERS, server.as_str())
        .with(format!("{PREFIX}.url"), "/api/v2/spans")
        .with(format!("{PREFIX}.compress"), compress.to_string())
        .with(format!("{PREFIX}.maxRequests"), "4");
    if let Some((user, password)) = auth {
        config.set(format!("{OUTPUT_SERVER}.username"), user);
        config.set(format!("{OUTPUT_SERVER}.password"), password);
    }

    let sender = match HttpSender::init(config, PREFIX) {
        Ok(sender) => sender,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize sender");
            std::process::exit(1);
        }
    };

    if !sender.is_available() {
        tracing::warn!(server = %server, "sender unavailable, sends are no-ops");
    }

    /*
     * Send a handful of batches and wait for each outcome.
     */
    let calls: Vec<_> = (0..8)
        .map(|_| sender.send(EncodedPayload::json(SPANS)))
        .collect();
    for call in calls {
        match call.wait_timeout(Duration::from_secs(35)) {
            Some(outcome) => tracing::info!(call = call.id(), ?outcome, "export finished"),
            None => tracing::warn!(call = call.id(), "export still pending"),
        }
    }

    /*
     * Hot reconfiguration: a new path is a decisive change, so the
     * client is renewed.
     */
    if let Err(err) = sender.update_configs([(format!("{PREFIX}.url"), "/api/v2/spans?renewed=1")]) {
        tracing::error!(error = %err, "reconfiguration failed");
    }
    let outcome = sender.send(EncodedPayload::json(SPANS)).wait();
    tracing::info!(?outcome, "export after renewal finished");

    sender.close();
}
