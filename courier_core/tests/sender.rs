//! End-to-end tests for `HttpSender` against a local collector.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use courier_core::{
    BuildError, CallOutcome, CallState, ClientRegistry, Config, EncodedPayload, HttpSender,
    SkipReason, TransportError,
};
use flate2::read::GzDecoder;

mod common;

use common::Collector;

const PREFIX: &str = "reporter.tracing.sender";
const SPANS: &[u8] = br#"[{"traceId":"5af7183fb1d4cf5f","id":"5af7183fb1d4cf5f","name":"get /api"}]"#;

fn config(url: &str) -> Config {
    Config::new().with("reporter.tracing.sender.url", url)
}

fn sender(config: Config) -> HttpSender {
    HttpSender::init_with_registry(config, PREFIX, ClientRegistry::new()).unwrap()
}

fn gunzip(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out).unwrap();
    out
}

#[test]
fn test_send_carries_b3_marker_and_content_type() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/api/v2/spans")));

    let call = sender.send(EncodedPayload::json(SPANS.to_vec()));
    assert_eq!(call.wait(), CallOutcome::Delivered { status: 202 });

    let requests = collector.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/v2/spans");
    assert_eq!(request.header("b3"), Some("0"));
    assert_eq!(request.header("content-type"), Some("application/json"));
}

#[test]
fn test_bootstrap_server_and_relative_url() {
    let collector = Collector::start();
    let config = Config::new()
        .with("reporter.outputServer.bootstrapServer", collector.url(""))
        .with("reporter.tracing.sender.url", "/api/v2/spans");
    let sender = sender(config);

    assert!(sender.send(EncodedPayload::json(SPANS.to_vec())).wait().is_success());
    assert_eq!(collector.requests()[0].path, "/api/v2/spans");
}

#[test]
fn test_invalid_url_is_unavailable_and_silent() {
    let collector = Collector::start();
    let sender = sender(config("not a url"));

    assert!(!sender.is_available());
    let call = sender.send(EncodedPayload::json(SPANS.to_vec()));
    assert_eq!(call.state(), CallState::Succeeded);
    assert_eq!(call.wait(), CallOutcome::Skipped(SkipReason::Disabled));

    assert!(sender.client().is_none());
    assert!(sender.registry().is_empty());
    assert!(collector.requests().is_empty());
}

#[test]
fn test_empty_url_is_unavailable() {
    let sender = sender(Config::new());
    assert!(!sender.is_available());
    assert_eq!(
        sender.send(EncodedPayload::json(SPANS.to_vec())).wait(),
        CallOutcome::Skipped(SkipReason::Disabled)
    );
}

#[test]
fn test_compressed_body_is_gzip_of_payload() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/spans")));

    sender.send(EncodedPayload::json(SPANS.to_vec())).wait();

    let request = &collector.requests()[0];
    assert_eq!(request.header("content-encoding"), Some("gzip"));
    assert_eq!(gunzip(&request.body), SPANS);
}

#[test]
fn test_uncompressed_body_is_verbatim() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/spans")).with("reporter.tracing.sender.compress", "false"));

    sender.send(EncodedPayload::json(SPANS.to_vec())).wait();

    let request = &collector.requests()[0];
    assert_eq!(request.header("content-encoding"), None);
    assert_eq!(request.body, SPANS);
}

#[test]
fn test_basic_auth_header() {
    let collector = Collector::start();
    let sender = sender(
        config(&collector.url("/spans"))
            .with("reporter.outputServer.username", "agent")
            .with("reporter.outputServer.password", "secret"),
    );

    sender.send(EncodedPayload::json(SPANS.to_vec())).wait();

    /* base64("agent:secret") */
    assert_eq!(
        collector.requests()[0].header("authorization"),
        Some("Basic YWdlbnQ6c2VjcmV0")
    );
}

#[test]
fn test_identical_identity_shares_client() {
    let collector = Collector::start();
    let registry = ClientRegistry::new();
    let config = config(&collector.url("/spans"))
        .with("reporter.tracing.sender.username", "agent")
        .with("reporter.tracing.sender.password", "secret");

    let a = HttpSender::init_with_registry(config.clone(), PREFIX, registry.clone()).unwrap();
    let b = HttpSender::init_with_registry(config, PREFIX, registry.clone()).unwrap();

    let (ca, cb) = (a.client().unwrap(), b.client().unwrap());
    assert!(Arc::ptr_eq(&ca, &cb));
    assert_eq!(ca.id(), cb.id());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_global_registry_shares_across_senders() {
    let collector = Collector::start();
    let config = config(&collector.url("/global-registry"));

    let a = HttpSender::init(config, PREFIX).unwrap();

    /* A different prefix resolving to the same url, user and password. */
    let c = HttpSender::init(
        Config::new().with("reporter.metric.sender.url", collector.url("/global-registry")),
        "reporter.metric.sender",
    )
    .unwrap();

    assert!(Arc::ptr_eq(&a.client().unwrap(), &c.client().unwrap()));
    a.close();
}

#[test]
fn test_renewal_on_url_change() {
    let first = Collector::start();
    let second = Collector::start();
    let sender = sender(config(&first.url("/spans")));
    let old = sender.client().unwrap();

    sender
        .update_configs([("reporter.tracing.sender.url", second.url("/spans"))])
        .unwrap();

    let new = sender.client().unwrap();
    assert_ne!(old.id(), new.id());
    assert!(!old.is_accepting());
    assert!(!sender.registry().contains(old.identity()));

    sender.send(EncodedPayload::json(SPANS.to_vec())).wait();
    assert!(first.requests().is_empty());
    assert_eq!(second.requests().len(), 1);
}

#[test]
fn test_renewal_on_credential_change() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/spans")));
    let old = sender.client().unwrap();

    sender
        .update_configs([
            ("reporter.tracing.sender.username", "agent"),
            ("reporter.tracing.sender.password", "secret"),
        ])
        .unwrap();

    let new = sender.client().unwrap();
    assert_ne!(old.id(), new.id());
    assert!(!old.is_accepting());
}

#[test]
fn test_renewal_on_tls_change_keeps_identity_but_replaces_client() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/spans")));
    let old = sender.client().unwrap();

    sender
        .update_configs([("reporter.outputServer.tls.cert", "-----BEGIN CERTIFICATE-----")])
        .unwrap();

    let new = sender.client().unwrap();
    assert_eq!(old.identity(), new.identity());
    assert_ne!(old.id(), new.id());
    assert!(!old.is_accepting());
    assert_eq!(sender.registry().len(), 1);
}

#[test]
fn test_retired_client_rejects_submissions() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/spans")));
    let old = sender.client().unwrap();

    sender
        .update_configs([("reporter.tracing.sender.url", collector.url("/v2"))])
        .unwrap();

    let request = courier_core::OutboundRequest {
        url: collector.url("/spans"),
        headers: vec![("b3", "0".into())],
        body: SPANS.to_vec(),
    };
    assert!(old.submit(request).is_err());
}

#[test]
fn test_malformed_tls_at_init_fails_construction() {
    let result = HttpSender::init_with_registry(
        config("https://collector/spans")
            .with("reporter.outputServer.tls.enable", "true")
            .with("reporter.outputServer.tls.ca_cert", "garbage")
            .with("reporter.outputServer.tls.cert", "garbage")
            .with("reporter.outputServer.tls.key", "garbage"),
        PREFIX,
        ClientRegistry::new(),
    );
    assert!(matches!(result, Err(BuildError::TlsMaterial(_))));
}

#[test]
fn test_saturated_dispatcher_blocks_submitter() {
    let collector = Collector::with_delay(Duration::from_millis(300));
    let sender = sender(
        config(&collector.url("/spans")).with("reporter.tracing.sender.maxRequests", "2"),
    );

    let started = Instant::now();
    let calls: Vec<_> = (0..4)
        .map(|_| sender.send(EncodedPayload::json(SPANS.to_vec())))
        .collect();
    let submit_elapsed = started.elapsed();

    /* Sends three and four had to wait for a worker to free up. */
    assert!(
        submit_elapsed >= Duration::from_millis(250),
        "submissions returned after {submit_elapsed:?}"
    );

    for call in &calls {
        assert_eq!(call.wait(), CallOutcome::Delivered { status: 202 });
    }
    assert!(collector.peak_concurrency() <= 2);
    assert_eq!(collector.requests().len(), 4);
}

#[test]
fn test_close_removes_entry_with_requests_in_flight() {
    let collector = Collector::with_delay(Duration::from_secs(3));
    let sender = sender(config(&collector.url("/spans")));
    let identity = sender.snapshot().identity();

    let call = sender.send(EncodedPayload::json(SPANS.to_vec()));
    /* Let the worker reach the collector. */
    while collector.requests().is_empty() {
        thread::sleep(Duration::from_millis(10));
    }

    let started = Instant::now();
    sender.close();
    assert!(started.elapsed() < Duration::from_millis(2500));

    assert!(!sender.registry().contains(&identity));
    assert_eq!(call.wait(), CallOutcome::Cancelled);
}

#[test]
fn test_network_failure_surfaces_through_call() {
    let sender = sender(config(&common::refused_url("/spans")));

    let outcome = sender.send(EncodedPayload::json(SPANS.to_vec())).wait();
    assert!(
        matches!(outcome, CallOutcome::Failed(TransportError::Network(_))),
        "unexpected outcome {outcome:?}"
    );
}

#[test]
fn test_callback_completion() {
    let collector = Collector::start();
    let sender = sender(config(&collector.url("/spans")));
    let (tx, rx) = std::sync::mpsc::channel();

    sender
        .send(EncodedPayload::json(SPANS.to_vec()))
        .on_complete(move |outcome| tx.send(outcome.clone()).unwrap());

    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, CallOutcome::Delivered { status: 202 });
}

/// Sends a batch every 5 ms until `stop` is set.
fn keep_sending(sender: &HttpSender, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        sender.send(EncodedPayload::json(SPANS.to_vec()));
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_sends_during_renewal_switch_to_new_credentials() {
    let collector = Collector::with_delay(Duration::from_millis(300));
    let sender = sender(
        config(&collector.url("/spans"))
            .with("reporter.tracing.sender.username", "u")
            .with("reporter.tracing.sender.password", "old"),
    );
    let old_identity = sender.snapshot().identity();
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| keep_sending(&sender, &stop));
        thread::sleep(Duration::from_millis(50));
        sender
            .update_configs([("reporter.tracing.sender.password", "new")])
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::SeqCst);
    });

    let new_identity = sender.snapshot().identity();
    assert_eq!(sender.client().unwrap().identity(), &new_identity);
    assert!(sender.registry().contains(&new_identity));
    assert!(!sender.registry().contains(&old_identity));

    let call = sender.send(EncodedPayload::json(SPANS.to_vec()));
    assert_eq!(call.wait(), CallOutcome::Delivered { status: 202 });

    /* base64("u:new") */
    assert!(collector
        .requests()
        .iter()
        .any(|request| request.header("authorization") == Some("Basic dTpuZXc=")));
}

#[test]
fn test_sends_during_url_renewal_follow_new_url() {
    let first = Collector::with_delay(Duration::from_millis(300));
    let second = Collector::start();
    let sender = sender(config(&first.url("/a")));
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| keep_sending(&sender, &stop));
        thread::sleep(Duration::from_millis(50));
        sender
            .update_configs([("reporter.tracing.sender.url", second.url("/b"))])
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::SeqCst);
    });

    let client = sender.client().unwrap();
    assert_eq!(client.identity().url(), second.url("/b"));
    assert_eq!(sender.registry().len(), 1);
}

#[test]
fn test_sends_during_close_do_not_republish() {
    let collector = Collector::with_delay(Duration::from_millis(300));
    let sender = sender(config(&collector.url("/spans")));
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| keep_sending(&sender, &stop));
        thread::sleep(Duration::from_millis(50));
        sender.close();
        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::SeqCst);
    });

    assert!(sender.registry().is_empty());
    assert!(sender.client().is_none());
    assert!(matches!(
        sender.send(EncodedPayload::json(SPANS.to_vec())).wait(),
        CallOutcome::Failed(TransportError::Rejected(_))
    ));
}
