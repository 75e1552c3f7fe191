/**
 * HTTP client construction and the `ureq`-backed exchange.
 *
 * Uses `ureq`, a pure-Rust blocking HTTP client with no async runtime.
 * Dispatcher workers are dedicated threads, so blocking I/O is what we
 * want there.
 *
 * `prepare_client` does all the expensive, fallible work of building a
 * client: timeouts, the auth middleware, TLS parsing. It runs outside the
 * registry lock. The dispatcher is only attached once the registry has
 * decided to publish.
 */
use std::io::BufReader;
use std::sync::Arc;

use rustls_pemfile::Item;
use ureq::http::{header, HeaderValue, Request, Response};
use ureq::middleware::{Middleware, MiddlewareNext};
use ureq::tls::{Certificate, ClientCert, PrivateKey, RootCerts, TlsConfig};
use ureq::{Agent, Body, SendBody};

use super::dispatcher::Exchange;
use super::request::OutboundRequest;
use crate::config::SenderConfig;
use crate::error::{BuildError, TransportError};
use crate::protocol::types::Identity;

// ---------------------------------------------------------------------------
// PreparedClient
// ---------------------------------------------------------------------------

/**
 * A configured agent that has not been published yet.
 *
 * Dropping it is free. No threads exist until a dispatcher is attached.
 */
pub struct PreparedClient {
    pub(crate) identity: Identity,
    pub(crate) agent: Agent,
    pub(crate) max_requests: usize,
}

/**
 * Builds the HTTP agent for `config`.
 *
 * - connect / send / receive timeouts all set to the resolved timeout;
 * - `Authorization` middleware when auth is active;
 * - mutual TLS trusting exactly the configured CA when TLS is enabled.
 *
 * # Errors
 * `BuildError` when TLS is enabled and its material is missing or
 * malformed, or when the credential cannot be a header value.
 */
pub fn prepare_client(config: &SenderConfig) -> Result<PreparedClient, BuildError> {
    let timeout = Some(config.timeout());

    let mut builder = Agent::config_builder()
        .timeout_connect(timeout)
        .timeout_send_request(timeout)
        .timeout_send_body(timeout)
        .timeout_recv_response(timeout)
        .timeout_recv_body(timeout)
        .http_status_as_error(false)
        .max_idle_connections_per_host(config.max_requests());

    if let Some(credential) = config.credential() {
        let value = HeaderValue::from_str(credential).map_err(|_| BuildError::InvalidCredential)?;
        builder = builder.middleware(BasicAuth { credential: value });
    }

    if config.tls_enabled() {
        builder = builder.tls_config(tls_config(config)?);
    }

    let agent: Agent = builder.build().into();

    Ok(PreparedClient {
        identity: config.identity(),
        agent,
        max_requests: config.max_requests(),
    })
}

// ---------------------------------------------------------------------------
// Auth middleware
// ---------------------------------------------------------------------------

/**
 * Sets `Authorization` on every request passing through the agent,
 * overwriting whatever the request carried.
 */
struct BasicAuth {
    credential: HeaderValue,
}

impl Middleware for BasicAuth {
    fn handle(
        &self,
        mut request: Request<SendBody>,
        next: MiddlewareNext,
    ) -> Result<Response<Body>, ureq::Error> {
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, self.credential.clone());
        next.handle(request)
    }
}

// ---------------------------------------------------------------------------
// TLS
// ---------------------------------------------------------------------------

/**
 * Parses the PEM material into a TLS config for mutual TLS.
 *
 * The CA becomes the only trust root. The client certificate and the
 * PKCS#8 private key are presented as the client identity.
 */
fn tls_config(config: &SenderConfig) -> Result<TlsConfig, BuildError> {
    let ca_pem = config
        .tls_ca_cert()
        .ok_or(BuildError::MissingTlsMaterial("tls.ca_cert"))?;
    let cert_pem = config
        .tls_cert()
        .ok_or(BuildError::MissingTlsMaterial("tls.cert"))?;
    let key_pem = config
        .tls_key()
        .ok_or(BuildError::MissingTlsMaterial("tls.key"))?;

    let roots = parse_certificates(ca_pem, "CA certificate")?;
    let chain = parse_certificates(cert_pem, "client certificate")?;
    let key = parse_private_key(key_pem)?;

    Ok(TlsConfig::builder()
        .root_certs(RootCerts::Specific(Arc::new(roots)))
        .client_cert(Some(ClientCert::new_with_certs(&chain, key)))
        .build())
}

fn parse_certificates(pem: &str, what: &str) -> Result<Vec<Certificate<'static>>, BuildError> {
    let mut reader = BufReader::new(pem.as_bytes());
    let ders = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BuildError::TlsMaterial(format!("failed to parse {what}: {e}")))?;

    if ders.is_empty() {
        return Err(BuildError::TlsMaterial(format!("no {what} found in PEM")));
    }

    Ok(ders
        .iter()
        .map(|der| Certificate::from_der(der.as_ref()).to_owned())
        .collect())
}

/**
 * Accepts only a PKCS#8 (`BEGIN PRIVATE KEY`) key.
 *
 * `ureq` loads the first private key in the PEM, so that first key must be
 * the PKCS#8 one.
 */
fn parse_private_key(pem: &str) -> Result<PrivateKey<'static>, BuildError> {
    let mut reader = BufReader::new(pem.as_bytes());
    let first_key = rustls_pemfile::read_all(&mut reader)
        .find_map(|item| match item {
            Ok(Item::Pkcs8Key(_)) => Some(Ok(true)),
            Ok(Item::Pkcs1Key(_) | Item::Sec1Key(_)) => Some(Ok(false)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .transpose()
        .map_err(|e| BuildError::TlsMaterial(format!("failed to parse private key: {e}")))?;

    if first_key != Some(true) {
        return Err(BuildError::TlsMaterial("no PKCS#8 private key found in PEM".into()));
    }

    PrivateKey::from_pem(pem.as_bytes())
        .map_err(|e| BuildError::TlsMaterial(format!("failed to load private key: {e}")))
}

// ---------------------------------------------------------------------------
// HttpExchange
// ---------------------------------------------------------------------------

/// Largest response body read back from the collector. Anything bigger is
/// abandoned along with its connection.
const DRAIN_LIMIT: u64 = 64 * 1024;

/**
 * `Exchange` backed by a `ureq::Agent`. Cloning the agent shares its
 * connection pool.
 */
pub struct HttpExchange {
    agent: Agent,
}

impl HttpExchange {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }
}

impl Exchange for HttpExchange {
    fn execute(&self, request: &OutboundRequest) -> Result<u16, TransportError> {
        let mut builder = self.agent.post(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send(request.body.as_slice())?;
        let status = response.status().as_u16();

        /* Drain the body so the connection can go back to the pool. */
        let mut body = response.into_body();
        if let Err(err) = body.with_config().limit(DRAIN_LIMIT).read_to_vec() {
            tracing::trace!(status, error = %err, "response body not drained");
        }

        Ok(status)
    }
}
