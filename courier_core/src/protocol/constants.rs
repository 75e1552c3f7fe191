/**
 * Wire-level and configuration constants.
 *
 * Header names and values that every outbound request carries, plus the
 * configuration keys and defaults the resolver falls back to.
 */
use std::time::Duration;

// ---------------------------------------------------------------------------
// Wire
// ---------------------------------------------------------------------------

/// Name reported by `HttpSender::name()`.
pub const SENDER_NAME: &str = "http";

/// B3 single-header sampling marker. `0` tells instrumented proxies that
/// understand B3 (Envoy and friends) not to trace the export request itself,
/// which would otherwise amplify into more spans on every hop.
pub const B3_HEADER: &str = "b3";
pub const B3_NOT_SAMPLED: &str = "0";

pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const GZIP: &str = "gzip";

pub const JSON_CONTENT_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Configuration keys
// ---------------------------------------------------------------------------

/// Root of the shared output-server settings.
pub const OUTPUT_SERVER: &str = "reporter.outputServer";

pub const BOOTSTRAP_SERVERS: &str = "reporter.outputServer.bootstrapServer";
pub const OUTPUT_SERVERS_ENABLE: &str = "reporter.outputServer.enabled";
pub const OUTPUT_SERVERS_TIMEOUT: &str = "reporter.outputServer.timeout";

pub const TLS_ENABLE: &str = "reporter.outputServer.tls.enable";
/// Client private key; must be PKCS#8 PEM.
pub const TLS_KEY: &str = "reporter.outputServer.tls.key";
pub const TLS_CERT: &str = "reporter.outputServer.tls.cert";
pub const TLS_CA_CERT: &str = "reporter.outputServer.tls.ca_cert";

/// Per-sender key suffixes, joined onto the sender prefix.
pub const ENABLED_KEY: &str = "enabled";
pub const URL_KEY: &str = "url";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const COMPRESS_KEY: &str = "compress";
pub const MAX_REQUESTS_KEY: &str = "maxRequests";

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Floor for connect/read/write timeouts. Configured values below it are
/// raised to it.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(30_000);

pub const DEFAULT_MAX_REQUESTS: usize = 65;

pub const DEFAULT_COMPRESS: bool = true;

/// Grace window given to in-flight requests on renewal and close before
/// the remainder is cancelled.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Idle time after which a dispatcher worker thread retires.
pub const WORKER_KEEP_ALIVE: Duration = Duration::from_secs(60);
