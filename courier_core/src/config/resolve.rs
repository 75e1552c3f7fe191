/**
 * Resolution of a `SenderConfig` snapshot from layered configuration keys.
 *
 * Every field is looked up in order: sender-specific key, shared
 * output-server key, hardcoded default. The result is immutable. A new
 * snapshot is resolved on every reconfiguration and swapped in whole, so
 * readers never observe a half-updated configuration.
 */
use std::fmt;
use std::time::Duration;

use url::Url;

use super::store::{join, Config};
use crate::protocol::constants::{
    BOOTSTRAP_SERVERS, COMPRESS_KEY, DEFAULT_COMPRESS, DEFAULT_MAX_REQUESTS, ENABLED_KEY,
    MAX_REQUESTS_KEY, MIN_TIMEOUT, OUTPUT_SERVER, OUTPUT_SERVERS_ENABLE, OUTPUT_SERVERS_TIMEOUT,
    PASSWORD_KEY, TLS_CA_CERT, TLS_CERT, TLS_ENABLE, TLS_KEY, URL_KEY, USERNAME_KEY,
};
use crate::protocol::credential;
use crate::protocol::types::Identity;

// ---------------------------------------------------------------------------
// SenderKeys
// ---------------------------------------------------------------------------

/**
 * Fully-qualified keys for one sender prefix.
 */
#[derive(Debug, Clone)]
pub struct SenderKeys {
    pub enabled: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub compress: String,
    pub max_requests: String,
}

impl SenderKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            enabled: join(prefix, ENABLED_KEY),
            url: join(prefix, URL_KEY),
            username: join(prefix, USERNAME_KEY),
            password: join(prefix, PASSWORD_KEY),
            compress: join(prefix, COMPRESS_KEY),
            max_requests: join(prefix, MAX_REQUESTS_KEY),
        }
    }
}

// ---------------------------------------------------------------------------
// SenderConfig
// ---------------------------------------------------------------------------

/**
 * Immutable configuration snapshot for one sender.
 */
#[derive(Clone, PartialEq, Eq)]
pub struct SenderConfig {
    url: String,
    endpoint: Option<Url>,
    username: Option<String>,
    password: Option<String>,
    credential: Option<String>,
    compress: bool,
    timeout: Duration,
    max_requests: usize,
    tls_enabled: bool,
    tls_ca_cert: Option<String>,
    tls_cert: Option<String>,
    tls_key: Option<String>,
    enabled: bool,
}

impl SenderConfig {
    /**
     * Resolves a snapshot for the sender whose keys are `keys`.
     *
     * Never fails. A missing or unparsable URL, or either enable switch
     * set to `false`, produces a disabled snapshot instead.
     */
    pub fn resolve(config: &Config, keys: &SenderKeys) -> Self {
        let url = resolve_url(config, keys);

        let username = first_non_empty(config, &keys.username, &join(OUTPUT_SERVER, USERNAME_KEY));
        let password = first_non_empty(config, &keys.password, &join(OUTPUT_SERVER, PASSWORD_KEY));

        let compress = config
            .get_bool(&keys.compress)
            .or_else(|| config.get_bool(&join(OUTPUT_SERVER, COMPRESS_KEY)))
            .unwrap_or(DEFAULT_COMPRESS);

        /*
         * Timeout is in milliseconds and only ever raised to the floor,
         * never lowered below it.
         */
        let timeout = config
            .get_int(OUTPUT_SERVERS_TIMEOUT)
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis)
            .map_or(MIN_TIMEOUT, |t| t.max(MIN_TIMEOUT));

        let max_requests = config
            .get_int(&keys.max_requests)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_REQUESTS);

        let mut enabled = config.get_bool(&keys.enabled).unwrap_or(true);
        let mut endpoint = None;

        if url.is_empty() || config.get_bool(OUTPUT_SERVERS_ENABLE) == Some(false) {
            enabled = false;
        } else {
            endpoint = parse_endpoint(&url);
            if endpoint.is_none() {
                tracing::error!(url = %url, "invalid collector url, sender disabled");
                enabled = false;
            }
        }

        let credential = credential::resolve(username.as_deref(), password.as_deref());

        Self {
            url,
            endpoint,
            username,
            password,
            credential,
            compress,
            timeout,
            max_requests,
            tls_enabled: config.get_bool(TLS_ENABLE).unwrap_or(false),
            tls_ca_cert: config.get_non_empty(TLS_CA_CERT).map(str::to_string),
            tls_cert: config.get_non_empty(TLS_CERT).map(str::to_string),
            tls_key: config.get_non_empty(TLS_KEY).map(str::to_string),
            enabled,
        }
    }

    /**
     * Whether moving from `self` to `next` requires tearing down the
     * managed client: any change to URL, credentials, or TLS material.
     */
    pub fn requires_renewal(&self, next: &SenderConfig) -> bool {
        self.url != next.url
            || self.username != next.username
            || self.password != next.password
            || self.tls_ca_cert != next.tls_ca_cert
            || self.tls_cert != next.tls_cert
            || self.tls_key != next.tls_key
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.url.clone(), self.username.clone(), self.password.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parsed endpoint; `None` whenever the URL was empty or invalid.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Precomputed `Basic ...` header value when auth is active.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_auth(&self) -> bool {
        self.credential.is_some()
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    pub fn tls_ca_cert(&self) -> Option<&str> {
        self.tls_ca_cert.as_deref()
    }

    pub fn tls_cert(&self) -> Option<&str> {
        self.tls_cert.as_deref()
    }

    pub fn tls_key(&self) -> Option<&str> {
        self.tls_key.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("SenderConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("credential", &redact(&self.credential))
            .field("compress", &self.compress)
            .field("timeout", &self.timeout)
            .field("max_requests", &self.max_requests)
            .field("tls_enabled", &self.tls_enabled)
            .field("tls_ca_cert", &self.tls_ca_cert.is_some())
            .field("tls_cert", &self.tls_cert.is_some())
            .field("tls_key", &redact(&self.tls_key))
            .field("enabled", &self.enabled)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/**
 * Per-sender URL, prefixed with the shared bootstrap server unless the
 * fragment already carries a scheme.
 */
fn resolve_url(config: &Config, keys: &SenderKeys) -> String {
    let fragment = config.get_string(&keys.url).unwrap_or_default();
    match config.get_non_empty(BOOTSTRAP_SERVERS) {
        Some(base) if !fragment.starts_with("http") => format!("{base}{fragment}"),
        _ => fragment.to_string(),
    }
}

fn parse_endpoint(url: &str) -> Option<Url> {
    Url::parse(url)
        .ok()
        .filter(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
}

fn first_non_empty(config: &Config, primary: &str, fallback: &str) -> Option<String> {
    config
        .get_non_empty(primary)
        .or_else(|| config.get_non_empty(fallback))
        .map(str::to_string)
}
