/**
 * Core data types shared across the transport.
 *
 * `EncodedPayload` is what the upstream encoder hands us; `Identity` is the
 * key under which managed clients are shared.
 */
use std::fmt;

use crate::protocol::constants::JSON_CONTENT_TYPE;

// ---------------------------------------------------------------------------
// EncodedPayload
// ---------------------------------------------------------------------------

/**
 * An already-encoded batch of spans or metrics.
 *
 * The bytes are opaque to this crate. They are only ever read, either
 * attached verbatim as the request body or gzip-compressed into a new
 * buffer.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    data: Vec<u8>,
    content_type: String,
}

impl EncodedPayload {
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// Shorthand for a JSON-encoded batch.
    pub fn json(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data, JSON_CONTENT_TYPE)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, String) {
        (self.data, self.content_type)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/**
 * The key that decides client sharing: resolved URL plus credentials.
 *
 * Two senders whose snapshots produce equal identities share one
 * `ManagedClient`. TLS material is not part of the key, so a TLS-only
 * change keeps the same identity and relies on the registry retiring the
 * old client before a new one is published.
 */
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl Identity {
    pub fn new(url: impl Into<String>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            url: url.into(),
            username,
            password,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => write!(f, "{user}@{}", self.url),
            None => f.write_str(&self.url),
        }
    }
}
