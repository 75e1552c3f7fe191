/**
 * Request assembly — turns an `EncodedPayload` into an `OutboundRequest`.
 *
 * Everything here runs on the submitting thread, strictly before the
 * request reaches a dispatcher: header selection, and gzip compression
 * into a fresh buffer when enabled.
 */
use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use ureq::http::HeaderValue;

use crate::config::SenderConfig;
use crate::protocol::constants::{
    AUTHORIZATION, B3_HEADER, B3_NOT_SAMPLED, CONTENT_ENCODING, CONTENT_TYPE, GZIP,
};
use crate::protocol::types::EncodedPayload;

/**
 * A fully assembled POST, ready to be handed to an `Exchange`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl OutboundRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/**
 * Builds the outbound request for `payload` under `snapshot`.
 *
 * # Errors
 * Any local failure: a content type that is not a valid header value, or
 * an I/O error from the gzip encoder. Callers treat these as "skip this
 * batch", never as a transport failure.
 */
pub fn assemble(snapshot: &SenderConfig, payload: EncodedPayload) -> io::Result<OutboundRequest> {
    let (data, content_type) = payload.into_parts();

    if HeaderValue::from_str(&content_type).is_err() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("content type {content_type:?} is not a valid header value"),
        ));
    }

    let mut headers = vec![
        (B3_HEADER, B3_NOT_SAMPLED.to_string()),
        (CONTENT_TYPE, content_type),
    ];

    if let Some(credential) = snapshot.credential() {
        headers.push((AUTHORIZATION, credential.to_string()));
    }

    let body = if snapshot.compress() {
        headers.push((CONTENT_ENCODING, GZIP.to_string()));
        gzip(&data)?
    } else {
        data
    };

    Ok(OutboundRequest {
        url: snapshot.url().to_string(),
        headers,
        body,
    })
}

/**
 * Gzip-compresses `data` into a new in-memory buffer.
 */
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 64), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
