/**
 * HTTP basic credential handling.
 *
 * The credential is computed once per configuration snapshot and reused
 * verbatim for every request, both by the request assembler and by the
 * client's auth middleware.
 */
use base64::Engine as _;

/**
 * Builds the `Authorization` header value for HTTP basic auth:
 * `Basic base64(username:password)`.
 *
 * Callers must only invoke this when both parts are non-empty.
 */
pub fn basic(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

/**
 * Returns the credential only when both username and password are
 * present and non-empty.
 */
pub fn resolve(username: Option<&str>, password: Option<&str>) -> Option<String> {
    match (username, password) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some(basic(user, pass)),
        _ => None,
    }
}
