/**
 * Error types.
 *
 * Only `BuildError` ever reaches callers as a `Result`. Transport failures
 * travel inside a `Call`, and dispatcher rejections are folded into failed
 * calls by the sender. An unusable configuration is not an error at all:
 * it yields a disabled snapshot.
 */
use thiserror::Error;

/**
 * Failure while constructing a managed client.
 */
#[derive(Debug, Error)]
pub enum BuildError {
    /// PEM material present but unparsable, or of the wrong kind.
    #[error("malformed TLS material: {0}")]
    TlsMaterial(String),

    /// TLS enabled without one of the required PEM strings.
    #[error("TLS is enabled but `{0}` is not configured")]
    MissingTlsMaterial(&'static str),

    #[error("basic credential is not a valid header value")]
    InvalidCredential,
}

/**
 * Reasons a dispatcher refuses a submission.
 */
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("dispatcher is shut down")]
    ShutDown,

    #[error("failed to spawn dispatcher worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/**
 * Failure of a submitted request, observed through `CallOutcome::Failed`.
 *
 * `Clone` so every holder of a `Call` handle can read the same outcome.
 */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("collector responded with HTTP {0}")]
    Status(u16),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("worker panicked while performing the exchange")]
    Panicked,
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => TransportError::Status(code),
            ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
            other => TransportError::Network(other.to_string()),
        }
    }
}

impl From<SubmitError> for TransportError {
    fn from(err: SubmitError) -> Self {
        TransportError::Rejected(err.to_string())
    }
}
