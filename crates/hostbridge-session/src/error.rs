use std::time::Duration;

use crate::handshake::NegotiationError;
use crate::queue::Target;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Window-level error while posting.
    #[error("transport error: {0}")]
    Transport(#[from] hostbridge_window::TransportError),

    /// Envelope encoding/decoding error.
    #[error("envelope error: {0}")]
    Envelope(#[from] hostbridge_envelope::EnvelopeError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The host answered with a failure status.
    #[error("host reported failure: {0}")]
    HostFailure(String),

    /// The host answered with an SDK error object.
    #[error("host error {code}: {message}")]
    HostError { code: i64, message: String },

    /// The initialize round trip did not complete in time.
    #[error("SDK initialization timed out after {0:?}")]
    InitializationTimeout(Duration),

    /// Neither a parent window nor a native bridge is available.
    #[error("Initialization Failed. No Parent window found.")]
    NoParentWindow,

    /// `initialize` was already called on this session.
    #[error("session already initialized")]
    AlreadyInitialized,

    /// The host's initialize response could not be negotiated.
    #[error("runtime negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    /// Messages queued for a target were not posted in time.
    #[error("{target} queue did not drain within {timeout:?}")]
    QueueTimeout { target: Target, timeout: Duration },

    /// The session was torn down before the response arrived.
    #[error("session closed before a response arrived")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
