/// Errors that can occur when delivering a message to a window.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target window has been closed.
    #[error("window closed: {0}")]
    Closed(String),

    /// The receiving side of the window has gone away.
    #[error("window receiver dropped: {0}")]
    ReceiverGone(String),

    /// The message could not be encoded for delivery.
    #[error("message encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The target origin is not a usable destination.
    #[error("invalid target origin '{0}'")]
    InvalidTargetOrigin(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
