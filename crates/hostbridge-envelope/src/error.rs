/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The message body is not a JSON object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// The encoded payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A field had the wrong shape.
    #[error("malformed {kind}: {source}")]
    Malformed {
        kind: &'static str,
        source: serde_json::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
