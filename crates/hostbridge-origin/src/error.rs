use std::time::Duration;

/// Errors that can occur while resolving the origin allow-list.
///
/// None of these reach a caller of [`crate::OriginValidator::is_valid_origin`];
/// they select the fallback list and are logged.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    /// The request could not be sent or the body could not be read.
    #[error("allow-list fetch failed: {0}")]
    Fetch(String),

    /// The endpoint answered with a non-success status.
    #[error("allow-list endpoint returned HTTP {0}")]
    HttpStatus(u16),

    /// The fetch did not finish in time.
    #[error("allow-list fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The document does not have the expected shape.
    #[error("invalid allow-list document: {0}")]
    InvalidDocument(String),

    /// An entry of the document is not a usable host.
    #[error("invalid allow-list entry '{0}'")]
    InvalidEntry(String),

    /// The document is not valid JSON.
    #[error("allow-list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OriginError>;
