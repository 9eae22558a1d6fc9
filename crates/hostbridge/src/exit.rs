use std::fmt;

use hostbridge_envelope::EnvelopeError;
use hostbridge_origin::OriginError;
use hostbridge_session::{NegotiationError, SessionError};

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn origin_error(context: &str, err: OriginError) -> CliError {
    match err {
        OriginError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        OriginError::Fetch(_) | OriginError::HttpStatus(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn envelope_error(context: &str, err: EnvelopeError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn negotiation_error(context: &str, err: NegotiationError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SessionError::Envelope(err) => envelope_error(context, err),
        SessionError::Negotiation(err) => negotiation_error(context, err),
        SessionError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::InitializationTimeout(_) | SessionError::QueueTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        SessionError::NoParentWindow | SessionError::AlreadyInitialized => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SessionError::HostFailure(_)
        | SessionError::HostError { .. }
        | SessionError::SessionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
