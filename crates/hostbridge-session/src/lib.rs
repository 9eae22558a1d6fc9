//! Session core for cross-window messaging.
//!
//! A [`Session`] is the messaging state of one embedded browsing context:
//! - which window is the parent (host) and which is a nested child
//! - outbound queues for targets whose origin is not known yet
//! - pending requests and their callbacks, futures and streams
//! - handlers for host-initiated actions, with plugin chaining
//! - the initialize handshake and runtime negotiation
//! - relaying of unhandled child requests to the parent

pub mod correlator;
pub mod error;
pub mod handlers;
pub mod handshake;
pub mod queue;
pub mod relationship;
pub mod relay;
pub mod runtime;
pub mod session;

pub use correlator::{
    Callback, Dispatch, LatencyObserver, LatencySample, PartialResponse, PartialResponses,
    PendingCallback, ResponseFuture,
};
pub use error::{Result, SessionError};
pub use handlers::{Handler, HandlerEntry, HandlerRegistry};
pub use handshake::{
    negotiate, parse_runtime_config, parse_trailing_runtime_config, InitializeOutcome,
    NegotiationError, DEFAULT_CLIENT_SDK_VERSION, INITIALIZE_FUNC,
};
pub use queue::{OutboundQueues, Target};
pub use relationship::{Binding, Relationships};
pub use relay::{RelayRecord, RELAY_API_VERSION_TAG};
pub use runtime::{compare_versions, generate_back_compat_runtime, RuntimeConfig};
pub use session::{
    EmbeddingContext, IgnoreReason, InboundMessage, MessageDisposition, PendingInitialize,
    Session, SessionConfig, INITIALIZE_API_VERSION_TAG, REGISTER_HANDLER_FUNC,
};
