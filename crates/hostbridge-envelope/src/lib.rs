//! Wire envelope types and JSON codec for cross-window messaging.
//!
//! Every message exchanged with the host or a nested child is one of:
//! - a request `{ id, uuid, func, timestamp, args, apiVersionTag }`
//! - a response `{ id, uuid?, args, isPartialResponse? }`
//! - an id-less event `{ func, args }` forwarded to a child
//!
//! The codec turns these into JSON values or bytes and classifies inbound
//! JSON back into the matching shape.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    classify, classify_from_child, decode_inbound, encode, CodecConfig, Inbound,
    DEFAULT_MAX_PAYLOAD,
};
pub use error::{EnvelopeError, Result};
pub use message::{
    InboundRequest, MessageEvent, MessageRequest, MessageResponse, Outbound, MessageId,
};
