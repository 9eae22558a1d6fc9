//! Cross-window messaging between embedded apps and their hosts.
//!
//! hostbridge lets code running in an embedded browsing context (iframe or
//! webview) exchange request/response messages with the window embedding
//! it, and relay messages for a further-nested child window.
//!
//! # Crate Structure
//!
//! - [`window`]: window handle abstraction and in-process channel windows
//! - [`envelope`]: wire envelope types and JSON codec
//! - [`origin`]: origin allow-list resolution and validation
//! - [`session`]: relationships, queues, correlation, handshake and relay

/// Re-export window types.
pub mod window {
    pub use hostbridge_window::*;
}

/// Re-export envelope types.
pub mod envelope {
    pub use hostbridge_envelope::*;
}

/// Re-export origin validation types.
pub mod origin {
    pub use hostbridge_origin::*;
}

/// Re-export session types.
pub mod session {
    pub use hostbridge_session::*;
}
