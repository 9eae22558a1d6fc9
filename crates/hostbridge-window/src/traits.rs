use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

/// Wildcard target origin. Only the initialize handshake posts with it.
pub const ANY_ORIGIN: &str = "*";

/// A browsing context that can receive posted messages.
///
/// Implementations mirror the browser contract: a message posted with a
/// `target_origin` that does not match the receiver's real origin is
/// silently discarded, not reported as an error.
pub trait WindowHandle: Send + Sync {
    /// Post a JSON message, restricted to `target_origin` (or [`ANY_ORIGIN`]).
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<()>;

    /// Whether the window has been closed.
    fn is_closed(&self) -> bool;

    /// Short human-readable label used in logs.
    fn label(&self) -> &str {
        "window"
    }
}

/// Native bridge of a frameless host (no parent frame).
pub trait NativeInterface: Send + Sync {
    /// Hand a serialized JSON message to the native host.
    fn frameless_post_message(&self, payload: Bytes) -> Result<()>;
}

/// Shared, identity-compared reference to a window.
///
/// Two `WindowRef`s are equal only when they point at the same window
/// object, matching `===` on browser window proxies.
#[derive(Clone)]
pub struct WindowRef {
    inner: Arc<dyn WindowHandle>,
}

impl WindowRef {
    /// Wrap a window implementation.
    pub fn new(window: impl WindowHandle + 'static) -> Self {
        Self {
            inner: Arc::new(window),
        }
    }

    /// Wrap an already shared window implementation.
    pub fn from_arc(inner: Arc<dyn WindowHandle>) -> Self {
        Self { inner }
    }

    /// Post a message to this window.
    pub fn post_message(&self, message: &Value, target_origin: &str) -> Result<()> {
        self.inner.post_message(message, target_origin)
    }

    /// Whether the underlying window is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Label of the underlying window.
    pub fn label(&self) -> &str {
        self.inner.label()
    }

    /// Identity comparison.
    pub fn same_window(&self, other: &WindowRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for WindowRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_window(other)
    }
}

impl Eq for WindowRef {}

impl fmt::Debug for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowRef")
            .field("label", &self.inner.label())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    impl WindowHandle for Inert {
        fn post_message(&self, _message: &Value, _target_origin: &str) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[test]
    fn equality_is_identity() {
        let a = WindowRef::new(Inert);
        let b = WindowRef::new(Inert);
        let a2 = a.clone();

        assert_eq!(a, a2);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_uses_label() {
        let window = WindowRef::new(Inert);
        let debug = format!("{window:?}");
        assert!(debug.contains("\"window\""));
        assert!(debug.contains("closed: false"));
    }
}
