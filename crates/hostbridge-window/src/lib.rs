//! Window handle abstraction for cross-window messaging.
//!
//! Provides a unified interface over the things a session can talk to:
//! - Browsing-context windows (parent frame, nested child frame)
//! - The native bridge exposed by frameless (mobile) hosts
//!
//! This is the lowest layer of hostbridge. Everything else builds on top of
//! the [`WindowRef`] type provided here.

pub mod channel;
pub mod error;
pub mod traits;

pub use channel::{ChannelWindow, Delivery, Mailbox, NativeChannel, NativeMailbox};
pub use error::{Result, TransportError};
pub use traits::{NativeInterface, WindowHandle, WindowRef, ANY_ORIGIN};
