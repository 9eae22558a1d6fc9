//! In-process windows backed by tokio channels.
//!
//! A [`ChannelWindow`] behaves like a browser window proxy: messages posted
//! to it land in the paired [`Mailbox`] only when the target origin matches
//! the window's own origin (or is [`ANY_ORIGIN`]). Used by the simulator,
//! by tests, and by embedders that bridge windows over their own transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::{NativeInterface, WindowHandle, WindowRef, ANY_ORIGIN};

/// A message delivered into a window's mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Posted message body.
    pub data: Value,
    /// Target origin the sender required.
    pub target_origin: String,
}

/// Sending half of an in-process window.
pub struct ChannelWindow {
    label: String,
    origin: String,
    closed: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Receiving half of an in-process window.
pub struct Mailbox {
    origin: String,
    closed: Arc<AtomicBool>,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl ChannelWindow {
    /// Open a window living at `origin` and return its handle and mailbox.
    pub fn open(label: impl Into<String>, origin: impl Into<String>) -> (WindowRef, Mailbox) {
        let origin = normalize_origin(&origin.into());
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        let window = ChannelWindow {
            label: label.into(),
            origin: origin.clone(),
            closed: Arc::clone(&closed),
            tx,
        };
        let mailbox = Mailbox { origin, closed, rx };

        (WindowRef::new(window), mailbox)
    }

    fn accepts(&self, target_origin: &str) -> bool {
        target_origin == ANY_ORIGIN || normalize_origin(target_origin) == self.origin
    }
}

impl WindowHandle for ChannelWindow {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<()> {
        if target_origin.is_empty() {
            return Err(TransportError::InvalidTargetOrigin(target_origin.to_string()));
        }
        if self.is_closed() {
            return Err(TransportError::Closed(self.label.clone()));
        }
        if !self.accepts(target_origin) {
            tracing::debug!(
                window = %self.label,
                target_origin,
                actual_origin = %self.origin,
                "target origin mismatch; message discarded"
            );
            return Ok(());
        }

        self.tx
            .send(Delivery {
                data: message.clone(),
                target_origin: target_origin.to_string(),
            })
            .map_err(|_| TransportError::ReceiverGone(self.label.clone()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Mailbox {
    /// Origin of the window this mailbox belongs to.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Mark the window closed. Later posts fail with [`TransportError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Wait for the next delivery.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Take the next delivery if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Take every delivery currently waiting, oldest first.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            out.push(delivery);
        }
        out
    }
}

/// In-process native bridge for frameless hosts.
pub struct NativeChannel {
    tx: mpsc::UnboundedSender<Bytes>,
}

/// Receiving side of a [`NativeChannel`].
pub struct NativeMailbox {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl NativeChannel {
    /// Open a native bridge and return it with its mailbox.
    pub fn open() -> (Arc<dyn NativeInterface>, NativeMailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(NativeChannel { tx }), NativeMailbox { rx })
    }
}

impl NativeInterface for NativeChannel {
    fn frameless_post_message(&self, payload: Bytes) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| TransportError::ReceiverGone("native bridge".to_string()))
    }
}

impl NativeMailbox {
    /// Take every payload currently waiting, oldest first.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(payload) = self.rx.try_recv() {
            out.push(payload);
        }
        out
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn delivers_on_matching_origin() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com");

        window
            .post_message(&json!({"id": 1}), "https://teams.microsoft.com")
            .unwrap();

        let delivery = mailbox.try_recv().unwrap();
        assert_eq!(delivery.data, json!({"id": 1}));
        assert_eq!(delivery.target_origin, "https://teams.microsoft.com");
    }

    #[test]
    fn wildcard_origin_always_delivers() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com");
        window.post_message(&json!("hello"), ANY_ORIGIN).unwrap();
        assert_eq!(mailbox.drain().len(), 1);
    }

    #[test]
    fn mismatched_origin_is_discarded() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com");

        window
            .post_message(&json!({"id": 1}), "https://evil.example.com")
            .unwrap();

        assert!(mailbox.try_recv().is_none());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com/");
        window
            .post_message(&json!(1), "https://teams.microsoft.com")
            .unwrap();
        assert_eq!(mailbox.origin(), "https://teams.microsoft.com");
        assert!(mailbox.try_recv().is_some());
    }

    #[test]
    fn closed_window_rejects_posts() {
        let (window, mailbox) = ChannelWindow::open("child", "https://child.example.com");
        assert!(!window.is_closed());

        mailbox.close();

        assert!(window.is_closed());
        let err = window
            .post_message(&json!(1), "https://child.example.com")
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
    }

    #[test]
    fn empty_target_origin_rejected() {
        let (window, _mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com");
        let err = window.post_message(&json!(1), "").unwrap_err();
        assert!(matches!(err, TransportError::InvalidTargetOrigin(_)));
    }

    #[test]
    fn dropped_mailbox_reports_receiver_gone() {
        let (window, mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com");
        drop(mailbox);
        let err = window.post_message(&json!(1), ANY_ORIGIN).unwrap_err();
        assert!(matches!(err, TransportError::ReceiverGone(_)));
    }

    #[tokio::test]
    async fn recv_waits_for_delivery() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://teams.microsoft.com");
        window.post_message(&json!([1, 2]), ANY_ORIGIN).unwrap();
        let delivery = mailbox.recv().await.unwrap();
        assert_eq!(delivery.data, json!([1, 2]));
    }

    #[test]
    fn native_channel_passes_payloads_in_order() {
        let (native, mut mailbox) = NativeChannel::open();
        native
            .frameless_post_message(Bytes::from_static(b"one"))
            .unwrap();
        native
            .frameless_post_message(Bytes::from_static(b"two"))
            .unwrap();

        let payloads = mailbox.drain();
        assert_eq!(payloads, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    }
}
