use std::collections::VecDeque;
use std::fmt;

use hostbridge_envelope::Outbound;
use hostbridge_window::WindowRef;
use tokio::sync::watch;

use crate::error::Result;

/// Logical destination of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Parent,
    Child,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Parent => f.write_str("parent"),
            Target::Child => f.write_str("child"),
        }
    }
}

/// Per-target FIFO of messages waiting for a known window and origin.
///
/// Each queue publishes its depth on a watch channel so callers can wait
/// for it to drain without borrowing the queues.
#[derive(Debug)]
pub struct OutboundQueues {
    parent: VecDeque<Outbound>,
    child: VecDeque<Outbound>,
    parent_depth: watch::Sender<usize>,
    child_depth: watch::Sender<usize>,
}

impl Default for OutboundQueues {
    fn default() -> Self {
        Self {
            parent: VecDeque::new(),
            child: VecDeque::new(),
            parent_depth: watch::Sender::new(0),
            child_depth: watch::Sender::new(0),
        }
    }
}

impl OutboundQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, target: Target, message: Outbound) {
        tracing::debug!(%target, message = %message.describe(), "queueing message");
        self.queue_mut(target).push_back(message);
        self.publish(target);
    }

    /// Number of messages waiting for `target`.
    pub fn len(&self, target: Target) -> usize {
        self.queue(target).len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty() && self.child.is_empty()
    }

    /// Subscribe to the depth of the queue for `target`.
    pub fn watch_depth(&self, target: Target) -> watch::Receiver<usize> {
        self.depth(target).subscribe()
    }

    /// Drop every queued message.
    pub fn clear(&mut self) {
        self.parent.clear();
        self.child.clear();
        self.publish(Target::Parent);
        self.publish(Target::Child);
    }

    /// Post every queued message for `target`, oldest first.
    ///
    /// No-op unless both `window` and `origin` are known. Each message is
    /// posted with `origin` as the required target origin. A failed post
    /// stops the flush and leaves that message at the front of the queue.
    /// Returns how many messages were posted.
    pub fn flush(
        &mut self,
        target: Target,
        window: Option<&WindowRef>,
        origin: Option<&str>,
    ) -> Result<usize> {
        let (Some(window), Some(origin)) = (window, origin) else {
            return Ok(0);
        };

        let drained = Self::drain_into(self.queue_mut(target), target, window, origin);
        self.publish(target);
        drained
    }

    fn drain_into(
        queue: &mut VecDeque<Outbound>,
        target: Target,
        window: &WindowRef,
        origin: &str,
    ) -> Result<usize> {
        let mut posted = 0;
        while let Some(message) = queue.pop_front() {
            let value = match message.to_value() {
                Ok(value) => value,
                Err(err) => {
                    queue.push_front(message);
                    return Err(err.into());
                }
            };
            if let Err(err) = window.post_message(&value, origin) {
                queue.push_front(message);
                return Err(err.into());
            }
            tracing::debug!(
                %target,
                message = %message.describe(),
                origin,
                "flushed queued message"
            );
            posted += 1;
        }
        Ok(posted)
    }

    fn publish(&self, target: Target) {
        let len = self.len(target);
        self.depth(target).send_if_modified(|depth| {
            let changed = *depth != len;
            *depth = len;
            changed
        });
    }

    fn depth(&self, target: Target) -> &watch::Sender<usize> {
        match target {
            Target::Parent => &self.parent_depth,
            Target::Child => &self.child_depth,
        }
    }

    fn queue(&self, target: Target) -> &VecDeque<Outbound> {
        match target {
            Target::Parent => &self.parent,
            Target::Child => &self.child,
        }
    }

    fn queue_mut(&mut self, target: Target) -> &mut VecDeque<Outbound> {
        match target {
            Target::Parent => &mut self.parent,
            Target::Child => &mut self.child,
        }
    }
}

#[cfg(test)]
mod tests {
    use hostbridge_envelope::MessageEvent;
    use hostbridge_window::ChannelWindow;
    use serde_json::json;

    use super::*;

    fn event(func: &str) -> Outbound {
        MessageEvent::new(func, vec![]).into()
    }

    #[test]
    fn flush_without_origin_is_noop() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://host.example.com");
        let mut queues = OutboundQueues::new();
        queues.enqueue(Target::Parent, event("a"));

        assert_eq!(queues.flush(Target::Parent, Some(&window), None).unwrap(), 0);
        let flushed = queues.flush(Target::Parent, None, Some("https://host.example.com"));
        assert_eq!(flushed.unwrap(), 0);
        assert_eq!(queues.len(Target::Parent), 1);
        assert!(mailbox.drain().is_empty());
    }

    #[test]
    fn flush_preserves_fifo_order() {
        let (window, mut mailbox) = ChannelWindow::open("host", "https://host.example.com");
        let mut queues = OutboundQueues::new();
        for func in ["a", "b", "c"] {
            queues.enqueue(Target::Parent, event(func));
        }
        queues.enqueue(Target::Child, event("child-only"));

        let posted = queues
            .flush(Target::Parent, Some(&window), Some("https://host.example.com"))
            .unwrap();

        assert_eq!(posted, 3);
        let funcs: Vec<_> = mailbox
            .drain()
            .into_iter()
            .map(|delivery| delivery.data["func"].clone())
            .collect();
        assert_eq!(funcs, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(queues.len(Target::Parent), 0);
        assert_eq!(queues.len(Target::Child), 1);
    }

    #[test]
    fn failed_post_keeps_message_at_front() {
        let (window, mailbox) = ChannelWindow::open("host", "https://host.example.com");
        mailbox.close();
        let mut queues = OutboundQueues::new();
        queues.enqueue(Target::Parent, event("a"));
        queues.enqueue(Target::Parent, event("b"));

        assert!(queues
            .flush(Target::Parent, Some(&window), Some("https://host.example.com"))
            .is_err());
        assert_eq!(queues.len(Target::Parent), 2);
    }

    #[test]
    fn depth_watch_follows_queue_length() {
        let (window, _mailbox) = ChannelWindow::open("host", "https://host.example.com");
        let mut queues = OutboundQueues::new();
        let depth = queues.watch_depth(Target::Parent);
        let child_depth = queues.watch_depth(Target::Child);

        queues.enqueue(Target::Parent, event("a"));
        queues.enqueue(Target::Parent, event("b"));
        assert_eq!(*depth.borrow(), 2);
        assert_eq!(*child_depth.borrow(), 0);

        queues
            .flush(Target::Parent, Some(&window), Some("https://host.example.com"))
            .unwrap();
        assert_eq!(*depth.borrow(), 0);

        queues.enqueue(Target::Child, event("c"));
        queues.clear();
        assert_eq!(*child_depth.borrow(), 0);
    }
}
