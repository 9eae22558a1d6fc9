//! Which window is our parent and which is our child.
//!
//! Bindings are learned from inbound traffic: the first trusted sender is
//! taken as the parent, a different sender as the child, and a closed
//! window gives up its slot to the next sender.

use hostbridge_window::WindowRef;

use crate::queue::Target;

/// A window and the origin it was observed at.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    window: Option<WindowRef>,
    origin: Option<String>,
}

impl Binding {
    pub fn window(&self) -> Option<&WindowRef> {
        self.window.as_ref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Window and origin, when both are known.
    pub fn resolved(&self) -> Option<(&WindowRef, &str)> {
        match (&self.window, &self.origin) {
            (Some(window), Some(origin)) => Some((window, origin.as_str())),
            _ => None,
        }
    }

    pub fn is(&self, window: &WindowRef) -> bool {
        self.window.as_ref().is_some_and(|bound| bound.same_window(window))
    }

    fn is_closed(&self) -> bool {
        self.window.as_ref().is_some_and(WindowRef::is_closed)
    }

    fn is_open_for(&self, source: &WindowRef) -> bool {
        self.window.is_none() || self.is_closed() || self.is(source)
    }

    fn bind(&mut self, window: &WindowRef, origin: &str) {
        self.window = Some(window.clone());
        self.origin = Some(origin.to_string());
    }

    fn clear(&mut self) {
        self.window = None;
        self.origin = None;
    }
}

/// Parent and child bindings of a session.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    parent: Binding,
    child: Binding,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self, target: Target) -> &Binding {
        match target {
            Target::Parent => &self.parent,
            Target::Child => &self.child,
        }
    }

    /// Remember the embedding parent before its origin is known.
    ///
    /// Messages to the parent queue until it sends something.
    pub fn expect_parent(&mut self, window: WindowRef) {
        self.parent.window = Some(window);
        self.parent.origin = None;
    }

    /// Record an accepted inbound message from `source` at `origin`.
    ///
    /// Returns the role the source holds afterwards, if any. In frameless
    /// mode there is no parent frame, so every sender is a child candidate.
    pub fn observe(&mut self, source: &WindowRef, origin: &str, frameless: bool) -> Option<Target> {
        if !frameless && self.parent.is_open_for(source) {
            self.parent.bind(source, origin);
        } else if self.child.is_open_for(source) {
            self.child.bind(source, origin);
        }

        self.forget_closed();
        self.role_of(source)
    }

    /// Clear bindings whose window is closed.
    pub fn forget_closed(&mut self) {
        if self.parent.is_closed() {
            tracing::debug!("parent window closed; clearing binding");
            self.parent.clear();
        }
        if self.child.is_closed() {
            tracing::debug!("child window closed; clearing binding");
            self.child.clear();
        }
    }

    /// Role `source` currently holds.
    pub fn role_of(&self, source: &WindowRef) -> Option<Target> {
        if self.parent.is(source) {
            Some(Target::Parent)
        } else if self.child.is(source) {
            Some(Target::Child)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.parent.clear();
        self.child.clear();
    }
}

#[cfg(test)]
mod tests {
    use hostbridge_window::ChannelWindow;

    use super::*;

    const HOST: &str = "https://teams.microsoft.com";
    const CHILD: &str = "https://child.example.com";

    #[test]
    fn first_sender_becomes_parent() {
        let (host, _host_box) = ChannelWindow::open("host", HOST);
        let mut relationships = Relationships::new();

        assert_eq!(relationships.observe(&host, HOST, false), Some(Target::Parent));
        assert_eq!(relationships.binding(Target::Parent).origin(), Some(HOST));
    }

    #[test]
    fn expected_parent_keeps_slot_for_others() {
        let (host, _host_box) = ChannelWindow::open("host", HOST);
        let (child, _child_box) = ChannelWindow::open("child", CHILD);
        let mut relationships = Relationships::new();
        relationships.expect_parent(host.clone());

        assert_eq!(relationships.observe(&child, CHILD, false), Some(Target::Child));
        assert!(relationships.binding(Target::Parent).resolved().is_none());
        assert_eq!(relationships.observe(&host, HOST, false), Some(Target::Parent));
        assert!(relationships.binding(Target::Parent).resolved().is_some());
    }

    #[test]
    fn closed_parent_is_taken_over() {
        let (host, host_box) = ChannelWindow::open("host", HOST);
        let (other, _other_box) = ChannelWindow::open("other", CHILD);
        let mut relationships = Relationships::new();
        relationships.observe(&host, HOST, false);

        host_box.close();

        assert_eq!(relationships.observe(&other, CHILD, false), Some(Target::Parent));
        assert!(relationships.binding(Target::Parent).is(&other));
        assert!(relationships.binding(Target::Child).window().is_none());
    }

    #[test]
    fn closed_child_is_cleared() {
        let (host, _host_box) = ChannelWindow::open("host", HOST);
        let (child, child_box) = ChannelWindow::open("child", CHILD);
        let mut relationships = Relationships::new();
        relationships.observe(&host, HOST, false);
        relationships.observe(&child, CHILD, false);

        child_box.close();
        relationships.observe(&host, HOST, false);

        assert!(relationships.binding(Target::Child).window().is_none());
        assert!(relationships.binding(Target::Child).origin().is_none());
    }

    #[test]
    fn frameless_senders_are_children() {
        let (sender, _sender_box) = ChannelWindow::open("sender", CHILD);
        let mut relationships = Relationships::new();

        assert_eq!(relationships.observe(&sender, CHILD, true), Some(Target::Child));
        assert!(relationships.binding(Target::Parent).window().is_none());
    }

    #[test]
    fn third_window_gets_no_role() {
        let (host, _a) = ChannelWindow::open("host", HOST);
        let (child, _b) = ChannelWindow::open("child", CHILD);
        let (stranger, _c) = ChannelWindow::open("stranger", CHILD);
        let mut relationships = Relationships::new();
        relationships.observe(&host, HOST, false);
        relationships.observe(&child, CHILD, false);

        assert_eq!(relationships.observe(&stranger, CHILD, false), None);
    }
}
