use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Handler for a host-initiated action. Returns a value to answer with.
pub type Handler = Box<dyn FnMut(&[Value]) -> Option<Value> + Send>;

/// One entry of a handler chain.
pub enum HandlerEntry {
    /// The application's handler. Its result is the chain's result.
    Primary(Handler),
    /// A plugin observer called after the primary with the same arguments.
    Chained { plugin: String, handler: Handler },
}

impl HandlerEntry {
    fn is_primary(&self) -> bool {
        matches!(self, HandlerEntry::Primary(_))
    }

    fn invoke(&mut self, args: &[Value]) -> Option<Value> {
        match self {
            HandlerEntry::Primary(handler) => handler(args),
            HandlerEntry::Chained { handler, .. } => handler(args),
        }
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerEntry::Primary(_) => f.write_str("Primary"),
            HandlerEntry::Chained { plugin, .. } => {
                f.debug_struct("Chained").field("plugin", plugin).finish()
            }
        }
    }
}

/// Action name to handler chain.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    chains: HashMap<String, Vec<HandlerEntry>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` as the primary handler for `name`.
    ///
    /// Replaces an earlier primary. Plugin entries stay chained behind it.
    pub fn set_primary(&mut self, name: impl Into<String>, handler: Handler) {
        let chain = self.chains.entry(name.into()).or_default();
        chain.retain(|entry| !entry.is_primary());
        chain.insert(0, HandlerEntry::Primary(handler));
    }

    /// Drop every handler for `name`.
    pub fn remove(&mut self, name: &str) {
        self.chains.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chains.get(name).is_some_and(|chain| !chain.is_empty())
    }

    /// Chain a plugin handler after whatever handles `name` today.
    pub fn add_plugin(
        &mut self,
        plugin: impl Into<String>,
        name: impl Into<String>,
        handler: Handler,
    ) {
        self.chains
            .entry(name.into())
            .or_default()
            .push(HandlerEntry::Chained {
                plugin: plugin.into(),
                handler,
            });
    }

    /// Remove everything `plugin` chained, restoring the prior handlers.
    pub fn remove_plugin(&mut self, plugin: &str) {
        for chain in self.chains.values_mut() {
            chain.retain(|entry| {
                !matches!(entry, HandlerEntry::Chained { plugin: owner, .. } if owner == plugin)
            });
        }
        self.chains.retain(|_, chain| !chain.is_empty());
    }

    /// Invoke the chain for `name`.
    ///
    /// Returns whether anything was called and the primary handler's
    /// result. A chain with no primary reports its first entry's result.
    pub fn call(&mut self, name: &str, args: &[Value]) -> (bool, Option<Value>) {
        let Some(chain) = self.chains.get_mut(name) else {
            tracing::debug!(name, "no handler registered");
            return (false, None);
        };
        if chain.is_empty() {
            return (false, None);
        }

        tracing::debug!(name, handlers = chain.len(), "invoking handler chain");
        let has_primary = chain.iter().any(HandlerEntry::is_primary);
        let mut result = None;
        for (index, entry) in chain.iter_mut().enumerate() {
            let value = entry.invoke(args);
            if entry.is_primary() || (!has_primary && index == 0) {
                result = value;
            }
        }
        (true, result)
    }

    pub fn clear(&mut self) {
        self.chains.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    #[test]
    fn missing_handler_is_not_called() {
        let mut registry = HandlerRegistry::new();
        assert_eq!(registry.call("themeChange", &[]), (false, None));
    }

    #[test]
    fn primary_result_is_returned() {
        let mut registry = HandlerRegistry::new();
        registry.set_primary("echo", Box::new(|args| args.first().cloned()));

        assert!(registry.contains("echo"));
        assert_eq!(registry.call("echo", &[json!("hi")]), (true, Some(json!("hi"))));
    }

    #[test]
    fn plugins_run_after_primary_without_changing_result() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();

        let seen = Arc::clone(&order);
        registry.set_primary(
            "load",
            Box::new(move |_| {
                seen.lock().unwrap().push("primary");
                Some(json!(1))
            }),
        );
        let seen = Arc::clone(&order);
        registry.add_plugin(
            "telemetry",
            "load",
            Box::new(move |_| {
                seen.lock().unwrap().push("plugin");
                Some(json!(2))
            }),
        );

        assert_eq!(registry.call("load", &[]), (true, Some(json!(1))));
        assert_eq!(*order.lock().unwrap(), vec!["primary", "plugin"]);
    }

    #[test]
    fn plugin_only_chain_reports_first_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        for (plugin, answer) in [("telemetry", "first"), ("audit", "second")] {
            let counter = Arc::clone(&calls);
            registry.add_plugin(
                plugin,
                "focusEnter",
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Some(json!(answer))
                }),
            );
        }

        assert_eq!(registry.call("focusEnter", &[]), (true, Some(json!("first"))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removing_plugin_restores_prior_state() {
        let mut registry = HandlerRegistry::new();
        registry.set_primary("load", Box::new(|_| Some(json!("app"))));
        registry.add_plugin("a", "load", Box::new(|_| None));
        registry.add_plugin("a", "unload", Box::new(|_| None));

        registry.remove_plugin("a");

        assert!(registry.contains("load"));
        assert!(!registry.contains("unload"));
        assert_eq!(registry.call("load", &[]), (true, Some(json!("app"))));
    }

    #[test]
    fn replacing_primary_keeps_plugins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = HandlerRegistry::new();
        registry.set_primary("load", Box::new(|_| Some(json!("old"))));
        registry.add_plugin(
            "p",
            "load",
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            }),
        );
        registry.set_primary("load", Box::new(|_| Some(json!("new"))));

        assert_eq!(registry.call("load", &[]), (true, Some(json!("new"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_drops_whole_chain() {
        let mut registry = HandlerRegistry::new();
        registry.set_primary("load", Box::new(|_| None));
        registry.add_plugin("p", "load", Box::new(|_| None));
        registry.remove("load");
        assert!(!registry.contains("load"));
    }
}
