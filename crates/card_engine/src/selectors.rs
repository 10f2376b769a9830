//! Named selector registry.

use std::{collections::BTreeMap, fmt, rc::Rc};

use serde_json::{Map, Value};

/// Read-only context handed to selectors alongside domain state and arguments.
#[derive(Debug, Clone, Copy)]
pub struct SelectorContext<'a> {
    /// Active settings supplied by the host.
    pub settings: &'a Value,
    /// Text matched by the triggering gesture.
    pub matched: Option<&'a str>,
    /// Navigation parameter of the current card.
    pub param: &'a Value,
    /// Merged scoped state of the current card.
    pub card_state: &'a Map<String, Value>,
}

/// Pure selector over domain state `S`.
pub type SelectorFn<S> = Rc<dyn Fn(&S, &Value, &SelectorContext<'_>) -> Value>;

/// Name → selector table.
pub struct SelectorRegistry<S> {
    selectors: BTreeMap<String, SelectorFn<S>>,
}

impl<S> Default for SelectorRegistry<S> {
    fn default() -> Self {
        Self {
            selectors: BTreeMap::new(),
        }
    }
}

impl<S> Clone for SelectorRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            selectors: self.selectors.clone(),
        }
    }
}

impl<S> fmt::Debug for SelectorRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorRegistry")
            .field("names", &self.selectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S> SelectorRegistry<S> {
    /// Registers `selector` under `name`, replacing any previous entry.
    ///
    /// Returns whether an entry was replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        selector: impl Fn(&S, &Value, &SelectorContext<'_>) -> Value + 'static,
    ) -> bool {
        let name = name.into();
        let replaced = self.selectors.insert(name.clone(), Rc::new(selector)).is_some();
        if replaced {
            tracing::warn!(selector = %name, "selector re-registered; previous entry replaced");
        }
        replaced
    }

    /// Returns whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.selectors.contains_key(name)
    }

    /// Registered selector names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.selectors.keys().map(String::as_str)
    }

    /// Calls `name`. Unknown names resolve to null.
    pub fn select(&self, name: &str, state: &S, args: &Value, ctx: &SelectorContext<'_>) -> Value {
        match self.selectors.get(name) {
            Some(selector) => selector(state, args, ctx),
            None => {
                tracing::debug!(selector = %name, "unknown selector resolved to null");
                Value::Null
            }
        }
    }
}
