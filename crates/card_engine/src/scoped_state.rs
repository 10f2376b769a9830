//! Layered scoped state for cards.
//!
//! Precedence, lowest first: global defaults, stack defaults, background defaults, card-type
//! defaults, card-instance initial state, runtime patches. Layers merge shallowly per key on read.
//! Writes only ever land in the runtime-patch layer of one `(session, card)` scope.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::EngineError;

/// Flat key → value state object.
pub type StateMap = Map<String, Value>;

/// Read-only default layers visible to one card, lowest precedence first.
#[derive(Debug, Clone, Copy)]
pub struct ScopeLayers<'a> {
    /// Engine-wide defaults.
    pub global: &'a StateMap,
    /// Stack defaults.
    pub stack: Option<&'a StateMap>,
    /// Defaults of the card's background.
    pub background: Option<&'a StateMap>,
    /// Defaults for the card's kind.
    pub card_type: Option<&'a StateMap>,
    /// The card's own initial state.
    pub card: Option<&'a StateMap>,
}

impl ScopeLayers<'_> {
    /// Merges the default layers and `runtime` into one view.
    pub fn merge(&self, runtime: Option<&StateMap>) -> StateMap {
        let mut merged = self.global.clone();
        for layer in [self.stack, self.background, self.card_type, self.card, runtime]
            .into_iter()
            .flatten()
        {
            for (key, value) in layer {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// Identity of one card's runtime-patch layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardScopeKey {
    /// Card session (one per card window).
    pub session_id: String,
    /// Card within the session's stack.
    pub card_id: String,
}

impl CardScopeKey {
    /// Creates a scope key.
    pub fn new(session_id: impl Into<String>, card_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            card_id: card_id.into(),
        }
    }
}

/// Runtime-patch layers keyed by card scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardStateStore {
    patches: HashMap<CardScopeKey, StateMap>,
}

impl CardStateStore {
    /// Returns the runtime-patch layer of `key`, if anything was written.
    pub fn runtime(&self, key: &CardScopeKey) -> Option<&StateMap> {
        self.patches.get(key)
    }

    /// Returns the merged view of `key` over `layers`.
    pub fn read(&self, key: &CardScopeKey, layers: &ScopeLayers<'_>) -> StateMap {
        layers.merge(self.runtime(key))
    }

    /// Sets `path` to `value`.
    ///
    /// The top-level key is seeded from the merged view so nested writes keep sibling fields that
    /// came from default layers.
    pub fn set(
        &mut self,
        key: &CardScopeKey,
        layers: &ScopeLayers<'_>,
        path: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        let segments = split_path(path)?;
        let (head, rest) = segments
            .split_first()
            .ok_or_else(|| invalid_path(path, "path is empty"))?;

        if rest.is_empty() {
            self.patches
                .entry(key.clone())
                .or_default()
                .insert(head.clone(), value);
            return Ok(());
        }

        let merged = self.read(key, layers);
        let mut root = merged
            .get(head)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        write_nested(&mut root, rest, value).map_err(|reason| invalid_path(path, reason))?;
        self.patches
            .entry(key.clone())
            .or_default()
            .insert(head.clone(), root);
        Ok(())
    }

    /// Shallow-merges the object `value` into the state root, or into the object at `path`.
    pub fn patch(
        &mut self,
        key: &CardScopeKey,
        layers: &ScopeLayers<'_>,
        path: Option<&str>,
        value: Value,
    ) -> Result<(), EngineError> {
        let Value::Object(fields) = value else {
            return Err(EngineError::PatchNotObject);
        };

        let Some(path) = path else {
            let runtime = self.patches.entry(key.clone()).or_default();
            runtime.extend(fields);
            return Ok(());
        };

        let segments = split_path(path)?;
        let merged = Value::Object(self.read(key, layers));
        let mut target = crate::expr::lookup(&merged, &segments)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let Value::Object(target_fields) = &mut target else {
            return Err(invalid_path(path, "target is not an object"));
        };
        target_fields.extend(fields);
        self.set(key, layers, path, target)
    }

    /// Drops every runtime layer owned by `session_id`.
    ///
    /// Returns how many card scopes were discarded.
    pub fn dispose_session(&mut self, session_id: &str) -> usize {
        let before = self.patches.len();
        self.patches.retain(|key, _| key.session_id != session_id);
        before - self.patches.len()
    }

    /// Number of card scopes holding runtime patches.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Returns whether no runtime patches are held.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Splits and validates a dotted state path.
pub fn split_path(path: &str) -> Result<Vec<String>, EngineError> {
    if path.trim().is_empty() {
        return Err(invalid_path(path, "path is empty"));
    }
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(invalid_path(path, "path has an empty segment"));
    }
    Ok(segments)
}

fn write_nested(root: &mut Value, segments: &[String], value: Value) -> Result<(), &'static str> {
    let Some((head, rest)) = segments.split_first() else {
        *root = value;
        return Ok(());
    };

    match root {
        Value::Object(map) => {
            let child = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            write_nested(child, rest, value)
        }
        Value::Array(items) => {
            let idx = head
                .parse::<usize>()
                .map_err(|_| "array segment is not an index")?;
            let child = items.get_mut(idx).ok_or("array index out of bounds")?;
            write_nested(child, rest, value)
        }
        Value::Null => {
            *root = Value::Object(Map::new());
            write_nested(root, segments, value)
        }
        _ => Err("path crosses a scalar value"),
    }
}

fn invalid_path(path: &str, reason: &str) -> EngineError {
    EngineError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
