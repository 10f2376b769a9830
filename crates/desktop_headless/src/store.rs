//! JSON-backed domain store for headless sessions.

use std::collections::VecDeque;

use card_engine::{DomainAction, DomainStore};
use serde_json::{Map, Value};

/// Domain state as one JSON document keyed by domain name.
///
/// `upsert` actions whose payload carries a string `id` shallow-merge the payload into
/// `state[domain][id]`; `remove` actions delete that entry. Dispatched actions are recorded
/// only when a log limit is set, and only the most recent `limit` are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonDomainStore {
    state: Value,
    log: VecDeque<DomainAction>,
    log_limit: usize,
}

impl JsonDomainStore {
    pub fn new(state: Value) -> Self {
        Self {
            state,
            log: VecDeque::new(),
            log_limit: 0,
        }
    }

    /// Keeps the last `limit` dispatched actions.
    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = limit;
        self.log.truncate(limit);
        self
    }

    /// Recorded actions, oldest first.
    pub fn log(&self) -> &VecDeque<DomainAction> {
        &self.log
    }

    fn records_mut(&mut self, domain: &str) -> Option<&mut Map<String, Value>> {
        if !self.state.is_object() {
            self.state = Value::Object(Map::new());
        }
        self.state
            .as_object_mut()?
            .entry(domain.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
    }
}

impl DomainStore for JsonDomainStore {
    type State = Value;

    fn state(&self) -> &Value {
        &self.state
    }

    fn dispatch(&mut self, action: DomainAction) {
        let id = action
            .payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        match (action.action_name.as_str(), id, &action.payload) {
            ("upsert", Some(id), Value::Object(fields)) => {
                let fields = fields.clone();
                if let Some(records) = self.records_mut(&action.domain) {
                    let record = records
                        .entry(id)
                        .or_insert_with(|| Value::Object(Map::new()));
                    match record {
                        Value::Object(existing) => existing.extend(fields),
                        other => *other = Value::Object(fields),
                    }
                }
            }
            ("remove", Some(id), _) => {
                if let Some(records) = self.records_mut(&action.domain) {
                    records.remove(&id);
                }
            }
            _ => tracing::debug!(action = %action.action_type(), "domain action not applied"),
        }
        if self.log_limit == 0 {
            return;
        }
        if self.log.len() == self.log_limit {
            self.log.pop_front();
        }
        self.log.push_back(action);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn action(name: &str, payload: Value) -> DomainAction {
        DomainAction {
            domain: "books".to_string(),
            action_name: name.to_string(),
            payload,
        }
    }

    #[test]
    fn upsert_merges_and_remove_deletes() {
        let mut store = JsonDomainStore::new(json!({ "books": { "dune": { "title": "Dune" } } }))
            .with_log_limit(8);

        store.dispatch(action("upsert", json!({ "id": "dune", "rating": 5 })));
        assert_eq!(
            store.state()["books"]["dune"],
            json!({ "id": "dune", "title": "Dune", "rating": 5 })
        );

        store.dispatch(action("remove", json!({ "id": "dune" })));
        store.dispatch(action("archive", json!({ "id": "dune" })));
        assert_eq!(store.state()["books"], json!({}));
        assert_eq!(store.log().len(), 3);
    }

    #[test]
    fn log_is_off_by_default_and_bounded_when_on() {
        let mut silent = JsonDomainStore::default();
        silent.dispatch(action("upsert", json!({ "id": "a" })));
        assert!(silent.log().is_empty());

        let mut store = JsonDomainStore::default().with_log_limit(2);
        for id in ["a", "b", "c"] {
            store.dispatch(action("upsert", json!({ "id": id })));
        }
        let kept: Vec<&str> = store
            .log()
            .iter()
            .filter_map(|action| action.payload["id"].as_str())
            .collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn null_state_becomes_an_object_on_first_write() {
        let mut store = JsonDomainStore::default();
        store.dispatch(action("upsert", json!({ "id": "a", "n": 1 })));
        assert_eq!(store.state(), &json!({ "books": { "a": { "id": "a", "n": 1 } } }));
    }
}
