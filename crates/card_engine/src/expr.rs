//! Value expressions embedded in card declarations.
//!
//! On the wire an expression is plain JSON. Three marker objects change meaning:
//!
//! - `{"$sel": "name", "args": <expr>}` calls a registered selector,
//! - `{"$ctx": "root.path"}` reads a context field (`settings`, `match`, `param`, `state`,
//!   `event`, `card`, `session`),
//! - `{"$lit": <json>}` embeds JSON verbatim without interpreting markers.
//!
//! Every other object or array is resolved element-wise, and scalars are literals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const SELECTOR_KEY: &str = "$sel";
const SELECTOR_ARGS_KEY: &str = "args";
const CONTEXT_KEY: &str = "$ctx";
const LITERAL_KEY: &str = "$lit";

/// Context root addressed by a `$ctx` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRoot {
    /// Active desktop/user settings supplied by the host.
    Settings,
    /// Text matched by the triggering gesture (chat mention, search hit).
    Match,
    /// Navigation parameter of the current card.
    Param,
    /// Merged scoped state of the current card.
    State,
    /// Payload of the triggering event.
    Event,
    /// Metadata of the current card (`id`, `kind`, `stackId`).
    Card,
    /// Metadata of the current session (`id`, `windowId`).
    Session,
    /// Any other root; always resolves to null.
    Unknown(String),
}

impl ContextRoot {
    fn parse(raw: &str) -> Self {
        match raw {
            "settings" => Self::Settings,
            "match" => Self::Match,
            "param" => Self::Param,
            "state" => Self::State,
            "event" => Self::Event,
            "card" => Self::Card,
            "session" => Self::Session,
            other => Self::Unknown(other.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Settings => "settings",
            Self::Match => "match",
            Self::Param => "param",
            Self::State => "state",
            Self::Event => "event",
            Self::Card => "card",
            Self::Session => "session",
            Self::Unknown(raw) => raw,
        }
    }
}

/// Parsed `$ctx` reference: a root plus a dotted path below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPath {
    /// Context root.
    pub root: ContextRoot,
    /// Path segments below the root; numeric segments index arrays.
    pub segments: Vec<String>,
}

impl ContextPath {
    /// Parses `root.a.b` notation.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split('.').filter(|part| !part.is_empty());
        let root = ContextRoot::parse(parts.next().unwrap_or_default());
        Self {
            root,
            segments: parts.map(str::to_string).collect(),
        }
    }

    fn to_dotted(&self) -> String {
        let mut out = self.root.as_str().to_string();
        for segment in &self.segments {
            out.push('.');
            out.push_str(segment);
        }
        out
    }
}

/// Environment a [`ValueExpr`] is resolved against.
pub trait ExprEnv {
    /// Calls the named selector. Unknown selectors return null.
    fn select(&self, name: &str, args: &Value) -> Value;

    /// Returns the whole value of a context root. Unknown roots return null.
    fn context_root(&self, root: &ContextRoot) -> Value;

    /// Reads `path`. Missing segments resolve to null.
    fn context(&self, path: &ContextPath) -> Value {
        let root = self.context_root(&path.root);
        lookup(&root, &path.segments).cloned().unwrap_or(Value::Null)
    }
}

/// A value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ValueExpr {
    /// Literal JSON value.
    Literal(Value),
    /// Selector call.
    Selector {
        /// Registered selector name.
        name: String,
        /// Argument expression, resolved before the call.
        args: Box<ValueExpr>,
    },
    /// Context field read.
    Context(ContextPath),
    /// Object whose fields are expressions.
    Object(Vec<(String, ValueExpr)>),
    /// Array whose items are expressions.
    Array(Vec<ValueExpr>),
}

impl Default for ValueExpr {
    fn default() -> Self {
        Self::Literal(Value::Null)
    }
}

impl ValueExpr {
    /// Shorthand for a selector call.
    pub fn selector(name: impl Into<String>, args: ValueExpr) -> Self {
        Self::Selector {
            name: name.into(),
            args: Box::new(args),
        }
    }

    /// Shorthand for a `$ctx` reference.
    pub fn context(path: &str) -> Self {
        Self::Context(ContextPath::parse(path))
    }

    /// Resolves the expression. Total: every expression yields a value.
    pub fn resolve(&self, env: &impl ExprEnv) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Selector { name, args } => {
                let args = args.resolve(env);
                env.select(name, &args)
            }
            Self::Context(path) => env.context(path),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, expr)| (key.clone(), expr.resolve(env)))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(|item| item.resolve(env)).collect()),
        }
    }

    /// Returns whether resolving this expression can call a selector or read context.
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Selector { .. } | Self::Context(_) => false,
            Self::Object(fields) => fields.iter().all(|(_, expr)| expr.is_constant()),
            Self::Array(items) => items.iter().all(ValueExpr::is_constant),
        }
    }
}

impl From<Value> for ValueExpr {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => parse_object(map),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            scalar => Self::Literal(scalar),
        }
    }
}

fn parse_object(mut map: Map<String, Value>) -> ValueExpr {
    if map.len() == 1 {
        if let Some(literal) = map.remove(LITERAL_KEY) {
            return ValueExpr::Literal(literal);
        }
        if let Some(Value::String(path)) = map.get(CONTEXT_KEY) {
            return ValueExpr::Context(ContextPath::parse(path));
        }
    }

    let is_selector = matches!(map.get(SELECTOR_KEY), Some(Value::String(_)))
        && map
            .keys()
            .all(|key| key == SELECTOR_KEY || key == SELECTOR_ARGS_KEY);
    if is_selector {
        let name = match map.remove(SELECTOR_KEY) {
            Some(Value::String(name)) => name,
            _ => String::new(),
        };
        let args = map.remove(SELECTOR_ARGS_KEY).unwrap_or(Value::Null);
        return ValueExpr::Selector {
            name,
            args: Box::new(ValueExpr::from(args)),
        };
    }

    ValueExpr::Object(
        map.into_iter()
            .map(|(key, value)| (key, ValueExpr::from(value)))
            .collect(),
    )
}

impl From<ValueExpr> for Value {
    fn from(expr: ValueExpr) -> Self {
        match expr {
            ValueExpr::Literal(value) if needs_literal_escape(&value) => {
                let mut map = Map::new();
                map.insert(LITERAL_KEY.to_string(), value);
                Value::Object(map)
            }
            ValueExpr::Literal(value) => value,
            ValueExpr::Selector { name, args } => {
                let mut map = Map::new();
                map.insert(SELECTOR_KEY.to_string(), Value::String(name));
                let args = Value::from(*args);
                if !args.is_null() {
                    map.insert(SELECTOR_ARGS_KEY.to_string(), args);
                }
                Value::Object(map)
            }
            ValueExpr::Context(path) => {
                let mut map = Map::new();
                map.insert(CONTEXT_KEY.to_string(), Value::String(path.to_dotted()));
                Value::Object(map)
            }
            ValueExpr::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, expr)| (key, Value::from(expr)))
                    .collect(),
            ),
            ValueExpr::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

fn needs_literal_escape(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.keys().any(|key| key.starts_with('$')) || map.values().any(needs_literal_escape)
        }
        Value::Array(items) => items.iter().any(needs_literal_escape),
        _ => false,
    }
}

/// Walks `segments` below `value`. Numeric segments index arrays.
pub fn lookup<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        })
}

/// JavaScript-style truthiness used by handler conditions.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct FixedEnv;

    impl ExprEnv for FixedEnv {
        fn select(&self, name: &str, args: &Value) -> Value {
            match name {
                "double" => json!(args.as_i64().unwrap_or(0) * 2),
                "echo" => args.clone(),
                _ => Value::Null,
            }
        }

        fn context_root(&self, root: &ContextRoot) -> Value {
            match root {
                ContextRoot::Param => json!("A-1"),
                ContextRoot::State => json!({ "form": { "qty": 3 }, "tags": ["x", "y"] }),
                ContextRoot::Match => json!("@alice"),
                _ => Value::Null,
            }
        }
    }

    #[test]
    fn parses_marker_objects_into_typed_variants() {
        let expr = ValueExpr::from(json!({ "$sel": "double", "args": { "$ctx": "state.form.qty" } }));
        assert_eq!(
            expr,
            ValueExpr::selector("double", ValueExpr::context("state.form.qty"))
        );
        assert!(!expr.is_constant());
    }

    #[test]
    fn resolves_nested_objects_arrays_and_selectors() {
        let expr = ValueExpr::from(json!({
            "id": { "$ctx": "param" },
            "qty": { "$sel": "double", "args": { "$ctx": "state.form.qty" } },
            "second": { "$ctx": "state.tags.1" },
            "who": [{ "$ctx": "match" }, "lit"],
        }));
        assert_eq!(
            expr.resolve(&FixedEnv),
            json!({ "id": "A-1", "qty": 6, "second": "y", "who": ["@alice", "lit"] })
        );
    }

    #[test]
    fn unknown_selectors_and_roots_fail_closed_to_null() {
        let expr = ValueExpr::from(json!([
            { "$sel": "missing" },
            { "$ctx": "nowhere.at.all" },
            { "$ctx": "state.form.absent" },
        ]));
        assert_eq!(expr.resolve(&FixedEnv), json!([null, null, null]));
    }

    #[test]
    fn literal_escape_survives_serialization() {
        let raw = json!({ "$lit": { "$sel": "not-a-call" } });
        let expr: ValueExpr = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(expr, ValueExpr::Literal(json!({ "$sel": "not-a-call" })));
        assert_eq!(serde_json::to_value(&expr).unwrap(), raw);
        assert_eq!(expr.resolve(&FixedEnv), json!({ "$sel": "not-a-call" }));
    }

    #[test]
    fn truthiness_follows_script_conventions() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!("0")));
    }
}
