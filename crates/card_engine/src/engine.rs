//! Card command-execution engine.
//!
//! Execution is strictly synchronous. For each descriptor every value expression (including
//! nested selector calls) is resolved against an immutable view first; only then is the result
//! applied, either by dispatching to the injected [`DomainStore`], by writing the card's
//! runtime-patch layer, or by recording a [`CardIntent`] for the host. Nothing is dispatched while
//! a resolution is in progress.

use std::collections::BTreeMap;

use desktop_command_contract::{CommandInvocation, Notice};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    descriptor::{ActionDescriptor, CardCommand, DomainAction},
    error::EngineError,
    expr::{lookup, ContextPath, ContextRoot, ExprEnv},
    program::Instruction,
    scoped_state::{split_path, CardScopeKey, CardStateStore, ScopeLayers, StateMap},
    selectors::{SelectorContext, SelectorRegistry},
    stack::{CardDefinition, Stack},
};

/// Host store receiving resolved domain actions.
pub trait DomainStore {
    /// Domain state selectors read from.
    type State;

    /// Current domain state.
    fn state(&self) -> &Self::State;

    /// Applies one resolved domain action.
    fn dispatch(&mut self, action: DomainAction);
}

/// Engine limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest handler program accepted, counted over both branches of every `if`.
    pub max_instructions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_instructions: 256,
        }
    }
}

/// Where an action executes: which stack, session, and card, plus host-provided context.
///
/// The scope stays fixed for the whole run of a handler program; navigation requested by the
/// program takes effect only after the host applies the resulting intents.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionScope {
    /// Stack id.
    pub stack_id: String,
    /// Card session id.
    pub session_id: String,
    /// Current card id.
    pub card_id: String,
    /// Navigation parameter of the current card.
    pub param: Value,
    /// Active settings.
    pub settings: Value,
    /// Matched text, when the trigger carried one.
    pub matched: Option<String>,
    /// Window hosting the session, when known.
    pub window_id: Option<String>,
}

impl ExecutionScope {
    /// Creates a scope with null param and settings.
    pub fn new(
        stack_id: impl Into<String>,
        session_id: impl Into<String>,
        card_id: impl Into<String>,
    ) -> Self {
        Self {
            stack_id: stack_id.into(),
            session_id: session_id.into(),
            card_id: card_id.into(),
            param: Value::Null,
            settings: Value::Null,
            matched: None,
            window_id: None,
        }
    }

    /// Sets the navigation parameter.
    pub fn with_param(mut self, param: Value) -> Self {
        self.param = param;
        self
    }

    /// Sets the active settings.
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the matched text.
    pub fn with_match(mut self, matched: impl Into<String>) -> Self {
        self.matched = Some(matched.into());
        self
    }

    /// Sets the hosting window.
    pub fn with_window(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    fn scope_key(&self) -> CardScopeKey {
        CardScopeKey::new(self.session_id.clone(), self.card_id.clone())
    }
}

/// Navigation operation requested by a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum NavOp {
    /// Push a card.
    Go {
        /// Target card id.
        card: String,
        /// Navigation parameter.
        param: Value,
    },
    /// Pop one entry.
    Back,
    /// Return to the first entry.
    Home,
}

/// Navigation request for one session, applied by the host to the window registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavIntent {
    /// Session whose navigation stack changes.
    pub session_id: String,
    /// Requested operation.
    pub op: NavOp,
}

/// Effects the engine leaves for the host to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum CardIntent {
    /// Change a session's navigation stack.
    Navigate(NavIntent),
    /// Show a notice.
    Notify(Notice),
    /// Route a desktop command.
    RunCommand(CommandInvocation),
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionReport {
    /// Whether a descriptor ran (for events: whether a handler was found).
    pub handled: bool,
    /// Descriptors executed.
    pub executed: usize,
    /// Domain actions dispatched to the store, in order.
    pub dispatched: Vec<DomainAction>,
    /// Intents for the host, in order.
    pub intents: Vec<CardIntent>,
    /// Whether the card's runtime-patch layer was written.
    pub state_changed: bool,
    /// Error that stopped a handler program partway. Everything recorded above it already
    /// happened and still has to be applied by the host.
    pub error: Option<EngineError>,
}

/// Why a card could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotFoundReason {
    /// The stack is not registered.
    UnknownStack,
    /// The stack has no card with that id.
    UnknownCard,
    /// The card's record binding resolved to null.
    MissingRecord,
}

/// A card ready to render, or the not-found fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum CardBinding {
    /// The card and its data.
    Found {
        /// Card definition.
        card: CardDefinition,
        /// Merged scoped state.
        state: StateMap,
        /// Resolved record, when the card binds one.
        record: Option<Value>,
    },
    /// Render a local "not found" view instead.
    NotFound {
        /// Card id that was requested.
        card_id: String,
        /// Why binding failed.
        reason: NotFoundReason,
    },
}

enum Resolved {
    Domain(DomainAction),
    Intent(CardIntent),
    Set { path: String, value: Value },
    Patch { path: Option<String>, value: Value },
}

/// The engine: registered stacks, selectors, global defaults, and runtime card state.
pub struct CardEngine<S> {
    config: EngineConfig,
    global_defaults: StateMap,
    stacks: BTreeMap<String, Stack>,
    selectors: SelectorRegistry<S>,
    card_state: CardStateStore,
}

impl<S> Default for CardEngine<S> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<S> CardEngine<S> {
    /// Creates an empty engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            global_defaults: StateMap::new(),
            stacks: BTreeMap::new(),
            selectors: SelectorRegistry::default(),
            card_state: CardStateStore::default(),
        }
    }

    /// Engine limits.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the global default state layer.
    pub fn set_global_defaults(&mut self, defaults: StateMap) {
        self.global_defaults = defaults;
    }

    /// Validates and registers a stack, replacing any stack with the same id.
    pub fn register_stack(&mut self, stack: Stack) -> Result<(), EngineError> {
        stack.validate()?;
        if self.stacks.contains_key(&stack.id) {
            tracing::warn!(stack = %stack.id, "stack re-registered; previous definition replaced");
        }
        self.stacks.insert(stack.id.clone(), stack);
        Ok(())
    }

    /// Looks up a registered stack.
    pub fn stack(&self, stack_id: &str) -> Option<&Stack> {
        self.stacks.get(stack_id)
    }

    /// Selector table.
    pub fn selectors(&self) -> &SelectorRegistry<S> {
        &self.selectors
    }

    /// Mutable selector table for registration.
    pub fn selectors_mut(&mut self) -> &mut SelectorRegistry<S> {
        &mut self.selectors
    }

    /// Runtime card state.
    pub fn card_state(&self) -> &CardStateStore {
        &self.card_state
    }

    /// Discards every runtime-patch layer of `session_id`.
    pub fn dispose_session(&mut self, session_id: &str) -> usize {
        let dropped = self.card_state.dispose_session(session_id);
        tracing::debug!(session = %session_id, dropped, "disposed card session state");
        dropped
    }

    /// Merged scoped state of the card named by `scope`.
    pub fn read_state(&self, scope: &ExecutionScope) -> Result<StateMap, EngineError> {
        let stack = self.stack_for(scope)?;
        let layers = scope_layers(&self.global_defaults, stack, stack.card(&scope.card_id));
        Ok(self.card_state.read(&scope.scope_key(), &layers))
    }

    /// Binds the card named by `scope` for rendering. Never fails: unknown stacks, unknown cards,
    /// and null records all produce [`CardBinding::NotFound`].
    pub fn bind_card(&self, scope: &ExecutionScope, domain: &S) -> CardBinding {
        let not_found = |reason| CardBinding::NotFound {
            card_id: scope.card_id.clone(),
            reason,
        };
        let Some(stack) = self.stacks.get(&scope.stack_id) else {
            return not_found(NotFoundReason::UnknownStack);
        };
        let Some(card) = stack.card(&scope.card_id) else {
            return not_found(NotFoundReason::UnknownCard);
        };

        let layers = scope_layers(&self.global_defaults, stack, Some(card));
        let state = self.card_state.read(&scope.scope_key(), &layers);
        let event = Value::Null;
        let env = EvalEnv {
            domain,
            selectors: &self.selectors,
            scope,
            card_state: &state,
            card: Some(card),
            event: &event,
        };
        let record = match &card.record {
            Some(expr) => match expr.resolve(&env) {
                Value::Null => return not_found(NotFoundReason::MissingRecord),
                value => Some(value),
            },
            None => None,
        };

        CardBinding::Found {
            card: card.clone(),
            state,
            record,
        }
    }

    /// Executes one descriptor in `scope`.
    pub fn execute<D>(
        &mut self,
        scope: &ExecutionScope,
        descriptor: &ActionDescriptor,
        event: &Value,
        domain: &mut D,
    ) -> Result<ExecutionReport, EngineError>
    where
        D: DomainStore<State = S>,
    {
        let mut report = ExecutionReport {
            handled: true,
            ..ExecutionReport::default()
        };
        self.execute_one(scope, descriptor, event, domain, &mut report)?;
        Ok(report)
    }

    /// Runs the handler for `event_name` (card, then background, then stack).
    ///
    /// Returns an unhandled report when no handler exists. Programs larger than
    /// [`EngineConfig::max_instructions`] are rejected before any instruction runs. An
    /// instruction that fails mid-program stops it; the report up to that point is returned
    /// with [`ExecutionReport::error`] set.
    pub fn handle_event<D>(
        &mut self,
        scope: &ExecutionScope,
        event_name: &str,
        event: &Value,
        domain: &mut D,
    ) -> Result<ExecutionReport, EngineError>
    where
        D: DomainStore<State = S>,
    {
        let stack = self.stack_for(scope)?;
        let Some(program) = stack.handler_for(&scope.card_id, event_name).cloned() else {
            tracing::debug!(
                stack = %scope.stack_id,
                card = %scope.card_id,
                event = %event_name,
                "no handler for card event"
            );
            return Ok(ExecutionReport::default());
        };

        let count = program.instruction_count();
        if count > self.config.max_instructions {
            return Err(EngineError::InstructionBudgetExceeded {
                handler: event_name.to_string(),
                count,
                limit: self.config.max_instructions,
            });
        }

        let mut report = ExecutionReport {
            handled: true,
            ..ExecutionReport::default()
        };
        if let Err(error) = self.run_block(scope, program.instructions(), event, domain, &mut report)
        {
            tracing::warn!(
                stack = %scope.stack_id,
                card = %scope.card_id,
                event = %event_name,
                executed = report.executed,
                %error,
                "card handler stopped partway"
            );
            report.error = Some(error);
        }
        Ok(report)
    }

    fn run_block<D>(
        &mut self,
        scope: &ExecutionScope,
        instructions: &[Instruction],
        event: &Value,
        domain: &mut D,
        report: &mut ExecutionReport,
    ) -> Result<(), EngineError>
    where
        D: DomainStore<State = S>,
    {
        for instruction in instructions {
            match instruction {
                Instruction::Run { action } => {
                    self.execute_one(scope, action, event, domain, report)?;
                }
                Instruction::If {
                    when,
                    then,
                    otherwise,
                } => {
                    let holds = self.with_env(scope, event, domain.state(), |env| {
                        Ok(when.holds(env))
                    })?;
                    let branch = if holds { then } else { otherwise };
                    self.run_block(scope, branch, event, domain, report)?;
                }
                Instruction::Seq { body } => {
                    self.run_block(scope, body, event, domain, report)?;
                }
            }
        }
        Ok(())
    }

    fn execute_one<D>(
        &mut self,
        scope: &ExecutionScope,
        descriptor: &ActionDescriptor,
        event: &Value,
        domain: &mut D,
        report: &mut ExecutionReport,
    ) -> Result<(), EngineError>
    where
        D: DomainStore<State = S>,
    {
        let resolved = self.with_env(scope, event, domain.state(), |env| {
            resolve_descriptor(env, scope, descriptor)
        })?;
        report.executed += 1;

        match resolved {
            Resolved::Domain(action) => {
                tracing::debug!(action = %action.action_type(), "dispatching domain action");
                domain.dispatch(action.clone());
                report.dispatched.push(action);
            }
            Resolved::Intent(intent) => report.intents.push(intent),
            Resolved::Set { path, value } => {
                let stack = self
                    .stacks
                    .get(&scope.stack_id)
                    .ok_or_else(|| EngineError::UnknownStack(scope.stack_id.clone()))?;
                let layers =
                    scope_layers(&self.global_defaults, stack, stack.card(&scope.card_id));
                self.card_state
                    .set(&scope.scope_key(), &layers, &path, value)?;
                report.state_changed = true;
            }
            Resolved::Patch { path, value } => {
                let stack = self
                    .stacks
                    .get(&scope.stack_id)
                    .ok_or_else(|| EngineError::UnknownStack(scope.stack_id.clone()))?;
                let layers =
                    scope_layers(&self.global_defaults, stack, stack.card(&scope.card_id));
                self.card_state
                    .patch(&scope.scope_key(), &layers, path.as_deref(), value)?;
                report.state_changed = true;
            }
        }
        Ok(())
    }

    fn with_env<R>(
        &self,
        scope: &ExecutionScope,
        event: &Value,
        domain: &S,
        f: impl FnOnce(&EvalEnv<'_, S>) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let stack = self.stack_for(scope)?;
        let card = stack.card(&scope.card_id);
        let layers = scope_layers(&self.global_defaults, stack, card);
        let card_state = self.card_state.read(&scope.scope_key(), &layers);
        let env = EvalEnv {
            domain,
            selectors: &self.selectors,
            scope,
            card_state: &card_state,
            card,
            event,
        };
        f(&env)
    }

    fn stack_for(&self, scope: &ExecutionScope) -> Result<&Stack, EngineError> {
        self.stacks
            .get(&scope.stack_id)
            .ok_or_else(|| EngineError::UnknownStack(scope.stack_id.clone()))
    }
}

fn scope_layers<'a>(
    global: &'a StateMap,
    stack: &'a Stack,
    card: Option<&'a CardDefinition>,
) -> ScopeLayers<'a> {
    ScopeLayers {
        global,
        stack: Some(&stack.defaults),
        background: card
            .and_then(|card| stack.background_of(card))
            .map(|background| &background.defaults),
        card_type: card.and_then(|card| stack.card_type_defaults.get(&card.kind)),
        card: card.map(|card| &card.state),
    }
}

fn resolve_descriptor<S>(
    env: &EvalEnv<'_, S>,
    scope: &ExecutionScope,
    descriptor: &ActionDescriptor,
) -> Result<Resolved, EngineError> {
    let command = match descriptor {
        ActionDescriptor::Domain(domain) => {
            return Ok(Resolved::Domain(DomainAction {
                domain: domain.domain.clone(),
                action_name: domain.action_name.clone(),
                payload: domain.payload.resolve(env),
            }));
        }
        ActionDescriptor::Command(command) => command,
    };

    let navigate = |op| {
        Resolved::Intent(CardIntent::Navigate(NavIntent {
            session_id: scope.session_id.clone(),
            op,
        }))
    };

    Ok(match command {
        CardCommand::NavGo { args } => {
            let card = match args.card.resolve(env) {
                Value::String(card) if !card.trim().is_empty() => card,
                other => return Err(EngineError::InvalidNavigationTarget(other.to_string())),
            };
            navigate(NavOp::Go {
                card,
                param: args.param.resolve(env),
            })
        }
        CardCommand::NavBack { .. } => navigate(NavOp::Back),
        CardCommand::NavHome { .. } => navigate(NavOp::Home),
        CardCommand::Notify { args } => Resolved::Intent(CardIntent::Notify(Notice {
            level: args.level,
            message: notice_text(args.message.resolve(env)),
        })),
        CardCommand::DesktopRun { args } => {
            Resolved::Intent(CardIntent::RunCommand(CommandInvocation {
                command_id: args.id.clone(),
                payload: args.payload.resolve(env),
                source_window_id: scope.window_id.clone(),
            }))
        }
        CardCommand::Set { path, value } => {
            split_path(path)?;
            Resolved::Set {
                path: path.clone(),
                value: value.resolve(env),
            }
        }
        CardCommand::Patch { path, value } => {
            if let Some(path) = path {
                split_path(path)?;
            }
            match value.resolve(env) {
                value @ Value::Object(_) => Resolved::Patch {
                    path: path.clone(),
                    value,
                },
                _ => return Err(EngineError::PatchNotObject),
            }
        }
    })
}

fn notice_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

struct EvalEnv<'a, S> {
    domain: &'a S,
    selectors: &'a SelectorRegistry<S>,
    scope: &'a ExecutionScope,
    card_state: &'a StateMap,
    card: Option<&'a CardDefinition>,
    event: &'a Value,
}

impl<S> ExprEnv for EvalEnv<'_, S> {
    fn select(&self, name: &str, args: &Value) -> Value {
        let ctx = SelectorContext {
            settings: &self.scope.settings,
            matched: self.scope.matched.as_deref(),
            param: &self.scope.param,
            card_state: self.card_state,
        };
        self.selectors.select(name, self.domain, args, &ctx)
    }

    fn context_root(&self, root: &ContextRoot) -> Value {
        match root {
            ContextRoot::Settings => self.scope.settings.clone(),
            ContextRoot::Match => self
                .scope
                .matched
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            ContextRoot::Param => self.scope.param.clone(),
            ContextRoot::State => Value::Object(self.card_state.clone()),
            ContextRoot::Event => self.event.clone(),
            ContextRoot::Card => json!({
                "id": self.scope.card_id,
                "kind": self.card.map(|card| card.kind),
                "stackId": self.scope.stack_id,
            }),
            ContextRoot::Session => json!({
                "id": self.scope.session_id,
                "windowId": self.scope.window_id,
            }),
            ContextRoot::Unknown(_) => Value::Null,
        }
    }

    fn context(&self, path: &ContextPath) -> Value {
        let borrowed = match &path.root {
            ContextRoot::State => match path.segments.split_first() {
                Some((head, rest)) => self.card_state.get(head).and_then(|v| lookup(v, rest)),
                None => return Value::Object(self.card_state.clone()),
            },
            ContextRoot::Event => lookup(self.event, &path.segments),
            ContextRoot::Param => lookup(&self.scope.param, &path.segments),
            ContextRoot::Settings => lookup(&self.scope.settings, &path.segments),
            _ => {
                let root = self.context_root(&path.root);
                return lookup(&root, &path.segments).cloned().unwrap_or(Value::Null);
            }
        };
        borrowed.cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::expr::ValueExpr;

    #[derive(Default)]
    struct Inventory {
        items: BTreeMap<String, i64>,
        log: Vec<String>,
    }

    impl DomainStore for Inventory {
        type State = BTreeMap<String, i64>;

        fn state(&self) -> &Self::State {
            &self.items
        }

        fn dispatch(&mut self, action: DomainAction) {
            self.log.push(action.action_type());
            if action.action_name == "adjustQty" {
                let sku = action.payload["sku"].as_str().unwrap_or_default().to_string();
                let delta = action.payload["delta"].as_i64().unwrap_or(0);
                *self.items.entry(sku).or_default() += delta;
            }
        }
    }

    fn engine() -> CardEngine<BTreeMap<String, i64>> {
        let mut engine = CardEngine::default();
        engine
            .register_stack(
                serde_json::from_value(json!({
                    "id": "inventory",
                    "homeCard": "browse",
                    "defaults": { "currency": "USD" },
                    "cards": [
                        { "id": "browse", "kind": "list", "state": { "filter": { "text": "" } } },
                        {
                            "id": "detail",
                            "kind": "detail",
                            "record": { "$sel": "qtyOf", "args": { "$ctx": "param" } },
                            "handlers": {
                                "sell": [
                                    {
                                        "op": "run",
                                        "action": {
                                            "domain": "inventory",
                                            "actionName": "adjustQty",
                                            "payload": { "sku": { "$ctx": "param" }, "delta": -1 }
                                        }
                                    },
                                    {
                                        "op": "if",
                                        "when": {
                                            "test": "eq",
                                            "left": { "$sel": "qtyOf", "args": { "$ctx": "param" } },
                                            "right": 0
                                        },
                                        "then": [{
                                            "op": "run",
                                            "action": { "command": "notify", "args": { "message": "sold out" } }
                                        }]
                                    }
                                ]
                            }
                        }
                    ]
                }))
                .unwrap(),
            )
            .unwrap();
        engine
            .selectors_mut()
            .register("qtyOf", |items: &BTreeMap<String, i64>, args, _| {
                args.as_str()
                    .and_then(|sku| items.get(sku))
                    .map(|qty| json!(qty))
                    .unwrap_or(Value::Null)
            });
        engine
    }

    #[test]
    fn domain_action_is_resolved_before_dispatch() {
        let mut engine = engine();
        let mut store = Inventory::default();
        store.items.insert("A-1".to_string(), 2);
        let scope = ExecutionScope::new("inventory", "s1", "detail").with_param(json!("A-1"));

        let report = engine
            .handle_event(&scope, "sell", &Value::Null, &mut store)
            .unwrap();
        assert_eq!(store.items["A-1"], 1);
        assert_eq!(report.dispatched.len(), 1);
        assert!(report.intents.is_empty());

        let report = engine
            .handle_event(&scope, "sell", &Value::Null, &mut store)
            .unwrap();
        assert_eq!(store.items["A-1"], 0);
        assert_eq!(
            report.intents,
            vec![CardIntent::Notify(Notice::info("sold out"))]
        );
        assert_eq!(store.log, vec!["inventory/adjustQty", "inventory/adjustQty"]);
    }

    #[test]
    fn navigation_is_returned_as_intent() {
        let mut engine = engine();
        let mut store = Inventory::default();
        let scope = ExecutionScope::new("inventory", "s1", "browse");
        let descriptor: ActionDescriptor = serde_json::from_value(json!({
            "command": "nav.go",
            "args": { "card": "detail", "param": { "$ctx": "event.sku" } }
        }))
        .unwrap();

        let report = engine
            .execute(&scope, &descriptor, &json!({ "sku": "B-7" }), &mut store)
            .unwrap();
        assert_eq!(
            report.intents,
            vec![CardIntent::Navigate(NavIntent {
                session_id: "s1".to_string(),
                op: NavOp::Go {
                    card: "detail".to_string(),
                    param: json!("B-7"),
                },
            })]
        );
        assert!(store.log.is_empty());
    }

    #[test]
    fn nav_go_to_unresolved_card_is_rejected() {
        let mut engine = engine();
        let mut store = Inventory::default();
        let scope = ExecutionScope::new("inventory", "s1", "browse");
        let descriptor = ActionDescriptor::Command(CardCommand::NavGo {
            args: crate::descriptor::NavGoArgs {
                card: ValueExpr::selector("nowhere", ValueExpr::default()),
                param: ValueExpr::default(),
            },
        });
        assert_eq!(
            engine.execute(&scope, &descriptor, &Value::Null, &mut store),
            Err(EngineError::InvalidNavigationTarget("null".to_string()))
        );
    }

    #[test]
    fn set_and_patch_write_only_the_current_card_scope() {
        let mut engine = engine();
        let mut store = Inventory::default();
        let scope = ExecutionScope::new("inventory", "s1", "browse");
        let set: ActionDescriptor = serde_json::from_value(json!({
            "command": "set", "path": "filter.text", "value": { "$ctx": "match" }
        }))
        .unwrap();

        let report = engine
            .execute(
                &scope.clone().with_match("bolt"),
                &set,
                &Value::Null,
                &mut store,
            )
            .unwrap();
        assert!(report.state_changed);
        assert_eq!(
            Value::Object(engine.read_state(&scope).unwrap()),
            json!({ "currency": "USD", "filter": { "text": "bolt" } })
        );

        let other_session = ExecutionScope::new("inventory", "s2", "browse");
        assert_eq!(
            Value::Object(engine.read_state(&other_session).unwrap()),
            json!({ "currency": "USD", "filter": { "text": "" } })
        );

        assert_eq!(engine.dispose_session("s1"), 1);
        assert_eq!(
            engine.read_state(&scope).unwrap()["filter"],
            json!({ "text": "" })
        );
    }

    #[test]
    fn bind_card_falls_back_to_not_found() {
        let engine = engine();
        let mut items = BTreeMap::new();
        items.insert("A-1".to_string(), 4);

        let found = engine.bind_card(
            &ExecutionScope::new("inventory", "s1", "detail").with_param(json!("A-1")),
            &items,
        );
        assert!(matches!(found, CardBinding::Found { record: Some(_), .. }));

        let deleted = engine.bind_card(
            &ExecutionScope::new("inventory", "s1", "detail").with_param(json!("gone")),
            &items,
        );
        assert_eq!(
            deleted,
            CardBinding::NotFound {
                card_id: "detail".to_string(),
                reason: NotFoundReason::MissingRecord,
            }
        );

        let unknown = engine.bind_card(&ExecutionScope::new("inventory", "s1", "nope"), &items);
        assert!(matches!(
            unknown,
            CardBinding::NotFound {
                reason: NotFoundReason::UnknownCard,
                ..
            }
        ));
    }

    #[test]
    fn oversized_programs_are_rejected_before_running() {
        let mut engine: CardEngine<BTreeMap<String, i64>> =
            CardEngine::new(EngineConfig { max_instructions: 1 });
        engine
            .register_stack(
                serde_json::from_value(json!({
                    "id": "s",
                    "homeCard": "c",
                    "cards": [{
                        "id": "c",
                        "kind": "form",
                        "handlers": { "save": [
                            { "op": "run", "action": { "command": "set", "path": "a", "value": 1 } },
                            { "op": "run", "action": { "command": "set", "path": "b", "value": 2 } }
                        ] }
                    }]
                }))
                .unwrap(),
            )
            .unwrap();
        let mut store = Inventory::default();
        let scope = ExecutionScope::new("s", "s1", "c");

        let err = engine
            .handle_event(&scope, "save", &Value::Null, &mut store)
            .unwrap_err();
        assert!(matches!(err, EngineError::InstructionBudgetExceeded { count: 2, .. }));
        assert!(engine.card_state().is_empty());
    }

    #[test]
    fn failed_instruction_keeps_the_work_done_before_it() {
        let mut engine: CardEngine<BTreeMap<String, i64>> = CardEngine::default();
        engine
            .register_stack(
                serde_json::from_value(json!({
                    "id": "s",
                    "homeCard": "c",
                    "cards": [{
                        "id": "c",
                        "kind": "form",
                        "handlers": { "save": [
                            {
                                "op": "run",
                                "action": { "domain": "inventory", "actionName": "adjustQty", "payload": { "sku": "A-1", "delta": 1 } }
                            },
                            { "op": "run", "action": { "command": "notify", "args": { "message": "saved" } } },
                            { "op": "run", "action": { "command": "patch", "value": 5 } },
                            { "op": "run", "action": { "command": "nav.home" } }
                        ] }
                    }]
                }))
                .unwrap(),
            )
            .unwrap();
        let mut store = Inventory::default();
        let scope = ExecutionScope::new("s", "s1", "c");

        let report = engine
            .handle_event(&scope, "save", &Value::Null, &mut store)
            .unwrap();

        assert_eq!(report.error, Some(EngineError::PatchNotObject));
        assert_eq!(report.executed, 2);
        assert_eq!(store.log, vec!["inventory/adjustQty"]);
        assert_eq!(
            report.intents,
            vec![CardIntent::Notify(Notice::info("saved"))]
        );
        assert!(!report.state_changed);
    }

    #[test]
    fn missing_handler_reports_unhandled() {
        let mut engine = engine();
        let mut store = Inventory::default();
        let scope = ExecutionScope::new("inventory", "s1", "browse");
        let report = engine
            .handle_event(&scope, "sell", &Value::Null, &mut store)
            .unwrap();
        assert!(!report.handled);
        assert_eq!(
            engine.handle_event(
                &ExecutionScope::new("ghost", "s1", "x"),
                "sell",
                &Value::Null,
                &mut store
            ),
            Err(EngineError::UnknownStack("ghost".to_string()))
        );
    }
}
