//! Single-writer desktop runtime.
//!
//! [`DesktopRuntime`] owns the window registry, the drag overlay, the composed contributions, the
//! command router, the context-action registry, and the card engine. Every mutation goes through
//! `&mut self`, and side effects accumulate in a queue the host drains with
//! [`DesktopRuntime::drain_effects`].

use card_engine::{
    ActionDescriptor, CardBinding, CardEngine, CardIntent, DomainStore, EngineError,
    ExecutionReport, ExecutionScope, NavOp, Stack,
};
use desktop_command_contract::{CommandInvocation, RegistrationToken, RouteOutcome};
use serde_json::Value;
use thiserror::Error;

use crate::{
    action_visibility::{filter_actions, VisibilityContext},
    builtin_commands::builtin_contribution,
    command_router::{CommandRouter, HostFallback},
    config::DesktopConfig,
    context_actions::{ContextAction, ContextActionRegistry, ContextTargetRef},
    contributions::{
        compose_contributions, ComposeError, ComposedDesktop, DesktopContribution, MenuEntry,
        ResolvedContent,
    },
    interaction::{DragOverlay, GestureMode},
    model::{DesktopState, PointerPosition, WindowBounds, WindowContent, WindowId},
    reducer::{reduce_desktop, DesktopAction, RuntimeEffect},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors surfaced by [`DesktopRuntime`].
pub enum RuntimeError {
    /// Contributions could not be composed.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// The card engine rejected a stack or an execution.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// No live window has this id.
    #[error("unknown window `{0}`")]
    UnknownWindow(WindowId),
    /// The window does not host card content.
    #[error("window `{0}` does not host a card")]
    NotCardWindow(WindowId),
    /// The window's card session has no navigation entry.
    #[error("card session `{0}` has no navigation entry")]
    MissingSession(String),
}

/// Result of a card event or action after its intents were applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRun {
    /// What the engine did.
    pub report: ExecutionReport,
    /// Outcome of every `desktop.run` intent, in order.
    pub routes: Vec<RouteOutcome>,
}

/// The desktop runtime over a host domain store.
pub struct DesktopRuntime<D: DomainStore> {
    config: DesktopConfig,
    state: DesktopState,
    overlay: DragOverlay,
    composed: ComposedDesktop,
    router: CommandRouter,
    context_actions: ContextActionRegistry,
    engine: CardEngine<D::State>,
    domain: D,
    settings: Value,
    effects: Vec<RuntimeEffect>,
}

impl<D: DomainStore> DesktopRuntime<D> {
    /// Composes `contributions` plus the built-in window commands.
    pub fn new(
        config: DesktopConfig,
        mut contributions: Vec<DesktopContribution>,
        domain: D,
    ) -> Result<Self, RuntimeError> {
        contributions.push(builtin_contribution());
        let composed = compose_contributions(contributions, config.contributions.icon_collision)?;
        let router = CommandRouter::new(composed.commands.clone());
        tracing::info!(
            contributions = composed.contribution_ids.len(),
            handlers = composed.commands.len(),
            "desktop runtime ready"
        );
        Ok(Self {
            overlay: DragOverlay::new(config.windows),
            engine: CardEngine::new(config.engine.clone()),
            config,
            state: DesktopState::default(),
            composed,
            router,
            context_actions: ContextActionRegistry::default(),
            domain,
            settings: Value::Null,
            effects: Vec::new(),
        })
    }

    /// Opens every startup window in contribution order. Returns how many were requested.
    pub fn boot(&mut self) -> usize {
        let payloads = self.composed.startup_payloads(&self.state);
        let count = payloads.len();
        for payload in payloads {
            self.dispatch(DesktopAction::OpenWindow(payload));
        }
        tracing::info!(startup_windows = count, "desktop booted");
        count
    }

    pub fn config(&self) -> &DesktopConfig {
        &self.config
    }

    pub fn state(&self) -> &DesktopState {
        &self.state
    }

    pub fn overlay(&self) -> &DragOverlay {
        &self.overlay
    }

    pub fn composed(&self) -> &ComposedDesktop {
        &self.composed
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn engine(&self) -> &CardEngine<D::State> {
        &self.engine
    }

    /// Mutable engine access for registering stacks, selectors, and global defaults.
    pub fn engine_mut(&mut self) -> &mut CardEngine<D::State> {
        &mut self.engine
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut D {
        &mut self.domain
    }

    /// Settings exposed to card expressions as `settings`.
    pub fn set_settings(&mut self, settings: Value) {
        self.settings = settings;
    }

    pub fn register_stack(&mut self, stack: Stack) -> Result<(), RuntimeError> {
        self.engine.register_stack(stack)?;
        Ok(())
    }

    /// Installs or clears the host hook for commands no handler claims.
    pub fn set_command_fallback(&mut self, fallback: Option<HostFallback>) {
        self.router.set_fallback(fallback);
    }

    /// Applies one registry action and queues its effects.
    pub fn dispatch(&mut self, action: DesktopAction) {
        if let DesktopAction::CloseWindow { window_id } = &action {
            self.overlay.forget(window_id);
        }
        for effect in reduce_desktop(&mut self.state, &self.config.windows, action) {
            if let RuntimeEffect::SessionDisposed(session_id) = &effect {
                self.engine.dispose_session(session_id);
            }
            self.effects.push(effect);
        }
    }

    /// Effects queued since the last drain, in emission order.
    pub fn drain_effects(&mut self) -> Vec<RuntimeEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn pending_effects(&self) -> &[RuntimeEffect] {
        &self.effects
    }

    /// Starts a move or resize gesture, focusing the window. Returns whether it started.
    pub fn begin_gesture(
        &mut self,
        window_id: &WindowId,
        mode: GestureMode,
        pointer: PointerPosition,
    ) -> bool {
        match self.overlay.begin(&self.state, window_id, mode, pointer) {
            Some(focus) => {
                self.dispatch(focus);
                true
            }
            None => false,
        }
    }

    pub fn update_gesture(&mut self, pointer: PointerPosition) -> Option<WindowBounds> {
        self.overlay.update(pointer)
    }

    /// Persists the active gesture's draft. Returns the number of registry actions applied.
    pub fn commit_gesture(&mut self) -> usize {
        let actions = self.overlay.commit(&self.state);
        let count = actions.len();
        for action in actions {
            self.dispatch(action);
        }
        count
    }

    pub fn cancel_gesture(&mut self) -> Option<WindowId> {
        self.overlay.cancel()
    }

    /// Bounds a renderer should paint for `window_id`, draft included.
    pub fn effective_bounds(&self, window_id: &WindowId) -> Option<WindowBounds> {
        self.state
            .window(window_id)
            .map(|window| self.overlay.effective_bounds(window))
    }

    /// Routes a command, then applies the actions and notices its handler queued.
    pub fn run_command(&mut self, invocation: CommandInvocation) -> RouteOutcome {
        let routed = self.router.route(&invocation, &self.state);
        for action in routed.actions {
            self.dispatch(action);
        }
        self.effects
            .extend(routed.notices.into_iter().map(RuntimeEffect::Notify));
        routed.outcome
    }

    /// Selects a desktop icon and routes its command.
    pub fn activate_icon(&mut self, icon_id: &str) -> Option<RouteOutcome> {
        let icon = self.composed.icon(icon_id)?.clone();
        self.dispatch(DesktopAction::SelectIcon {
            icon_id: Some(icon.id),
        });
        Some(self.run_command(CommandInvocation::new(icon.command).with_payload(icon.payload)))
    }

    /// Routes a menu item's command and closes the menu. The focused window is the source.
    pub fn run_menu_item(&mut self, section_id: &str, item_id: &str) -> Option<RouteOutcome> {
        let item = self
            .composed
            .menu(section_id)?
            .items
            .iter()
            .find_map(|entry| match entry {
                MenuEntry::Item(item) if item.id == item_id => Some(item.clone()),
                _ => None,
            })?;
        self.dispatch(DesktopAction::SetActiveMenu { menu_id: None });
        let mut invocation = CommandInvocation::new(item.command).with_payload(item.payload);
        invocation.source_window_id = self
            .state
            .focused_window_id
            .as_ref()
            .map(|id| id.as_str().to_string());
        Some(self.run_command(invocation))
    }

    pub fn register_context_actions(
        &mut self,
        target: &ContextTargetRef,
        actions: Vec<ContextAction>,
    ) -> RegistrationToken {
        self.context_actions.register(target, actions)
    }

    pub fn unregister_context_actions(&mut self, token: RegistrationToken) -> bool {
        self.context_actions.unregister(token)
    }

    /// Resolved and visibility-filtered context menu for `target`.
    pub fn context_actions(
        &self,
        target: &ContextTargetRef,
        viewer: &VisibilityContext,
    ) -> Vec<ContextAction> {
        let mut viewer = viewer.clone();
        if viewer.target.is_none() {
            viewer.target = Some(target.normalized());
        }
        filter_actions(self.context_actions.resolve(target), &viewer)
    }

    /// Runs the visible, enabled context action `action_id`. The target's window is the source.
    pub fn run_context_action(
        &mut self,
        target: &ContextTargetRef,
        viewer: &VisibilityContext,
        action_id: &str,
    ) -> Option<RouteOutcome> {
        let item = self
            .context_actions(target, viewer)
            .into_iter()
            .find_map(|action| match action {
                ContextAction::Item(item) if item.id == action_id && !item.disabled => Some(item),
                _ => None,
            })?;
        let mut invocation = CommandInvocation::new(item.command).with_payload(item.payload);
        invocation.source_window_id = target.normalized().window_id;
        Some(self.run_command(invocation))
    }

    /// View model for a window's content.
    pub fn resolve_content(&self, window_id: &WindowId) -> Option<ResolvedContent> {
        self.state
            .window(window_id)
            .map(|window| self.composed.adapters.resolve(window))
    }

    /// Execution scope of the card currently shown in `window_id`.
    pub fn card_scope(&self, window_id: &WindowId) -> Result<ExecutionScope, RuntimeError> {
        let window = self
            .state
            .window(window_id)
            .ok_or_else(|| RuntimeError::UnknownWindow(window_id.clone()))?;
        let WindowContent::Card { card } = &window.content else {
            return Err(RuntimeError::NotCardWindow(window_id.clone()));
        };
        let session_id = card
            .card_session_id
            .clone()
            .unwrap_or_else(|| window_id.as_str().to_string());
        let current = self
            .state
            .session_current(&session_id)
            .ok_or_else(|| RuntimeError::MissingSession(session_id.clone()))?;

        Ok(
            ExecutionScope::new(card.stack_id.clone(), session_id.clone(), current.card.clone())
                .with_param(current.param.clone())
                .with_settings(self.settings.clone())
                .with_window(window_id.as_str()),
        )
    }

    /// Binds the current card of `window_id` for rendering.
    pub fn bind_card(&self, window_id: &WindowId) -> Result<CardBinding, RuntimeError> {
        let scope = self.card_scope(window_id)?;
        Ok(self.engine.bind_card(&scope, self.domain.state()))
    }

    /// Runs the card's handler for `event_name` and applies the resulting intents.
    ///
    /// A program that stops partway still has the intents it recorded before failing applied;
    /// the failure is reported in [`ExecutionReport::error`].
    pub fn handle_card_event(
        &mut self,
        window_id: &WindowId,
        event_name: &str,
        event: &Value,
    ) -> Result<CardRun, RuntimeError> {
        let scope = self.card_scope(window_id)?;
        let report = self
            .engine
            .handle_event(&scope, event_name, event, &mut self.domain)?;
        let routes = self.apply_card_intents(&report.intents);
        Ok(CardRun { report, routes })
    }

    /// Executes one descriptor in the card of `window_id` and applies the resulting intents.
    pub fn execute_card_action(
        &mut self,
        window_id: &WindowId,
        descriptor: &ActionDescriptor,
        event: &Value,
    ) -> Result<CardRun, RuntimeError> {
        let scope = self.card_scope(window_id)?;
        let report = self
            .engine
            .execute(&scope, descriptor, event, &mut self.domain)?;
        let routes = self.apply_card_intents(&report.intents);
        Ok(CardRun { report, routes })
    }

    fn apply_card_intents(&mut self, intents: &[CardIntent]) -> Vec<RouteOutcome> {
        let mut routes = Vec::new();
        for intent in intents {
            match intent {
                CardIntent::Navigate(nav) => {
                    let session_id = nav.session_id.clone();
                    self.dispatch(match &nav.op {
                        NavOp::Go { card, param } => DesktopAction::SessionNavGo {
                            session_id,
                            card: card.clone(),
                            param: param.clone(),
                        },
                        NavOp::Back => DesktopAction::SessionNavBack { session_id },
                        NavOp::Home => DesktopAction::SessionNavHome { session_id },
                    });
                }
                CardIntent::Notify(notice) => {
                    self.effects.push(RuntimeEffect::Notify(notice.clone()));
                }
                CardIntent::RunCommand(invocation) => {
                    let outcome = self.run_command(invocation.clone());
                    tracing::debug!(command = %invocation.command_id, ?outcome, "card ran desktop command");
                    routes.push(outcome);
                }
            }
        }
        routes
    }
}
