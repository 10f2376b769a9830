//! Priority-ordered routing of command ids to contributed handlers.

use std::{fmt, rc::Rc};

use desktop_command_contract::{CommandId, CommandInvocation, CommandOutcome, Notice, RouteOutcome};
use serde_json::Value;

use crate::{model::DesktopState, reducer::DesktopAction};

/// Which command ids a handler claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandMatcher {
    /// One id.
    Exact(CommandId),
    /// Every id starting with the prefix, such as `window.`.
    Prefix(String),
    /// Every id.
    Any,
}

impl CommandMatcher {
    pub fn matches(&self, command_id: &CommandId) -> bool {
        match self {
            Self::Exact(id) => id == command_id,
            Self::Prefix(prefix) => command_id.as_str().starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }
}

/// Context handed to a running handler.
///
/// Handlers never mutate the desktop directly: they queue actions, which the runtime applies after
/// routing returns.
pub struct CommandContext<'a> {
    state: &'a DesktopState,
    invocation: &'a CommandInvocation,
    actions: Vec<DesktopAction>,
    notices: Vec<Notice>,
}

impl<'a> CommandContext<'a> {
    pub fn new(state: &'a DesktopState, invocation: &'a CommandInvocation) -> Self {
        Self {
            state,
            invocation,
            actions: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &DesktopState {
        self.state
    }

    pub fn invocation(&self) -> &CommandInvocation {
        self.invocation
    }

    pub fn payload(&self) -> &Value {
        &self.invocation.payload
    }

    pub fn source_window_id(&self) -> Option<&str> {
        self.invocation.source_window_id.as_deref()
    }

    /// Queues a registry action.
    pub fn dispatch(&mut self, action: DesktopAction) {
        self.actions.push(action);
    }

    /// Queues a user-facing notice.
    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// A contributed command handler.
pub trait CommandHandler {
    /// Stable handler id, reported when the handler claims a command.
    fn id(&self) -> &str;

    /// Higher priorities are consulted first.
    fn priority(&self) -> i32 {
        0
    }

    fn matches(&self, command_id: &CommandId) -> bool;

    fn run(&self, command_id: &CommandId, ctx: &mut CommandContext<'_>) -> CommandOutcome;
}

/// Closure type run by [`FnCommandHandler`].
pub type CommandFn = Rc<dyn Fn(&CommandId, &mut CommandContext<'_>) -> CommandOutcome>;

/// Handler built from a matcher and a closure.
#[derive(Clone)]
pub struct FnCommandHandler {
    id: String,
    priority: i32,
    matcher: CommandMatcher,
    run: CommandFn,
}

impl FnCommandHandler {
    pub fn new(
        id: impl Into<String>,
        matcher: CommandMatcher,
        run: impl Fn(&CommandId, &mut CommandContext<'_>) -> CommandOutcome + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            matcher,
            run: Rc::new(run),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for FnCommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommandHandler")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

impl CommandHandler for FnCommandHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn matches(&self, command_id: &CommandId) -> bool {
        self.matcher.matches(command_id)
    }

    fn run(&self, command_id: &CommandId, ctx: &mut CommandContext<'_>) -> CommandOutcome {
        (self.run)(command_id, ctx)
    }
}

/// Host hook invoked for commands no handler claimed.
pub type HostFallback = Rc<dyn Fn(&CommandInvocation, &DesktopState)>;

/// Result of routing one command.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCommand {
    pub outcome: RouteOutcome,
    /// Actions queued by the handler that claimed the command.
    pub actions: Vec<DesktopAction>,
    pub notices: Vec<Notice>,
}

/// Routes command ids through handlers sorted by descending priority.
#[derive(Clone, Default)]
pub struct CommandRouter {
    handlers: Vec<Rc<dyn CommandHandler>>,
    fallback: Option<HostFallback>,
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.id()).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl CommandRouter {
    /// Builds a router over handlers already sorted by priority.
    pub fn new(handlers: Vec<Rc<dyn CommandHandler>>) -> Self {
        Self {
            handlers,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: HostFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn set_fallback(&mut self, fallback: Option<HostFallback>) {
        self.fallback = fallback;
    }

    pub fn handler_ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|handler| handler.id())
    }

    /// Offers the command to each matching handler in order and stops at the first that handles
    /// it. Actions and notices queued by handlers that pass are discarded.
    pub fn route(&self, invocation: &CommandInvocation, state: &DesktopState) -> RoutedCommand {
        let command_id = &invocation.command_id;
        for handler in &self.handlers {
            if !handler.matches(command_id) {
                continue;
            }
            let mut ctx = CommandContext::new(state, invocation);
            match handler.run(command_id, &mut ctx) {
                CommandOutcome::Handled => {
                    tracing::debug!(command = %command_id, handler = handler.id(), "command handled");
                    return RoutedCommand {
                        outcome: RouteOutcome::Handled {
                            handler_id: handler.id().to_string(),
                        },
                        actions: ctx.actions,
                        notices: ctx.notices,
                    };
                }
                CommandOutcome::Pass => {
                    tracing::trace!(command = %command_id, handler = handler.id(), "handler passed");
                }
            }
        }

        match &self.fallback {
            Some(fallback) => fallback(invocation, state),
            None => tracing::warn!(command = %command_id, "unhandled desktop command"),
        }
        RoutedCommand {
            outcome: RouteOutcome::Unhandled {
                command_id: command_id.clone(),
            },
            actions: Vec::new(),
            notices: Vec::new(),
        }
    }
}
