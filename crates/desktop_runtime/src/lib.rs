//! Virtual desktop runtime: window registry, pointer interaction, contribution composition,
//! command routing, and context menus, hosting card windows driven by [`card_engine`].

pub mod action_visibility;
pub mod builtin_commands;
pub mod command_router;
pub mod config;
pub mod context_actions;
pub mod contributions;
pub mod interaction;
pub mod model;
pub mod reducer;
pub mod runtime;
pub mod window_manager;

pub use action_visibility::{
    collapse_separators, filter_actions, ActionVisibility, UnauthorizedBehavior,
    VisibilityContext, VisibilityPredicate,
};
pub use command_router::{
    CommandContext, CommandHandler, CommandMatcher, CommandRouter, FnCommandHandler, HostFallback,
    RoutedCommand,
};
pub use config::{ConfigError, DesktopConfig};
pub use context_actions::{
    ContextAction, ContextActionItem, ContextActionRegistry, ContextTargetKind, ContextTargetRef,
};
pub use contributions::{
    compose_contributions, ComposeError, ComposedDesktop, ContributionManifest,
    DesktopContribution, DesktopIcon, IconCollisionPolicy, MenuEntry, MenuItem, MenuSection,
    ResolvedContent, StartupWindowFactory, WindowContentAdapter,
};
pub use interaction::{DragOverlay, GestureMode};
pub use model::*;
pub use reducer::{reduce_desktop, DesktopAction, RuntimeEffect};
pub use runtime::{CardRun, DesktopRuntime, RuntimeError};
pub use window_manager::WindowLimits;
