//! Window commands every desktop ships with.

use desktop_command_contract::{CommandId, CommandOutcome, Notice};
use serde_json::Value;

use crate::{
    command_router::{CommandContext, CommandMatcher, FnCommandHandler},
    contributions::DesktopContribution,
    model::{OpenWindowPayload, WindowId},
    reducer::DesktopAction,
};

/// Contribution id of the built-in window commands.
pub const BUILTIN_CONTRIBUTION_ID: &str = "desktop.builtin";

/// Built-ins run after every contributed handler with default priority.
pub const BUILTIN_PRIORITY: i32 = -100;

/// `window.open`, `window.focus`, `window.close`, and `menu.close`.
pub fn builtin_contribution() -> DesktopContribution {
    DesktopContribution::new(BUILTIN_CONTRIBUTION_ID)
        .with_command(window_open_handler())
        .with_command(simple_window_handler("window.focus", |window_id| {
            DesktopAction::FocusWindow { window_id }
        }))
        .with_command(simple_window_handler("window.close", |window_id| {
            DesktopAction::CloseWindow { window_id }
        }))
        .with_command(
            FnCommandHandler::new(
                "menu.close",
                CommandMatcher::Exact(CommandId::new("menu.close")),
                |_, ctx| {
                    ctx.dispatch(DesktopAction::SetActiveMenu { menu_id: None });
                    CommandOutcome::Handled
                },
            )
            .with_priority(BUILTIN_PRIORITY),
        )
}

fn window_open_handler() -> FnCommandHandler {
    FnCommandHandler::new(
        "window.open",
        CommandMatcher::Exact(CommandId::new("window.open")),
        |command_id, ctx| {
            match serde_json::from_value::<OpenWindowPayload>(ctx.payload().clone()) {
                Ok(payload) => ctx.dispatch(DesktopAction::OpenWindow(payload)),
                Err(err) => {
                    tracing::warn!(command = %command_id, error = %err, "invalid open-window payload");
                    ctx.notify(Notice::warning(format!("{command_id}: {err}")));
                }
            }
            CommandOutcome::Handled
        },
    )
    .with_priority(BUILTIN_PRIORITY)
}

/// Handler acting on one window named by the payload's `windowId`, or else by the source window.
fn simple_window_handler(
    command: &'static str,
    builder: fn(WindowId) -> DesktopAction,
) -> FnCommandHandler {
    FnCommandHandler::new(
        command,
        CommandMatcher::Exact(CommandId::new(command)),
        move |command_id, ctx| {
            match target_window(ctx) {
                Some(window_id) => ctx.dispatch(builder(window_id)),
                None => ctx.notify(Notice::warning(format!(
                    "usage: {command_id} {{\"windowId\": <id>}}"
                ))),
            }
            CommandOutcome::Handled
        },
    )
    .with_priority(BUILTIN_PRIORITY)
}

fn target_window(ctx: &CommandContext<'_>) -> Option<WindowId> {
    let from_payload = match ctx.payload() {
        Value::String(id) => Some(id.as_str()),
        payload => payload.get("windowId").and_then(Value::as_str),
    };
    from_payload
        .or_else(|| ctx.source_window_id())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(WindowId::from)
}

#[cfg(test)]
mod tests {
    use desktop_command_contract::{CommandInvocation, NoticeLevel, RouteOutcome};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{
        command_router::CommandRouter,
        contributions::{compose_contributions, IconCollisionPolicy},
        model::{DesktopState, WindowContent},
    };

    fn router() -> CommandRouter {
        let composed =
            compose_contributions(vec![builtin_contribution()], IconCollisionPolicy::Throw)
                .unwrap();
        CommandRouter::new(composed.commands)
    }

    #[test]
    fn close_uses_payload_then_source_window() {
        let router = router();
        let state = DesktopState::default();

        let explicit = router.route(
            &CommandInvocation::new("window.close").with_payload(json!({ "windowId": "w2" })),
            &state,
        );
        assert_eq!(
            explicit.actions,
            vec![DesktopAction::CloseWindow { window_id: "w2".into() }]
        );

        let from_source = router.route(
            &CommandInvocation::new("window.close").with_source_window("w1"),
            &state,
        );
        assert_eq!(
            from_source.actions,
            vec![DesktopAction::CloseWindow { window_id: "w1".into() }]
        );
    }

    #[test]
    fn missing_target_is_handled_with_a_warning() {
        let routed = router().route(&CommandInvocation::new("window.focus"), &DesktopState::default());

        assert!(routed.outcome.is_handled());
        assert!(routed.actions.is_empty());
        assert_eq!(routed.notices.len(), 1);
        assert_eq!(routed.notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn open_parses_payload() {
        let routed = router().route(
            &CommandInvocation::new("window.open").with_payload(json!({
                "id": "w-notes",
                "title": "Notes",
                "content": { "kind": "app", "appKey": "notes" }
            })),
            &DesktopState::default(),
        );

        assert_eq!(
            routed.outcome,
            RouteOutcome::Handled {
                handler_id: "window.open".to_string()
            }
        );
        assert_eq!(
            routed.actions,
            vec![DesktopAction::OpenWindow(OpenWindowPayload::new(
                "w-notes",
                "Notes",
                WindowContent::app("notes")
            ))]
        );
    }
}
