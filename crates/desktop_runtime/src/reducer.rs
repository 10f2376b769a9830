//! Reducer actions, side-effect intents, and transition logic for the window registry.

use desktop_command_contract::Notice;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    model::{DesktopState, NavEntry, OpenWindowPayload, WindowContent, WindowId, WindowInstance},
    window_manager::{focus_window_internal, next_z, topmost_window, WindowLimits},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
/// Actions accepted by [`reduce_desktop`] to mutate [`DesktopState`].
pub enum DesktopAction {
    /// Open a window, or focus the window already holding the payload's dedupe key.
    OpenWindow(OpenWindowPayload),
    /// Focus (and raise) a window by id.
    FocusWindow {
        /// Window to focus.
        window_id: WindowId,
    },
    /// Close a window by id.
    CloseWindow {
        /// Window to close.
        window_id: WindowId,
    },
    /// Move a window's origin.
    MoveWindow {
        /// Window to move.
        window_id: WindowId,
        /// Requested x.
        x: i32,
        /// Requested y.
        y: i32,
    },
    /// Resize a window.
    ResizeWindow {
        /// Window to resize.
        window_id: WindowId,
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },
    /// Open or close a desktop menu.
    SetActiveMenu {
        /// Menu to show, or none.
        menu_id: Option<String>,
    },
    /// Select a desktop icon.
    SelectIcon {
        /// Icon to select, or none.
        icon_id: Option<String>,
    },
    /// Push a card onto a session's navigation stack.
    SessionNavGo {
        /// Card session.
        session_id: String,
        /// Card to show.
        card: String,
        /// Navigation parameter.
        #[serde(default)]
        param: Value,
    },
    /// Pop a session's navigation stack, never below its first entry.
    SessionNavBack {
        /// Card session.
        session_id: String,
    },
    /// Truncate a session's navigation stack to its first entry.
    SessionNavHome {
        /// Card session.
        session_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
/// Side-effect intents emitted by the runtime for the host to execute.
pub enum RuntimeEffect {
    /// Move input focus into the newly focused window.
    FocusWindowInput(WindowId),
    /// A card session ended; its scoped state can be released.
    SessionDisposed(String),
    /// Show a user-facing notice.
    Notify(Notice),
}

/// Applies a [`DesktopAction`] to the window registry and collects resulting side effects.
///
/// Every transition is total: an action naming an unknown window or session leaves the state
/// unchanged and returns no effects.
pub fn reduce_desktop(
    state: &mut DesktopState,
    limits: &WindowLimits,
    action: DesktopAction,
) -> Vec<RuntimeEffect> {
    let mut effects = Vec::new();
    match action {
        DesktopAction::OpenWindow(payload) => {
            open_window(state, limits, payload, &mut effects);
        }
        DesktopAction::FocusWindow { window_id } => {
            if focus_window_internal(state, &window_id) {
                state.active_menu_id = None;
                effects.push(RuntimeEffect::FocusWindowInput(window_id));
            } else if !state.windows.contains_key(&window_id) {
                tracing::debug!(window = %window_id, "focus ignored for unknown window");
            }
        }
        DesktopAction::CloseWindow { window_id } => {
            let Some(window) = state.windows.remove(&window_id) else {
                tracing::debug!(window = %window_id, "close ignored for unknown window");
                return effects;
            };
            state.order.retain(|id| *id != window_id);
            if let Some(session_id) = window.content.session_id() {
                if state.session_nav.remove(session_id).is_some() {
                    effects.push(RuntimeEffect::SessionDisposed(session_id.to_string()));
                }
            }
            if state.focused_window_id.as_ref() == Some(&window_id) {
                state.focused_window_id = topmost_window(state);
                if let Some(next) = state.focused_window_id.clone() {
                    effects.push(RuntimeEffect::FocusWindowInput(next));
                }
            }
        }
        DesktopAction::MoveWindow { window_id, x, y } => {
            let Some(window) = state.windows.get_mut(&window_id) else {
                tracing::debug!(window = %window_id, "move ignored for unknown window");
                return effects;
            };
            let (x, y) = limits.clamp_position(x, y, window.bounds.w);
            window.bounds.x = x;
            window.bounds.y = y;
        }
        DesktopAction::ResizeWindow {
            window_id,
            width,
            height,
        } => {
            let Some(window) = state.windows.get_mut(&window_id) else {
                tracing::debug!(window = %window_id, "resize ignored for unknown window");
                return effects;
            };
            window.bounds.w = width.max(window.min_w);
            window.bounds.h = height.max(window.min_h);
        }
        DesktopAction::SetActiveMenu { menu_id } => {
            state.active_menu_id = menu_id;
        }
        DesktopAction::SelectIcon { icon_id } => {
            state.selected_icon_id = icon_id;
        }
        DesktopAction::SessionNavGo {
            session_id,
            card,
            param,
        } => match state.session_nav.get_mut(&session_id) {
            Some(stack) => stack.push(NavEntry { card, param }),
            None => tracing::debug!(session = %session_id, "nav go ignored for unknown session"),
        },
        DesktopAction::SessionNavBack { session_id } => {
            if let Some(stack) = state.session_nav.get_mut(&session_id) {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
        }
        DesktopAction::SessionNavHome { session_id } => {
            if let Some(stack) = state.session_nav.get_mut(&session_id) {
                stack.truncate(1);
            }
        }
    }
    effects
}

fn open_window(
    state: &mut DesktopState,
    limits: &WindowLimits,
    mut payload: OpenWindowPayload,
    effects: &mut Vec<RuntimeEffect>,
) {
    let existing = payload
        .dedupe_key
        .as_deref()
        .and_then(|key| state.window_by_dedupe_key(key))
        .map(|window| window.id.clone())
        .or_else(|| {
            state
                .windows
                .contains_key(&payload.id)
                .then(|| payload.id.clone())
        });
    if let Some(window_id) = existing {
        tracing::debug!(window = %window_id, requested = %payload.id, "open resolved to existing window");
        if focus_window_internal(state, &window_id) {
            effects.push(RuntimeEffect::FocusWindowInput(window_id));
        }
        state.active_menu_id = None;
        return;
    }

    let min_w = payload.min_w.unwrap_or(limits.default_min_width);
    let min_h = payload.min_h.unwrap_or(limits.default_min_height);
    let mut bounds = payload.bounds.clamped_min(min_w, min_h);
    (bounds.x, bounds.y) = limits.clamp_position(bounds.x, bounds.y, bounds.w);

    // Card windows opened without a session host one named after the window.
    if let WindowContent::Card { card } = &mut payload.content {
        let session_id = card
            .card_session_id
            .get_or_insert_with(|| payload.id.as_str().to_string());
        state
            .session_nav
            .entry(session_id.clone())
            .or_insert_with(|| {
                vec![NavEntry {
                    card: card.card_id.clone(),
                    param: card.param.clone(),
                }]
            });
    }

    let window_id = payload.id.clone();
    let z = next_z(state);
    state.windows.insert(
        window_id.clone(),
        WindowInstance {
            id: window_id.clone(),
            title: payload.title,
            icon: payload.icon,
            bounds,
            z,
            min_w,
            min_h,
            is_dialog: payload.is_dialog,
            is_resizable: payload.is_resizable.unwrap_or(!payload.is_dialog),
            content: payload.content,
            dedupe_key: payload.dedupe_key,
        },
    );
    state.order.push(window_id.clone());
    state.focused_window_id = Some(window_id.clone());
    state.active_menu_id = None;
    effects.push(RuntimeEffect::FocusWindowInput(window_id));
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::WindowBounds;

    fn open(state: &mut DesktopState, payload: OpenWindowPayload) -> Vec<RuntimeEffect> {
        reduce_desktop(state, &WindowLimits::default(), DesktopAction::OpenWindow(payload))
    }

    fn card_window(id: &str, card: &str) -> OpenWindowPayload {
        OpenWindowPayload::new(id, card, WindowContent::card("inventory", card))
            .with_dedupe_key(format!("inventory:{card}"))
    }

    fn id(raw: &str) -> WindowId {
        WindowId::from(raw)
    }

    fn apply(state: &mut DesktopState, action: DesktopAction) -> Vec<RuntimeEffect> {
        reduce_desktop(state, &WindowLimits::default(), action)
    }

    #[test]
    fn open_window_focuses_new_window_and_raises_z() {
        let mut state = DesktopState::default();

        let effects = open(&mut state, card_window("w1", "browse"));
        open(&mut state, card_window("w2", "detail"));

        assert_eq!(effects, vec![RuntimeEffect::FocusWindowInput("w1".into())]);
        assert_eq!(state.order, vec![WindowId::from("w1"), WindowId::from("w2")]);
        assert_eq!(state.focused_window_id, Some("w2".into()));
        assert!(state.windows[&id("w1")].z < state.windows[&id("w2")].z);
        assert_eq!(state.windows[&id("w1")].min_w, 180);
        assert_eq!(state.windows[&id("w1")].min_h, 120);
    }

    #[test]
    fn dedupe_key_focuses_existing_window_without_allocating() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse"));
        open(&mut state, card_window("w2", "detail"));
        let z_before = state.z_counter;

        let effects = open(&mut state, card_window("w3", "browse"));

        assert_eq!(state.order, vec![WindowId::from("w1"), WindowId::from("w2")]);
        assert!(!state.windows.contains_key(&id("w3")));
        assert_eq!(state.focused_window_id, Some("w1".into()));
        assert_eq!(state.windows[&id("w1")].z, z_before + 1);
        assert_eq!(effects, vec![RuntimeEffect::FocusWindowInput("w1".into())]);
    }

    #[test]
    fn reopening_a_live_id_is_a_focus() {
        let mut state = DesktopState::default();
        open(&mut state, OpenWindowPayload::new("w1", "A", WindowContent::app("notes")));
        open(&mut state, OpenWindowPayload::new("w2", "B", WindowContent::app("chat")));
        open(&mut state, OpenWindowPayload::new("w1", "A again", WindowContent::app("notes")));

        assert_eq!(state.windows.len(), 2);
        assert_eq!(state.windows[&id("w1")].title, "A");
        assert_eq!(state.focused_window_id, Some("w1".into()));
    }

    #[test]
    fn focusing_focused_or_unknown_window_is_noop() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse"));
        let before = state.clone();

        assert!(apply(&mut state, DesktopAction::FocusWindow { window_id: "w1".into() }).is_empty());
        assert!(apply(&mut state, DesktopAction::FocusWindow { window_id: "nope".into() }).is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn open_and_focus_close_active_menu() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse"));
        open(&mut state, card_window("w2", "detail"));
        apply(
            &mut state,
            DesktopAction::SetActiveMenu {
                menu_id: Some("file".to_string()),
            },
        );
        assert_eq!(state.active_menu_id.as_deref(), Some("file"));

        apply(&mut state, DesktopAction::FocusWindow { window_id: "w1".into() });
        assert_eq!(state.active_menu_id, None);
    }

    #[test]
    fn closing_focused_window_focuses_highest_remaining_z() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse"));
        open(&mut state, card_window("w2", "detail"));
        open(&mut state, card_window("w3", "report"));
        apply(&mut state, DesktopAction::FocusWindow { window_id: "w1".into() });

        // w1 is focused and topmost; w3 is next by z.
        let effects = apply(&mut state, DesktopAction::CloseWindow { window_id: "w1".into() });
        assert_eq!(state.focused_window_id, Some("w3".into()));
        assert_eq!(
            effects,
            vec![
                RuntimeEffect::SessionDisposed("w1".to_string()),
                RuntimeEffect::FocusWindowInput("w3".into()),
            ]
        );

        // Closing a background window leaves focus alone.
        apply(&mut state, DesktopAction::CloseWindow { window_id: "w2".into() });
        assert_eq!(state.focused_window_id, Some("w3".into()));
    }

    #[test]
    fn closing_sole_window_clears_focus_and_order() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse"));

        apply(&mut state, DesktopAction::CloseWindow { window_id: "w1".into() });

        assert_eq!(state.focused_window_id, None);
        assert!(state.order.is_empty());
        assert!(state.windows.is_empty());
    }

    #[test]
    fn move_clamps_to_reachable_title_bar() {
        let mut state = DesktopState::default();
        open(
            &mut state,
            card_window("w1", "browse").with_bounds(WindowBounds::new(10, 10, 300, 200)),
        );

        apply(
            &mut state,
            DesktopAction::MoveWindow {
                window_id: "w1".into(),
                x: -500,
                y: -50,
            },
        );

        let bounds = state.windows[&id("w1")].bounds;
        assert_eq!((bounds.x, bounds.y), (-260, 0));
    }

    #[test]
    fn resize_clamps_to_window_minimum() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse").with_min_size(250, 150));

        apply(
            &mut state,
            DesktopAction::ResizeWindow {
                window_id: "w1".into(),
                width: 10,
                height: 400,
            },
        );

        let bounds = state.windows[&id("w1")].bounds;
        assert_eq!((bounds.w, bounds.h), (250, 400));
    }

    #[test]
    fn unknown_ids_leave_state_identical() {
        let mut state = DesktopState::default();
        open(&mut state, card_window("w1", "browse"));
        let before = state.clone();

        for action in [
            DesktopAction::CloseWindow { window_id: "x".into() },
            DesktopAction::MoveWindow { window_id: "x".into(), x: 1, y: 1 },
            DesktopAction::ResizeWindow { window_id: "x".into(), width: 1, height: 1 },
            DesktopAction::SessionNavGo {
                session_id: "x".to_string(),
                card: "c".to_string(),
                param: Value::Null,
            },
            DesktopAction::SessionNavBack { session_id: "x".to_string() },
            DesktopAction::SessionNavHome { session_id: "x".to_string() },
        ] {
            assert!(apply(&mut state, action).is_empty());
        }
        assert_eq!(state, before);
    }

    #[test]
    fn session_nav_bootstraps_and_never_empties() {
        let mut state = DesktopState::default();
        open(
            &mut state,
            OpenWindowPayload::new(
                "w1",
                "Browse",
                WindowContent::card("inventory", "browse")
                    .with_session("s1")
                    .with_param(json!({ "page": 1 })),
            ),
        );
        assert_eq!(
            state.session_nav("s1"),
            Some(
                &[NavEntry {
                    card: "browse".to_string(),
                    param: json!({ "page": 1 }),
                }][..]
            )
        );

        for card in ["detail", "edit"] {
            apply(
                &mut state,
                DesktopAction::SessionNavGo {
                    session_id: "s1".to_string(),
                    card: card.to_string(),
                    param: json!("A-1"),
                },
            );
        }
        assert_eq!(state.session_depth("s1"), 3);
        assert_eq!(state.session_current("s1").map(|e| e.card.as_str()), Some("edit"));

        apply(&mut state, DesktopAction::SessionNavHome { session_id: "s1".to_string() });
        assert_eq!(state.session_depth("s1"), 1);
        apply(&mut state, DesktopAction::SessionNavBack { session_id: "s1".to_string() });
        assert_eq!(state.session_depth("s1"), 1);
        assert_eq!(state.session_current("s1").map(|e| e.card.as_str()), Some("browse"));
    }

    #[test]
    fn closing_card_window_disposes_its_session() {
        let mut state = DesktopState::default();
        open(
            &mut state,
            OpenWindowPayload::new(
                "w1",
                "Browse",
                WindowContent::card("inventory", "browse").with_session("s1"),
            ),
        );

        let effects = apply(&mut state, DesktopAction::CloseWindow { window_id: "w1".into() });

        assert_eq!(effects, vec![RuntimeEffect::SessionDisposed("s1".to_string())]);
        assert_eq!(state.session_nav("s1"), None);
    }

    #[test]
    fn card_window_without_session_hosts_one_named_after_it() {
        let mut state = DesktopState::default();
        open(
            &mut state,
            OpenWindowPayload::new("w9", "Browse", WindowContent::card("inventory", "browse")),
        );

        assert_eq!(state.windows[&id("w9")].content.session_id(), Some("w9"));
        assert_eq!(state.session_depth("w9"), 1);
    }

    #[test]
    fn dialogs_default_to_fixed_size() {
        let mut state = DesktopState::default();
        open(
            &mut state,
            OpenWindowPayload::new("d1", "About", WindowContent::dialog("about")).as_dialog(),
        );
        let dialog = &state.windows[&id("d1")];
        assert!(dialog.is_dialog);
        assert!(!dialog.is_resizable);
    }

    #[test]
    fn actions_read_from_tagged_json() {
        let action: DesktopAction = serde_json::from_value(json!({
            "type": "moveWindow",
            "windowId": "w1",
            "x": 5,
            "y": 6
        }))
        .unwrap();
        assert_eq!(
            action,
            DesktopAction::MoveWindow {
                window_id: "w1".into(),
                x: 5,
                y: 6
            }
        );
    }
}
