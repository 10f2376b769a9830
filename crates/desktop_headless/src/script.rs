//! Scripted desktop sessions.
//!
//! A script is a JSON array of steps, or one step per line (blank lines and `#` comments are
//! skipped). Each step is tagged by `step`:
//!
//! ```json
//! {"step": "action", "action": {"type": "focusWindow", "windowId": "w1"}}
//! {"step": "begin-gesture", "windowId": "w1", "gesture": {"mode": "move"}, "x": 10, "y": 10}
//! {"step": "pointer", "x": 60, "y": 40}
//! {"step": "commit"}
//! {"step": "command", "commandId": "window.close", "sourceWindowId": "w1"}
//! {"step": "card-event", "windowId": "w2", "event": "save", "payload": {"stars": 4}}
//! ```

use anyhow::{Context, Result};
use card_engine::DomainStore;
use desktop_command_contract::{CommandInvocation, RouteOutcome};
use desktop_runtime::{
    DesktopAction, DesktopRuntime, DesktopState, GestureMode, PointerPosition, RuntimeEffect,
    WindowId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ScriptStep {
    /// Apply a registry action directly.
    Action { action: DesktopAction },
    BeginGesture {
        window_id: WindowId,
        gesture: GestureMode,
        x: i32,
        y: i32,
    },
    Pointer { x: i32, y: i32 },
    Commit,
    Cancel,
    /// Route a desktop command.
    Command(CommandInvocation),
    /// Fire a card event in a card window.
    CardEvent {
        window_id: WindowId,
        event: String,
        #[serde(default)]
        payload: Value,
    },
    ActivateIcon { icon_id: String },
    MenuItem { section: String, item: String },
}

/// Parses a JSON array or a JSON-lines script.
pub fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("script is not a valid step array");
    }
    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("script line {}", index + 1))
        })
        .collect()
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub index: usize,
    /// Command routes taken by the step, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub effects: Vec<RuntimeEffect>,
}

/// Final output of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub boot_effects: Vec<RuntimeEffect>,
    pub steps: Vec<StepRecord>,
    pub state: DesktopState,
}

/// Runs every step in order. Card errors are recorded on the step and do not stop the session.
pub fn run_script<D: DomainStore>(
    runtime: &mut DesktopRuntime<D>,
    steps: Vec<ScriptStep>,
) -> SessionReport {
    let boot_effects = runtime.drain_effects();
    let mut records = Vec::with_capacity(steps.len());

    for (index, step) in steps.into_iter().enumerate() {
        let mut record = StepRecord {
            index,
            routes: Vec::new(),
            error: None,
            effects: Vec::new(),
        };
        match step {
            ScriptStep::Action { action } => runtime.dispatch(action),
            ScriptStep::BeginGesture {
                window_id,
                gesture,
                x,
                y,
            } => {
                if !runtime.begin_gesture(&window_id, gesture, PointerPosition::new(x, y)) {
                    record.error = Some(format!("gesture rejected for window `{window_id}`"));
                }
            }
            ScriptStep::Pointer { x, y } => {
                runtime.update_gesture(PointerPosition::new(x, y));
            }
            ScriptStep::Commit => {
                runtime.commit_gesture();
            }
            ScriptStep::Cancel => {
                runtime.cancel_gesture();
            }
            ScriptStep::Command(invocation) => {
                record.routes.push(runtime.run_command(invocation));
            }
            ScriptStep::CardEvent {
                window_id,
                event,
                payload,
            } => {
                match runtime.handle_card_event(&window_id, &event, &payload) {
                    Ok(run) => {
                        record.routes = run.routes;
                        record.error = run.report.error.map(|err| err.to_string());
                    }
                    Err(err) => {
                        tracing::warn!(window = %window_id, event = %event, error = %err, "card event failed");
                        record.error = Some(err.to_string());
                    }
                }
            }
            ScriptStep::ActivateIcon { icon_id } => {
                match runtime.activate_icon(&icon_id) {
                    Some(route) => record.routes.push(route),
                    None => record.error = Some(format!("unknown icon `{icon_id}`")),
                }
            }
            ScriptStep::MenuItem { section, item } => {
                match runtime.run_menu_item(&section, &item) {
                    Some(route) => record.routes.push(route),
                    None => record.error = Some(format!("unknown menu item `{section}/{item}`")),
                }
            }
        }
        record.effects = runtime.drain_effects();
        records.push(record);
    }

    SessionReport {
        boot_effects,
        steps: records,
        state: runtime.state().clone(),
    }
}
