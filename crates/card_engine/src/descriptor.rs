//! Declarative action descriptors.
//!
//! Wire vocabulary:
//!
//! - domain action: `{"domain": "inventory", "actionName": "adjustQty", "payload": <expr>}`
//! - system command: `{"command": "nav.go" | "nav.back" | "nav.home" | "notify" | "desktop.run",
//!   "args": {...}}`
//! - card action: `{"command": "set", "path": "form.qty", "value": <expr>}` or
//!   `{"command": "patch", "path"?: "form", "value": <expr>}`

use desktop_command_contract::{CommandId, NoticeLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::ValueExpr;

/// One declarative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionDescriptor {
    /// Domain-scoped state mutation forwarded to the host store.
    Domain(DomainActionDescriptor),
    /// System command or card-local state edit.
    Command(CardCommand),
}

impl ActionDescriptor {
    /// Shorthand for a domain action descriptor.
    pub fn domain(
        domain: impl Into<String>,
        action_name: impl Into<String>,
        payload: ValueExpr,
    ) -> Self {
        Self::Domain(DomainActionDescriptor {
            domain: domain.into(),
            action_name: action_name.into(),
            payload,
        })
    }
}

impl From<CardCommand> for ActionDescriptor {
    fn from(command: CardCommand) -> Self {
        Self::Command(command)
    }
}

/// Unresolved domain action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainActionDescriptor {
    /// Domain (store slice) the action belongs to.
    pub domain: String,
    /// Action name within the domain.
    pub action_name: String,
    /// Payload expression.
    #[serde(default)]
    pub payload: ValueExpr,
}

/// Fully resolved domain action handed to the host store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainAction {
    /// Domain (store slice) the action belongs to.
    pub domain: String,
    /// Action name within the domain.
    pub action_name: String,
    /// Resolved payload.
    pub payload: Value,
}

impl DomainAction {
    /// Returns the conventional `domain/actionName` type string.
    pub fn action_type(&self) -> String {
        format!("{}/{}", self.domain, self.action_name)
    }
}

/// System commands and card-local state edits, tagged by `command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum CardCommand {
    /// Push a card onto the session's navigation stack.
    #[serde(rename = "nav.go")]
    NavGo {
        /// Target card and parameter.
        args: NavGoArgs,
    },
    /// Pop the session's navigation stack (never below its first entry).
    #[serde(rename = "nav.back")]
    NavBack {
        /// Ignored.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        args: Value,
    },
    /// Truncate the session's navigation stack to its first entry.
    #[serde(rename = "nav.home")]
    NavHome {
        /// Ignored.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        args: Value,
    },
    /// Emit a user-facing notice.
    #[serde(rename = "notify")]
    Notify {
        /// Notice message and level.
        args: NotifyArgs,
    },
    /// Route a desktop command id through the host command router.
    #[serde(rename = "desktop.run")]
    DesktopRun {
        /// Command id and payload.
        args: DesktopRunArgs,
    },
    /// Set one path of the current card's scoped state.
    #[serde(rename = "set")]
    Set {
        /// Dotted path below the card state root.
        path: String,
        /// Value expression.
        value: ValueExpr,
    },
    /// Shallow-merge an object into the card state root, or into the object at `path`.
    #[serde(rename = "patch")]
    Patch {
        /// Optional dotted path of the object to merge into.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        /// Object expression.
        value: ValueExpr,
    },
}

/// Arguments of `nav.go`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavGoArgs {
    /// Card id expression.
    pub card: ValueExpr,
    /// Navigation parameter expression.
    #[serde(default)]
    pub param: ValueExpr,
}

/// Arguments of `notify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyArgs {
    /// Message expression; non-string values are rendered as JSON.
    pub message: ValueExpr,
    /// Notice severity.
    #[serde(default)]
    pub level: NoticeLevel,
}

/// Arguments of `desktop.run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopRunArgs {
    /// Desktop command to route.
    pub id: CommandId,
    /// Payload expression.
    #[serde(default)]
    pub payload: ValueExpr,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn domain_descriptor_uses_camel_case_wire_names() {
        let descriptor: ActionDescriptor = serde_json::from_value(json!({
            "domain": "inventory",
            "actionName": "adjustQty",
            "payload": { "sku": { "$ctx": "param" }, "delta": -1 },
        }))
        .unwrap();
        let ActionDescriptor::Domain(domain) = descriptor else {
            panic!("expected domain action");
        };
        assert_eq!(domain.domain, "inventory");
        assert_eq!(domain.action_name, "adjustQty");
        assert!(!domain.payload.is_constant());
    }

    #[test]
    fn system_and_card_commands_are_tagged_by_command() {
        let go: ActionDescriptor = serde_json::from_value(json!({
            "command": "nav.go",
            "args": { "card": "detail", "param": { "$ctx": "event.sku" } },
        }))
        .unwrap();
        assert!(matches!(
            go,
            ActionDescriptor::Command(CardCommand::NavGo { .. })
        ));

        let back: ActionDescriptor =
            serde_json::from_value(json!({ "command": "nav.back" })).unwrap();
        assert_eq!(
            back,
            ActionDescriptor::Command(CardCommand::NavBack { args: Value::Null })
        );

        let set: ActionDescriptor = serde_json::from_value(json!({
            "command": "set",
            "path": "form.qty",
            "value": 4,
        }))
        .unwrap();
        assert_eq!(
            set,
            ActionDescriptor::Command(CardCommand::Set {
                path: "form.qty".to_string(),
                value: ValueExpr::Literal(json!(4)),
            })
        );
    }

    #[test]
    fn unknown_command_tag_is_rejected() {
        let result =
            serde_json::from_value::<ActionDescriptor>(json!({ "command": "eval", "args": "1+1" }));
        assert!(result.is_err());
    }
}
