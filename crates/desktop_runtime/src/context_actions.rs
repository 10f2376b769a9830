//! Context-menu actions keyed by UI target.

use std::collections::{BTreeMap, BTreeSet};

use desktop_command_contract::{CommandId, RegistrationToken};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action_visibility::ActionVisibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextTargetKind {
    Desktop,
    Window,
    Icon,
    Widget,
    Conversation,
    Message,
}

impl ContextTargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Window => "window",
            Self::Icon => "icon",
            Self::Widget => "widget",
            Self::Conversation => "conversation",
            Self::Message => "message",
        }
    }
}

/// Reference to the UI element a context menu was opened on. Used only as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextTargetRef {
    pub kind: ContextTargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,
}

impl ContextTargetRef {
    pub fn new(kind: ContextTargetKind) -> Self {
        Self {
            kind,
            app_id: None,
            window_id: None,
            conversation_id: None,
            message_id: None,
            icon_id: None,
            widget_id: None,
        }
    }

    pub fn with_app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_window(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_icon(mut self, icon_id: impl Into<String>) -> Self {
        self.icon_id = Some(icon_id.into());
        self
    }

    pub fn with_widget(mut self, widget_id: impl Into<String>) -> Self {
        self.widget_id = Some(widget_id.into());
        self
    }

    /// Trims every id and drops the ones left empty.
    pub fn normalized(&self) -> Self {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            kind: self.kind,
            app_id: clean(&self.app_id),
            window_id: clean(&self.window_id),
            conversation_id: clean(&self.conversation_id),
            message_id: clean(&self.message_id),
            icon_id: clean(&self.icon_id),
            widget_id: clean(&self.widget_id),
        }
    }

    /// Deterministic registry key, e.g. `kind=message|app=chat|conversation=c1|message=m9`.
    pub fn key(&self) -> String {
        let target = self.normalized();
        let mut key = format!("kind={}", target.kind.as_str());
        for (name, value) in [
            ("app", &target.app_id),
            ("window", &target.window_id),
            ("conversation", &target.conversation_id),
            ("message", &target.message_id),
            ("icon", &target.icon_id),
            ("widget", &target.widget_id),
        ] {
            if let Some(value) = value {
                key.push('|');
                key.push_str(name);
                key.push('=');
                key.push_str(value);
            }
        }
        key
    }

    /// Targets consulted for this target, most specific first.
    pub fn resolution_chain(&self) -> Vec<ContextTargetRef> {
        let target = self.normalized();
        let mut chain = vec![target.clone()];

        let mut kind_app = Self::new(target.kind);
        kind_app.app_id = target.app_id.clone();
        chain.push(kind_app);
        chain.push(Self::new(target.kind));

        if target.window_id.is_some() && target.kind != ContextTargetKind::Window {
            let mut window_app = Self::new(ContextTargetKind::Window);
            window_app.app_id = target.app_id.clone();
            chain.push(window_app);
            chain.push(Self::new(ContextTargetKind::Window));
        }
        chain
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextActionItem {
    pub id: String,
    pub label: String,
    pub command: CommandId,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<ActionVisibility>,
    /// Shown but not selectable.
    #[serde(default)]
    pub disabled: bool,
}

impl ContextActionItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>, command: CommandId) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            command,
            payload: Value::Null,
            visibility: None,
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContextAction {
    Item(ContextActionItem),
    Separator,
}

impl ContextAction {
    pub fn is_separator(&self) -> bool {
        matches!(self, Self::Separator)
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Item(item) => Some(&item.id),
            Self::Separator => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Registration {
    key: String,
    actions: Vec<ContextAction>,
}

/// Context actions registered per target key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextActionRegistry {
    next_token: u64,
    by_token: BTreeMap<RegistrationToken, Registration>,
}

impl ContextActionRegistry {
    /// Registers actions for `target` and returns the token that removes them.
    pub fn register(
        &mut self,
        target: &ContextTargetRef,
        actions: Vec<ContextAction>,
    ) -> RegistrationToken {
        self.next_token = self.next_token.saturating_add(1);
        let token = RegistrationToken(self.next_token);
        self.by_token.insert(
            token,
            Registration {
                key: target.key(),
                actions,
            },
        );
        token
    }

    /// Removes a registration. Returns whether the token was live.
    pub fn unregister(&mut self, token: RegistrationToken) -> bool {
        self.by_token.remove(&token).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Actions registered under exactly `key`, in registration order.
    pub fn actions_for_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ContextAction> {
        self.by_token
            .values()
            .filter(move |registration| registration.key == key)
            .flat_map(|registration| registration.actions.iter())
    }

    /// Resolves the action list for a concrete target.
    ///
    /// Lists along [`ContextTargetRef::resolution_chain`] are concatenated in precedence order.
    /// The first action with a given id wins, and a separator directly after another separator is
    /// dropped. Visibility is not applied here.
    pub fn resolve(&self, target: &ContextTargetRef) -> Vec<ContextAction> {
        let mut visited_keys = BTreeSet::new();
        let mut seen_ids = BTreeSet::new();
        let mut out: Vec<ContextAction> = Vec::new();

        for link in target.resolution_chain() {
            let key = link.key();
            if !visited_keys.insert(key.clone()) {
                continue;
            }
            for action in self.actions_for_key(&key) {
                match action {
                    ContextAction::Separator => {
                        if !out.last().is_some_and(ContextAction::is_separator) {
                            out.push(ContextAction::Separator);
                        }
                    }
                    ContextAction::Item(item) => {
                        if seen_ids.insert(item.id.clone()) {
                            out.push(action.clone());
                        }
                    }
                }
            }
        }
        out
    }
}
