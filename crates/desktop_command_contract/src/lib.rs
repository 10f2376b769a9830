//! Shared command contracts used by the desktop runtime, its command router, and the card
//! command-execution engine.
//!
//! This crate is intentionally runtime-agnostic. It defines serializable command identifiers,
//! invocation payloads, routing outcomes, and notices without depending on window-manager or
//! card-engine internals.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable command identifier such as `window.close` or `inventory.open-browse`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    /// Creates a command identifier from trusted caller input.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace segment before the first `.`, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('.').map(|(namespace, _)| namespace)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommandId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// One command invocation as produced by menus, icons, keyboard shortcuts, or card programs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInvocation {
    /// Command to route.
    pub command_id: CommandId,
    /// Free-form payload interpreted by the handler.
    #[serde(default)]
    pub payload: Value,
    /// Window the invocation originated from, when known.
    #[serde(default)]
    pub source_window_id: Option<String>,
}

impl CommandInvocation {
    /// Creates an invocation with a null payload and no source window.
    pub fn new(command_id: impl Into<CommandId>) -> Self {
        Self {
            command_id: command_id.into(),
            payload: Value::Null,
            source_window_id: None,
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches the originating window id.
    pub fn with_source_window(mut self, window_id: impl Into<String>) -> Self {
        self.source_window_id = Some(window_id.into());
        self
    }
}

/// Result of running one handler against a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandOutcome {
    /// The handler consumed the command; routing stops.
    Handled,
    /// The handler declined; routing continues with the next handler.
    Pass,
}

/// Result of routing a command through the full handler list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RouteOutcome {
    /// A handler consumed the command.
    Handled {
        /// Identifier of the handler that consumed the command.
        handler_id: String,
    },
    /// No handler both matched and consumed the command.
    Unhandled {
        /// The command that fell through.
        command_id: CommandId,
    },
}

impl RouteOutcome {
    /// Returns whether a handler consumed the command.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeLevel {
    /// Informational message.
    #[default]
    Info,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
}

/// User-facing notice emitted by command handlers or card programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Notice severity.
    #[serde(default)]
    pub level: NoticeLevel,
    /// Human-readable message.
    pub message: String,
}

impl Notice {
    /// Creates an informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Creates a warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Opaque registration token used to unregister runtime registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistrationToken(pub u64);
