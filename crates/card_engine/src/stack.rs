//! Stacks, backgrounds, and card definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError, expr::ValueExpr, program::HandlerProgram, scoped_state::StateMap,
};

/// Closed set of card kinds. Each kind may carry its own default state layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardKind {
    /// Launcher-style list of choices.
    Menu,
    /// Browsable collection.
    List,
    /// One record.
    Detail,
    /// Editable form.
    Form,
    /// Conversation view.
    Chat,
    /// Read-only summary.
    Report,
}

/// Shared defaults and handlers for a group of cards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Background {
    /// Background default state layer.
    #[serde(default)]
    pub defaults: StateMap,
    /// Event handlers consulted when a card has none for the event.
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerProgram>,
}

/// One card definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDefinition {
    /// Card id, unique within the stack.
    pub id: String,
    /// Card kind.
    pub kind: CardKind,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Background whose defaults and handlers this card inherits.
    #[serde(default)]
    pub background: Option<String>,
    /// Card-instance initial state.
    #[serde(default)]
    pub state: StateMap,
    /// Record this card displays. A null result renders the not-found fallback.
    #[serde(default)]
    pub record: Option<ValueExpr>,
    /// Event handlers by event name.
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerProgram>,
}

/// A named collection of cards plus shared default state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    /// Stack id.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Card shown when a session starts without an explicit card.
    pub home_card: String,
    /// Stack default state layer.
    #[serde(default)]
    pub defaults: StateMap,
    /// Backgrounds by id.
    #[serde(default)]
    pub backgrounds: BTreeMap<String, Background>,
    /// Default state layer per card kind.
    #[serde(default)]
    pub card_type_defaults: BTreeMap<CardKind, StateMap>,
    /// Cards in the stack.
    pub cards: Vec<CardDefinition>,
    /// Stack-wide event handlers, consulted last.
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerProgram>,
}

impl Stack {
    /// Looks up a card by id.
    pub fn card(&self, card_id: &str) -> Option<&CardDefinition> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    /// Returns the background a card inherits from.
    pub fn background_of(&self, card: &CardDefinition) -> Option<&Background> {
        card.background
            .as_deref()
            .and_then(|id| self.backgrounds.get(id))
    }

    /// Finds the handler for `event` on `card_id`: card first, then background, then stack.
    pub fn handler_for(&self, card_id: &str, event: &str) -> Option<&HandlerProgram> {
        let card = self.card(card_id);
        card.and_then(|card| card.handlers.get(event))
            .or_else(|| {
                card.and_then(|card| self.background_of(card))
                    .and_then(|background| background.handlers.get(event))
            })
            .or_else(|| self.handlers.get(event))
    }

    /// Checks internal references: unique card ids, an existing home card, existing backgrounds.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: String| EngineError::InvalidStack {
            stack_id: self.id.clone(),
            reason,
        };

        let mut seen = std::collections::BTreeSet::new();
        for card in &self.cards {
            if !seen.insert(card.id.as_str()) {
                return Err(invalid(format!("duplicate card id `{}`", card.id)));
            }
            if let Some(background) = &card.background {
                if !self.backgrounds.contains_key(background) {
                    return Err(invalid(format!(
                        "card `{}` references unknown background `{background}`",
                        card.id
                    )));
                }
            }
        }
        if self.card(&self.home_card).is_none() {
            return Err(invalid(format!("home card `{}` does not exist", self.home_card)));
        }
        Ok(())
    }
}
