//! Merging independently authored desktop contributions.
//!
//! Each feature module ships a [`DesktopContribution`]: menu sections, desktop icons, command
//! handlers, window-content adapters, and startup windows. [`compose_contributions`] folds them
//! into one [`ComposedDesktop`] the runtime owns.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::Rc,
};

use desktop_command_contract::CommandId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    command_router::CommandHandler,
    model::{DesktopState, OpenWindowPayload, WindowContentKind, WindowInstance},
};

/// Selectable menu entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub command: CommandId,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MenuEntry {
    Item(MenuItem),
    Separator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuSection {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub items: Vec<MenuEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopIcon {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Command routed when the icon is activated.
    pub command: CommandId,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// View model produced by a content adapter for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ResolvedContent {
    Adapted {
        adapter_id: String,
        view: Value,
    },
    /// No adapter accepted the window; renderers show a placeholder.
    Unresolved { kind: WindowContentKind },
}

/// Turns a window's content into a renderer view model.
pub trait WindowContentAdapter {
    fn id(&self) -> &str;

    /// Content kind this adapter serves.
    fn kind(&self) -> WindowContentKind;

    /// Returns `None` to let the next adapter of the same kind try.
    fn adapt(&self, window: &WindowInstance) -> Option<Value>;
}

/// Produces windows opened at boot.
pub trait StartupWindowFactory {
    fn id(&self) -> &str;

    fn build(&self, state: &DesktopState) -> Option<OpenWindowPayload>;
}

/// Startup window declared as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticStartupWindow(pub OpenWindowPayload);

impl StartupWindowFactory for StaticStartupWindow {
    fn id(&self) -> &str {
        self.0.id.as_str()
    }

    fn build(&self, _state: &DesktopState) -> Option<OpenWindowPayload> {
        Some(self.0.clone())
    }
}

/// One feature module's contribution.
#[derive(Clone, Default)]
pub struct DesktopContribution {
    pub id: String,
    pub menus: Vec<MenuSection>,
    pub icons: Vec<DesktopIcon>,
    pub commands: Vec<Rc<dyn CommandHandler>>,
    pub window_content_adapters: Vec<Rc<dyn WindowContentAdapter>>,
    pub startup_windows: Vec<Rc<dyn StartupWindowFactory>>,
}

impl fmt::Debug for DesktopContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesktopContribution")
            .field("id", &self.id)
            .field("menus", &self.menus)
            .field("icons", &self.icons)
            .field("commands", &self.commands.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field(
                "window_content_adapters",
                &self
                    .window_content_adapters
                    .iter()
                    .map(|a| a.id())
                    .collect::<Vec<_>>(),
            )
            .field(
                "startup_windows",
                &self.startup_windows.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DesktopContribution {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_menu(mut self, section: MenuSection) -> Self {
        self.menus.push(section);
        self
    }

    pub fn with_icon(mut self, icon: DesktopIcon) -> Self {
        self.icons.push(icon);
        self
    }

    pub fn with_command(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.commands.push(Rc::new(handler));
        self
    }

    pub fn with_adapter(mut self, adapter: impl WindowContentAdapter + 'static) -> Self {
        self.window_content_adapters.push(Rc::new(adapter));
        self
    }

    pub fn with_startup_window(mut self, factory: impl StartupWindowFactory + 'static) -> Self {
        self.startup_windows.push(Rc::new(factory));
        self
    }
}

/// Data-only part of a contribution, loadable from a manifest file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContributionManifest {
    pub id: String,
    #[serde(default)]
    pub menus: Vec<MenuSection>,
    #[serde(default)]
    pub icons: Vec<DesktopIcon>,
    #[serde(default)]
    pub startup_windows: Vec<OpenWindowPayload>,
}

impl From<ContributionManifest> for DesktopContribution {
    fn from(manifest: ContributionManifest) -> Self {
        Self {
            id: manifest.id,
            menus: manifest.menus,
            icons: manifest.icons,
            startup_windows: manifest
                .startup_windows
                .into_iter()
                .map(|payload| Rc::new(StaticStartupWindow(payload)) as Rc<dyn StartupWindowFactory>)
                .collect(),
            ..Self::default()
        }
    }
}

/// What to do when two contributions declare the same icon id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconCollisionPolicy {
    /// Reject the composition.
    #[default]
    Throw,
    /// Log a warning and keep the first contributor's icon.
    Warn,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Configuration errors found while composing contributions.
pub enum ComposeError {
    /// Two contributions declared the same icon id.
    #[error("icon `{icon_id}` from `{contribution}` collides with `{first}`")]
    IconCollision {
        /// Icon id.
        icon_id: String,
        /// Contribution that declared it first.
        first: String,
        /// Contribution that declared it again.
        contribution: String,
    },
    /// Two contributions share an id.
    #[error("contribution `{0}` is registered twice")]
    DuplicateContribution(String),
}

/// Content adapters grouped by content kind, in contribution order.
#[derive(Clone, Default)]
pub struct AdapterTable {
    by_kind: BTreeMap<WindowContentKind, Vec<Rc<dyn WindowContentAdapter>>>,
}

impl fmt::Debug for AdapterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, adapters) in &self.by_kind {
            map.entry(kind, &adapters.iter().map(|a| a.id()).collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl AdapterTable {
    fn push(&mut self, adapter: Rc<dyn WindowContentAdapter>) {
        self.by_kind.entry(adapter.kind()).or_default().push(adapter);
    }

    pub fn adapters_for(&self, kind: WindowContentKind) -> &[Rc<dyn WindowContentAdapter>] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First adapter of the window's kind that accepts it wins.
    pub fn resolve(&self, window: &WindowInstance) -> ResolvedContent {
        let kind = window.content.kind();
        self.adapters_for(kind)
            .iter()
            .find_map(|adapter| {
                adapter.adapt(window).map(|view| ResolvedContent::Adapted {
                    adapter_id: adapter.id().to_string(),
                    view,
                })
            })
            .unwrap_or(ResolvedContent::Unresolved { kind })
    }
}

/// Merged view of every contribution.
#[derive(Clone, Default)]
pub struct ComposedDesktop {
    pub contribution_ids: Vec<String>,
    pub menus: Vec<MenuSection>,
    pub icons: Vec<DesktopIcon>,
    /// Handlers sorted by descending priority; ties keep contribution order.
    pub commands: Vec<Rc<dyn CommandHandler>>,
    pub adapters: AdapterTable,
    pub startup_windows: Vec<Rc<dyn StartupWindowFactory>>,
}

impl fmt::Debug for ComposedDesktop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedDesktop")
            .field("contribution_ids", &self.contribution_ids)
            .field("menus", &self.menus)
            .field("icons", &self.icons)
            .field("commands", &self.commands.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field("adapters", &self.adapters)
            .field(
                "startup_windows",
                &self.startup_windows.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ComposedDesktop {
    pub fn menu(&self, section_id: &str) -> Option<&MenuSection> {
        self.menus.iter().find(|section| section.id == section_id)
    }

    pub fn icon(&self, icon_id: &str) -> Option<&DesktopIcon> {
        self.icons.iter().find(|icon| icon.id == icon_id)
    }

    /// Startup windows in contribution order.
    pub fn startup_payloads(&self, state: &DesktopState) -> Vec<OpenWindowPayload> {
        self.startup_windows
            .iter()
            .filter_map(|factory| factory.build(state))
            .collect()
    }
}

/// Merges contributions in order.
///
/// Menu sections merge by id (items concatenated, first label kept). Icons merge by id under
/// `policy`. Command handlers are stably sorted by descending priority. Adapters and startup
/// windows keep contribution order.
pub fn compose_contributions(
    contributions: Vec<DesktopContribution>,
    policy: IconCollisionPolicy,
) -> Result<ComposedDesktop, ComposeError> {
    let mut composed = ComposedDesktop::default();
    let mut seen_ids = BTreeSet::new();
    let mut icon_owner: BTreeMap<String, String> = BTreeMap::new();

    for contribution in contributions {
        if !seen_ids.insert(contribution.id.clone()) {
            return Err(ComposeError::DuplicateContribution(contribution.id));
        }

        for section in contribution.menus {
            match composed.menus.iter_mut().find(|existing| existing.id == section.id) {
                Some(existing) => existing.items.extend(section.items),
                None => composed.menus.push(section),
            }
        }

        for icon in contribution.icons {
            if let Some(first) = icon_owner.get(&icon.id) {
                match policy {
                    IconCollisionPolicy::Throw => {
                        return Err(ComposeError::IconCollision {
                            icon_id: icon.id,
                            first: first.clone(),
                            contribution: contribution.id,
                        });
                    }
                    IconCollisionPolicy::Warn => {
                        tracing::warn!(
                            icon = %icon.id,
                            first = %first,
                            contribution = %contribution.id,
                            "duplicate desktop icon ignored"
                        );
                        continue;
                    }
                }
            }
            icon_owner.insert(icon.id.clone(), contribution.id.clone());
            composed.icons.push(icon);
        }

        composed.commands.extend(contribution.commands);
        for adapter in contribution.window_content_adapters {
            composed.adapters.push(adapter);
        }
        composed.startup_windows.extend(contribution.startup_windows);
        composed.contribution_ids.push(contribution.id);
    }

    composed
        .commands
        .sort_by(|left, right| right.priority().cmp(&left.priority()));
    tracing::debug!(
        contributions = composed.contribution_ids.len(),
        menus = composed.menus.len(),
        icons = composed.icons.len(),
        commands = composed.commands.len(),
        "composed desktop contributions"
    );
    Ok(composed)
}

#[cfg(test)]
mod tests {
    use desktop_command_contract::CommandOutcome;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{
        command_router::{CommandMatcher, FnCommandHandler},
        model::{WindowBounds, WindowContent, WindowId},
    };

    fn item(id: &str) -> MenuEntry {
        MenuEntry::Item(MenuItem {
            id: id.to_string(),
            label: id.to_string(),
            command: CommandId::new(id),
            payload: Value::Null,
            shortcut: None,
        })
    }

    fn section(id: &str, label: &str, items: Vec<MenuEntry>) -> MenuSection {
        MenuSection {
            id: id.to_string(),
            label: label.to_string(),
            items,
        }
    }

    fn icon(id: &str) -> DesktopIcon {
        DesktopIcon {
            id: id.to_string(),
            label: id.to_string(),
            icon: None,
            command: CommandId::new("window.open"),
            payload: Value::Null,
        }
    }

    fn handler(id: &str, priority: i32) -> FnCommandHandler {
        FnCommandHandler::new(id, CommandMatcher::Any, |_, _| CommandOutcome::Pass)
            .with_priority(priority)
    }

    struct KeyAdapter {
        id: &'static str,
        accepts: &'static str,
    }

    impl WindowContentAdapter for KeyAdapter {
        fn id(&self) -> &str {
            self.id
        }

        fn kind(&self) -> WindowContentKind {
            WindowContentKind::App
        }

        fn adapt(&self, window: &WindowInstance) -> Option<Value> {
            match &window.content {
                WindowContent::App { app_key } if app_key == self.accepts => {
                    Some(json!({ "app": app_key }))
                }
                _ => None,
            }
        }
    }

    #[test]
    fn menu_sections_merge_items_in_contribution_order() {
        let composed = compose_contributions(
            vec![
                DesktopContribution::new("inventory")
                    .with_menu(section("chat", "Chat", vec![item("chat.inventory")])),
                DesktopContribution::new("books")
                    .with_menu(section("chat", "Book Chat", vec![item("chat.books")]))
                    .with_menu(section("file", "File", vec![item("file.new")])),
            ],
            IconCollisionPolicy::Throw,
        )
        .unwrap();

        let chat = composed.menu("chat").unwrap();
        assert_eq!(chat.label, "Chat");
        assert_eq!(chat.items, vec![item("chat.inventory"), item("chat.books")]);
        assert_eq!(
            composed.menus.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["chat", "file"]
        );
    }

    #[test]
    fn icon_collision_throws_by_default_and_warn_keeps_first() {
        let contributions = || {
            vec![
                DesktopContribution::new("a").with_icon(icon("inventory")),
                DesktopContribution::new("b").with_icon(DesktopIcon {
                    label: "Second".to_string(),
                    ..icon("inventory")
                }),
            ]
        };

        assert_eq!(
            compose_contributions(contributions(), IconCollisionPolicy::default()).unwrap_err(),
            ComposeError::IconCollision {
                icon_id: "inventory".to_string(),
                first: "a".to_string(),
                contribution: "b".to_string(),
            }
        );

        let lenient = compose_contributions(contributions(), IconCollisionPolicy::Warn).unwrap();
        assert_eq!(lenient.icons, vec![icon("inventory")]);
    }

    #[test]
    fn handlers_sort_by_descending_priority_with_stable_ties() {
        let composed = compose_contributions(
            vec![
                DesktopContribution::new("a")
                    .with_command(handler("a-low", 0))
                    .with_command(handler("a-high", 10)),
                DesktopContribution::new("b")
                    .with_command(handler("b-low", 0))
                    .with_command(handler("b-high", 10)),
            ],
            IconCollisionPolicy::Throw,
        )
        .unwrap();

        assert_eq!(
            composed.commands.iter().map(|h| h.id()).collect::<Vec<_>>(),
            vec!["a-high", "b-high", "a-low", "b-low"]
        );
    }

    #[test]
    fn duplicate_contribution_ids_are_rejected() {
        let err = compose_contributions(
            vec![DesktopContribution::new("a"), DesktopContribution::new("a")],
            IconCollisionPolicy::Throw,
        )
        .unwrap_err();
        assert_eq!(err, ComposeError::DuplicateContribution("a".to_string()));
    }

    #[test]
    fn adapters_resolve_first_match_by_kind_with_fallback() {
        let composed = compose_contributions(
            vec![
                DesktopContribution::new("a").with_adapter(KeyAdapter {
                    id: "notes-view",
                    accepts: "notes",
                }),
                DesktopContribution::new("b").with_adapter(KeyAdapter {
                    id: "chat-view",
                    accepts: "chat",
                }),
            ],
            IconCollisionPolicy::Throw,
        )
        .unwrap();
        let window = |content| WindowInstance {
            id: WindowId::from("w"),
            title: String::new(),
            icon: None,
            bounds: WindowBounds::default(),
            z: 1,
            min_w: 180,
            min_h: 120,
            is_dialog: false,
            is_resizable: true,
            content,
            dedupe_key: None,
        };

        assert_eq!(
            composed.adapters.resolve(&window(WindowContent::app("chat"))),
            ResolvedContent::Adapted {
                adapter_id: "chat-view".to_string(),
                view: json!({ "app": "chat" }),
            }
        );
        assert_eq!(
            composed.adapters.resolve(&window(WindowContent::dialog("about"))),
            ResolvedContent::Unresolved {
                kind: WindowContentKind::Dialog
            }
        );
    }

    #[test]
    fn manifest_contributes_static_startup_windows() {
        let manifest: ContributionManifest = serde_json::from_value(json!({
            "id": "inventory",
            "icons": [{ "id": "inventory", "label": "Inventory", "command": "window.open" }],
            "startupWindows": [{
                "id": "w-home",
                "title": "Home",
                "content": { "kind": "card", "card": { "stackId": "inventory", "cardId": "home" } }
            }]
        }))
        .unwrap();

        let composed = compose_contributions(vec![manifest.into()], IconCollisionPolicy::Throw)
            .unwrap();
        let payloads = composed.startup_payloads(&DesktopState::default());
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].id, WindowId::from("w-home"));
        assert!(composed.icon("inventory").is_some());
    }
}
