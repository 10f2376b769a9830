use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MIN_WIDTH: i32 = 180;
pub const DEFAULT_MIN_HEIGHT: i32 = 120;
/// Logical units of title bar that must stay reachable after a move.
pub const TITLE_BAR_REACH: i32 = 40;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl WindowBounds {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn clamped_min(self, min_w: i32, min_h: i32) -> Self {
        Self {
            w: self.w.max(min_w),
            h: self.h.max(min_h),
            ..self
        }
    }

    pub fn same_position(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }

    pub fn same_size(&self, other: &Self) -> bool {
        self.w == other.w && self.h == other.h
    }
}

impl Default for WindowBounds {
    fn default() -> Self {
        Self {
            x: 48,
            y: 48,
            w: 420,
            h: 300,
        }
    }
}

/// Card hosted by a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    pub stack_id: String,
    pub card_id: String,
    /// Navigation session owned by the window. Windows without one have no history.
    #[serde(default)]
    pub card_session_id: Option<String>,
    #[serde(default)]
    pub param: Value,
}

/// Closed set of window content kinds; content adapters are indexed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowContentKind {
    Card,
    App,
    Dialog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WindowContent {
    Card {
        card: CardRef,
    },
    App {
        #[serde(rename = "appKey")]
        app_key: String,
    },
    Dialog {
        #[serde(rename = "dialogKey")]
        dialog_key: String,
    },
}

impl WindowContent {
    pub fn card(stack_id: impl Into<String>, card_id: impl Into<String>) -> Self {
        Self::Card {
            card: CardRef {
                stack_id: stack_id.into(),
                card_id: card_id.into(),
                card_session_id: None,
                param: Value::Null,
            },
        }
    }

    pub fn app(app_key: impl Into<String>) -> Self {
        Self::App {
            app_key: app_key.into(),
        }
    }

    pub fn dialog(dialog_key: impl Into<String>) -> Self {
        Self::Dialog {
            dialog_key: dialog_key.into(),
        }
    }

    /// Attaches a navigation session to card content. Other content is returned unchanged.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        if let Self::Card { card } = &mut self {
            card.card_session_id = Some(session_id.into());
        }
        self
    }

    /// Sets the card parameter. Other content is returned unchanged.
    pub fn with_param(mut self, param: Value) -> Self {
        if let Self::Card { card } = &mut self {
            card.param = param;
        }
        self
    }

    pub fn kind(&self) -> WindowContentKind {
        match self {
            Self::Card { .. } => WindowContentKind::Card,
            Self::App { .. } => WindowContentKind::App,
            Self::Dialog { .. } => WindowContentKind::Dialog,
        }
    }

    pub fn card_ref(&self) -> Option<&CardRef> {
        match self {
            Self::Card { card } => Some(card),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.card_ref()
            .and_then(|card| card.card_session_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInstance {
    pub id: WindowId,
    pub title: String,
    pub icon: Option<String>,
    pub bounds: WindowBounds,
    /// Paint order. Higher values paint above lower ones.
    pub z: u64,
    pub min_w: i32,
    pub min_h: i32,
    pub is_dialog: bool,
    pub is_resizable: bool,
    pub content: WindowContent,
    pub dedupe_key: Option<String>,
}

/// One entry of a session's navigation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavEntry {
    pub card: String,
    #[serde(default)]
    pub param: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopState {
    pub windows: BTreeMap<WindowId, WindowInstance>,
    /// Window ids in open order.
    pub order: Vec<WindowId>,
    pub focused_window_id: Option<WindowId>,
    pub active_menu_id: Option<String>,
    pub selected_icon_id: Option<String>,
    pub z_counter: u64,
    /// Navigation stacks by card session id. Never empty while present.
    pub session_nav: BTreeMap<String, Vec<NavEntry>>,
}

impl DesktopState {
    pub fn window(&self, window_id: &WindowId) -> Option<&WindowInstance> {
        self.windows.get(window_id)
    }

    pub fn focused_window(&self) -> Option<&WindowInstance> {
        self.focused_window_id
            .as_ref()
            .and_then(|id| self.windows.get(id))
    }

    /// Windows in open order.
    pub fn windows_in_order(&self) -> impl Iterator<Item = &WindowInstance> {
        self.order.iter().filter_map(|id| self.windows.get(id))
    }

    /// Windows in paint order, lowest z first.
    pub fn windows_by_z(&self) -> Vec<&WindowInstance> {
        let mut windows: Vec<_> = self.windows.values().collect();
        windows.sort_by_key(|window| window.z);
        windows
    }

    pub fn window_by_dedupe_key(&self, dedupe_key: &str) -> Option<&WindowInstance> {
        self.windows_in_order()
            .find(|window| window.dedupe_key.as_deref() == Some(dedupe_key))
    }

    pub fn window_for_session(&self, session_id: &str) -> Option<&WindowInstance> {
        self.windows_in_order()
            .find(|window| window.content.session_id() == Some(session_id))
    }

    pub fn session_nav(&self, session_id: &str) -> Option<&[NavEntry]> {
        self.session_nav.get(session_id).map(Vec::as_slice)
    }

    /// Top entry of a session's navigation stack.
    pub fn session_current(&self, session_id: &str) -> Option<&NavEntry> {
        self.session_nav.get(session_id).and_then(|stack| stack.last())
    }

    pub fn session_depth(&self, session_id: &str) -> usize {
        self.session_nav.get(session_id).map_or(0, Vec::len)
    }
}

/// Request accepted by the open-window transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenWindowPayload {
    pub id: WindowId,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub bounds: WindowBounds,
    #[serde(default)]
    pub min_w: Option<i32>,
    #[serde(default)]
    pub min_h: Option<i32>,
    #[serde(default)]
    pub is_dialog: bool,
    #[serde(default)]
    pub is_resizable: Option<bool>,
    pub content: WindowContent,
    #[serde(default)]
    pub dedupe_key: Option<String>,
}

impl OpenWindowPayload {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: WindowContent) -> Self {
        Self {
            id: WindowId::new(id),
            title: title.into(),
            icon: None,
            bounds: WindowBounds::default(),
            min_w: None,
            min_h: None,
            is_dialog: false,
            is_resizable: None,
            content,
            dedupe_key: None,
        }
    }

    pub fn with_bounds(mut self, bounds: WindowBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_min_size(mut self, min_w: i32, min_h: i32) -> Self {
        self.min_w = Some(min_w);
        self.min_h = Some(min_h);
        self
    }

    pub fn with_dedupe_key(mut self, dedupe_key: impl Into<String>) -> Self {
        self.dedupe_key = Some(dedupe_key.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Marks the window as a dialog. Dialogs default to a fixed size.
    pub fn as_dialog(mut self) -> Self {
        self.is_dialog = true;
        self
    }

    pub fn resizable(mut self, resizable: bool) -> Self {
        self.is_resizable = Some(resizable);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

impl PointerPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeEdge {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeEdge {
    pub fn moves_left_edge(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub fn moves_right_edge(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    pub fn moves_top_edge(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub fn moves_bottom_edge(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }
}
