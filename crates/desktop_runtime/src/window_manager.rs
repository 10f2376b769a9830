//! Shared window-manager transition helpers used by the desktop reducer and the interaction
//! controller.

use serde::{Deserialize, Serialize};

use crate::model::{
    DesktopState, ResizeEdge, WindowBounds, WindowId, DEFAULT_MIN_HEIGHT, DEFAULT_MIN_WIDTH,
    TITLE_BAR_REACH,
};

/// Geometry rules applied to every window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowLimits {
    /// Minimum width used when an open request does not name one.
    pub default_min_width: i32,
    /// Minimum height used when an open request does not name one.
    pub default_min_height: i32,
    /// Title bar width that must stay on screen after a move.
    pub title_bar_reach: i32,
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            default_min_width: DEFAULT_MIN_WIDTH,
            default_min_height: DEFAULT_MIN_HEIGHT,
            title_bar_reach: TITLE_BAR_REACH,
        }
    }
}

impl WindowLimits {
    /// Clamps a window origin so the top edge stays on screen and the title bar stays reachable.
    pub fn clamp_position(&self, x: i32, y: i32, width: i32) -> (i32, i32) {
        (x.max(-width + self.title_bar_reach), y.max(0))
    }
}

/// Allocates the next paint-order value.
pub fn next_z(state: &mut DesktopState) -> u64 {
    state.z_counter = state.z_counter.saturating_add(1);
    state.z_counter
}

/// Focuses and raises `window_id`.
///
/// Returns `true` when focus changed. Unknown and already-focused windows are left untouched.
pub fn focus_window_internal(state: &mut DesktopState, window_id: &WindowId) -> bool {
    if !state.windows.contains_key(window_id) {
        return false;
    }
    if state.focused_window_id.as_ref() == Some(window_id) {
        return false;
    }

    let z = next_z(state);
    if let Some(window) = state.windows.get_mut(window_id) {
        window.z = z;
    }
    state.focused_window_id = Some(window_id.clone());
    true
}

/// Returns the live window with the highest paint order.
pub fn topmost_window(state: &DesktopState) -> Option<WindowId> {
    state
        .windows
        .values()
        .max_by_key(|window| window.z)
        .map(|window| window.id.clone())
}

/// Applies resize deltas for a given edge/corner drag, clamped to a minimum size.
///
/// Edges that are not dragged stay fixed: when a west or north drag reaches the minimum size the
/// origin stops moving instead of pushing the opposite edge.
pub fn resize_bounds(
    start: WindowBounds,
    edge: ResizeEdge,
    dx: i32,
    dy: i32,
    min_w: i32,
    min_h: i32,
) -> WindowBounds {
    let right = start.x + start.w;
    let bottom = start.y + start.h;

    let (x, w) = if edge.moves_left_edge() {
        let w = (start.w - dx).max(min_w);
        (right - w, w)
    } else if edge.moves_right_edge() {
        (start.x, (start.w + dx).max(min_w))
    } else {
        (start.x, start.w.max(min_w))
    };

    let (y, h) = if edge.moves_top_edge() {
        let h = (start.h - dy).max(min_h);
        let top = bottom - h;
        if top < 0 {
            (0, bottom.max(min_h))
        } else {
            (top, h)
        }
    } else if edge.moves_bottom_edge() {
        (start.y, (start.h + dy).max(min_h))
    } else {
        (start.y, start.h.max(min_h))
    };

    WindowBounds { x, y, w, h }
}
