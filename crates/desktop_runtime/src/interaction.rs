//! Pointer-driven move/resize protocol.
//!
//! Pointer moves only write drafts held in [`DragOverlay`]; durable window bounds change once,
//! when the gesture commits. Renderers read [`DragOverlay::effective_bounds`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    model::{DesktopState, PointerPosition, ResizeEdge, WindowBounds, WindowId, WindowInstance},
    reducer::DesktopAction,
    window_manager::{resize_bounds, WindowLimits},
};

/// What a gesture does to its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "edge", rename_all = "kebab-case")]
pub enum GestureMode {
    /// Drag by the title bar.
    Move,
    /// Drag an edge or corner.
    Resize(ResizeEdge),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveGesture {
    window_id: WindowId,
    mode: GestureMode,
    pointer_start: PointerPosition,
    bounds_start: WindowBounds,
    min_w: i32,
    min_h: i32,
}

/// Ephemeral drafts of in-flight gestures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DragOverlay {
    limits: WindowLimits,
    drafts: BTreeMap<WindowId, WindowBounds>,
    active: Option<ActiveGesture>,
}

impl DragOverlay {
    /// Creates an empty overlay clamping drafts with `limits`.
    pub fn new(limits: WindowLimits) -> Self {
        Self {
            limits,
            drafts: BTreeMap::new(),
            active: None,
        }
    }

    /// Starts a gesture on `window_id` and returns the focus action the caller must apply.
    ///
    /// Returns `None` (and records nothing) for unknown windows and for resize gestures on
    /// non-resizable windows. A gesture already in progress is cancelled first.
    pub fn begin(
        &mut self,
        state: &DesktopState,
        window_id: &WindowId,
        mode: GestureMode,
        pointer: PointerPosition,
    ) -> Option<DesktopAction> {
        let Some(window) = state.window(window_id) else {
            tracing::debug!(window = %window_id, "gesture ignored for unknown window");
            return None;
        };
        if matches!(mode, GestureMode::Resize(_)) && !window.is_resizable {
            tracing::debug!(window = %window_id, "resize ignored for fixed-size window");
            return None;
        }

        self.cancel();
        self.drafts.insert(window_id.clone(), window.bounds);
        self.active = Some(ActiveGesture {
            window_id: window_id.clone(),
            mode,
            pointer_start: pointer,
            bounds_start: window.bounds,
            min_w: window.min_w,
            min_h: window.min_h,
        });
        Some(DesktopAction::FocusWindow {
            window_id: window_id.clone(),
        })
    }

    /// Recomputes the draft from the pointer's delta since `begin`.
    pub fn update(&mut self, pointer: PointerPosition) -> Option<WindowBounds> {
        let gesture = self.active.as_ref()?;
        let dx = pointer.x - gesture.pointer_start.x;
        let dy = pointer.y - gesture.pointer_start.y;

        let mut draft = match gesture.mode {
            GestureMode::Move => gesture.bounds_start.offset(dx, dy),
            GestureMode::Resize(edge) => resize_bounds(
                gesture.bounds_start,
                edge,
                dx,
                dy,
                gesture.min_w,
                gesture.min_h,
            ),
        };
        (draft.x, draft.y) = self.limits.clamp_position(draft.x, draft.y, draft.w);

        self.drafts.insert(gesture.window_id.clone(), draft);
        Some(draft)
    }

    /// Ends the gesture and returns the registry actions that persist the draft.
    ///
    /// Only changed geometry is emitted; the resize precedes the move so the move's title-bar
    /// clamp sees the final width. A window closed mid-gesture yields nothing.
    pub fn commit(&mut self, state: &DesktopState) -> Vec<DesktopAction> {
        let Some(gesture) = self.active.take() else {
            return Vec::new();
        };
        let Some(draft) = self.drafts.remove(&gesture.window_id) else {
            return Vec::new();
        };
        let Some(window) = state.window(&gesture.window_id) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        if !draft.same_size(&window.bounds) {
            actions.push(DesktopAction::ResizeWindow {
                window_id: gesture.window_id.clone(),
                width: draft.w,
                height: draft.h,
            });
        }
        if !draft.same_position(&window.bounds) {
            actions.push(DesktopAction::MoveWindow {
                window_id: gesture.window_id,
                x: draft.x,
                y: draft.y,
            });
        }
        actions
    }

    /// Drops the active gesture and its draft without committing.
    pub fn cancel(&mut self) -> Option<WindowId> {
        let gesture = self.active.take()?;
        self.drafts.remove(&gesture.window_id);
        Some(gesture.window_id)
    }

    /// Drops any draft for a window that no longer exists.
    pub fn forget(&mut self, window_id: &WindowId) {
        self.drafts.remove(window_id);
        if self
            .active
            .as_ref()
            .is_some_and(|gesture| gesture.window_id == *window_id)
        {
            self.active = None;
        }
    }

    /// Window of the gesture in progress.
    pub fn active_window(&self) -> Option<&WindowId> {
        self.active.as_ref().map(|gesture| &gesture.window_id)
    }

    /// Mode of the gesture in progress.
    pub fn active_mode(&self) -> Option<GestureMode> {
        self.active.as_ref().map(|gesture| gesture.mode)
    }

    /// Uncommitted bounds of `window_id`.
    pub fn draft(&self, window_id: &WindowId) -> Option<WindowBounds> {
        self.drafts.get(window_id).copied()
    }

    /// Bounds a renderer should paint: the draft when one exists, else the durable bounds.
    pub fn effective_bounds(&self, window: &WindowInstance) -> WindowBounds {
        self.draft(&window.id).unwrap_or(window.bounds)
    }
}
