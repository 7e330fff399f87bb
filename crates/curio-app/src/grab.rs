// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::view::{ShelfView, ViewEvent};
use crate::Piece;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrabOperation {
    #[default]
    None,
    PieceGrab,
    ForeignGrab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabPhase {
    Idle,
    Armed,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrabModifiers {
    pub alt: bool,
    pub control: bool,
    pub shift: bool,
}

/// State machine for an in-progress reorder gesture: which piece is lifted,
/// where the insertion ghost currently sits, and which modifier keys are
/// held. Modifiers are force-cleared on every return to idle, so a stale
/// flag can never leak into the next gesture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrabSession {
    operation: GrabOperation,
    grabbed: Option<Piece>,
    ghost_index: Option<usize>,
    modifiers: GrabModifiers,
}

impl GrabSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(&self) -> GrabOperation {
        self.operation
    }

    pub fn phase(&self) -> GrabPhase {
        match (self.operation, self.ghost_index) {
            (GrabOperation::None, _) => GrabPhase::Idle,
            (_, None) => GrabPhase::Armed,
            (_, Some(_)) => GrabPhase::Tracking,
        }
    }

    pub fn grabbed(&self) -> Option<&Piece> {
        self.grabbed.as_ref()
    }

    pub fn ghost_index(&self) -> Option<usize> {
        self.ghost_index
    }

    pub fn modifiers(&self) -> GrabModifiers {
        self.modifiers
    }

    /// Lift a piece. Arms the session; any gesture already in progress is
    /// discarded first.
    pub fn begin(&mut self, piece: Piece) {
        self.reset();
        self.operation = GrabOperation::PieceGrab;
        self.grabbed = Some(piece);
    }

    /// A gesture whose payload is not a shelf piece. The session tracks it so
    /// modifier state stays coherent, but dropping it reorders nothing.
    pub fn begin_foreign(&mut self) {
        self.reset();
        self.operation = GrabOperation::ForeignGrab;
    }

    /// Track the insertion ghost. `requested` is clamped to `[0, row_count]`;
    /// a detached marker (`marker_attached == false`) forces `row_count`. A
    /// marker can detach when the container is rebuilt mid-gesture.
    pub fn track_ghost(&mut self, requested: usize, row_count: usize, marker_attached: bool) {
        if self.operation == GrabOperation::None {
            return;
        }
        let clamped = if marker_attached {
            requested.min(row_count)
        } else {
            row_count
        };
        self.ghost_index = Some(clamped);
    }

    /// Modifier flags only mutate while a gesture is active; at idle they
    /// stay force-zeroed.
    pub fn set_modifiers(&mut self, modifiers: GrabModifiers) {
        if self.operation == GrabOperation::None {
            self.modifiers = GrabModifiers::default();
            return;
        }
        self.modifiers = modifiers;
    }

    /// Finish the gesture: translate the ghost into a target index against
    /// the view's filtered order, reorder, and resolve the post-drop
    /// selection. Always returns to idle, even when the drop aborts.
    pub fn drop_onto(&mut self, view: &mut ShelfView) -> Vec<ViewEvent> {
        let operation = self.operation;
        let grabbed = self.grabbed.take();
        let ghost_index = self.ghost_index;
        self.reset();

        if operation != GrabOperation::PieceGrab {
            return Vec::new();
        }
        let Some(piece) = grabbed else {
            return vec![ViewEvent::Noted("drop with nothing grabbed".to_owned())];
        };
        if view.filtered().is_empty() {
            return vec![ViewEvent::Noted(
                "shelf is empty; drop abandoned".to_owned(),
            )];
        }

        let previous_primary = view.primary().map(|primary| primary.token.clone());
        let target = view.display_start() + ghost_index.unwrap_or_else(|| view.displayed().len());

        let mut events = view.reorder(&piece.token, target);
        events.extend(view.post_drop_selection(previous_primary.as_deref(), Some(&piece.token)));
        events
    }

    /// Abandon the gesture without reordering.
    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.operation = GrabOperation::None;
        self.grabbed = None;
        self.ghost_index = None;
        self.modifiers = GrabModifiers::default();
    }
}
