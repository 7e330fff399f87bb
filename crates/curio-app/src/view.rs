// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::order::relocate;
use crate::{KindId, Piece, PieceFilter};

/// Notification emitted synchronously by a [`ShelfView`] operation, after the
/// operation has fully applied. There is no queue; callers react to the
/// returned events or drop them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    OrderChanged {
        kind_id: KindId,
        order: Vec<String>,
    },
    SelectionChanged {
        primary: Option<String>,
        selected: Vec<String>,
    },
    PageChanged {
        kind_id: KindId,
        page_index: usize,
    },
    Noted(String),
}

/// The four coupled sequences for one shelf: canonical per-shelf order,
/// filtered subset, paginated display window, and multi-select list. Every
/// public mutation applies atomically across all four and ends in one
/// centralized invariant-restoring pass; no caller mutates the sequences
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfView {
    kind_id: KindId,
    canonical: Vec<Piece>,
    filtered: Vec<Piece>,
    selection: Vec<Piece>,
    display_start: usize,
    page_size: usize,
}

impl ShelfView {
    pub fn new(kind_id: KindId, pieces: Vec<Piece>, page_size: usize) -> Self {
        let mut canonical = pieces;
        restore_unique(&mut canonical);
        let filtered = canonical.clone();
        Self {
            kind_id,
            canonical,
            filtered,
            selection: Vec::new(),
            display_start: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn kind_id(&self) -> KindId {
        self.kind_id
    }

    pub fn canonical(&self) -> &[Piece] {
        &self.canonical
    }

    pub fn filtered(&self) -> &[Piece] {
        &self.filtered
    }

    pub fn selection(&self) -> &[Piece] {
        &self.selection
    }

    pub fn primary(&self) -> Option<&Piece> {
        self.selection.first()
    }

    pub fn is_selected(&self, token: &str) -> bool {
        self.selection.iter().any(|piece| piece.token == token)
    }

    pub fn display_start(&self) -> usize {
        self.display_start
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.display_start / self.page_size
    }

    /// The display window, re-clamped at read time so a filter that shrank
    /// since the window was set can never yield an out-of-range slice.
    pub fn displayed(&self) -> &[Piece] {
        let start = self.display_start.min(self.filtered.len());
        let end = (start + self.page_size).min(self.filtered.len());
        &self.filtered[start..end]
    }

    pub fn canonical_tokens(&self) -> Vec<String> {
        self.canonical.iter().map(|piece| piece.token.clone()).collect()
    }

    /// Move a piece to the front of the filtered order (and of the selection,
    /// if it is selected). Absent from both sequences: no-op with a notice.
    pub fn move_to_top(&mut self, token: &str) -> Vec<ViewEvent> {
        self.move_to_edge(token, Edge::Top)
    }

    /// Mirror of [`Self::move_to_top`] for the back of the order.
    pub fn move_to_bottom(&mut self, token: &str) -> Vec<ViewEvent> {
        self.move_to_edge(token, Edge::Bottom)
    }

    fn move_to_edge(&mut self, token: &str, edge: Edge) -> Vec<ViewEvent> {
        let in_filtered = contains_token(&self.filtered, token);
        let in_selection = contains_token(&self.selection, token);
        if !in_filtered && !in_selection {
            return vec![ViewEvent::Noted(format!(
                "piece {token} is no longer on this shelf"
            ))];
        }

        if in_filtered {
            relocate_to_edge(&mut self.filtered, token, edge);
        }
        if in_selection {
            relocate_to_edge(&mut self.selection, token, edge);
        }

        let mut events = Vec::new();
        self.finish_structural(&mut events);
        events.push(self.order_changed());
        if in_selection {
            events.push(self.selection_changed());
        }
        events
    }

    /// Relocate a piece so it lands at `target_index` of the filtered
    /// sequence (index counted with the piece itself removed, clamped to
    /// `[0, len]`). The anchors derived from that position are applied to the
    /// filtered sequence and, independently, to the selection; the selection
    /// resolves the same anchors against its own contents and falls back on
    /// its own.
    pub fn reorder(&mut self, token: &str, target_index: usize) -> Vec<ViewEvent> {
        let Some(piece) = find_token(&self.filtered, token).cloned() else {
            return vec![ViewEvent::Noted(format!(
                "piece {token} is no longer on this shelf"
            ))];
        };

        let remainder: Vec<Piece> = self
            .filtered
            .iter()
            .filter(|entry| entry.token != token)
            .cloned()
            .collect();
        let target = target_index.min(remainder.len());
        let insert_before = remainder.get(target).cloned();
        let insert_after = target.checked_sub(1).and_then(|i| remainder.get(i)).cloned();

        let selection_touched = contains_token(&self.selection, token);
        self.filtered = relocate(
            &self.filtered,
            &piece,
            insert_before.as_ref(),
            insert_after.as_ref(),
        );
        self.selection = relocate(
            &self.selection,
            &piece,
            insert_before.as_ref(),
            insert_after.as_ref(),
        );

        let mut events = Vec::new();
        self.finish_structural(&mut events);
        events.push(self.order_changed());
        if selection_touched {
            events.push(self.selection_changed());
        }
        events
    }

    /// Insert a new piece at `index` of the filtered sequence (append when
    /// `None` or out of range). Re-inserting a token that is already present
    /// is repaired by the dedup pass, which keeps the first occurrence.
    pub fn insert_piece(&mut self, piece: Piece, index: Option<usize>) -> Vec<ViewEvent> {
        let at = index.unwrap_or(self.filtered.len()).min(self.filtered.len());
        self.filtered.insert(at, piece);

        let mut events = Vec::new();
        self.finish_structural(&mut events);
        events.push(self.order_changed());
        events
    }

    /// Delete a piece from every sequence. Absent token: no-op with a notice.
    pub fn remove_piece(&mut self, token: &str) -> Vec<ViewEvent> {
        let was_known =
            contains_token(&self.canonical, token) || contains_token(&self.selection, token);
        if !was_known {
            return vec![ViewEvent::Noted(format!("piece {token} is already gone"))];
        }

        let selection_touched = contains_token(&self.selection, token);
        self.canonical.retain(|piece| piece.token != token);
        self.filtered.retain(|piece| piece.token != token);
        self.selection.retain(|piece| piece.token != token);

        let mut events = Vec::new();
        self.finish_structural(&mut events);
        events.push(self.order_changed());
        if selection_touched {
            events.push(self.selection_changed());
        }
        events
    }

    /// Re-derive the filtered subset from the canonical order, calling the
    /// predicate once per canonical piece. Selection is left intact; entries
    /// that no longer pass the filter simply stop participating in reorders
    /// until the filter readmits them.
    pub fn recompute_filtered(&mut self, filter: &dyn PieceFilter) -> Vec<ViewEvent> {
        self.filtered = self
            .canonical
            .iter()
            .filter(|piece| filter.matches(piece))
            .cloned()
            .collect();

        let mut events = Vec::new();
        let before = self.page_index();
        self.clamp_window();
        if self.page_index() != before {
            events.push(self.page_changed());
        }
        events
    }

    /// Position the display window. `start` is clamped so a full page is
    /// shown whenever the filtered sequence allows one; `displayed()` clamps
    /// again at read time.
    pub fn set_display_window(&mut self, start: usize, page_size: usize) -> Vec<ViewEvent> {
        let before = self.page_index();
        self.page_size = page_size.max(1);
        self.display_start = start.min(self.filtered.len().saturating_sub(self.page_size));

        if self.page_index() == before {
            return Vec::new();
        }
        vec![self.page_changed()]
    }

    pub fn toggle_select(&mut self, token: &str) -> Vec<ViewEvent> {
        let Some(piece) = find_token(&self.filtered, token).cloned() else {
            return vec![ViewEvent::Noted(format!(
                "piece {token} is not visible; selection unchanged"
            ))];
        };

        if self.is_selected(token) {
            self.selection.retain(|entry| entry.token != token);
        } else {
            self.selection.push(piece);
        }
        vec![self.selection_changed()]
    }

    pub fn select_only(&mut self, token: &str) -> Vec<ViewEvent> {
        let Some(piece) = find_token(&self.filtered, token).cloned() else {
            return vec![ViewEvent::Noted(format!(
                "piece {token} is not visible; selection unchanged"
            ))];
        };
        self.selection = vec![piece];
        vec![self.selection_changed()]
    }

    pub fn clear_selection(&mut self) -> Vec<ViewEvent> {
        if self.selection.is_empty() {
            return Vec::new();
        }
        self.selection.clear();
        vec![self.selection_changed()]
    }

    /// Resolve what should be selected after a drop: the previous primary if
    /// it still exists in the filtered sequence, else the grabbed piece, else
    /// the previous primary looked up by token across the whole canonical
    /// order, else nothing.
    pub fn post_drop_selection(
        &mut self,
        previous_primary: Option<&str>,
        grabbed: Option<&str>,
    ) -> Vec<ViewEvent> {
        let resolved = previous_primary
            .and_then(|token| find_token(&self.filtered, token))
            .or_else(|| grabbed.and_then(|token| find_token(&self.filtered, token)))
            .or_else(|| previous_primary.and_then(|token| find_token(&self.canonical, token)))
            .cloned();

        self.selection = resolved.into_iter().collect();
        vec![self.selection_changed()]
    }

    /// One invariant-restoring pass run at the end of every structural
    /// mutation: dedup by token, rebuild the canonical order as the filtered
    /// order followed by filtered-out pieces in their prior relative order,
    /// and re-clamp the display window.
    fn finish_structural(&mut self, events: &mut Vec<ViewEvent>) {
        restore_unique(&mut self.filtered);
        restore_unique(&mut self.selection);

        let mut rebuilt = self.filtered.clone();
        rebuilt.extend(
            self.canonical
                .iter()
                .filter(|piece| !contains_token(&self.filtered, &piece.token))
                .cloned(),
        );
        self.canonical = rebuilt;

        let before = self.page_index();
        self.clamp_window();
        if self.page_index() != before {
            events.push(self.page_changed());
        }
    }

    fn clamp_window(&mut self) {
        self.display_start = self
            .display_start
            .min(self.filtered.len().saturating_sub(self.page_size));
    }

    fn order_changed(&self) -> ViewEvent {
        ViewEvent::OrderChanged {
            kind_id: self.kind_id,
            order: self.canonical_tokens(),
        }
    }

    fn selection_changed(&self) -> ViewEvent {
        ViewEvent::SelectionChanged {
            primary: self.primary().map(|piece| piece.token.clone()),
            selected: self
                .selection
                .iter()
                .map(|piece| piece.token.clone())
                .collect(),
        }
    }

    fn page_changed(&self) -> ViewEvent {
        ViewEvent::PageChanged {
            kind_id: self.kind_id,
            page_index: self.page_index(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Bottom,
}

fn relocate_to_edge(sequence: &mut Vec<Piece>, token: &str, edge: Edge) {
    let Some(index) = sequence.iter().position(|piece| piece.token == token) else {
        return;
    };
    let piece = sequence.remove(index);
    match edge {
        Edge::Top => sequence.insert(0, piece),
        Edge::Bottom => sequence.push(piece),
    }
}

/// Keep the first occurrence of each token, drop later ones. Duplicates only
/// appear if an upstream bug introduced them; this pass repairs silently.
fn restore_unique(sequence: &mut Vec<Piece>) {
    let mut index = 0;
    while index < sequence.len() {
        let token = sequence[index].token.clone();
        let mut probe = index + 1;
        while probe < sequence.len() {
            if sequence[probe].token == token {
                sequence.remove(probe);
            } else {
                probe += 1;
            }
        }
        index += 1;
    }
}

fn contains_token(sequence: &[Piece], token: &str) -> bool {
    sequence.iter().any(|piece| piece.token == token)
}

fn find_token<'a>(sequence: &'a [Piece], token: &str) -> Option<&'a Piece> {
    sequence.iter().find(|piece| piece.token == token)
}
