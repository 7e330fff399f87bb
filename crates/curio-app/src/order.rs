// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Piece;

/// Relocate `piece` within `sequence` using anchor references.
///
/// The piece is removed from the sequence (matched by token), then reinserted
/// at the position of `insert_before` in the piece-removed sequence; if
/// `insert_before` is absent, immediately after `insert_after`; if neither
/// anchor resolves, at the end. A piece that is not in the sequence at all
/// leaves the input unchanged.
///
/// Pure: callers get a fresh vector and the same call applied twice yields
/// the same result as applying it once.
pub fn relocate(
    sequence: &[Piece],
    piece: &Piece,
    insert_before: Option<&Piece>,
    insert_after: Option<&Piece>,
) -> Vec<Piece> {
    if !sequence.iter().any(|entry| entry.same_piece(piece)) {
        return sequence.to_vec();
    }

    let mut reordered: Vec<Piece> = sequence
        .iter()
        .filter(|entry| !entry.same_piece(piece))
        .cloned()
        .collect();

    let target = insertion_index(&reordered, insert_before, insert_after);
    reordered.insert(target, piece.clone());
    reordered
}

fn insertion_index(
    sequence: &[Piece],
    insert_before: Option<&Piece>,
    insert_after: Option<&Piece>,
) -> usize {
    // insert_before wins whenever both anchors resolve.
    if let Some(before) = insert_before
        && let Some(index) = position_of(sequence, before)
    {
        return index;
    }
    if let Some(after) = insert_after
        && let Some(index) = position_of(sequence, after)
    {
        return index + 1;
    }
    sequence.len()
}

fn position_of(sequence: &[Piece], piece: &Piece) -> Option<usize> {
    sequence.iter().position(|entry| entry.same_piece(piece))
}
