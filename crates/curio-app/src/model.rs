// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

/// A collectible on a shelf. The `token` is the stable identifier: assigned
/// once by the store when the piece is created, never reused, and the basis
/// for equality inside ordered sequences (`PieceId` is the storage rowid and
/// stays out of ordering logic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub token: String,
    pub kind_id: KindId,
    pub title: String,
    pub origin: String,
    pub year: Option<i32>,
    pub notes: String,
    pub acquired_on: Option<Date>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Piece {
    pub fn same_piece(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfKind {
    pub id: KindId,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Piece,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Grab,
    Filter,
    Form(FormKind),
}

impl AppMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nav => "nav",
            Self::Grab => "grab",
            Self::Filter => "filter",
            Self::Form(FormKind::Piece) => "add piece",
        }
    }
}

/// Filter seam supplied by the UI layer. The view calls `matches` once per
/// canonical piece per recompute pass; ranking and fuzzy matching live
/// outside this crate.
pub trait PieceFilter {
    fn matches(&self, piece: &Piece) -> bool;
}

/// Accept-everything filter used when no query is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFilter;

impl PieceFilter for OpenFilter {
    fn matches(&self, _piece: &Piece) -> bool {
        true
    }
}
