// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::Date;

use crate::{FormKind, KindId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceFormInput {
    pub title: String,
    pub kind_id: KindId,
    pub origin: String,
    pub year: Option<i32>,
    pub notes: String,
    pub acquired_on: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Piece(PieceFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Piece(_) => FormKind::Piece,
        }
    }

    pub fn blank_for(kind: FormKind) -> Self {
        match kind {
            FormKind::Piece => Self::Piece(PieceFormInput {
                title: String::new(),
                kind_id: KindId::new(0),
                origin: String::new(),
                year: None,
                notes: String::new(),
                acquired_on: None,
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Piece(piece) => piece.validate(),
        }
    }
}

impl PieceFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("piece title is required -- enter a title and retry");
        }
        if self.kind_id.get() <= 0 {
            bail!("shelf kind is required -- choose a shelf and retry");
        }
        if let Some(year) = self.year
            && !(1000..=9999).contains(&year)
        {
            bail!("piece year must be a four-digit year");
        }
        Ok(())
    }
}
