// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use curio_app::{FormPayload, KindId, OrderWriter, Piece, PieceId, ShelfKind, WriteRequest};
use curio_db::{NewPiece, Store};

pub struct DbRuntime<'a> {
    store: &'a Store,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl OrderWriter for DbRuntime<'_> {
    fn write(&mut self, request: &WriteRequest) -> Result<()> {
        match request {
            WriteRequest::ShelfOrder { kind_id, order } => {
                self.store.save_shelf_order(*kind_id, order)
            }
        }
    }

    fn write_catalog(&mut self) -> Result<()> {
        self.store.mark_catalog_saved()
    }
}

impl curio_tui::AppRuntime for DbRuntime<'_> {
    fn load_kinds(&mut self) -> Result<Vec<ShelfKind>> {
        self.store.list_kinds()
    }

    fn load_shelf(&mut self, kind_id: KindId) -> Result<Vec<Piece>> {
        self.store.list_pieces(kind_id)
    }

    fn submit_form(&mut self, payload: &FormPayload) -> Result<Piece> {
        payload.validate()?;

        match payload {
            FormPayload::Piece(form) => self.store.create_piece(&NewPiece {
                kind_id: form.kind_id,
                title: form.title.clone(),
                origin: form.origin.clone(),
                year: form.year,
                notes: form.notes.clone(),
                acquired_on: form.acquired_on,
            }),
        }
    }

    fn delete_piece(&mut self, piece_id: PieceId) -> Result<()> {
        self.store.delete_piece(piece_id)
    }
}
