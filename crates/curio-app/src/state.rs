// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, FormKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_shelf: usize,
    pub shelf_count: usize,
    pub filter_query: String,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_shelf: 0,
            shelf_count: 0,
            filter_query: String::new(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextShelf,
    PrevShelf,
    EnterGrab,
    EnterFilter,
    OpenForm(FormKind),
    ExitToNav,
    SetFilterQuery(String),
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    ShelfChanged(usize),
    FilterChanged(String),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextShelf => self.rotate_shelf(1),
            AppCommand::PrevShelf => self.rotate_shelf(-1),
            AppCommand::EnterGrab => {
                self.mode = AppMode::Grab;
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status("grab: j/k move, enter drop, esc cancel"),
                ]
            }
            AppCommand::EnterFilter => {
                self.mode = AppMode::Filter;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenForm(kind) => {
                self.mode = AppMode::Form(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode), self.set_status("nav")]
            }
            AppCommand::SetFilterQuery(query) => {
                self.filter_query = query.clone();
                vec![AppEvent::FilterChanged(query)]
            }
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_shelf(&mut self, delta: isize) -> Vec<AppEvent> {
        if self.shelf_count == 0 {
            return Vec::new();
        }
        let len = self.shelf_count as isize;
        let current = self.active_shelf.min(self.shelf_count - 1) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_shelf = next;
        vec![AppEvent::ShelfChanged(self.active_shelf)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
