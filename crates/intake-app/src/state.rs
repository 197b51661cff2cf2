// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::SearchField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    ChiefComplaint,
    Occupation,
    Patient,
    SecretaryTags,
    Documents,
}

impl Focus {
    pub const ALL: [Self; 5] = [
        Self::ChiefComplaint,
        Self::Occupation,
        Self::Patient,
        Self::SecretaryTags,
        Self::Documents,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::ChiefComplaint => "chief complaint",
            Self::Occupation => "occupation",
            Self::Patient => "patient",
            Self::SecretaryTags => "secretary tags",
            Self::Documents => "documents",
        }
    }

    pub const fn search_field(self) -> Option<SearchField> {
        match self {
            Self::ChiefComplaint => Some(SearchField::ChiefComplaint),
            Self::Occupation => Some(SearchField::Occupation),
            Self::Patient => Some(SearchField::Patient),
            Self::SecretaryTags => Some(SearchField::SecretaryTags),
            Self::Documents => None,
        }
    }
}

impl From<SearchField> for Focus {
    fn from(field: SearchField) -> Self {
        match field {
            SearchField::ChiefComplaint => Self::ChiefComplaint,
            SearchField::Occupation => Self::Occupation,
            SearchField::Patient => Self::Patient,
            SearchField::SecretaryTags => Self::SecretaryTags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub focus: Focus,
    pub status_line: Option<String>,
    pub documents_enabled: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            focus: Focus::ChiefComplaint,
            status_line: None,
            documents_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    FocusNext,
    FocusPrev,
    SetFocus(Focus),
    SetStatus(String),
    ClearStatus,
    DisableDocuments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    FocusChanged(Focus),
    StatusUpdated(String),
    StatusCleared,
    DocumentsDisabled,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::FocusNext => self.rotate_focus(1),
            AppCommand::FocusPrev => self.rotate_focus(-1),
            AppCommand::SetFocus(focus) => {
                if focus == Focus::Documents && !self.documents_enabled {
                    return Vec::new();
                }
                self.focus = focus;
                vec![AppEvent::FocusChanged(self.focus)]
            }
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
            AppCommand::DisableDocuments => {
                self.documents_enabled = false;
                if self.focus == Focus::Documents {
                    self.focus = Focus::ChiefComplaint;
                }
                vec![AppEvent::DocumentsDisabled]
            }
        }
    }

    fn rotate_focus(&mut self, delta: isize) -> Vec<AppEvent> {
        let order = Focus::ALL;
        let len = order.len() as isize;
        let current = order
            .iter()
            .position(|focus| *focus == self.focus)
            .unwrap_or(0) as isize;

        let mut next = (current + delta).rem_euclid(len) as usize;
        if order[next] == Focus::Documents && !self.documents_enabled {
            next = (next as isize + delta).rem_euclid(len) as usize;
        }
        self.focus = order[next];
        vec![AppEvent::FocusChanged(self.focus)]
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, Focus};

    #[test]
    fn focus_rotation_wraps() {
        let mut state = AppState {
            focus: Focus::Documents,
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::FocusNext);
        assert_eq!(state.focus, Focus::ChiefComplaint);
        assert_eq!(events, vec![AppEvent::FocusChanged(Focus::ChiefComplaint)]);
    }

    #[test]
    fn disabled_documents_section_is_skipped() {
        let mut state = AppState {
            focus: Focus::SecretaryTags,
            ..AppState::default()
        };
        state.dispatch(AppCommand::DisableDocuments);

        state.dispatch(AppCommand::FocusNext);
        assert_eq!(state.focus, Focus::ChiefComplaint);

        assert_eq!(state.dispatch(AppCommand::SetFocus(Focus::Documents)), Vec::new());
        assert_eq!(state.focus, Focus::ChiefComplaint);
    }

    #[test]
    fn disabling_documents_moves_focus_off_the_section() {
        let mut state = AppState {
            focus: Focus::Documents,
            ..AppState::default()
        };
        state.dispatch(AppCommand::DisableDocuments);
        assert_eq!(state.focus, Focus::ChiefComplaint);
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();

        let events = state.dispatch(AppCommand::SetStatus("patient selected".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("patient selected"));
        assert_eq!(
            events,
            vec![AppEvent::StatusUpdated("patient selected".to_owned())],
        );

        state.dispatch(AppCommand::ClearStatus);
        assert_eq!(state.status_line, None);
    }
}
