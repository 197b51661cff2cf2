// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Suggestion;

/// What the dropdown does when a search returns zero rows: close silently or
/// keep a single "No results found" placeholder row visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyResultPolicy {
    Close,
    Placeholder,
}

/// How a commit lands: write the id into the single bound target and keep the
/// label visible, or hand the label to a tag collection and clear the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStyle {
    SingleValue,
    TagCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorConfig {
    pub min_query_len: usize,
    pub empty_policy: EmptyResultPolicy,
    pub commit: CommitStyle,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            empty_policy: EmptyResultPolicy::Close,
            commit: CommitStyle::SingleValue,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorCommand {
    Input(String),
    ResponseArrived { seq: u64, items: Vec<Suggestion> },
    ResponseFailed { seq: u64 },
    HighlightNext,
    HighlightPrev,
    Hover(usize),
    ClickRow(usize),
    Submit,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Match(Suggestion),
    FreeText(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorEvent {
    QueryIssued { seq: u64, query: String },
    SuggestionsShown(usize),
    NoMatches,
    DropdownClosed,
    HighlightMoved(usize),
    Committed(Selection),
    StaleResponseDropped { seq: u64 },
}

/// One typeahead widget bound to one input. Each instance owns its own
/// dropdown state; responses are matched against the latest issued sequence
/// and discarded when stale. Invariant: `highlighted` is `None` or a valid
/// index into `suggestions`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorState {
    config: SelectorConfig,
    query: String,
    suggestions: Vec<Suggestion>,
    highlighted: Option<usize>,
    no_matches: bool,
    bound: Option<i64>,
    latest_seq: u64,
}

impl SelectorState {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            query: String::new(),
            suggestions: Vec::new(),
            highlighted: None,
            no_matches: false,
            bound: None,
            latest_seq: 0,
        }
    }

    pub fn config(&self) -> SelectorConfig {
        self.config
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// The id committed from the last matched selection, if any. Cleared on
    /// every edit and on free-text commits.
    pub fn bound(&self) -> Option<i64> {
        self.bound
    }

    pub fn is_open(&self) -> bool {
        !self.suggestions.is_empty() || self.no_matches
    }

    pub fn shows_placeholder(&self) -> bool {
        self.no_matches
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub fn dispatch(&mut self, command: SelectorCommand) -> Vec<SelectorEvent> {
        match command {
            SelectorCommand::Input(text) => self.apply_input(text),
            SelectorCommand::ResponseArrived { seq, items } => self.apply_response(seq, items),
            SelectorCommand::ResponseFailed { seq } => {
                if seq == self.latest_seq {
                    // Dropdown state is deliberately left as-is; the owner
                    // logs the failure and the user sees nothing.
                    Vec::new()
                } else {
                    vec![SelectorEvent::StaleResponseDropped { seq }]
                }
            }
            SelectorCommand::HighlightNext => self.move_highlight(1),
            SelectorCommand::HighlightPrev => self.move_highlight(-1),
            SelectorCommand::Hover(index) => {
                if index < self.suggestions.len() {
                    self.highlighted = Some(index);
                    vec![SelectorEvent::HighlightMoved(index)]
                } else {
                    Vec::new()
                }
            }
            SelectorCommand::ClickRow(index) => match self.suggestions.get(index).cloned() {
                Some(suggestion) => self.commit_match(suggestion),
                None => Vec::new(),
            },
            SelectorCommand::Submit => self.submit(),
            SelectorCommand::Dismiss => self.close_dropdown(),
        }
    }

    fn apply_input(&mut self, text: String) -> Vec<SelectorEvent> {
        let trimmed = text.trim().to_owned();
        self.query = text;
        // Any pending selection becomes "new/unmatched value".
        self.bound = None;
        // Bumping the sequence on every edit also invalidates in-flight
        // requests when the query falls back below the threshold.
        self.latest_seq += 1;

        if trimmed.chars().count() < self.config.min_query_len {
            self.close_dropdown()
        } else {
            vec![SelectorEvent::QueryIssued {
                seq: self.latest_seq,
                query: trimmed,
            }]
        }
    }

    fn apply_response(&mut self, seq: u64, items: Vec<Suggestion>) -> Vec<SelectorEvent> {
        if seq != self.latest_seq {
            return vec![SelectorEvent::StaleResponseDropped { seq }];
        }

        self.highlighted = None;
        if items.is_empty() {
            self.suggestions.clear();
            match self.config.empty_policy {
                EmptyResultPolicy::Close => {
                    self.no_matches = false;
                    vec![SelectorEvent::DropdownClosed]
                }
                EmptyResultPolicy::Placeholder => {
                    self.no_matches = true;
                    vec![SelectorEvent::NoMatches]
                }
            }
        } else {
            self.no_matches = false;
            let count = items.len();
            self.suggestions = items;
            vec![SelectorEvent::SuggestionsShown(count)]
        }
    }

    fn move_highlight(&mut self, delta: isize) -> Vec<SelectorEvent> {
        let len = self.suggestions.len();
        if len == 0 {
            return Vec::new();
        }

        let next = match self.highlighted {
            Some(index) => (index as isize + delta).rem_euclid(len as isize) as usize,
            None if delta >= 0 => 0,
            None => len - 1,
        };
        self.highlighted = Some(next);
        vec![SelectorEvent::HighlightMoved(next)]
    }

    fn submit(&mut self) -> Vec<SelectorEvent> {
        let highlighted = self
            .highlighted
            .and_then(|index| self.suggestions.get(index).cloned());

        match self.config.commit {
            CommitStyle::SingleValue => {
                if !self.is_open() {
                    return Vec::new();
                }
                match highlighted {
                    Some(suggestion) => self.commit_match(suggestion),
                    None => self.commit_free_text(),
                }
            }
            CommitStyle::TagCollection => match highlighted {
                Some(suggestion) => self.commit_match(suggestion),
                // Enter with free text adds a new tag even when no dropdown
                // is showing.
                None if !self.query.trim().is_empty() => self.commit_free_text(),
                None => self.close_dropdown(),
            },
        }
    }

    fn commit_match(&mut self, suggestion: Suggestion) -> Vec<SelectorEvent> {
        match self.config.commit {
            CommitStyle::SingleValue => {
                self.query = suggestion.label.clone();
                self.bound = Some(suggestion.id);
            }
            CommitStyle::TagCollection => {
                self.query.clear();
                self.bound = None;
            }
        }

        let mut events = self.close_dropdown();
        events.push(SelectorEvent::Committed(Selection::Match(suggestion)));
        events
    }

    fn commit_free_text(&mut self) -> Vec<SelectorEvent> {
        let text = self.query.trim().to_owned();
        self.bound = None;
        if self.config.commit == CommitStyle::TagCollection {
            self.query.clear();
        }

        let mut events = self.close_dropdown();
        events.push(SelectorEvent::Committed(Selection::FreeText(text)));
        events
    }

    fn close_dropdown(&mut self) -> Vec<SelectorEvent> {
        let was_open = self.is_open();
        self.suggestions.clear();
        self.highlighted = None;
        self.no_matches = false;
        if was_open {
            vec![SelectorEvent::DropdownClosed]
        } else {
            Vec::new()
        }
    }
}
