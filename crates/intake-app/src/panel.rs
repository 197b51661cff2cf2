// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};

use crate::{DocumentDescriptor, EditorConfig};

/// Milliseconds between starting to hide the panel and marking the overlay
/// non-interactive.
pub const OVERLAY_RELEASE_DELAY_MS: u64 = 300;

/// Instantiates the external document editor for one descriptor. The editor
/// itself is an opaque third-party contract; this crate only keeps the
/// resulting session handle.
pub trait EditorHost {
    fn instantiate(
        &mut self,
        descriptor: &DocumentDescriptor,
        config: &EditorConfig,
    ) -> Result<EditorSession>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSession {
    pub preview: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelVisibility {
    Hidden,
    Visible,
    /// Slide-out has started; the overlay stays interactive until released.
    Closing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelEntry {
    pub descriptor: DocumentDescriptor,
    pub editor: EditorSession,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    Opened { key: String },
    Switched { key: String },
}

/// Slide-in panel hosting one lazily instantiated editor session per opened
/// document key. Entries double as the tab order; at most one entry is
/// current, and exactly zero or one editor container is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelManager {
    entries: Vec<PanelEntry>,
    current: Option<usize>,
    visibility: PanelVisibility,
    hide_token: u64,
}

impl Default for PanelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            visibility: PanelVisibility::Hidden,
            hide_token: 0,
        }
    }

    pub fn entries(&self) -> &[PanelEntry] {
        &self.entries
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_entry(&self) -> Option<&PanelEntry> {
        self.current.and_then(|index| self.entries.get(index))
    }

    pub fn visibility(&self) -> PanelVisibility {
        self.visibility
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self.visibility, PanelVisibility::Hidden)
    }

    /// Opens a document. A never-seen key instantiates an editor session via
    /// the host and creates the tab; a known key only switches the current
    /// tab and re-shows the panel, keeping the original session.
    pub fn open_document(
        &mut self,
        descriptor: DocumentDescriptor,
        config: &EditorConfig,
        host: &mut dyn EditorHost,
    ) -> Result<PanelEvent> {
        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.descriptor.key == descriptor.key)
        {
            self.current = Some(index);
            self.visibility = PanelVisibility::Visible;
            return Ok(PanelEvent::Switched {
                key: descriptor.key,
            });
        }

        let editor = host
            .instantiate(&descriptor, config)
            .with_context(|| format!("instantiate editor for document {:?}", descriptor.key))?;
        let key = descriptor.key.clone();
        self.entries.push(PanelEntry { descriptor, editor });
        self.current = Some(self.entries.len() - 1);
        self.visibility = PanelVisibility::Visible;
        Ok(PanelEvent::Opened { key })
    }

    /// Switches to an already-open tab by position.
    pub fn select_tab(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current = Some(index);
            self.visibility = PanelVisibility::Visible;
            true
        } else {
            false
        }
    }

    pub fn rotate_tab(&mut self, delta: isize) -> bool {
        let len = self.entries.len() as isize;
        if len == 0 {
            return false;
        }
        let current = self.current.unwrap_or(0) as isize;
        self.current = Some((current + delta).rem_euclid(len) as usize);
        true
    }

    /// Re-shows the panel on whichever entry is current. Visibility is
    /// independent of tab/editor state.
    pub fn show(&mut self) -> bool {
        if self.current.is_some() {
            self.visibility = PanelVisibility::Visible;
            true
        } else {
            false
        }
    }

    /// Starts the slide-out. Returns the token the caller must pass back via
    /// [`release_overlay`](Self::release_overlay) after the release delay.
    /// The current entry is kept so a later show reveals it again.
    pub fn hide(&mut self) -> Option<u64> {
        if self.visibility == PanelVisibility::Hidden {
            return None;
        }
        self.visibility = PanelVisibility::Closing;
        self.hide_token += 1;
        Some(self.hide_token)
    }

    /// Completes a hide. A stale token (another show/hide happened since) is
    /// ignored.
    pub fn release_overlay(&mut self, token: u64) -> bool {
        if token == self.hide_token && self.visibility == PanelVisibility::Closing {
            self.visibility = PanelVisibility::Hidden;
            true
        } else {
            false
        }
    }
}
