// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use intake_app::{
    AppCommand, AppState, CommitStyle, DocumentDescriptor, EditorConfig, EditorHost, EditorSession,
    EmptyResultPolicy, Focus, GenerateRequest, OVERLAY_RELEASE_DELAY_MS, PanelEvent, PanelManager,
    PatientRecordId, SearchField, Selection, SelectorCommand, SelectorConfig, SelectorEvent,
    SelectorState, Suggestion, SuggestionRow, TagSet,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const DROPDOWN_MAX_ROWS: usize = 8;
const STATUS_CLEAR_SECS: u64 = 4;

/// Selector tuning handed to the UI by the runtime. `tag_placeholder` keeps
/// the secretary-tags dropdown open with a "No results found" row on empty
/// responses; the other three fields always close silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub min_query_len: usize,
    pub tag_placeholder: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            tag_placeholder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Completed {
        field: SearchField,
        request_id: u64,
        items: Vec<Suggestion>,
    },
    Failed {
        field: SearchField,
        request_id: u64,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerateEvent {
    Completed { descriptor: DocumentDescriptor },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    ReleasePanelOverlay { token: u64 },
    Search(SearchEvent),
    Generate(GenerateEvent),
}

/// Backend seam for the UI. The default `spawn_*` methods run synchronously
/// and push the completion through the channel; real runtimes override them
/// with worker threads. In-flight work is never cancelled -- stale
/// completions are discarded by the selector sequence guard.
pub trait AppRuntime {
    fn run_search(&mut self, field: SearchField, query: &str) -> Result<Vec<Suggestion>>;
    fn select_patient(&mut self, patient: PatientRecordId) -> Result<()>;
    fn list_documents(&mut self) -> Result<Vec<DocumentDescriptor>>;
    fn run_generate(&mut self, request: &GenerateRequest) -> Result<DocumentDescriptor>;
    fn instantiate_editor(
        &mut self,
        descriptor: &DocumentDescriptor,
        config: &EditorConfig,
    ) -> Result<EditorSession>;

    fn ui_options(&mut self) -> UiOptions {
        UiOptions::default()
    }

    fn editor_config(&mut self) -> EditorConfig {
        EditorConfig::default()
    }

    fn generate_request(&mut self) -> GenerateRequest {
        GenerateRequest::default()
    }

    fn spawn_search(
        &mut self,
        field: SearchField,
        request_id: u64,
        query: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.run_search(field, query) {
            Ok(items) => InternalEvent::Search(SearchEvent::Completed {
                field,
                request_id,
                items,
            }),
            Err(error) => InternalEvent::Search(SearchEvent::Failed {
                field,
                request_id,
                error: error.to_string(),
            }),
        };
        tx.send(event)
            .map_err(|_| anyhow!("search event channel closed"))?;
        Ok(())
    }

    fn spawn_generate(
        &mut self,
        request: &GenerateRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.run_generate(request) {
            Ok(descriptor) => InternalEvent::Generate(GenerateEvent::Completed { descriptor }),
            Err(error) => InternalEvent::Generate(GenerateEvent::Failed {
                error: error.to_string(),
            }),
        };
        tx.send(event)
            .map_err(|_| anyhow!("generate event channel closed"))?;
        Ok(())
    }
}

struct RuntimeHost<'a, R: AppRuntime>(&'a mut R);

impl<R: AppRuntime> EditorHost for RuntimeHost<'_, R> {
    fn instantiate(
        &mut self,
        descriptor: &DocumentDescriptor,
        config: &EditorConfig,
    ) -> Result<EditorSession> {
        self.0.instantiate_editor(descriptor, config)
    }
}

/// One selector per bound field; every widget owns its own dropdown state so
/// simultaneously active typeaheads cannot collide.
#[derive(Debug, Clone, PartialEq)]
struct SelectorBank {
    chief_complaint: SelectorState,
    occupation: SelectorState,
    patient: SelectorState,
    secretary_tags: SelectorState,
}

impl SelectorBank {
    fn new(options: UiOptions) -> Self {
        let single = SelectorConfig {
            min_query_len: options.min_query_len,
            empty_policy: EmptyResultPolicy::Close,
            commit: CommitStyle::SingleValue,
        };
        let tags = SelectorConfig {
            min_query_len: options.min_query_len,
            empty_policy: if options.tag_placeholder {
                EmptyResultPolicy::Placeholder
            } else {
                EmptyResultPolicy::Close
            },
            commit: CommitStyle::TagCollection,
        };
        Self {
            chief_complaint: SelectorState::new(single),
            occupation: SelectorState::new(single),
            patient: SelectorState::new(single),
            secretary_tags: SelectorState::new(tags),
        }
    }

    fn get(&self, field: SearchField) -> &SelectorState {
        match field {
            SearchField::ChiefComplaint => &self.chief_complaint,
            SearchField::Occupation => &self.occupation,
            SearchField::Patient => &self.patient,
            SearchField::SecretaryTags => &self.secretary_tags,
        }
    }

    fn get_mut(&mut self, field: SearchField) -> &mut SelectorState {
        match field {
            SearchField::ChiefComplaint => &mut self.chief_complaint,
            SearchField::Occupation => &mut self.occupation,
            SearchField::Patient => &mut self.patient,
            SearchField::SecretaryTags => &mut self.secretary_tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct GenerateUiState {
    in_flight: bool,
    /// Armed after the first successful generation; later submissions ask
    /// for confirmation first.
    has_generated: bool,
    confirm_visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    selectors: SelectorBank,
    tags: TagSet,
    documents: Vec<DocumentDescriptor>,
    document_cursor: usize,
    panel: PanelManager,
    generate: GenerateUiState,
    editor_config: EditorConfig,
    help_visible: bool,
    status_token: u64,
    screen: Rect,
}

impl ViewData {
    fn with_options(options: UiOptions) -> Self {
        Self {
            selectors: SelectorBank::new(options),
            tags: TagSet::new(),
            documents: Vec::new(),
            document_cursor: 0,
            panel: PanelManager::new(),
            generate: GenerateUiState::default(),
            editor_config: EditorConfig::default(),
            help_visible: false,
            status_token: 0,
            screen: Rect::new(0, 0, 80, 24),
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        terminal::EnterAlternateScreen,
        event::EnableMouseCapture
    )
    .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::with_options(runtime.ui_options());
    view_data.editor_config = runtime.editor_config();
    let (internal_tx, internal_rx) = mpsc::channel();

    load_documents_or_disable(state, runtime, &mut view_data);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        match terminal.size() {
            Ok(size) => view_data.screen = Rect::new(0, 0, size.width, size.height),
            Err(error) => {
                result = Err(error).context("query terminal size");
                break;
            }
        }
        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse_event(state, runtime, &mut view_data, &internal_tx, mouse);
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    execute!(
        io::stdout(),
        event::DisableMouseCapture,
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    disable_raw_mode().context("disable raw mode")?;
    result
}

/// Initial document list; on failure the section logs once and disables
/// itself rather than surfacing an error.
fn load_documents_or_disable<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) {
    match runtime.list_documents() {
        Ok(documents) => {
            view_data.documents = documents;
            view_data.document_cursor = 0;
        }
        Err(error) => {
            tracing::warn!("document list load failed, disabling documents section: {error:#}");
            state.dispatch(AppCommand::DisableDocuments);
        }
    }
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::ReleasePanelOverlay { token } => {
                view_data.panel.release_overlay(token);
            }
            InternalEvent::Search(event) => handle_search_event(view_data, event),
            InternalEvent::Generate(event) => {
                handle_generate_event(state, runtime, view_data, tx, event);
            }
        }
    }
}

fn handle_search_event(view_data: &mut ViewData, event: SearchEvent) {
    match event {
        SearchEvent::Completed {
            field,
            request_id,
            items,
        } => {
            let events = view_data
                .selectors
                .get_mut(field)
                .dispatch(SelectorCommand::ResponseArrived {
                    seq: request_id,
                    items,
                });
            if stale_dropped(&events) {
                tracing::debug!("stale {} search response dropped", field.label());
            }
        }
        SearchEvent::Failed {
            field,
            request_id,
            error,
        } => {
            let events = view_data
                .selectors
                .get_mut(field)
                .dispatch(SelectorCommand::ResponseFailed { seq: request_id });
            if !stale_dropped(&events) {
                tracing::warn!("{} search failed: {error}", field.label());
            }
        }
    }
}

fn stale_dropped(events: &[SelectorEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, SelectorEvent::StaleResponseDropped { .. }))
}

fn handle_generate_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: GenerateEvent,
) {
    match event {
        GenerateEvent::Completed { descriptor } => {
            view_data.generate.in_flight = false;
            view_data.generate.has_generated = true;
            view_data.documents.push(descriptor.clone());
            view_data.document_cursor = view_data.documents.len() - 1;
            emit_status(
                state,
                view_data,
                tx,
                format!("document ready: {}", descriptor.title),
            );
            open_document(runtime, view_data, descriptor);
        }
        GenerateEvent::Failed { error } => {
            view_data.generate.in_flight = false;
            tracing::warn!("document generation failed: {error}");
        }
    }
}

fn open_document<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    descriptor: DocumentDescriptor,
) {
    let config = view_data.editor_config.clone();
    let mut host = RuntimeHost(runtime);
    match view_data.panel.open_document(descriptor, &config, &mut host) {
        Ok(PanelEvent::Opened { key }) => tracing::debug!("editor opened for document {key}"),
        Ok(PanelEvent::Switched { .. }) => {}
        Err(error) => tracing::warn!("editor instantiation failed: {error:#}"),
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(STATUS_CLEAR_SECS));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn schedule_panel_release(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(OVERLAY_RELEASE_DELAY_MS));
        let _ = sender.send(InternalEvent::ReleasePanelOverlay { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::F(1)) {
            view_data.help_visible = false;
        }
        return false;
    }

    if key.code == KeyCode::F(1) {
        view_data.help_visible = true;
        return false;
    }

    if view_data.generate.confirm_visible {
        handle_confirm_key(runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.panel.is_interactive() {
        handle_panel_key(view_data, internal_tx, key);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Tab, _) => cycle_focus(state, view_data, 1),
        (KeyCode::BackTab, _) => cycle_focus(state, view_data, -1),
        (KeyCode::Esc, _) => {
            if let Some(field) = state.focus.search_field() {
                view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::Dismiss);
            }
        }
        (KeyCode::Up, _) => match state.focus.search_field() {
            Some(field) => {
                view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::HighlightPrev);
            }
            None => view_data.document_cursor = view_data.document_cursor.saturating_sub(1),
        },
        (KeyCode::Down, _) => match state.focus.search_field() {
            Some(field) => {
                view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::HighlightNext);
            }
            None => {
                let max = view_data.documents.len().saturating_sub(1);
                view_data.document_cursor = (view_data.document_cursor + 1).min(max);
            }
        },
        (KeyCode::Enter, _) => match state.focus.search_field() {
            Some(field) => {
                let events = view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::Submit);
                enact_selector_events(state, runtime, view_data, internal_tx, field, events);
            }
            None => {
                if let Some(descriptor) =
                    view_data.documents.get(view_data.document_cursor).cloned()
                {
                    open_document(runtime, view_data, descriptor);
                }
            }
        },
        (KeyCode::Backspace, _) => {
            if let Some(field) = state.focus.search_field() {
                let selector = view_data.selectors.get_mut(field);
                if field == SearchField::SecretaryTags && selector.query().is_empty() {
                    remove_last_tag(state, view_data, internal_tx);
                } else {
                    let mut text = selector.query().to_owned();
                    text.pop();
                    let events = selector.dispatch(SelectorCommand::Input(text));
                    enact_selector_events(state, runtime, view_data, internal_tx, field, events);
                }
            }
        }
        (KeyCode::Char(ch), modifiers)
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
        {
            match state.focus.search_field() {
                Some(field) => {
                    let selector = view_data.selectors.get_mut(field);
                    let mut text = selector.query().to_owned();
                    text.push(ch);
                    let events = selector.dispatch(SelectorCommand::Input(text));
                    enact_selector_events(state, runtime, view_data, internal_tx, field, events);
                }
                None => match ch {
                    'g' => request_generate(state, runtime, view_data, internal_tx),
                    'j' => {
                        let max = view_data.documents.len().saturating_sub(1);
                        view_data.document_cursor = (view_data.document_cursor + 1).min(max);
                    }
                    'k' => {
                        view_data.document_cursor = view_data.document_cursor.saturating_sub(1);
                    }
                    _ => {}
                },
            }
        }
        _ => {}
    }
    false
}

fn handle_confirm_key<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            start_generate(runtime, view_data, internal_tx);
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_data.generate.confirm_visible = false;
        }
        _ => {}
    }
}

fn handle_panel_key(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if let Some(token) = view_data.panel.hide() {
                schedule_panel_release(internal_tx, token);
            }
        }
        KeyCode::Tab | KeyCode::Right => {
            view_data.panel.rotate_tab(1);
        }
        KeyCode::BackTab | KeyCode::Left => {
            view_data.panel.rotate_tab(-1);
        }
        _ => {}
    }
}

fn cycle_focus(state: &mut AppState, view_data: &mut ViewData, delta: isize) {
    // Leaving a field closes its dropdown without committing.
    if let Some(field) = state.focus.search_field() {
        view_data
            .selectors
            .get_mut(field)
            .dispatch(SelectorCommand::Dismiss);
    }
    let command = if delta >= 0 {
        AppCommand::FocusNext
    } else {
        AppCommand::FocusPrev
    };
    state.dispatch(command);
}

fn remove_last_tag(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(last) = view_data.tags.names().last().cloned() else {
        return;
    };
    view_data.tags.remove(&last);
    emit_status(state, view_data, internal_tx, format!("tag removed: {last}"));
}

fn enact_selector_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    field: SearchField,
    events: Vec<SelectorEvent>,
) {
    for event in events {
        match event {
            SelectorEvent::QueryIssued { seq, query } => {
                if let Err(error) = runtime.spawn_search(field, seq, &query, internal_tx.clone()) {
                    tracing::warn!("{} search dispatch failed: {error:#}", field.label());
                }
            }
            SelectorEvent::Committed(selection) => {
                commit_selection(state, runtime, view_data, internal_tx, field, selection);
            }
            _ => {}
        }
    }
}

fn commit_selection<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    field: SearchField,
    selection: Selection,
) {
    match field {
        SearchField::SecretaryTags => {
            let label = match selection {
                Selection::Match(suggestion) => suggestion.label,
                Selection::FreeText(text) => text,
            };
            if !label.is_empty() && view_data.tags.add(&label) {
                emit_status(state, view_data, internal_tx, format!("tag added: {label}"));
            }
        }
        SearchField::Patient => {
            if let Selection::Match(suggestion) = selection {
                match runtime.select_patient(PatientRecordId::new(suggestion.id)) {
                    Ok(()) => {
                        reload_session(state, runtime, view_data);
                        emit_status(
                            state,
                            view_data,
                            internal_tx,
                            format!("patient selected: {}", suggestion.label),
                        );
                    }
                    Err(error) => tracing::warn!("patient selection failed: {error:#}"),
                }
            }
        }
        SearchField::ChiefComplaint | SearchField::Occupation => {
            if let Selection::Match(suggestion) = selection {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{}: {}", field.label(), suggestion.label),
                );
            }
        }
    }
}

/// The terminal analog of the full page reload after a patient switch: every
/// widget resets and the document list is fetched again. Selector resets go
/// through `Input("")` so the sequence guard also invalidates any in-flight
/// searches.
fn reload_session<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) {
    for field in SearchField::ALL {
        view_data
            .selectors
            .get_mut(field)
            .dispatch(SelectorCommand::Input(String::new()));
    }
    view_data.tags.clear();
    view_data.panel = PanelManager::new();
    view_data.generate = GenerateUiState::default();
    load_documents_or_disable(state, runtime, view_data);
}

fn request_generate<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !state.documents_enabled {
        return;
    }
    if view_data.generate.in_flight {
        emit_status(state, view_data, internal_tx, "generation already running");
        return;
    }
    if view_data.generate.has_generated {
        view_data.generate.confirm_visible = true;
        return;
    }
    start_generate(runtime, view_data, internal_tx);
}

fn start_generate<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    view_data.generate.confirm_visible = false;
    view_data.generate.in_flight = true;
    let request = runtime.generate_request();
    if let Err(error) = runtime.spawn_generate(&request, internal_tx.clone()) {
        view_data.generate.in_flight = false;
        tracing::warn!("generation dispatch failed: {error:#}");
    }
}

fn handle_mouse_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
) {
    let layout = compute_layout(view_data.screen, state, view_data);
    let position = Position::new(mouse.column, mouse.row);

    if let Some(panel) = &layout.panel {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(index) = panel
                    .tab_cells
                    .iter()
                    .position(|cell| cell.contains(position))
                {
                    view_data.panel.select_tab(index);
                } else if !panel.area.contains(position) {
                    // Clicking the dimmed overlay outside the panel hides it.
                    if let Some(token) = view_data.panel.hide() {
                        schedule_panel_release(internal_tx, token);
                    }
                }
            }
            _ => {}
        }
        return;
    }

    match mouse.kind {
        MouseEventKind::Moved => {
            if let Some((field, row)) = layout.dropdown_row_at(position) {
                view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::Hover(row));
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if view_data.generate.confirm_visible {
                return;
            }
            if let Some((field, row)) = layout.dropdown_row_at(position) {
                let events = view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::ClickRow(row));
                enact_selector_events(state, runtime, view_data, internal_tx, field, events);
            } else if let Some(field) = layout.field_at(position) {
                if state.focus.search_field() != Some(field) {
                    cycle_to_field(state, view_data, field);
                }
            } else if let Some(index) = layout.document_row_at(position) {
                view_data.document_cursor = index;
                if let Some(descriptor) = view_data.documents.get(index).cloned() {
                    open_document(runtime, view_data, descriptor);
                }
            } else if let Some(field) = state.focus.search_field() {
                // Neither the input nor its dropdown: close without commit.
                view_data
                    .selectors
                    .get_mut(field)
                    .dispatch(SelectorCommand::Dismiss);
            }
        }
        _ => {}
    }
}

fn cycle_to_field(state: &mut AppState, view_data: &mut ViewData, field: SearchField) {
    if let Some(previous) = state.focus.search_field() {
        view_data
            .selectors
            .get_mut(previous)
            .dispatch(SelectorCommand::Dismiss);
    }
    state.dispatch(AppCommand::SetFocus(Focus::from(field)));
}

#[derive(Debug, Clone, PartialEq)]
struct DropdownLayout {
    field: SearchField,
    area: Rect,
    rows: Vec<Rect>,
}

#[derive(Debug, Clone, PartialEq)]
struct PanelLayout {
    area: Rect,
    tab_cells: Vec<Rect>,
    body: Rect,
}

#[derive(Debug, Clone, PartialEq)]
struct ScreenLayout {
    header: Rect,
    fields: [(SearchField, Rect); 4],
    tags_row: Rect,
    documents: Rect,
    document_rows: Vec<Rect>,
    status: Rect,
    dropdown: Option<DropdownLayout>,
    panel: Option<PanelLayout>,
}

impl ScreenLayout {
    fn field_at(&self, position: Position) -> Option<SearchField> {
        self.fields
            .iter()
            .find(|(_, rect)| rect.contains(position))
            .map(|(field, _)| *field)
    }

    fn dropdown_row_at(&self, position: Position) -> Option<(SearchField, usize)> {
        let dropdown = self.dropdown.as_ref()?;
        dropdown
            .rows
            .iter()
            .position(|rect| rect.contains(position))
            .map(|row| (dropdown.field, row))
    }

    fn document_row_at(&self, position: Position) -> Option<usize> {
        self.document_rows
            .iter()
            .position(|rect| rect.contains(position))
    }
}

/// Pure screen geometry shared by the renderer and the mouse handler. The
/// dropdown rectangle is derived from the focused input's current rectangle
/// on every call, so it tracks position and width across resizes.
fn compute_layout(area: Rect, state: &AppState, view_data: &ViewData) -> ScreenLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let fields = [
        (SearchField::ChiefComplaint, vertical[1]),
        (SearchField::Occupation, vertical[2]),
        (SearchField::Patient, vertical[3]),
        (SearchField::SecretaryTags, vertical[4]),
    ];
    let documents = vertical[6];

    let document_rows = if state.documents_enabled {
        let inner = documents.inner(ratatui::layout::Margin::new(1, 1));
        view_data
            .documents
            .iter()
            .enumerate()
            .take(inner.height as usize)
            .map(|(index, _)| Rect {
                x: inner.x,
                y: inner.y + index as u16,
                width: inner.width,
                height: 1,
            })
            .collect()
    } else {
        Vec::new()
    };

    let dropdown = state.focus.search_field().and_then(|field| {
        let selector = view_data.selectors.get(field);
        if !selector.is_open() {
            return None;
        }
        let anchor = fields
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, rect)| *rect)?;

        let row_count = if selector.shows_placeholder() {
            1
        } else {
            selector.suggestions().len().min(DROPDOWN_MAX_ROWS)
        };
        let top = anchor.y + anchor.height;
        let available = area.bottom().saturating_sub(top).saturating_sub(2) as usize;
        if available == 0 {
            return None;
        }
        let row_count = row_count.min(available);

        let dropdown_area = Rect {
            x: anchor.x,
            y: top,
            width: anchor.width,
            height: row_count as u16 + 2,
        };
        let rows = (0..row_count)
            .map(|index| Rect {
                x: dropdown_area.x + 1,
                y: dropdown_area.y + 1 + index as u16,
                width: dropdown_area.width.saturating_sub(2),
                height: 1,
            })
            .collect();
        Some(DropdownLayout {
            field,
            area: dropdown_area,
            rows,
        })
    });

    let panel = if view_data.panel.is_interactive() {
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(area);
        let panel_area = horizontal[1];
        let panel_vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)])
            .split(panel_area);
        let tab_bar = panel_vertical[0];
        let entries = view_data.panel.entries().len().max(1);
        let tab_cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, entries as u32); entries])
            .split(tab_bar)
            .to_vec();
        Some(PanelLayout {
            area: panel_area,
            tab_cells,
            body: panel_vertical[1],
        })
    } else {
        None
    };

    ScreenLayout {
        header: vertical[0],
        fields,
        tags_row: vertical[5],
        documents,
        document_rows,
        status: vertical[7],
        dropdown,
        panel,
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = compute_layout(frame.area(), state, view_data);

    let selected = Focus::ALL
        .iter()
        .position(|focus| *focus == state.focus)
        .unwrap_or(0);
    let titles = Focus::ALL
        .iter()
        .map(|focus| focus.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("intake").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout.header);

    for (field, rect) in layout.fields {
        render_field(frame, rect, state, view_data, field);
    }

    let chips = if view_data.tags.is_empty() {
        "(none)".to_owned()
    } else {
        view_data
            .tags
            .names()
            .iter()
            .map(|tag| format!("[{tag} x]"))
            .collect::<Vec<String>>()
            .join(" ")
    };
    let chips_widget = Paragraph::new(chips)
        .block(Block::default().title("selected tags").borders(Borders::ALL));
    frame.render_widget(chips_widget, layout.tags_row);

    render_documents(frame, &layout, state, view_data);

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout.status);

    if let Some(dropdown) = &layout.dropdown {
        render_dropdown(frame, dropdown, view_data);
    }

    if let Some(panel) = &layout.panel {
        render_panel(frame, panel, view_data);
    }

    if view_data.generate.confirm_visible {
        let area = centered_rect(44, 20, frame.area());
        frame.render_widget(Clear, area);
        let confirm = Paragraph::new("Are you sure you want to add another file?\n\ny / n")
            .block(Block::default().title("confirm").borders(Borders::ALL));
        frame.render_widget(confirm, area);
    }

    if view_data.help_visible {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_field(
    frame: &mut ratatui::Frame<'_>,
    rect: Rect,
    state: &AppState,
    view_data: &ViewData,
    field: SearchField,
) {
    let selector = view_data.selectors.get(field);
    let focused = state.focus.search_field() == Some(field);
    let title = match selector.bound() {
        Some(id) => format!("{} (#{id})", field.label()),
        None => field.label().to_owned(),
    };
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let body = if focused {
        format!("{}\u{2588}", selector.query())
    } else {
        selector.query().to_owned()
    };
    let widget = Paragraph::new(body).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    frame.render_widget(widget, rect);
}

fn render_documents(
    frame: &mut ratatui::Frame<'_>,
    layout: &ScreenLayout,
    state: &AppState,
    view_data: &ViewData,
) {
    let focused = state.focus == Focus::Documents;
    let title = if !state.documents_enabled {
        "documents (unavailable)".to_owned()
    } else if view_data.generate.in_flight {
        "documents -- processing".to_owned()
    } else {
        "documents".to_owned()
    };
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);
    frame.render_widget(block, layout.documents);

    for (index, rect) in layout.document_rows.iter().enumerate() {
        let Some(descriptor) = view_data.documents.get(index) else {
            break;
        };
        let marker = if focused && index == view_data.document_cursor {
            "> "
        } else {
            "  "
        };
        let line = format!("{marker}{} ({})", descriptor.title, descriptor.extension);
        let style = if focused && index == view_data.document_cursor {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        frame.render_widget(Paragraph::new(line).style(style), *rect);
    }
}

fn render_dropdown(frame: &mut ratatui::Frame<'_>, dropdown: &DropdownLayout, view_data: &ViewData) {
    let selector = view_data.selectors.get(dropdown.field);
    frame.render_widget(Clear, dropdown.area);
    frame.render_widget(Block::default().borders(Borders::ALL), dropdown.area);

    if selector.shows_placeholder() {
        if let Some(rect) = dropdown.rows.first() {
            let placeholder =
                Paragraph::new("No results found").style(Style::default().fg(Color::DarkGray));
            frame.render_widget(placeholder, *rect);
        }
        return;
    }

    for (index, rect) in dropdown.rows.iter().enumerate() {
        let Some(suggestion) = selector.suggestions().get(index) else {
            break;
        };
        let style = if selector.highlighted() == Some(index) {
            Style::default().bg(Color::Cyan).fg(Color::Black)
        } else {
            Style::default()
        };
        let line = suggestion_row_text(suggestion);
        frame.render_widget(Paragraph::new(line).style(style), *rect);
    }
}

fn suggestion_row_text(suggestion: &Suggestion) -> String {
    match &suggestion.row {
        SuggestionRow::Term => suggestion.label.clone(),
        SuggestionRow::Patient(patient) => format!(
            "{:<14} {:<14} {:<10} {}",
            patient.first_name, patient.last_name, patient.mrn, patient.ssn
        ),
    }
}

fn render_panel(frame: &mut ratatui::Frame<'_>, panel: &PanelLayout, view_data: &ViewData) {
    frame.render_widget(Clear, panel.area);
    frame.render_widget(
        Block::default()
            .title("document panel")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
        panel.area,
    );

    let current = view_data.panel.current_index();
    for (index, cell) in panel.tab_cells.iter().enumerate() {
        let Some(entry) = view_data.panel.entries().get(index) else {
            break;
        };
        let style = if current == Some(index) {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::White)
        };
        let tab = Paragraph::new(Line::from(entry.descriptor.title.clone()))
            .style(style)
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(tab, *cell);
    }

    if let Some(entry) = view_data.panel.current_entry() {
        let body = Paragraph::new(entry.editor.preview.clone())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::NONE));
        frame.render_widget(
            body,
            panel.body.inner(ratatui::layout::Margin::new(1, 1)),
        );
    }
}

fn status_text(state: &AppState) -> String {
    let default =
        "tab/shift-tab fields | type to search | enter select | g generate | F1 help | ctrl+q quit";
    match &state.status_line {
        Some(status) => format!("{} | {status} | {default}", state.focus.label()),
        None => format!("{} | {default}", state.focus.label()),
    }
}

fn help_overlay_text() -> &'static str {
    "tab / shift-tab   move between fields\n\
     type 3+ chars     search the records server\n\
     up / down         move the dropdown highlight\n\
     enter             select highlighted row (free text otherwise)\n\
     esc               close dropdown / panel\n\
     backspace         delete; on empty tag input, remove last tag\n\
     g                 generate a document (documents section)\n\
     j / k             move in the document list\n\
     mouse             hover highlights, click selects, outside click closes\n\
     ctrl+q            quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, GenerateEvent, InternalEvent, ScreenLayout, SearchEvent, UiOptions, ViewData,
        compute_layout, handle_key_event, handle_mouse_event, handle_search_event,
        load_documents_or_disable, process_internal_events, status_text,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
    use intake_app::{
        AppState, DocumentDescriptor, EditorConfig, EditorSession, Focus, GenerateRequest,
        PanelVisibility, PatientRecordId, SearchField, Suggestion,
    };
    use intake_testkit::{sample_descriptor as descriptor, term_suggestion as term};
    use ratatui::layout::Rect;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        results: Vec<Suggestion>,
        fail_search: bool,
        searches: Vec<(SearchField, String)>,
        selected_patients: Vec<i64>,
        documents: Vec<DocumentDescriptor>,
        fail_documents: bool,
        document_loads: usize,
        generated: Option<DocumentDescriptor>,
        generate_error: Option<String>,
        generate_calls: usize,
        fail_editor_keys: Vec<String>,
        editors_instantiated: usize,
    }

    impl TestRuntime {
        fn with_results(results: Vec<Suggestion>) -> Self {
            Self {
                results,
                ..Self::default()
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn run_search(&mut self, field: SearchField, query: &str) -> Result<Vec<Suggestion>> {
            self.searches.push((field, query.to_owned()));
            if self.fail_search {
                bail!("search backend down");
            }
            Ok(self.results.clone())
        }

        fn select_patient(&mut self, patient: PatientRecordId) -> Result<()> {
            self.selected_patients.push(patient.get());
            Ok(())
        }

        fn list_documents(&mut self) -> Result<Vec<DocumentDescriptor>> {
            self.document_loads += 1;
            if self.fail_documents {
                bail!("document list endpoint missing");
            }
            Ok(self.documents.clone())
        }

        fn run_generate(&mut self, _request: &GenerateRequest) -> Result<DocumentDescriptor> {
            self.generate_calls += 1;
            if let Some(error) = &self.generate_error {
                bail!("{error}");
            }
            self.generated
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no canned descriptor"))
        }

        fn instantiate_editor(
            &mut self,
            descriptor: &DocumentDescriptor,
            _config: &EditorConfig,
        ) -> Result<EditorSession> {
            if self.fail_editor_keys.contains(&descriptor.key) {
                bail!("editor refused {}", descriptor.key);
            }
            self.editors_instantiated += 1;
            Ok(EditorSession {
                preview: format!("preview {}", descriptor.key),
            })
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                state: AppState::default(),
                runtime,
                view_data: ViewData::with_options(UiOptions::default()),
                tx,
                rx,
            }
        }

        fn key(&mut self, code: KeyCode) {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, KeyModifiers::NONE),
            );
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch));
            }
        }

        fn drain(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn click(&mut self, column: u16, row: u16) {
            handle_mouse_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                MouseEvent {
                    kind: MouseEventKind::Down(MouseButton::Left),
                    column,
                    row,
                    modifiers: KeyModifiers::NONE,
                },
            );
        }

        fn hover(&mut self, column: u16, row: u16) {
            handle_mouse_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                MouseEvent {
                    kind: MouseEventKind::Moved,
                    column,
                    row,
                    modifiers: KeyModifiers::NONE,
                },
            );
        }

        fn layout(&self) -> ScreenLayout {
            compute_layout(self.view_data.screen, &self.state, &self.view_data)
        }

        /// Waits for the scheduled panel release and applies it, skipping any
        /// unrelated queued events.
        fn await_panel_release(&mut self) {
            loop {
                let event = self
                    .rx
                    .recv_timeout(std::time::Duration::from_secs(2))
                    .expect("panel release event should arrive");
                if let InternalEvent::ReleasePanelOverlay { token } = event {
                    self.view_data.panel.release_overlay(token);
                    return;
                }
            }
        }
    }

    #[test]
    fn queries_below_minimum_length_issue_no_search() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(5, "Abcess")]));
        harness.type_text("ab");
        harness.drain();

        assert!(harness.runtime.searches.is_empty());
        assert!(!harness.view_data.selectors.chief_complaint.is_open());
    }

    #[test]
    fn three_character_query_populates_dropdown() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(5, "Abcess")]));
        harness.type_text("abc");
        harness.drain();

        assert_eq!(
            harness.runtime.searches,
            vec![
                (SearchField::ChiefComplaint, "abc".to_owned()),
            ],
        );
        let selector = &harness.view_data.selectors.chief_complaint;
        assert_eq!(selector.suggestions().len(), 1);
        assert_eq!(selector.highlighted(), None);
    }

    #[test]
    fn arrow_down_then_enter_commits_highlighted_row() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(5, "Abcess")]));
        harness.type_text("abc");
        harness.drain();
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);

        let selector = &harness.view_data.selectors.chief_complaint;
        assert_eq!(selector.query(), "Abcess");
        assert_eq!(selector.bound(), Some(5));
        assert!(!selector.is_open());
    }

    #[test]
    fn min_query_length_option_is_honored() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(1, "x")]));
        harness.view_data = ViewData::with_options(UiOptions {
            min_query_len: 4,
            tag_placeholder: true,
        });
        harness.type_text("abc");
        harness.drain();
        assert!(harness.runtime.searches.is_empty());

        harness.type_text("d");
        harness.drain();
        assert_eq!(harness.runtime.searches.len(), 1);
    }

    #[test]
    fn stale_search_response_does_not_replace_fresh_one() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(2, "fresh")]));
        harness.type_text("abcd");
        harness.drain();

        handle_search_event(
            &mut harness.view_data,
            SearchEvent::Completed {
                field: SearchField::ChiefComplaint,
                request_id: 1,
                items: vec![term(1, "stale")],
            },
        );

        let selector = &harness.view_data.selectors.chief_complaint;
        assert_eq!(selector.suggestions().len(), 1);
        assert_eq!(selector.suggestions()[0].label, "fresh");
    }

    #[test]
    fn failed_search_leaves_dropdown_unchanged() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(1, "kept")]));
        harness.type_text("abc");
        harness.drain();

        harness.runtime.fail_search = true;
        harness.type_text("d");
        harness.drain();

        let selector = &harness.view_data.selectors.chief_complaint;
        assert_eq!(selector.suggestions().len(), 1);
        assert_eq!(selector.suggestions()[0].label, "kept");
    }

    #[test]
    fn focus_change_dismisses_open_dropdown() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(1, "row")]));
        harness.type_text("abc");
        harness.drain();
        assert!(harness.view_data.selectors.chief_complaint.is_open());

        harness.key(KeyCode::Tab);
        assert!(!harness.view_data.selectors.chief_complaint.is_open());
        assert_eq!(harness.state.focus, Focus::Occupation);
    }

    #[test]
    fn dropdown_sits_under_the_focused_field_and_tracks_width() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(1, "row")]));
        harness.key(KeyCode::Tab);
        harness.type_text("nur");
        harness.drain();

        let layout = harness.layout();
        let dropdown = layout.dropdown.expect("dropdown should be laid out");
        let (_, anchor) = layout.fields[1];
        assert_eq!(dropdown.field, SearchField::Occupation);
        assert_eq!(dropdown.area.x, anchor.x);
        assert_eq!(dropdown.area.y, anchor.y + anchor.height);
        assert_eq!(dropdown.area.width, anchor.width);

        // A narrower screen repositions the overlay on the next pass.
        harness.view_data.screen = Rect::new(0, 0, 40, 24);
        let narrow = harness.layout();
        let dropdown = narrow.dropdown.expect("dropdown survives resize");
        assert_eq!(dropdown.area.width, narrow.fields[1].1.width);
    }

    #[test]
    fn mouse_hover_highlights_and_click_commits() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![
            term(1, "first"),
            term(2, "second"),
        ]));
        harness.type_text("abc");
        harness.drain();

        let layout = harness.layout();
        let rows = layout.dropdown.as_ref().expect("dropdown").rows.clone();
        harness.hover(rows[1].x, rows[1].y);
        assert_eq!(
            harness.view_data.selectors.chief_complaint.highlighted(),
            Some(1),
        );

        harness.click(rows[1].x, rows[1].y);
        let selector = &harness.view_data.selectors.chief_complaint;
        assert_eq!(selector.bound(), Some(2));
        assert_eq!(selector.query(), "second");
    }

    #[test]
    fn outside_click_closes_dropdown_without_commit() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(1, "row")]));
        harness.type_text("abc");
        harness.drain();
        assert!(harness.view_data.selectors.chief_complaint.is_open());

        let status_y = harness.layout().status.y + 1;
        harness.click(2, status_y);

        let selector = &harness.view_data.selectors.chief_complaint;
        assert!(!selector.is_open());
        assert_eq!(selector.bound(), None);
    }

    #[test]
    fn selecting_the_same_tag_twice_keeps_one_chip() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(9, "Fever")]));
        harness.state.focus = Focus::SecretaryTags;

        for _ in 0..2 {
            harness.type_text("fev");
            harness.drain();
            harness.key(KeyCode::Down);
            harness.key(KeyCode::Enter);
        }

        assert_eq!(harness.view_data.tags.names(), ["Fever".to_owned()]);
        assert_eq!(harness.view_data.selectors.secretary_tags.query(), "");
    }

    #[test]
    fn tag_enter_with_free_text_adds_new_tag() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.state.focus = Focus::SecretaryTags;
        harness.type_text("hx");
        harness.key(KeyCode::Enter);
        assert_eq!(harness.view_data.tags.names(), ["hx".to_owned()]);
    }

    #[test]
    fn backspace_on_empty_tag_input_removes_last_chip() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.state.focus = Focus::SecretaryTags;
        harness.view_data.tags.add("Urgent");
        harness.view_data.tags.add("Billing");

        harness.key(KeyCode::Backspace);
        assert_eq!(harness.view_data.tags.names(), ["Urgent".to_owned()]);
    }

    #[test]
    fn patient_commit_posts_selection_and_reloads_session() {
        let mut harness = Harness::new(TestRuntime::with_results(vec![term(41, "Avery Walker")]));
        harness.runtime.documents = vec![descriptor("doc1")];
        load_documents_or_disable(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
        );
        harness.view_data.tags.add("Urgent");
        harness.state.focus = Focus::Patient;

        harness.type_text("wal");
        harness.drain();
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);

        assert_eq!(harness.runtime.selected_patients, vec![41]);
        assert!(harness.view_data.tags.is_empty());
        assert_eq!(harness.runtime.document_loads, 2);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("patient selected: Avery Walker"),
        );
    }

    #[test]
    fn opening_same_document_twice_instantiates_one_editor() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.documents = vec![descriptor("doc1")];
        load_documents_or_disable(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
        );
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Enter);
        assert!(harness.view_data.panel.is_interactive());
        harness.key(KeyCode::Esc);
        harness.await_panel_release();

        harness.key(KeyCode::Enter);
        assert_eq!(harness.runtime.editors_instantiated, 1);
        assert_eq!(harness.view_data.panel.entries().len(), 1);
        assert!(harness.view_data.panel.is_interactive());
    }

    #[test]
    fn editor_failure_keeps_panel_closed_for_that_key() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.documents = vec![descriptor("broken")];
        harness.runtime.fail_editor_keys = vec!["broken".to_owned()];
        load_documents_or_disable(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
        );
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Enter);
        assert!(harness.view_data.panel.entries().is_empty());
        assert_eq!(
            harness.view_data.panel.visibility(),
            PanelVisibility::Hidden,
        );
    }

    #[test]
    fn document_load_failure_disables_the_section() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.fail_documents = true;
        load_documents_or_disable(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
        );

        assert!(!harness.state.documents_enabled);
        assert!(harness.layout().document_rows.is_empty());
    }

    #[test]
    fn generate_success_opens_the_new_document() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.generated = Some(descriptor("fresh"));
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Char('g'));
        assert!(harness.view_data.generate.in_flight);
        harness.drain();

        assert!(!harness.view_data.generate.in_flight);
        assert!(harness.view_data.generate.has_generated);
        assert_eq!(harness.view_data.documents.len(), 1);
        assert_eq!(harness.view_data.panel.entries().len(), 1);
        assert!(harness.view_data.panel.is_interactive());
    }

    #[test]
    fn generate_business_error_clears_indicator_quietly() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.generate_error = Some("template missing".to_owned());
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Char('g'));
        harness.drain();

        assert!(!harness.view_data.generate.in_flight);
        assert!(!harness.view_data.generate.has_generated);
        assert!(harness.view_data.documents.is_empty());
        assert_eq!(harness.state.status_line, None);
    }

    #[test]
    fn second_generation_asks_for_confirmation_first() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.generated = Some(descriptor("one"));
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Char('g'));
        harness.drain();
        harness.key(KeyCode::Esc);
        harness.await_panel_release();
        assert_eq!(harness.runtime.generate_calls, 1);

        harness.key(KeyCode::Char('g'));
        assert!(harness.view_data.generate.confirm_visible);
        assert_eq!(harness.runtime.generate_calls, 1);

        harness.key(KeyCode::Char('n'));
        assert!(!harness.view_data.generate.confirm_visible);
        assert_eq!(harness.runtime.generate_calls, 1);

        harness.key(KeyCode::Char('g'));
        harness.key(KeyCode::Char('y'));
        harness.drain();
        assert_eq!(harness.runtime.generate_calls, 2);
    }

    #[test]
    fn generate_is_disabled_while_in_flight() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.generated = Some(descriptor("one"));
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Char('g'));
        // Completion not drained yet: the action stays armed but refuses.
        harness.key(KeyCode::Char('g'));
        harness.drain();
        assert_eq!(harness.runtime.generate_calls, 1);
    }

    #[test]
    fn panel_esc_starts_timed_overlay_release() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.documents = vec![descriptor("doc1")];
        load_documents_or_disable(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
        );
        harness.state.focus = Focus::Documents;
        harness.key(KeyCode::Enter);

        harness.key(KeyCode::Esc);
        assert_eq!(
            harness.view_data.panel.visibility(),
            PanelVisibility::Closing,
        );

        // The release arrives through the channel after the delay.
        let released = harness
            .rx
            .recv_timeout(std::time::Duration::from_secs(2))
            .expect("release event should arrive");
        assert!(matches!(
            released,
            InternalEvent::ReleasePanelOverlay { .. }
        ));
        if let InternalEvent::ReleasePanelOverlay { token } = released {
            harness.view_data.panel.release_overlay(token);
        }
        assert_eq!(harness.view_data.panel.visibility(), PanelVisibility::Hidden);
    }

    #[test]
    fn panel_tab_keys_switch_between_documents() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.runtime.documents = vec![descriptor("a"), descriptor("b")];
        load_documents_or_disable(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
        );
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Enter);
        harness.key(KeyCode::Esc);
        harness.await_panel_release();
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);
        assert_eq!(harness.view_data.panel.entries().len(), 2);
        assert_eq!(harness.view_data.panel.current_index(), Some(1));

        harness.key(KeyCode::Tab);
        assert_eq!(harness.view_data.panel.current_index(), Some(0));
    }

    #[test]
    fn generate_completion_arrives_via_internal_event() {
        let mut harness = Harness::new(TestRuntime::default());
        let (tx, rx) = mpsc::channel();
        harness.tx = tx;
        harness.rx = rx;
        harness.runtime.generated = Some(descriptor("late"));
        harness.state.focus = Focus::Documents;

        harness.key(KeyCode::Char('g'));
        let event = harness.rx.try_recv().expect("completion should be queued");
        assert!(matches!(
            event,
            InternalEvent::Generate(GenerateEvent::Completed { .. })
        ));
    }

    #[test]
    fn status_line_appears_in_status_text() {
        let mut state = AppState::default();
        state.status_line = Some("tag added: Fever".to_owned());
        let text = status_text(&state);
        assert!(text.contains("tag added: Fever"));
        assert!(text.contains("chief complaint"));
    }
}
