// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use casebook_app::format::{
    EMPTY_DISPLAY, EditControl, FieldControl, display, edit_control, edit_text, humanize,
};
use casebook_app::{
    AppCommand, AppState, Backend, FieldKind, FormMode, ImportOutcome, NoticeLevel,
    TableDescriptor, TableSchema, TableView, ViewEvent, ViewPhase, parse_transcript,
};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const PAGE_ROWS: usize = 10;
const CELL_WIDTH: usize = 24;

/// Collaborators the terminal loop needs from the binary.
pub trait AppRuntime {
    fn backend(&mut self) -> &mut dyn Backend;
    fn import_file(
        &mut self,
        table: &TableDescriptor,
        schema: &TableSchema,
        path: &Path,
    ) -> ImportOutcome;
}

pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Search,
    UploadPath,
    Transcript,
}

impl PromptKind {
    const fn title(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::UploadPath => "import CSV file",
            Self::Transcript => "dictation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PromptState {
    kind: PromptKind,
    buffer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct FormUiState {
    field_index: usize,
    editing: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ViewData {
    views: Vec<Option<TableView>>,
    selected_row: usize,
    form: Option<FormUiState>,
    prompt: Option<PromptState>,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn new(tabs: usize) -> Self {
        Self {
            views: vec![None; tabs],
            ..Self::default()
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(state.tabs.len());
    let (internal_tx, internal_rx) = mpsc::channel();
    ensure_active_view(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

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
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
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

fn active_view<'a>(state: &AppState, view_data: &'a ViewData) -> Option<&'a TableView> {
    view_data
        .views
        .get(state.active_tab)
        .and_then(Option::as_ref)
}

fn active_view_mut<'a>(state: &AppState, view_data: &'a mut ViewData) -> Option<&'a mut TableView> {
    view_data
        .views
        .get_mut(state.active_tab)
        .and_then(Option::as_mut)
}

/// Creates and loads the active tab's view on first visit.
fn ensure_active_view<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if view_data.views.len() < state.tabs.len() {
        view_data.views.resize(state.tabs.len(), None);
    }
    let Some(table) = state.active().cloned() else {
        return;
    };
    let Some(slot) = view_data.views.get_mut(state.active_tab) else {
        return;
    };
    if slot.is_some() {
        return;
    }
    let mut view = TableView::new(table);
    let events = view.load(runtime.backend());
    *slot = Some(view);
    apply_view_events(state, view_data, internal_tx, events);
}

/// Reflects controller events in the status line and keeps UI state in step
/// with the view's phase.
fn apply_view_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    events: Vec<ViewEvent>,
) {
    for event in events {
        match event {
            ViewEvent::Notice(notice) => {
                let message = match notice.level {
                    NoticeLevel::Success => notice.message,
                    NoticeLevel::Error => format!("error: {}", notice.message),
                };
                emit_status(state, view_data, internal_tx, message);
            }
            ViewEvent::RowInserted(index) | ViewEvent::RowReplaced(index) => {
                if let Some(position) = active_view(state, view_data)
                    .and_then(|view| view.visible().iter().position(|row| *row == index))
                {
                    view_data.selected_row = position;
                }
            }
            ViewEvent::Loaded { .. } | ViewEvent::SearchChanged { .. } => {
                view_data.selected_row = 0;
            }
            ViewEvent::PhaseChanged(_)
            | ViewEvent::LoadDiscarded
            | ViewEvent::RowRemoved(_)
            | ViewEvent::ReloadRequested => {}
        }
    }
    sync_ui_with_phase(state, view_data);
}

fn sync_ui_with_phase(state: &AppState, view_data: &mut ViewData) {
    let (phase, visible) = match active_view(state, view_data) {
        Some(view) => (view.phase().clone(), view.visible().len()),
        None => (ViewPhase::Loading, 0),
    };

    match phase {
        ViewPhase::Form(_) => {
            if view_data.form.is_none() {
                view_data.form = Some(FormUiState::default());
            }
        }
        _ => view_data.form = None,
    }

    let wanted = match phase {
        ViewPhase::Uploading => Some(PromptKind::UploadPath),
        ViewPhase::Dictating => Some(PromptKind::Transcript),
        _ => None,
    };
    let current = view_data.prompt.as_ref().map(|prompt| prompt.kind);
    match (wanted, current) {
        (Some(kind), current) if current != Some(kind) => {
            view_data.prompt = Some(PromptState {
                kind,
                buffer: String::new(),
            });
        }
        (None, Some(PromptKind::UploadPath | PromptKind::Transcript)) => {
            view_data.prompt = None;
        }
        _ => {}
    }

    if visible == 0 {
        view_data.selected_row = 0;
    } else if view_data.selected_row >= visible {
        view_data.selected_row = visible - 1;
    }
}

fn selected_cache_index(state: &AppState, view_data: &ViewData) -> Option<usize> {
    active_view(state, view_data)
        .and_then(|view| view.visible().get(view_data.selected_row).copied())
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q') {
        state.dispatch(AppCommand::Quit);
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.prompt.is_some() {
        handle_prompt_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    let phase = active_view(state, view_data).map(|view| view.phase().clone());
    match phase {
        Some(ViewPhase::Form(_)) => {
            handle_form_key(state, runtime, view_data, internal_tx, key);
            false
        }
        Some(ViewPhase::ConfirmDelete(_)) => {
            handle_confirm_key(state, runtime, view_data, internal_tx, key);
            false
        }
        _ => handle_nav_key(state, runtime, view_data, internal_tx, key),
    }
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let visible = active_view(state, view_data).map_or(0, |view| view.visible().len());
    let events = match key.code {
        KeyCode::Char('q') => {
            state.dispatch(AppCommand::Quit);
            return true;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            let command = if key.code == KeyCode::Tab {
                AppCommand::NextTab
            } else {
                AppCommand::PrevTab
            };
            if !state.dispatch(command).is_empty() {
                view_data.selected_row = 0;
                view_data.form = None;
                ensure_active_view(state, runtime, view_data, internal_tx);
                sync_ui_with_phase(state, view_data);
            }
            return false;
        }
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.selected_row = (view_data.selected_row + 1).min(visible.saturating_sub(1));
            return false;
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.selected_row = view_data.selected_row.saturating_sub(1);
            return false;
        }
        KeyCode::PageDown => {
            view_data.selected_row =
                (view_data.selected_row + PAGE_ROWS).min(visible.saturating_sub(1));
            return false;
        }
        KeyCode::PageUp => {
            view_data.selected_row = view_data.selected_row.saturating_sub(PAGE_ROWS);
            return false;
        }
        KeyCode::Char('g') | KeyCode::Home => {
            view_data.selected_row = 0;
            return false;
        }
        KeyCode::Char('G') | KeyCode::End => {
            view_data.selected_row = visible.saturating_sub(1);
            return false;
        }
        KeyCode::Char('/') => {
            let buffer = active_view(state, view_data)
                .map(|view| view.search_term().to_owned())
                .unwrap_or_default();
            view_data.prompt = Some(PromptState {
                kind: PromptKind::Search,
                buffer,
            });
            return false;
        }
        KeyCode::Char('r') => match active_view_mut(state, view_data) {
            Some(view) => view.load(runtime.backend()),
            None => Vec::new(),
        },
        KeyCode::Esc => match active_view_mut(state, view_data) {
            Some(view) if !view.search_term().is_empty() => view.set_search(""),
            _ => Vec::new(),
        },
        KeyCode::Char('a') => active_view_mut(state, view_data)
            .map(TableView::open_create)
            .unwrap_or_default(),
        KeyCode::Char('e') | KeyCode::Enter => {
            let selected = selected_cache_index(state, view_data);
            match (selected, active_view_mut(state, view_data)) {
                (Some(row), Some(view)) => view.open_edit(row),
                _ => Vec::new(),
            }
        }
        KeyCode::Char('d') => {
            let selected = selected_cache_index(state, view_data);
            match (selected, active_view_mut(state, view_data)) {
                (Some(row), Some(view)) => view.request_delete(row),
                _ => Vec::new(),
            }
        }
        KeyCode::Char('u') => active_view_mut(state, view_data)
            .map(TableView::begin_upload)
            .unwrap_or_default(),
        KeyCode::Char('v') => active_view_mut(state, view_data)
            .map(TableView::begin_dictation)
            .unwrap_or_default(),
        _ => return false,
    };
    apply_view_events(state, view_data, internal_tx, events);
    false
}

fn handle_prompt_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(prompt) = view_data.prompt.as_mut() else {
        return;
    };
    let kind = prompt.kind;

    match key.code {
        KeyCode::Char(ch) => prompt.buffer.push(ch),
        KeyCode::Backspace => {
            prompt.buffer.pop();
        }
        KeyCode::Esc => {
            view_data.prompt = None;
            let events = match (kind, active_view_mut(state, view_data)) {
                (PromptKind::Search, Some(view)) => view.set_search(""),
                (PromptKind::UploadPath, Some(view)) => {
                    view.finish_upload(runtime.backend(), ImportOutcome::Cancelled)
                }
                (PromptKind::Transcript, Some(view)) => view.cancel(),
                (_, None) => Vec::new(),
            };
            apply_view_events(state, view_data, internal_tx, events);
            return;
        }
        KeyCode::Enter => {
            let buffer = prompt.buffer.clone();
            submit_prompt(state, runtime, view_data, internal_tx, kind, &buffer);
            return;
        }
        _ => return,
    }

    if kind == PromptKind::Search {
        let buffer = prompt.buffer.clone();
        if let Some(view) = active_view_mut(state, view_data) {
            let events = view.set_search(&buffer);
            apply_view_events(state, view_data, internal_tx, events);
        }
    }
}

fn submit_prompt<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: PromptKind,
    buffer: &str,
) {
    match kind {
        PromptKind::Search => view_data.prompt = None,
        PromptKind::UploadPath => {
            let path = buffer.trim();
            if path.is_empty() {
                emit_status(state, view_data, internal_tx, "enter a CSV path or esc to cancel");
                return;
            }
            let Some(view) = active_view(state, view_data) else {
                return;
            };
            let table = view.table().clone();
            let Some(schema) = view.schema().cloned() else {
                return;
            };
            let outcome = runtime.import_file(&table, &schema, Path::new(path));
            if let Some(view) = active_view_mut(state, view_data) {
                let events = view.finish_upload(runtime.backend(), outcome);
                apply_view_events(state, view_data, internal_tx, events);
            }
        }
        PromptKind::Transcript => {
            let Some(schema) = active_view(state, view_data).and_then(|view| view.schema().cloned())
            else {
                return;
            };
            let dictation = parse_transcript(buffer, &schema);
            if dictation.fields.is_empty() {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "no fields recognized -- say `field is value`, separated by commas",
                );
                return;
            }
            if !dictation.unmatched.is_empty() {
                tracing::info!(unmatched = ?dictation.unmatched, "dictation had unknown fields");
            }
            if let Some(view) = active_view_mut(state, view_data) {
                let events = view.finish_dictation(runtime.backend(), &dictation.fields);
                apply_view_events(state, view_data, internal_tx, events);
            }
            if !dictation.unmatched.is_empty()
                && active_view(state, view_data)
                    .is_some_and(|view| view.phase() == &ViewPhase::Ready)
            {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("record added; ignored: {}", dictation.unmatched.join(", ")),
                );
            }
        }
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field_count = active_view(state, view_data)
        .and_then(TableView::schema)
        .map_or(0, TableSchema::len);
    let Some(form) = view_data.form.as_mut() else {
        return;
    };

    if let Some(buffer) = form.editing.as_mut() {
        match key.code {
            KeyCode::Char(ch) => buffer.push(ch),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Esc => form.editing = None,
            KeyCode::Enter => commit_form_field(state, view_data, internal_tx),
            _ => {}
        }
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
        if let Some(view) = active_view_mut(state, view_data) {
            let events = view.submit(runtime.backend());
            apply_view_events(state, view_data, internal_tx, events);
        }
        return;
    }

    match key.code {
        KeyCode::Down | KeyCode::Tab | KeyCode::Char('j') => {
            form.field_index = (form.field_index + 1).min(field_count.saturating_sub(1));
        }
        KeyCode::Up | KeyCode::BackTab | KeyCode::Char('k') => {
            form.field_index = form.field_index.saturating_sub(1);
        }
        KeyCode::Enter | KeyCode::Char('i') => {
            let index = form.field_index;
            let text = active_view(state, view_data).and_then(|view| {
                let column = view.schema()?.columns().get(index)?;
                let value = view.draft()?.get(&column.name);
                Some(edit_text(column.kind, value))
            });
            if let Some(form) = view_data.form.as_mut() {
                form.editing = Some(text.unwrap_or_default());
            }
        }
        KeyCode::Esc => {
            if let Some(view) = active_view_mut(state, view_data) {
                let events = view.cancel();
                apply_view_events(state, view_data, internal_tx, events);
            }
        }
        _ => {}
    }
}

fn commit_form_field(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.clone() else {
        return;
    };
    let Some(raw) = form.editing else {
        return;
    };
    let Some((column, kind)) = active_view(state, view_data)
        .and_then(TableView::schema)
        .and_then(|schema| schema.columns().get(form.field_index))
        .map(|column| (column.name.clone(), column.kind))
    else {
        return;
    };

    // A blank password entry keeps whatever is stored.
    if kind == FieldKind::Password && raw.trim().is_empty() {
        if let Some(form) = view_data.form.as_mut() {
            form.editing = None;
        }
        return;
    }

    let result = active_view_mut(state, view_data)
        .map(|view| view.edit_field(&column, &raw))
        .unwrap_or(Ok(()));
    match result {
        Ok(()) => {
            if let Some(form) = view_data.form.as_mut() {
                form.editing = None;
            }
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(view) = active_view_mut(state, view_data) else {
        return;
    };
    let events = match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => view.confirm_delete(runtime.backend()),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => view.cancel(),
        _ => return,
    };
    apply_view_events(state, view_data, internal_tx, events);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let tab_titles = state
        .tabs
        .iter()
        .map(TableDescriptor::label)
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("casebook").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(state.active_tab);
    frame.render_widget(tabs, layout[0]);

    render_body(frame, layout[1], state, view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    let view = active_view(state, view_data);
    if let (Some(view), Some(form)) = (view, view_data.form.as_ref()) {
        let area = centered_rect(70, 80, frame.area());
        frame.render_widget(Clear, area);
        let title = match view.phase() {
            ViewPhase::Form(mode) => mode.label(),
            _ => "record",
        };
        let body = Paragraph::new(form_lines(view, form).join("\n"))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if let Some(ViewPhase::ConfirmDelete(id)) = view.map(TableView::phase) {
        let area = centered_rect(40, 20, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(format!("delete record {id}?\n\ny confirm | n cancel"))
            .block(Block::default().title("delete").borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if let Some(prompt) = view_data
        .prompt
        .as_ref()
        .filter(|prompt| prompt.kind != PromptKind::Search)
    {
        let area = centered_rect(70, 30, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(prompt_text(prompt))
            .block(Block::default().title(prompt.kind.title()).borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if view_data.help_visible {
        let area = centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_body(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let title = state.active().map(TableDescriptor::label).unwrap_or_default();
    let Some(view) = active_view(state, view_data) else {
        let empty = Paragraph::new("loading")
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(empty, area);
        return;
    };

    match view.phase() {
        ViewPhase::Loading => {
            let body = Paragraph::new("loading")
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, area);
        }
        ViewPhase::Error(message) => {
            let body = Paragraph::new(format!("{message}\n\nr retry | tab switch table | q quit"))
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, area);
        }
        _ => render_table(frame, area, view, view_data),
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    view: &TableView,
    view_data: &ViewData,
) {
    let (headers, rows) = table_cells(view);
    let widths = vec![Constraint::Min(8); headers.len().max(1)];

    let header = Row::new(headers.into_iter().map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = rows.into_iter().enumerate().map(|(index, cells)| {
        let style = if index == view_data.selected_row {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(cells.into_iter().map(Cell::from)).style(style)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(view))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

/// Header labels and display text for the visible rows.
fn table_cells(view: &TableView) -> (Vec<String>, Vec<Vec<String>>) {
    let Some(schema) = view.schema() else {
        return (Vec::new(), Vec::new());
    };
    let headers = schema
        .columns()
        .iter()
        .map(|column| humanize(&column.name))
        .collect();
    let rows = view
        .visible_rows()
        .map(|(_, record)| {
            schema
                .columns()
                .iter()
                .map(|column| {
                    truncate_label(&display(column.kind, record.get(&column.name)), CELL_WIDTH)
                })
                .collect()
        })
        .collect();
    (headers, rows)
}

fn table_title(view: &TableView) -> String {
    let label = view.table().label();
    let shown = view.visible().len();
    let total = view.rows().len();
    if view.search_term().trim().is_empty() {
        format!("{label} ({total})")
    } else {
        format!("{label} ({shown}/{total} matching {:?})", view.search_term())
    }
}

fn form_lines(view: &TableView, form: &FormUiState) -> Vec<String> {
    let (Some(schema), Some(draft)) = (view.schema(), view.draft()) else {
        return Vec::new();
    };
    let locked_id = draft.mode() == FormMode::Edit;

    let mut lines = Vec::with_capacity(schema.len() + 3);
    let mut focused_hint = None;
    for (index, column) in schema.columns().iter().enumerate() {
        let control = edit_control(column);
        let focused = index == form.field_index;
        let marker = if focused { ">" } else { " " };
        if focused {
            focused_hint = field_hint(&control);
        }
        let value = match (&form.editing, focused) {
            (Some(buffer), true) if control.control == EditControl::Masked => {
                format!("{}_", "•".repeat(buffer.chars().count()))
            }
            (Some(buffer), true) => format!("{buffer}_"),
            _ => {
                let shown = display(column.kind, draft.get(&column.name));
                if shown == EMPTY_DISPLAY {
                    format!("({})", control.placeholder)
                } else {
                    shown
                }
            }
        };
        let lock = if locked_id && column.name == schema.id_column() {
            " [locked]"
        } else {
            ""
        };
        lines.push(format!("{marker} {}: {value}{lock}", control.label));
    }
    lines.push(String::new());
    if let Some(hint) = focused_hint {
        lines.push(hint);
    }
    lines.push("enter edit field | ctrl+s save | esc cancel".to_owned());
    lines
}

/// Accepted input for the focused field, when it is constrained.
fn field_hint(control: &FieldControl) -> Option<String> {
    match control.control {
        EditControl::Select(options) => Some(format!("choose: {}", options.join(" | "))),
        EditControl::TriState => Some("choose: yes | no | empty".to_owned()),
        EditControl::MultiSelect(days) => Some(format!(
            "days, comma-separated: {}",
            days.iter()
                .map(|(code, name)| format!("{code} {name}"))
                .collect::<Vec<_>>()
                .join(", ")
        )),
        EditControl::DatePicker => Some("format: yyyy-MM-dd".to_owned()),
        EditControl::CommaList => Some("comma-separated values".to_owned()),
        EditControl::Number => Some("digits only".to_owned()),
        EditControl::Masked => Some("hidden; leave empty to keep the current value".to_owned()),
        EditControl::MultiLine | EditControl::Email | EditControl::Text => None,
    }
}

fn prompt_text(prompt: &PromptState) -> String {
    let hint = match prompt.kind {
        PromptKind::Search => "type to filter | enter keep | esc clear",
        PromptKind::UploadPath => "path to a CSV file with a header row | enter import | esc cancel",
        PromptKind::Transcript => "e.g. name is Asha, dob is 2010-04-01 | enter create | esc cancel",
    };
    format!("{}_\n\n{hint}", prompt.buffer)
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(prompt) = view_data
        .prompt
        .as_ref()
        .filter(|prompt| prompt.kind == PromptKind::Search)
    {
        return format!("/{}_", prompt.buffer);
    }

    let phase = active_view(state, view_data).map_or("loading", |view| view.phase().label());
    let default = match active_view(state, view_data).map(TableView::phase) {
        Some(ViewPhase::Form(_)) => "j/k field | enter edit | ctrl+s save | esc cancel",
        Some(ViewPhase::ConfirmDelete(_)) => "y delete | n cancel",
        Some(ViewPhase::Uploading | ViewPhase::Dictating) => "enter submit | esc cancel",
        _ => "j/k move | / search | a add | e edit | d delete | u import | v dictate | r reload | tab table | ? help | q quit",
    };
    match &state.status_line {
        Some(status) => format!("{phase} | {status} | {default}"),
        None => format!("{phase} | {default}"),
    }
}

fn help_overlay_text() -> &'static str {
    "tab / shift+tab   switch table\n\
     j/k, up/down      move selection\n\
     g/G, pgup/pgdn    jump\n\
     /                 search (esc clears)\n\
     a                 add record\n\
     e, enter          edit record\n\
     d                 delete record\n\
     u                 import CSV\n\
     v                 dictate a new record\n\
     r                 reload from server\n\
     ctrl+s            save form\n\
     q, ctrl+q         quit"
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut truncated = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    truncated.push('…');
    truncated
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
