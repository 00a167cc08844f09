// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use chatdesk_app::{
    ACTIVE_SLOT, Bounds, Conversation, ConversationStore, DEFAULT_DROPDOWN_GAP, Locale, Localizer,
    Point, PointerHub, ProjectAssigner, ProjectSelector, ProjectsResponse, SelectorEvent,
    SelectorOption, SelectorView,
};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

const TRIGGER_LABEL_MAX_CHARS: usize = 16;
const DROPDOWN_MIN_WIDTH: u16 = 20;
const TRIGGER_CARET: &str = "▾";
const SELECTED_MARK: &str = "●";
const CLEAR_MARK: &str = "✕";
const DIVIDER: &str = "─";
const UNSAVED_TITLE: &str = "New conversation";
const KEY_HINTS: &str = "p projects · [ ] switch · n new · q quit";

pub trait AppRuntime {
    fn load_conversations(&mut self) -> Result<Vec<Conversation>>;
    fn load_projects(&mut self) -> Result<ProjectsResponse>;
    /// Starts loading the project list and reports through `tx`. The default
    /// loads inline; runtimes backed by slow storage should override it.
    fn spawn_project_load(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        let event = match self.load_projects() {
            Ok(projects) => InternalEvent::ProjectsLoaded(projects),
            Err(error) => InternalEvent::ProjectsFailed(format!("{error:#}")),
        };
        tx.send(event)
            .map_err(|_| anyhow::anyhow!("project event channel closed"))?;
        Ok(())
    }
    fn assigner(&mut self) -> Box<dyn ProjectAssigner>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    ProjectsLoaded(ProjectsResponse),
    ProjectsFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppOptions {
    pub locale: Locale,
    pub dropdown_gap: u16,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            dropdown_gap: DEFAULT_DROPDOWN_GAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropdownRow {
    Option(usize),
    Divider,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    /// `None` until the project list arrives.
    projects: Option<ProjectsResponse>,
    conversations: Vec<Conversation>,
    /// Index into `conversations`; `None` while an unsaved conversation is active.
    cursor: Option<usize>,
    highlight: usize,
    status: Option<String>,
    status_token: u64,
}

struct Session<A> {
    pointer: PointerHub,
    selector: ProjectSelector<A>,
    localizer: Localizer,
}

impl<A: ProjectAssigner> Session<A> {
    fn new(assigner: A, options: AppOptions) -> Self {
        let pointer = PointerHub::new();
        let conversations = ConversationStore::new();
        let selector = ProjectSelector::mount(&pointer, conversations.slot(ACTIVE_SLOT), assigner)
            .with_gap(options.dropdown_gap);
        Self {
            pointer,
            selector,
            localizer: Localizer::new(options.locale),
        }
    }

    fn view(&self, view_data: &ViewData) -> SelectorView {
        self.selector
            .view(view_data.projects.as_ref(), &self.localizer)
    }
}

pub fn run_app<R: AppRuntime>(runtime: &mut R, options: AppOptions) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (internal_tx, internal_rx) = mpsc::channel();
    let (session, mut view_data) = start_session(runtime, options, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(&session, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, &session, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(&session, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(Event::Mouse(mouse)) => {
                    handle_mouse_event(&session, &mut view_data, &internal_tx, mouse);
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        DisableMouseCapture,
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    result
}

fn start_session<R: AppRuntime>(
    runtime: &mut R,
    options: AppOptions,
    internal_tx: &Sender<InternalEvent>,
) -> (Session<Box<dyn ProjectAssigner>>, ViewData) {
    let session = Session::new(runtime.assigner(), options);
    let mut view_data = ViewData::default();

    match runtime.load_conversations() {
        Ok(conversations) => {
            tracing::info!(count = conversations.len(), "loaded conversations");
            view_data.conversations = conversations;
        }
        Err(error) => {
            tracing::warn!(error = %error, "load conversations failed");
            emit_status(
                &mut view_data,
                internal_tx,
                format!("load failed: {error}"),
            );
        }
    }
    let first = (!view_data.conversations.is_empty()).then_some(0);
    activate_conversation(&session, &mut view_data, first);

    if let Err(error) = runtime.spawn_project_load(internal_tx.clone()) {
        tracing::warn!(error = %error, "start project load failed");
        emit_status(
            &mut view_data,
            internal_tx,
            format!("project list unavailable: {error}"),
        );
    }
    (session, view_data)
}

fn process_internal_events<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::ProjectsLoaded(projects) => {
                tracing::debug!(count = projects.projects.len(), "projects loaded");
                view_data.projects = Some(projects);
                let last = session.view(view_data).options.len().saturating_sub(1);
                view_data.highlight = view_data.highlight.min(last);
            }
            InternalEvent::ProjectsFailed(error) => {
                tracing::warn!(error = %error, "project load failed");
                emit_status(
                    view_data,
                    tx,
                    format!("project list unavailable: {error}; only General is offered"),
                );
            }
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
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    if session.selector.is_open() {
        handle_dropdown_key(session, view_data, internal_tx, key);
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('p') => {
            session.selector.open();
            sync_highlight(session, view_data);
        }
        KeyCode::Char(']') => cycle_conversation(session, view_data, internal_tx, 1),
        KeyCode::Char('[') => cycle_conversation(session, view_data, internal_tx, -1),
        KeyCode::Char('n') => {
            stash_active_conversation(session, view_data);
            activate_conversation(session, view_data, None);
        }
        _ => {}
    }
    false
}

fn handle_dropdown_key<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let view = session.view(view_data);
    match key.code {
        KeyCode::Esc | KeyCode::Char('p') => {
            session.selector.close();
        }
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.highlight = view_data.highlight.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let last = view.options.len().saturating_sub(1);
            view_data.highlight = view_data.highlight.saturating_add(1).min(last);
        }
        KeyCode::Enter => {
            if let Some(option) = view.options.get(view_data.highlight) {
                select_option(session, view_data, internal_tx, option);
            }
        }
        _ => {}
    }
}

fn handle_mouse_event<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
) {
    let MouseEventKind::Down(button) = mouse.kind else {
        return;
    };

    // Any button dismisses; only the left one activates.
    let point = Point::new(mouse.column, mouse.row);
    session.pointer.pointer_down(point);
    if button != MouseButton::Left {
        return;
    }

    if session
        .selector
        .trigger_bounds()
        .is_some_and(|bounds| bounds.contains(point))
    {
        session.selector.toggle();
        if session.selector.is_open() {
            sync_highlight(session, view_data);
        }
        return;
    }

    if !session.selector.is_open() {
        return;
    }
    let Some(dropdown) = session.selector.dropdown_bounds() else {
        return;
    };
    if !dropdown.contains(point) {
        return;
    }

    let view = session.view(view_data);
    let Some(row) = point.y.checked_sub(dropdown.top().saturating_add(1)) else {
        return;
    };
    if let Some(DropdownRow::Option(index)) = dropdown_rows(&view).get(usize::from(row)).copied()
        && let Some(option) = view.options.get(index)
    {
        view_data.highlight = index;
        select_option(session, view_data, internal_tx, option);
    }
}

fn select_option<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    option: &SelectorOption,
) {
    let events = session.selector.select(option.target.clone());
    tracing::debug!(?events, "project selected");

    let requested = events
        .iter()
        .any(|event| matches!(event, SelectorEvent::AssignmentRequested(_)));
    let changed = events
        .iter()
        .any(|event| matches!(event, SelectorEvent::ProjectChanged(_)));
    let message = if requested {
        format!("moved to {}", option.label)
    } else if changed {
        format!("{} applied; it is saved with the first message", option.label)
    } else {
        "no active conversation".to_owned()
    };
    emit_status(view_data, internal_tx, message);
}

fn sync_highlight<A: ProjectAssigner>(session: &Session<A>, view_data: &mut ViewData) {
    view_data.highlight = session
        .view(view_data)
        .options
        .iter()
        .position(|option| option.selected)
        .unwrap_or(0);
}

fn stash_active_conversation<A: ProjectAssigner>(session: &Session<A>, view_data: &mut ViewData) {
    if let Some(index) = view_data.cursor
        && let Some(current) = session.selector.slot().get()
        && let Some(entry) = view_data.conversations.get_mut(index)
    {
        *entry = current;
    }
}

fn activate_conversation<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    cursor: Option<usize>,
) {
    let cursor = cursor.filter(|index| *index < view_data.conversations.len());
    let conversation = cursor
        .and_then(|index| view_data.conversations.get(index).cloned())
        .unwrap_or_else(|| Conversation::unsaved(UNSAVED_TITLE, OffsetDateTime::now_utc()));
    view_data.cursor = cursor;
    session.selector.slot().set(Some(conversation));
}

fn cycle_conversation<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    if view_data.conversations.is_empty() {
        emit_status(view_data, internal_tx, "no stored conversations yet");
        return;
    }

    stash_active_conversation(session, view_data);
    let len = view_data.conversations.len() as isize;
    let next = match view_data.cursor {
        Some(index) => (index as isize + delta).rem_euclid(len),
        None if delta > 0 => 0,
        None => len - 1,
    };
    activate_conversation(session, view_data, Some(next as usize));
}

fn dropdown_rows(view: &SelectorView) -> Vec<DropdownRow> {
    let mut rows = Vec::with_capacity(view.options.len() + 1);
    for index in 0..view.options.len() {
        rows.push(DropdownRow::Option(index));
        if index == 0 && view.has_projects {
            rows.push(DropdownRow::Divider);
        }
    }
    rows
}

fn render<A: ProjectAssigner>(
    frame: &mut ratatui::Frame<'_>,
    session: &Session<A>,
    view_data: &ViewData,
) {
    let view = session.view(view_data);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let trigger = trigger_text(&view);
    let trigger_width = trigger
        .chars()
        .count()
        .max(view.accessible_label.chars().count())
        .saturating_add(4);
    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(u16::try_from(trigger_width).unwrap_or(u16::MAX)),
            Constraint::Min(0),
        ])
        .split(layout[0]);

    let trigger_style = if session.selector.is_open() {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let trigger_widget = Paragraph::new(trigger).style(trigger_style).block(
        Block::default()
            .title(view.accessible_label.clone())
            .borders(Borders::ALL),
    );
    frame.render_widget(trigger_widget, header[0]);
    session.selector.mount_trigger(Some(bounds_of(header[0])));

    let active_title = session
        .selector
        .slot()
        .get()
        .map(|conversation| conversation.title)
        .unwrap_or_default();
    let title = Paragraph::new(active_title)
        .block(Block::default().title("chatdesk").borders(Borders::ALL));
    frame.render_widget(title, header[1]);

    let body = Paragraph::new(render_conversation_text(session, view_data, &view))
        .block(Block::default().borders(Borders::ALL).title("conversations"));
    frame.render_widget(body, layout[1]);

    let status = Paragraph::new(status_text(view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if session.selector.is_open() {
        let position = session.selector.dropdown_position();
        let area = dropdown_area(&view, position.left, position.top, frame.area());
        frame.render_widget(Clear, area);
        let lines = render_dropdown_lines(&view, view_data.highlight, area.width.saturating_sub(2));
        let dropdown = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(dropdown, area);
        session.selector.mount_dropdown(Some(bounds_of(area)));
    } else {
        session.selector.mount_dropdown(None);
    }
}

fn trigger_text(view: &SelectorView) -> String {
    format!(
        "{} {TRIGGER_CARET}",
        truncate_label(&view.trigger_label, TRIGGER_LABEL_MAX_CHARS)
    )
}

fn option_text(option: &SelectorOption) -> String {
    let mark = if option.selected { SELECTED_MARK } else { " " };
    if option.clearable {
        format!("{mark} {} {CLEAR_MARK}", option.label)
    } else {
        format!("{mark} {}", option.label)
    }
}

fn dropdown_area(view: &SelectorView, left: u16, top: u16, screen: Rect) -> Rect {
    let widest = view
        .options
        .iter()
        .map(|option| option_text(option).chars().count())
        .max()
        .unwrap_or(0)
        .saturating_add(2);
    let width = u16::try_from(widest)
        .unwrap_or(u16::MAX)
        .max(DROPDOWN_MIN_WIDTH);
    let height = u16::try_from(dropdown_rows(view).len().saturating_add(2)).unwrap_or(u16::MAX);
    Rect::new(left, top, width, height).intersection(screen)
}

fn render_dropdown_lines(view: &SelectorView, highlight: usize, inner_width: u16) -> Vec<Line<'static>> {
    dropdown_rows(view)
        .into_iter()
        .filter_map(|row| match row {
            DropdownRow::Divider => Some(Line::styled(
                DIVIDER.repeat(usize::from(inner_width)),
                Style::default().fg(Color::DarkGray),
            )),
            DropdownRow::Option(index) => view.options.get(index).map(|option| {
                let mut style = Style::default().fg(Color::White);
                if option.selected {
                    style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
                }
                if index == highlight {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Line::styled(option_text(option), style)
            }),
        })
        .collect()
}

fn render_conversation_text<A: ProjectAssigner>(
    session: &Session<A>,
    view_data: &ViewData,
    view: &SelectorView,
) -> String {
    let mut lines = Vec::new();
    match session.selector.slot().get() {
        Some(conversation) => {
            let id = if conversation.is_new() {
                "(unsaved)".to_owned()
            } else {
                conversation
                    .conversation_id
                    .map(|id| id.to_string())
                    .unwrap_or_default()
            };
            lines.push(format!("title: {}", conversation.title));
            lines.push(format!("id: {id}"));
            lines.push(format!("project: {}", view.trigger_label));
        }
        None => lines.push("no conversation".to_owned()),
    }

    if view_data.projects.is_none() {
        lines.push("loading projects…".to_owned());
    }

    if !view_data.conversations.is_empty() {
        lines.push(String::new());
        for (index, conversation) in view_data.conversations.iter().enumerate() {
            let marker = if view_data.cursor == Some(index) { "▸" } else { " " };
            lines.push(format!("{marker} {}", conversation.title));
        }
    }
    lines.join("\n")
}

fn status_text(view_data: &ViewData) -> String {
    view_data
        .status
        .clone()
        .unwrap_or_else(|| KEY_HINTS.to_owned())
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

fn bounds_of(area: Rect) -> Bounds {
    Bounds::new(area.x, area.y, area.width, area.height)
}

#[cfg(test)]
mod tests {
    use super::{
        AppOptions, AppRuntime, DropdownRow, InternalEvent, Session, ViewData, dropdown_rows,
        handle_key_event, handle_mouse_event, process_internal_events, render, start_session,
        trigger_text, truncate_label,
    };
    use anyhow::{Result, anyhow};
    use chatdesk_app::{
        AssignProject, Bounds, Conversation, ConversationId, Locale, ProjectAssigner, ProjectId,
        ProjectsResponse,
    };
    use chatdesk_testkit::{RecordingAssigner, conversation, project};
    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::rc::Rc;
    use std::sync::mpsc::{self, Receiver, Sender};

    struct TestRuntime {
        conversations: Vec<Conversation>,
        projects: Option<ProjectsResponse>,
        recorder: Rc<RecordingAssigner>,
    }

    impl TestRuntime {
        fn new(conversations: Vec<Conversation>) -> Self {
            Self {
                conversations,
                projects: Some(ProjectsResponse::new(vec![
                    project("p1", "Research"),
                    project("p2", "Personal"),
                    project("p3", "Work"),
                ])),
                recorder: Rc::new(RecordingAssigner::new()),
            }
        }

        fn without_projects(mut self) -> Self {
            self.projects = Some(ProjectsResponse::default());
            self
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_conversations(&mut self) -> Result<Vec<Conversation>> {
            Ok(self.conversations.clone())
        }

        fn load_projects(&mut self) -> Result<ProjectsResponse> {
            self.projects
                .clone()
                .ok_or_else(|| anyhow!("projects table is locked"))
        }

        fn assigner(&mut self) -> Box<dyn ProjectAssigner> {
            Box::new(Rc::clone(&self.recorder))
        }
    }

    struct Harness {
        session: Session<Box<dyn ProjectAssigner>>,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn start(runtime: &mut TestRuntime, options: AppOptions) -> Self {
            let (tx, rx) = mpsc::channel();
            let (session, view_data) = start_session(runtime, options, &tx);
            let mut harness = Self {
                session,
                view_data,
                tx,
                rx,
            };
            harness.pump();
            harness
        }

        fn terminal_gap() -> AppOptions {
            AppOptions {
                locale: Locale::En,
                dropdown_gap: 1,
            }
        }

        fn pump(&mut self) {
            process_internal_events(&self.session, &mut self.view_data, &self.tx, &self.rx);
        }

        fn key(&mut self, code: KeyCode) -> bool {
            handle_key_event(
                &self.session,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, KeyModifiers::NONE),
            )
        }

        fn click(&mut self, column: u16, row: u16) {
            self.press(MouseButton::Left, column, row);
        }

        fn press(&mut self, button: MouseButton, column: u16, row: u16) {
            handle_mouse_event(
                &self.session,
                &mut self.view_data,
                &self.tx,
                MouseEvent {
                    kind: MouseEventKind::Down(button),
                    column,
                    row,
                    modifiers: KeyModifiers::NONE,
                },
            );
        }

        fn draw(&self) -> Result<Vec<String>> {
            let mut terminal = Terminal::new(TestBackend::new(60, 20))?;
            terminal.draw(|frame| render(frame, &self.session, &self.view_data))?;
            let buffer = terminal.backend().buffer();
            let mut rows = Vec::with_capacity(usize::from(buffer.area.height));
            for y in 0..buffer.area.height {
                let mut row = String::new();
                for x in 0..buffer.area.width {
                    row.push_str(buffer[(x, y)].symbol());
                }
                rows.push(row);
            }
            Ok(rows)
        }

        fn active(&self) -> Conversation {
            self.session
                .selector
                .slot()
                .get()
                .expect("active conversation")
        }
    }

    fn stored(id: &str, project_id: Option<&str>) -> Conversation {
        let mut conversation = conversation(Some(id), project_id);
        conversation.title = format!("Conversation {id}");
        conversation
    }

    #[test]
    fn closed_selector_renders_trigger_with_current_project() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", Some("p2"))]);
        let harness = Harness::start(&mut runtime, Harness::terminal_gap());

        let rows = harness.draw()?;
        assert!(rows[1].contains("Personal ▾"), "{rows:#?}");
        assert!(rows[0].contains("Assign to project"), "{rows:#?}");
        assert!(rows.iter().any(|row| row.contains("project: Personal")));

        let trigger = harness
            .session
            .selector
            .trigger_bounds()
            .expect("trigger mounted");
        assert_eq!((trigger.x, trigger.y, trigger.height), (0, 0, 3));
        assert_eq!(harness.session.selector.dropdown_bounds(), None);
        Ok(())
    }

    #[test]
    fn open_dropdown_lists_general_then_divider_then_projects() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;
        harness.key(KeyCode::Char('p'));

        let rows = harness.draw()?;
        let dropdown = harness
            .session
            .selector
            .dropdown_bounds()
            .expect("dropdown mounted");
        assert_eq!((dropdown.x, dropdown.y), (0, 4));
        assert_eq!(dropdown.height, 7);
        assert!(dropdown.width >= 20);

        assert!(rows[5].contains("● General"), "{rows:#?}");
        assert!(rows[6].contains("───"), "{rows:#?}");
        assert!(rows[7].contains("Research"), "{rows:#?}");
        assert!(rows[8].contains("Personal"), "{rows:#?}");
        assert!(rows[9].contains("Work"), "{rows:#?}");
        Ok(())
    }

    #[test]
    fn dropdown_without_projects_has_no_divider() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]).without_projects();
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;
        harness.key(KeyCode::Char('p'));

        let rows = harness.draw()?;
        let dropdown = harness
            .session
            .selector
            .dropdown_bounds()
            .expect("dropdown mounted");
        assert_eq!(dropdown.height, 3);
        assert!(rows[5].contains("General"), "{rows:#?}");
        assert!(rows[6].contains('└'), "{rows:#?}");

        let view = harness.session.view(&harness.view_data);
        assert_eq!(dropdown_rows(&view), vec![DropdownRow::Option(0)]);
        Ok(())
    }

    #[test]
    fn clicking_an_option_assigns_and_closes() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let recorder = Rc::clone(&runtime.recorder);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;

        harness.click(1, 1);
        assert!(harness.session.selector.is_open());
        harness.draw()?;

        harness.click(3, 7);
        assert!(!harness.session.selector.is_open());
        assert_eq!(harness.active().project_id, Some(ProjectId::new("p1")));
        assert_eq!(
            recorder.requests(),
            vec![AssignProject {
                conversation_id: ConversationId::new("c1"),
                project_id: Some(ProjectId::new("p1")),
            }]
        );
        assert_eq!(
            harness.view_data.status.as_deref(),
            Some("moved to Research")
        );
        Ok(())
    }

    #[test]
    fn clicking_the_divider_does_nothing() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let recorder = Rc::clone(&runtime.recorder);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;
        harness.click(1, 1);
        harness.draw()?;

        harness.click(3, 6);
        assert!(harness.session.selector.is_open());
        assert_eq!(recorder.request_count(), 0);
        Ok(())
    }

    #[test]
    fn clicking_outside_dismisses_without_assigning() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let recorder = Rc::clone(&runtime.recorder);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;
        harness.click(1, 1);
        harness.draw()?;

        harness.click(50, 15);
        assert!(!harness.session.selector.is_open());
        assert_eq!(recorder.request_count(), 0);
        assert_eq!(harness.active().project_id, None);
        Ok(())
    }

    #[test]
    fn any_button_outside_dismisses_but_only_left_activates() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let recorder = Rc::clone(&runtime.recorder);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;
        harness.click(1, 1);
        harness.draw()?;

        harness.press(MouseButton::Right, 50, 15);
        assert!(!harness.session.selector.is_open());

        harness.press(MouseButton::Middle, 1, 1);
        assert!(!harness.session.selector.is_open());

        harness.click(1, 1);
        harness.draw()?;
        assert!(harness.session.selector.is_open());
        harness.press(MouseButton::Right, 2, 7);
        assert!(harness.session.selector.is_open());
        assert_eq!(recorder.request_count(), 0);
        assert_eq!(harness.active().project_id, None);
        Ok(())
    }

    #[test]
    fn clicking_the_trigger_again_closes() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());
        harness.draw()?;
        harness.click(1, 1);
        harness.draw()?;
        harness.click(2, 1);
        assert!(!harness.session.selector.is_open());

        harness.draw()?;
        assert_eq!(harness.session.selector.dropdown_bounds(), None);
        Ok(())
    }

    #[test]
    fn keyboard_enter_clears_project_from_general() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", Some("p1"))]);
        let recorder = Rc::clone(&runtime.recorder);
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());

        harness.key(KeyCode::Char('p'));
        assert_eq!(harness.view_data.highlight, 1);
        let rows = harness.draw()?;
        assert!(rows[5].contains("General ✕"), "{rows:#?}");

        harness.key(KeyCode::Up);
        harness.key(KeyCode::Enter);
        assert!(!harness.session.selector.is_open());
        assert_eq!(harness.active().project_id, None);
        assert_eq!(recorder.requests()[0].project_id, None);
        Ok(())
    }

    #[test]
    fn escape_closes_and_q_quits_only_when_closed() {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let mut harness = Harness::start(&mut runtime, AppOptions::default());

        harness.key(KeyCode::Char('p'));
        assert!(!harness.key(KeyCode::Char('q')));
        assert!(harness.session.selector.is_open());
        harness.key(KeyCode::Esc);
        assert!(!harness.session.selector.is_open());
        assert!(harness.key(KeyCode::Char('q')));
    }

    #[test]
    fn unsaved_conversation_updates_locally_only() {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let recorder = Rc::clone(&runtime.recorder);
        let mut harness = Harness::start(&mut runtime, AppOptions::default());

        harness.key(KeyCode::Char('n'));
        assert!(harness.active().is_new());
        harness.key(KeyCode::Char('p'));
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);

        assert_eq!(harness.active().project_id, Some(ProjectId::new("p1")));
        assert_eq!(recorder.request_count(), 0);
        assert!(
            harness
                .view_data
                .status
                .as_deref()
                .is_some_and(|status| status.contains("first message"))
        );
    }

    #[test]
    fn switching_conversations_keeps_local_assignment() {
        let mut runtime = TestRuntime::new(vec![stored("c1", None), stored("c2", Some("p3"))]);
        let mut harness = Harness::start(&mut runtime, AppOptions::default());

        harness.key(KeyCode::Char('p'));
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);
        assert_eq!(harness.active().project_id, Some(ProjectId::new("p2")));

        harness.key(KeyCode::Char(']'));
        assert_eq!(
            harness.active().conversation_id,
            Some(ConversationId::new("c2"))
        );
        assert_eq!(harness.active().project_id, Some(ProjectId::new("p3")));

        harness.key(KeyCode::Char('['));
        assert_eq!(harness.active().project_id, Some(ProjectId::new("p2")));
    }

    #[test]
    fn empty_history_starts_with_unsaved_conversation() {
        let mut runtime = TestRuntime::new(Vec::new());
        let mut harness = Harness::start(&mut runtime, AppOptions::default());
        assert!(harness.active().is_new());

        harness.key(KeyCode::Char(']'));
        assert_eq!(
            harness.view_data.status.as_deref(),
            Some("no stored conversations yet")
        );
    }

    #[test]
    fn project_load_failure_offers_general_only() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", Some("p1"))]);
        runtime.projects = None;
        let mut harness = Harness::start(&mut runtime, Harness::terminal_gap());

        assert!(harness.view_data.projects.is_none());
        assert!(
            harness
                .view_data
                .status
                .as_deref()
                .is_some_and(|status| status.contains("projects table is locked"))
        );

        harness.key(KeyCode::Char('p'));
        let rows = harness.draw()?;
        assert!(rows[1].contains("General ▾"), "{rows:#?}");
        assert_eq!(
            harness
                .session
                .selector
                .dropdown_bounds()
                .map(|bounds| bounds.height),
            Some(3)
        );
        Ok(())
    }

    #[test]
    fn late_project_list_is_picked_up() {
        let mut runtime = TestRuntime::new(vec![stored("c1", Some("p9"))]);
        let mut harness = Harness::start(&mut runtime, AppOptions::default());

        harness
            .tx
            .send(InternalEvent::ProjectsLoaded(ProjectsResponse::new(vec![
                project("p9", "Late Arrival"),
            ])))
            .expect("send");
        harness.pump();

        let view = harness.session.view(&harness.view_data);
        assert_eq!(view.trigger_label, "Late Arrival");
    }

    #[test]
    fn localized_labels_follow_locale() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let harness = Harness::start(
            &mut runtime,
            AppOptions {
                locale: Locale::De,
                dropdown_gap: 1,
            },
        );
        let rows = harness.draw()?;
        assert!(rows[1].contains("Allgemein ▾"), "{rows:#?}");
        assert!(rows[0].contains("Projekt zuweisen"), "{rows:#?}");
        Ok(())
    }

    #[test]
    fn trigger_label_is_truncated() {
        let mut runtime = TestRuntime::new(vec![stored("c1", Some("long"))]);
        runtime.projects = Some(ProjectsResponse::new(vec![project(
            "long",
            "Quarterly planning for the garden",
        )]));
        let harness = Harness::start(&mut runtime, AppOptions::default());

        let view = harness.session.view(&harness.view_data);
        assert_eq!(trigger_text(&view), "Quarterly planni… ▾");
        assert_eq!(truncate_label("short", 16), "short");
    }

    #[test]
    fn dropdown_bounds_track_trigger_with_default_gap() -> Result<()> {
        let mut runtime = TestRuntime::new(vec![stored("c1", None)]);
        let mut harness = Harness::start(&mut runtime, AppOptions::default());
        harness.draw()?;
        harness.key(KeyCode::Char('p'));
        harness.draw()?;

        let trigger = harness
            .session
            .selector
            .trigger_bounds()
            .expect("trigger mounted");
        let dropdown = harness
            .session
            .selector
            .dropdown_bounds()
            .expect("dropdown mounted");
        assert_eq!(dropdown.y, trigger.bottom() + 4);
        assert_eq!(dropdown.x, trigger.x);
        assert_ne!(dropdown, Bounds::default());
        Ok(())
    }
}
