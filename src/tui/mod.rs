mod state;

use crate::cli::Cli;
use crate::model::{Browser, World};
use crate::orchestrator::{self, UiCommand};
use crate::settings::{JsonFileSettings, SettingsStore};
use crate::view::{LogLevel, UiEvent};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use state::{main_fields, session_fields, MainField, SessionField, SessionState, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, mut store: SettingsStore, backend: JsonFileSettings) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the
    // controller loop.
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, ui_rx, cmd_tx));

    let res = orchestrator::run_controller(&args, &mut store, &backend, ui_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut ui_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::default();
    let mut start_pending = args.start_on_launch;
    let mut quit_sent = false;

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        let mut shutdown = false;
        loop {
            match ui_rx.try_recv() {
                Ok(UiEvent::Shutdown) => {
                    shutdown = true;
                    break;
                }
                Ok(UiEvent::SeedForm(draft)) => {
                    state.seed(draft);
                    if start_pending {
                        start_pending = false;
                        let _ = cmd_tx.send(UiCommand::Start(state.draft()));
                    }
                }
                Ok(ev) => apply_event(&mut state, ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    shutdown = true;
                    break;
                }
            }
        }
        if shutdown {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                handle_key(k, &mut state, &cmd_tx, &mut quit_sent);
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(state: &mut UiState, ev: UiEvent) {
    match ev {
        UiEvent::Log(level, text) => state.push_log(level, text),
        UiEvent::SetAllInputsEnabled(enabled) => state.inputs_enabled = enabled,
        UiEvent::SetStartEnabled(enabled) => state.start_enabled = enabled,
        UiEvent::SetStopEnabled(enabled) => state.stop_enabled = enabled,
        UiEvent::SetSettingsEnabled(enabled) => state.settings_enabled = enabled,
        UiEvent::Phase(phase) => state.phase = Some(phase),
        UiEvent::SessionOpened(draft) => state.session = Some(SessionState::from_draft(&draft)),
        UiEvent::SessionClosed => state.session = None,
        // Handled in the drain loop.
        UiEvent::SeedForm(_) | UiEvent::Shutdown => {}
    }
}

fn handle_key(
    k: KeyEvent,
    state: &mut UiState,
    cmd_tx: &UnboundedSender<UiCommand>,
    quit_sent: &mut bool,
) {
    // Quit works everywhere; the controller performs the bounded stop first,
    // so the UI stays up (and keeps logging) until Shutdown arrives.
    if k.modifiers == KeyModifiers::CONTROL
        && matches!(k.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        if !*quit_sent {
            *quit_sent = true;
            state.push_log(LogLevel::Info, "Quitting…".to_string());
            let _ = cmd_tx.send(UiCommand::Quit);
        }
        return;
    }

    if state.session.is_some() {
        handle_session_key(k, state, cmd_tx);
        return;
    }

    // Action keys, gated on the enablement the coordinator drives.
    if k.modifiers == KeyModifiers::CONTROL {
        match k.code {
            KeyCode::Char('s') => {
                if state.start_enabled {
                    let _ = cmd_tx.send(UiCommand::Start(state.draft()));
                }
            }
            KeyCode::Char('x') => {
                if state.stop_enabled {
                    let _ = cmd_tx.send(UiCommand::Stop);
                }
            }
            KeyCode::Char('o') => {
                if state.settings_enabled {
                    let _ = cmd_tx.send(UiCommand::OpenSettings);
                }
            }
            _ => {}
        }
        return;
    }

    if !state.inputs_enabled {
        return;
    }

    let fields = main_fields();
    let field = fields[state.focus.min(fields.len() - 1)];
    match k.code {
        KeyCode::Tab | KeyCode::Down => state.focus = (state.focus + 1) % fields.len(),
        KeyCode::BackTab | KeyCode::Up => {
            state.focus = (state.focus + fields.len() - 1) % fields.len();
        }
        KeyCode::Left => field_cycle(state, field, false),
        KeyCode::Right => field_cycle(state, field, true),
        KeyCode::Char(' ') => {
            if !field_toggle(state, field) {
                field_edit(state, field, Some(' '));
            }
        }
        KeyCode::Char(c) => field_edit(state, field, Some(c)),
        KeyCode::Backspace => field_edit(state, field, None),
        _ => {}
    }
}

fn handle_session_key(k: KeyEvent, state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    match k.code {
        KeyCode::Esc => {
            let _ = cmd_tx.send(UiCommand::CancelSettings);
            return;
        }
        KeyCode::Enter => {
            let _ = cmd_tx.send(UiCommand::SaveSettings(state.draft()));
            return;
        }
        _ => {}
    }

    let fields = session_fields();
    let Some(session) = state.session.as_mut() else {
        return;
    };
    let field = fields[session.focus.min(fields.len() - 1)];
    match k.code {
        KeyCode::Tab | KeyCode::Down => session.focus = (session.focus + 1) % fields.len(),
        KeyCode::BackTab | KeyCode::Up => {
            session.focus = (session.focus + fields.len() - 1) % fields.len();
        }
        KeyCode::Char(c) => session.field_text_mut(field).push(c),
        KeyCode::Backspace => {
            session.field_text_mut(field).pop();
        }
        _ => {}
    }
}

fn field_toggle(state: &mut UiState, field: MainField) -> bool {
    match field {
        MainField::MoveOption(option) => {
            if !state.move_options.remove(&option) {
                state.move_options.insert(option);
            }
            true
        }
        MainField::Task(task) => {
            if !state.tasks.remove(&task) {
                state.tasks.insert(task);
            }
            true
        }
        MainField::UseProtectionSpell => {
            state.use_protection_spell = !state.use_protection_spell;
            true
        }
        MainField::UseSpecialSkill => {
            state.use_special_skill = !state.use_special_skill;
            true
        }
        _ => false,
    }
}

fn field_edit(state: &mut UiState, field: MainField, input: Option<char>) {
    let text = match field {
        MainField::Username => &mut state.username,
        MainField::Password => &mut state.password,
        _ => return,
    };
    match input {
        Some(c) => text.push(c),
        None => {
            text.pop();
        }
    }
}

fn field_cycle(state: &mut UiState, field: MainField, forward: bool) {
    match field {
        MainField::World => state.world = cycle(&World::ALL, state.world, forward),
        MainField::Browser => state.browser = cycle(&Browser::ALL, state.browser, forward),
        _ => {}
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let idx = all.iter().position(|v| *v == current).unwrap_or(0);
    let next = if forward {
        (idx + 1) % all.len()
    } else {
        (idx + all.len() - 1) % all.len()
    };
    all[next]
}

fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(rows[0], f, state);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(42), Constraint::Percentage(58)])
        .split(rows[1]);
    draw_form(cols[0], f, state);
    draw_log(cols[1], f, state);

    draw_footer(rows[2], f, state);

    if state.session.is_some() {
        draw_session(area, f, state);
    }
}

fn draw_header(area: Rect, f: &mut Frame, state: &UiState) {
    let status = if state.stop_enabled {
        match state.phase {
            Some(phase) => format!("Running — {}", phase.label()),
            None => "Running".to_string(),
        }
    } else {
        "Idle".to_string()
    };
    let line = Line::from(vec![
        Span::styled(
            " routine-bot ",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(status, Style::default().fg(Color::Cyan)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_form(area: Rect, f: &mut Frame, state: &UiState) {
    let fields = main_fields();
    let mut lines = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let focused = i == state.focus && state.session.is_none();
        let marker = if focused { "› " } else { "  " };
        let mut style = Style::default();
        if !state.inputs_enabled {
            style = style.fg(Color::DarkGray);
        } else if focused {
            style = style.fg(Color::Cyan);
        }
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(field_line(state, *field), style),
        ]));
    }
    let block = Block::default().borders(Borders::ALL).title("Routine");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line(state: &UiState, field: MainField) -> String {
    fn mark(selected: bool) -> char {
        if selected {
            'x'
        } else {
            ' '
        }
    }
    match field {
        MainField::Username => format!("Username   {}", state.username),
        MainField::Password => {
            format!("Password   {}", "•".repeat(state.password.chars().count()))
        }
        MainField::World => format!("World      ‹ {} ›", state.world.label()),
        MainField::Browser => format!("Browser    ‹ {} ›", state.browser.label()),
        MainField::MoveOption(option) => format!(
            "[{}] Move: {}",
            mark(state.move_options.contains(&option)),
            option.label()
        ),
        MainField::Task(task) => format!(
            "[{}] Task: {}",
            mark(state.tasks.contains(&task)),
            task.label()
        ),
        MainField::UseProtectionSpell => format!(
            "[{}] Use protection spell",
            mark(state.use_protection_spell)
        ),
        MainField::UseSpecialSkill => {
            format!("[{}] Use special skill", mark(state.use_special_skill))
        }
    }
}

fn draw_log(area: Rect, f: &mut Frame, state: &UiState) {
    let visible = area.height.saturating_sub(2) as usize;
    let start = state.log.len().saturating_sub(visible);
    let lines: Vec<Line> = state.log[start..]
        .iter()
        .map(|entry| {
            let color = match entry.level {
                LogLevel::Info => Color::Gray,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(vec![
                Span::styled(
                    format!("{} ", entry.at),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(entry.text.clone(), Style::default().fg(color)),
            ])
        })
        .collect();
    let block = Block::default().borders(Borders::ALL).title("Log");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(area: Rect, f: &mut Frame, state: &UiState) {
    fn hint(label: &str, enabled: bool) -> Span<'_> {
        if enabled {
            Span::raw(label.to_string())
        } else {
            Span::styled(label.to_string(), Style::default().fg(Color::DarkGray))
        }
    }
    let line = if state.session.is_some() {
        Line::from(vec![Span::raw(
            " Tab/↑↓ focus · type to edit · Enter save · Esc cancel ",
        )])
    } else {
        Line::from(vec![
            hint(" ^S start ", state.start_enabled),
            hint("· ^X stop ", state.stop_enabled),
            hint("· ^O settings ", state.settings_enabled),
            Span::raw("· ^Q quit "),
            hint("· Tab/↑↓ focus · Space toggle · ←→ select ", state.inputs_enabled),
        ])
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_session(area: Rect, f: &mut Frame, state: &UiState) {
    let Some(session) = &state.session else {
        return;
    };
    let rect = centered_rect(64, 60, area);
    f.render_widget(Clear, rect);

    let fields = session_fields();
    let mut lines = Vec::with_capacity(fields.len() + 2);
    for (i, field) in fields.iter().enumerate() {
        let focused = i == session.focus;
        let marker = if focused { "› " } else { "  " };
        let style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let text = match field {
            SessionField::Driver(browser) => format!(
                "{:<10} driver  {}",
                browser.label(),
                session.drivers.get(browser).map(String::as_str).unwrap_or("")
            ),
            SessionField::Binary => format!("Browser binary     {}", session.binary),
            SessionField::ProtectionSpell => {
                format!("Protection spell   {}", session.protection_spell)
            }
        };
        lines.push(Line::from(vec![Span::raw(marker), Span::styled(text, style)]));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "Enter save · Esc cancel",
        Style::default().fg(Color::DarkGray),
    ));

    let block = Block::default().borders(Borders::ALL).title("Settings");
    f.render_widget(Paragraph::new(lines).block(block), rect);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
