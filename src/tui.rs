use crate::{
    AppError, DATE_FORMAT, EntryForm, GeneratedReport, SpendEntry, create_report,
    number_formatter::{FormatOptions, NumberFormatter},
    permission::PermissionGate,
    report::ReportOptions,
    save_entry,
    store::SpendStore,
    viewer::open_report,
};
use chrono::{Months, NaiveDate, TimeDelta};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::TestBackend,
    layout::Position as CursorPosition,
    prelude::*,
    widgets::*,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tui_input::{Input, backend::crossterm::EventHandler};

const FOCUSED_SELECTION_BG_COLOR: Color = Color::from_u32(0x001a1e24);
const SELECTION_INDICATOR_COLOR: Color = Color::Green;
const IDLE_POLL: Duration = Duration::from_millis(100);

/// What the screen needs to talk to the outside world.
#[derive(Clone)]
pub struct Services<S> {
    pub store: S,
    pub gate: Arc<dyn PermissionGate>,
    pub report: ReportOptions,
}

/// Core TUI loop that works with any backend and event source
///
/// Requests run on `runtime`; their results are applied between events. Once
/// `events` is exhausted (or the user quits) the loop waits for outstanding
/// requests and draws one last frame.
pub fn run_tui_loop<B, E, S>(
    services: Services<S>,
    runtime: &Handle,
    format_options: FormatOptions,
    terminal: &mut Terminal<B>,
    events: E,
) -> Result<(), Box<dyn std::error::Error>>
where
    B: ratatui::backend::Backend,
    E: IntoIterator<Item = Event>,
    S: SpendStore + Clone + 'static,
{
    let (completions_tx, mut completions) = unbounded_channel();
    let mut app = App::new(format_options, chrono::Local::now().date_naive());

    terminal.draw(|f| ui(f, &app))?;

    for event in events {
        app.apply_completions(&mut completions);

        if let Event::Key(key) = event
            && key.kind == KeyEventKind::Press
        {
            match app.handle_key(key) {
                Action::Quit => break,
                Action::Save(form) => {
                    app.begin_request("Saving...");
                    spawn_save(runtime, &services, &completions_tx, form);
                }
                Action::Report => {
                    app.begin_request("Fetching entries...");
                    spawn_report(runtime, &services, &completions_tx);
                }
                Action::None => {}
            }
        }

        terminal.draw(|f| ui(f, &app))?;
    }

    // Every task owns a sender clone, so `None` means nothing is left in flight.
    drop(completions_tx);
    while app.pending > 0 {
        match completions.blocking_recv() {
            Some(completion) => app.complete(completion),
            None => break,
        }
    }
    terminal.draw(|f| ui(f, &app))?;

    Ok(())
}

pub fn run_tui<S>(
    services: Services<S>,
    runtime: &Handle,
    format_options: FormatOptions,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: SpendStore + Clone + 'static,
{
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Idle polls yield a focus event so completions get drawn without a key press.
    let events = std::iter::from_fn(|| match event::poll(IDLE_POLL) {
        Ok(true) => event::read().ok(),
        Ok(false) => Some(Event::FocusGained),
        Err(_) => None,
    });

    let res = run_tui_loop(services, runtime, format_options, &mut terminal, events);

    disable_raw_mode()?;
    execute!(std::io::stdout(), LeaveAlternateScreen)?;
    res
}

/// Runs the loop on a `TestBackend` and returns the final screen as text.
///
/// Exposed for integration tests.
pub fn run_tui_with_events_test<S>(
    services: Services<S>,
    runtime: &Handle,
    format_options: FormatOptions,
    events: Vec<Event>,
    width: u16,
    height: u16,
) -> Result<String, Box<dyn std::error::Error>>
where
    S: SpendStore + Clone + 'static,
{
    let mut terminal = Terminal::new(TestBackend::new(width, height))?;
    run_tui_loop(services, runtime, format_options, &mut terminal, events)?;

    let buffer = terminal.backend().buffer();
    let lines: Vec<String> = buffer
        .content
        .chunks(usize::from(buffer.area.width))
        .map(|row| {
            row.iter()
                .map(|cell| cell.symbol())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect();
    Ok(lines.join("\n"))
}

fn spawn_save<S>(
    runtime: &Handle,
    services: &Services<S>,
    completions: &UnboundedSender<Completion>,
    form: EntryForm,
) where
    S: SpendStore + Clone + 'static,
{
    let store = services.store.clone();
    let completions = completions.clone();
    runtime.spawn(async move {
        let result = save_entry(&store, &form).await;
        // The receiver only goes away once the screen has been torn down.
        let _ = completions.send(Completion::Saved(result));
    });
}

fn spawn_report<S>(
    runtime: &Handle,
    services: &Services<S>,
    completions: &UnboundedSender<Completion>,
) where
    S: SpendStore + Clone + 'static,
{
    let store = services.store.clone();
    let gate = Arc::clone(&services.gate);
    let options = services.report.clone();
    let completions = completions.clone();
    runtime.spawn(async move {
        let result = create_report(&store, gate.as_ref(), &options).await;
        let viewer_error = match &result {
            Ok(generated) if options.open_viewer => {
                open_report(&generated.path, options.viewer.as_deref())
                    .await
                    .err()
            }
            _ => None,
        };
        let _ = completions.send(Completion::Reported(result, viewer_error));
    });
}

enum Completion {
    Saved(Result<SpendEntry, AppError>),
    /// Generation outcome plus the viewer failure, if any.
    Reported(Result<GeneratedReport, AppError>, Option<AppError>),
}

enum Action {
    None,
    Quit,
    Save(EntryForm),
    Report,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Field {
    Date,
    Amount,
    Cause,
}

enum Notification {
    Info(String),
    Error(String),
}

struct ReportSummary {
    path: String,
    entries: usize,
    total: String,
}

struct App {
    format_options: FormatOptions,
    today: NaiveDate,
    focus: Field,
    date_input: Input,
    amount_input: Input,
    cause_input: Input,
    notification: Option<Notification>,
    last_report: Option<ReportSummary>,
    pending: usize,
}

impl App {
    fn new(format_options: FormatOptions, today: NaiveDate) -> Self {
        Self {
            format_options,
            today,
            focus: Field::Amount,
            date_input: date_input(today),
            amount_input: Input::default(),
            cause_input: Input::default(),
            notification: None,
            last_report: None,
            pending: 0,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') if ctrl => Action::Quit,
            KeyCode::Char('r') if ctrl => Action::Report,
            KeyCode::F(5) => Action::Report,
            KeyCode::Enter => Action::Save(self.form()),
            KeyCode::Tab => {
                self.cycle_focus();
                Action::None
            }
            KeyCode::BackTab => {
                self.cycle_focus_back();
                Action::None
            }
            KeyCode::Up | KeyCode::Down | KeyCode::PageUp | KeyCode::PageDown
                if self.focus == Field::Date =>
            {
                self.pick_date(key.code);
                Action::None
            }
            _ => {
                self.handle_input(key);
                Action::None
            }
        }
    }

    fn form(&self) -> EntryForm {
        EntryForm::new(
            self.date_input.value(),
            self.amount_input.value(),
            self.cause_input.value(),
        )
    }

    fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Date => Field::Amount,
            Field::Amount => Field::Cause,
            Field::Cause => Field::Date,
        };
    }

    fn cycle_focus_back(&mut self) {
        self.focus = match self.focus {
            Field::Date => Field::Cause,
            Field::Amount => Field::Date,
            Field::Cause => Field::Amount,
        };
    }

    /// Steps the date field; an unreadable value restarts from today.
    fn pick_date(&mut self, code: KeyCode) {
        let current = NaiveDate::parse_from_str(self.date_input.value(), DATE_FORMAT)
            .unwrap_or(self.today);
        let picked = match code {
            KeyCode::Up => current.checked_add_signed(TimeDelta::days(1)),
            KeyCode::Down => current.checked_sub_signed(TimeDelta::days(1)),
            KeyCode::PageUp => current.checked_add_months(Months::new(1)),
            KeyCode::PageDown => current.checked_sub_months(Months::new(1)),
            _ => None,
        };
        if let Some(date) = picked {
            self.date_input = date_input(date);
        }
    }

    fn handle_input(&mut self, key: KeyEvent) {
        // Clear the last message when user starts typing
        if matches!(key.code, KeyCode::Char(_) | KeyCode::Backspace) {
            self.notification = None;
        }

        match self.focus {
            Field::Date => {
                self.date_input.handle_event(&Event::Key(key));
                // dd/mm/yyyy never exceeds 10 characters
                if self.date_input.value().chars().count() > 10 {
                    let truncated: String = self.date_input.value().chars().take(10).collect();
                    self.date_input = Input::new(truncated).with_cursor(10);
                }
            }
            Field::Amount => match key.code {
                KeyCode::Char(c) if !c.is_ascii_digit() => {}
                _ => {
                    self.amount_input.handle_event(&Event::Key(key));
                }
            },
            Field::Cause => {
                self.cause_input.handle_event(&Event::Key(key));
            }
        }
    }

    fn begin_request(&mut self, message: &str) {
        self.pending += 1;
        self.notification = Some(Notification::Info(message.to_string()));
    }

    fn apply_completions(&mut self, completions: &mut UnboundedReceiver<Completion>) {
        while let Ok(completion) = completions.try_recv() {
            self.complete(completion);
        }
    }

    fn complete(&mut self, completion: Completion) {
        self.pending = self.pending.saturating_sub(1);
        match completion {
            Completion::Saved(Ok(_)) => {
                self.notification = Some(Notification::Info("Data saved successfully".to_string()));
                self.date_input = date_input(self.today);
                self.amount_input.reset();
                self.cause_input.reset();
                self.focus = Field::Amount;
            }
            Completion::Saved(Err(err)) => {
                self.notification = Some(Notification::Error(err.to_string()));
            }
            Completion::Reported(Ok(generated), viewer_error) => {
                let path = generated.path.display().to_string();
                self.notification = Some(match viewer_error {
                    Some(err) => Notification::Error(format!("PDF saved to {path}. {err}")),
                    None => Notification::Info(format!("PDF saved to {path}")),
                });
                self.last_report = Some(ReportSummary {
                    path,
                    entries: generated.report.lines().len(),
                    total: generated.report.total().format(&self.format_options),
                });
            }
            Completion::Reported(Err(err), _) => {
                self.notification = Some(Notification::Error(err.to_string()));
            }
        }
    }
}

fn date_input(date: NaiveDate) -> Input {
    Input::new(date.format(DATE_FORMAT).to_string())
}

fn ui(frame: &mut Frame, app: &App) {
    let [form_rect, status_rect, report_rect, help_rect] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .areas(frame.area());

    render_form(frame, app, form_rect);

    let status_line = match &app.notification {
        Some(Notification::Info(message)) => {
            Line::from(Span::raw(message.as_str()).style(Style::default().fg(Color::Green)))
        }
        Some(Notification::Error(message)) => Line::from(vec![
            Span::raw("Error: ").style(Style::default().fg(Color::Red)),
            Span::raw(message.as_str()).style(Style::default().fg(Color::Red)),
        ]),
        None => Line::raw(""),
    };
    let status = Paragraph::new(status_line).block(make_block("Status"));
    frame.render_widget(status, status_rect);

    let report_lines: Vec<Line> = match &app.last_report {
        Some(summary) => vec![
            Line::from(vec![Span::raw(" File     "), Span::raw(summary.path.as_str())]),
            Line::from(vec![
                Span::raw(" Entries  "),
                Span::raw(summary.entries.to_string()),
            ]),
            Line::from(vec![
                Span::raw(" Total    "),
                Span::raw(summary.total.as_str()).add_modifier(Modifier::BOLD),
            ]),
        ],
        None => vec![Line::raw(" No report generated yet")],
    };
    let report = Paragraph::new(report_lines).block(make_block("Last report"));
    frame.render_widget(report, report_rect);

    let footer = Paragraph::new(
        "Tab: Switch Field | ↑/↓ PgUp/PgDn: Pick Date | Enter: Save | Ctrl+R: Fetch & PDF | Esc: Quit",
    )
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, help_rect);
}

fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let form_block = Block::default()
        .title(Line::from(" Spend Entry ").add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_type(BorderType::Double);
    let inner_area = form_block.inner(area);
    frame.render_widget(form_block, area);

    let [date_rect, amount_rect, cause_rect] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1); 3])
        .areas(inner_area);

    render_input_field(
        frame,
        "Date  ",
        &app.date_input,
        date_rect,
        app.focus == Field::Date,
    );
    render_input_field(
        frame,
        "Amount",
        &app.amount_input,
        amount_rect,
        app.focus == Field::Amount,
    );
    render_input_field(
        frame,
        "Cause ",
        &app.cause_input,
        cause_rect,
        app.focus == Field::Cause,
    );
}

fn render_input_field(
    frame: &mut Frame,
    name: &str,
    input: &Input,
    layout: Rect,
    is_focused: bool,
) {
    let style = if is_focused {
        Style::default()
            .bg(FOCUSED_SELECTION_BG_COLOR)
            .fg(Color::White)
    } else {
        Style::default().fg(Color::White)
    };
    let prefix = if is_focused {
        Span::raw("▌").style(SELECTION_INDICATOR_COLOR)
    } else {
        Span::raw(" ")
    };
    let value_span = Span::raw(input.value());
    let value_width = value_span.width() as u16;
    let line = Line::from(vec![prefix, Span::raw(name), Span::raw("  "), value_span]).style(style);
    let line_width = line.width() as u16;
    frame.render_widget(line, layout);

    if is_focused {
        let cursor_pos = input.visual_cursor() as u16;
        frame.set_cursor_position(CursorPosition {
            x: layout.x + line_width - value_width + cursor_pos,
            y: layout.y,
        });
    }
}

fn make_block(title: &str) -> Block<'_> {
    Block::default()
        .title(Line::raw(format!(" {title} ")))
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
}
