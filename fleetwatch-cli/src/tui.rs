use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, Wrap};
use ratatui::Terminal;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use fleetwatch_core::client::MonitoringApi;
use fleetwatch_core::config::Settings;
use fleetwatch_core::controller::{Dashboard, DataSource, LoadApplied, LoadPlan, LoadTicket};
use fleetwatch_core::mock::{mock_organizations, MockGenerator};
use fleetwatch_core::pagination::PAGE_SIZE_OPTIONS;
use fleetwatch_core::pipeline::RecordFetcher;
use fleetwatch_core::prelude::*;
use fleetwatch_core::transfer::{save_csv, validate_import_file, ImportFile, ImportResult};
use fleetwatch_core::types::{MonitoringRecord, Organization};
use fleetwatch_core::view::{DashboardView, TABLE_HEADERS};

use crate::error::CliResult;

enum AppEvent {
    OrganizationsLoaded(Result<Vec<Organization>>),
    RecordsLoaded {
        ticket: LoadTicket,
        outcome: Result<Vec<MonitoringRecord>>,
    },
    Exported(Result<PathBuf>),
    Imported(Result<ImportResult>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    QuickSearch,
    GotoPage,
    ImportPath,
}

struct AppState {
    dashboard: Dashboard,
    fetcher: RecordFetcher,
    out_dir: PathBuf,
    mode: InputMode,
    input: String,
    status: String,
    error: Option<String>,
    /// Set while the fleet selector holds sample fleets.
    fleet_warning: Option<String>,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
}

impl AppState {
    fn new(fetcher: RecordFetcher, dashboard: Dashboard) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            dashboard,
            fetcher,
            out_dir: PathBuf::from("."),
            mode: InputMode::Normal,
            input: String::new(),
            status: "Ready".to_string(),
            error: None,
            fleet_warning: None,
            events_tx,
            events_rx,
        }
    }

    fn report(&mut self, status: &str, error: Option<String>) {
        self.status = status.to_string();
        self.error = error;
    }
}

pub fn run_tui(
    runtime: &Runtime,
    api: Arc<dyn MonitoringApi>,
    settings: &Settings,
    organization_id: Option<String>,
    report_date: NaiveDate,
    token: CancellationToken,
) -> CliResult<()> {
    let mut dashboard = Dashboard::new(report_date)
        .with_page_size(settings.page_size)
        .with_mock(MockGenerator::new(), settings.mock_record_count);
    dashboard.select_organization(organization_id);
    let mut app = AppState::new(RecordFetcher::new(api, settings), dashboard);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    spawn_organizations(runtime, &app, &token);
    start_load(runtime, &mut app, &token);

    let res = run_loop(&mut terminal, runtime, &mut app, &token);
    token.cancel();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    runtime: &Runtime,
    app: &mut AppState,
    token: &CancellationToken,
) -> CliResult<()> {
    loop {
        drain_events(runtime, app, token);
        let view = app.dashboard.view();
        terminal.draw(|frame| render(frame, app, &view))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if handle_key(key, runtime, app, token) {
                    return Ok(());
                }
            }
        }
    }
}

fn spawn_task<F>(runtime: &Runtime, app: &AppState, token: &CancellationToken, task: F)
where
    F: std::future::Future<Output = AppEvent> + Send + 'static,
{
    let tx = app.events_tx.clone();
    let token = token.clone();
    runtime.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            event = task => {
                let _ = tx.send(event);
            }
        }
    });
}

fn spawn_organizations(runtime: &Runtime, app: &AppState, token: &CancellationToken) {
    let fetcher = app.fetcher.clone();
    spawn_task(runtime, app, token, async move {
        AppEvent::OrganizationsLoaded(fetcher.fetch_organizations().await)
    });
}

fn spawn_fetch(
    runtime: &Runtime,
    app: &mut AppState,
    token: &CancellationToken,
    ticket: LoadTicket,
) {
    let fetcher = app.fetcher.clone();
    app.report("Loading...", None);
    spawn_task(runtime, app, token, async move {
        let outcome = fetcher.fetch_records(ticket.key()).await;
        AppEvent::RecordsLoaded { ticket, outcome }
    });
}

fn start_load(runtime: &Runtime, app: &mut AppState, token: &CancellationToken) {
    match app.dashboard.begin_load() {
        LoadPlan::Reuse => app.report("Loaded from cache", None),
        LoadPlan::Fetch(ticket) => spawn_fetch(runtime, app, token, ticket),
        LoadPlan::AlreadyLoading => app.report("Loading...", None),
    }
}

fn drain_events(runtime: &Runtime, app: &mut AppState, token: &CancellationToken) {
    while let Ok(event) = app.events_rx.try_recv() {
        match event {
            AppEvent::OrganizationsLoaded(Ok(organizations)) => {
                app.fleet_warning = None;
                app.dashboard.set_organizations(organizations);
            }
            AppEvent::OrganizationsLoaded(Err(err)) => {
                tracing::warn!("Loading organizations failed, using sample fleets: {err}");
                app.dashboard.set_organizations(mock_organizations());
                app.fleet_warning =
                    Some(format!("Fleets unavailable, showing sample fleets ({err})"));
                app.report("Showing sample fleets", Some(err.to_string()));
            }
            AppEvent::RecordsLoaded { ticket, outcome } => {
                match app.dashboard.complete_load(ticket, outcome) {
                    LoadApplied::Fresh | LoadApplied::Reused => app.report("Ready", None),
                    LoadApplied::Fallback => app.report("Showing sample data", None),
                    LoadApplied::Stale => {}
                }
            }
            AppEvent::Exported(Ok(path)) => {
                app.report(&format!("Exported to {}", path.display()), None);
            }
            AppEvent::Exported(Err(err)) => {
                let status = match err.kind() {
                    ErrorKind::Unsupported(_) => "Export not available from this source",
                    _ => "Export failed",
                };
                app.report(status, Some(err.to_string()));
            }
            AppEvent::Imported(Ok(result)) if result.success => {
                app.report("Import succeeded, reloading", None);
                app.dashboard.invalidate();
                start_load(runtime, app, token);
            }
            AppEvent::Imported(Ok(result)) => {
                app.report("Import rejected", Some(result.message));
            }
            AppEvent::Imported(Err(err)) => app.report("Import failed", Some(err.to_string())),
        }
    }
}

fn handle_key(
    key: KeyEvent,
    runtime: &Runtime,
    app: &mut AppState,
    token: &CancellationToken,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    match app.mode {
        InputMode::Normal => return handle_normal_key(key, runtime, app, token),
        InputMode::QuickSearch => match key.code {
            KeyCode::Char(ch) => {
                app.input.push(ch);
                app.dashboard.set_quick_search(&app.input);
            }
            KeyCode::Backspace => {
                app.input.pop();
                app.dashboard.set_quick_search(&app.input);
            }
            KeyCode::Enter | KeyCode::Esc => app.mode = InputMode::Normal,
            _ => {}
        },
        InputMode::GotoPage | InputMode::ImportPath => match key.code {
            KeyCode::Char(ch) => app.input.push(ch),
            KeyCode::Backspace => {
                app.input.pop();
            }
            KeyCode::Esc => {
                app.input.clear();
                app.mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                let input = std::mem::take(&mut app.input);
                let mode = std::mem::replace(&mut app.mode, InputMode::Normal);
                if mode == InputMode::GotoPage {
                    match app.dashboard.goto_page(&input) {
                        Ok(page) => app.report(&format!("Page {page}"), None),
                        Err(err) => app.report("Invalid page", Some(err.to_string())),
                    }
                } else {
                    submit_import(runtime, app, token, input.trim());
                }
            }
            _ => {}
        },
    }
    false
}

fn handle_normal_key(
    key: KeyEvent,
    runtime: &Runtime,
    app: &mut AppState,
    token: &CancellationToken,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => {
            if app.dashboard.step_organization(true) {
                start_load(runtime, app, token);
            }
        }
        KeyCode::BackTab => {
            if app.dashboard.step_organization(false) {
                start_load(runtime, app, token);
            }
        }
        KeyCode::Char(']') => {
            if app.dashboard.step_date(1) {
                start_load(runtime, app, token);
            }
        }
        KeyCode::Char('[') => {
            if app.dashboard.step_date(-1) {
                start_load(runtime, app, token);
            }
        }
        KeyCode::Char('/') => {
            app.input = app.dashboard.search_term().to_string();
            app.mode = InputMode::QuickSearch;
        }
        KeyCode::Char('g') => {
            app.input.clear();
            app.mode = InputMode::GotoPage;
        }
        KeyCode::Char('i') => {
            app.input.clear();
            app.mode = InputMode::ImportPath;
        }
        KeyCode::Char('p') => {
            let current = app.dashboard.page_state().page_size;
            let next = PAGE_SIZE_OPTIONS
                .iter()
                .copied()
                .find(|size| *size > current)
                .unwrap_or(PAGE_SIZE_OPTIONS[0]);
            if let Err(err) = app.dashboard.set_page_size(next) {
                app.report("Invalid page size", Some(err.to_string()));
            }
        }
        KeyCode::Right | KeyCode::PageDown => {
            app.dashboard.next_page();
        }
        KeyCode::Left | KeyCode::PageUp => {
            app.dashboard.prev_page();
        }
        KeyCode::Home => {
            app.dashboard.select_page(1);
        }
        KeyCode::End => {
            let last = app.dashboard.page_state().total_pages;
            app.dashboard.select_page(last);
        }
        KeyCode::Char('s') | KeyCode::F(5) => {
            let ticket = app.dashboard.submit_search();
            spawn_fetch(runtime, app, token, ticket);
        }
        KeyCode::Char('e') => {
            let fetcher = app.fetcher.clone();
            let key = app.dashboard.query_key();
            let out_dir = app.out_dir.clone();
            app.report("Exporting...", None);
            spawn_task(runtime, app, token, async move {
                AppEvent::Exported(fetcher.export_to(&key, &out_dir).await)
            });
        }
        KeyCode::Char('c') => {
            let date = app.dashboard.selection().report_date;
            match save_csv(&app.out_dir, date, app.dashboard.filtered()) {
                Ok(path) => app.report(&format!("Saved {}", path.display()), None),
                Err(err) => app.report("CSV export failed", Some(err.to_string())),
            }
        }
        _ => {}
    }
    false
}

fn submit_import(runtime: &Runtime, app: &mut AppState, token: &CancellationToken, path: &str) {
    if path.is_empty() {
        return;
    }
    let path = PathBuf::from(path);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Err(err) = validate_import_file(&name, None) {
        app.report("Import rejected", Some(err.to_string()));
        return;
    }
    let file = match ImportFile::from_path(&path) {
        Ok(file) => file,
        Err(err) => {
            app.report("Import failed", Some(err.to_string()));
            return;
        }
    };
    let fetcher = app.fetcher.clone();
    app.report(&format!("Importing {}...", file.name), None);
    spawn_task(runtime, app, token, async move {
        AppEvent::Imported(fetcher.import(&file).await)
    });
}

fn source_label(source: DataSource) -> &'static str {
    match source {
        DataSource::Empty => "-",
        DataSource::Remote => "live",
        DataSource::Cache => "cached",
        DataSource::Mock => "sample",
    }
}

fn pagination_line(view: &DashboardView) -> String {
    if !view.pagination.visible {
        return String::new();
    }
    let pages: Vec<String> = view
        .pagination
        .pages
        .iter()
        .map(|button| {
            if button.active {
                format!("[{}]", button.number)
            } else {
                format!(" {} ", button.number)
            }
        })
        .collect();
    format!(
        "{} {} {}",
        if view.pagination.prev_enabled { "< Prev" } else { "      " },
        pages.join(""),
        if view.pagination.next_enabled { "Next >" } else { "" },
    )
}

fn render(frame: &mut ratatui::Frame, app: &AppState, view: &DashboardView) {
    let area = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(5),
            Constraint::Length(3),
        ])
        .split(area);

    let dashboard = &app.dashboard;
    let header = format!(
        "Fleet: {}  Date: {}  Search: {}  Page size: {}  Source: {}",
        dashboard.organization_label(),
        dashboard.query_key().date_string(),
        dashboard.search_term(),
        dashboard.page_state().page_size,
        source_label(dashboard.source()),
    );
    let header_block = Paragraph::new(header)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).title("Fleetwatch"));
    frame.render_widget(header_block, layout[0]);

    if view.no_data {
        let message = if dashboard.is_loading() { "Loading..." } else { "No data" };
        let empty = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title("Records"));
        frame.render_widget(empty, layout[1]);
    } else {
        let rows = view.rows.iter().map(|row| {
            let style = if row.is_violation {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Row::new(row.cells()).style(style)
        });
        let widths = [
            Constraint::Length(4),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Min(10),
            Constraint::Length(19),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(19),
            Constraint::Length(8),
            Constraint::Min(16),
            Constraint::Length(8),
        ];
        let table = Table::new(rows, widths)
            .header(Row::new(TABLE_HEADERS).style(Style::default().add_modifier(Modifier::BOLD)))
            .block(Block::default().borders(Borders::ALL).title("Records"));
        frame.render_widget(table, layout[1]);
    }

    let mut summary = format!(
        "Total: {}  Violations: {}  Normal: {}  Page {}\n{}",
        view.counters.total,
        view.counters.violations,
        view.counters.normal,
        view.page_info,
        pagination_line(view),
    );
    for warning in [app.fleet_warning.as_ref(), view.warning.as_ref()]
        .into_iter()
        .flatten()
    {
        summary.push('\n');
        summary.push_str(warning);
    }
    let summary_block = Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL).title("Summary"))
        .wrap(Wrap { trim: false });
    frame.render_widget(summary_block, layout[2]);

    let prompt = match app.mode {
        InputMode::Normal => {
            let status = match &app.error {
                Some(err) => format!("{} | Error: {err}", app.status),
                None => app.status.clone(),
            };
            format!(
                "{status}  |  Tab fleet  [ ] date  / filter  g page  p size  \u{2190}\u{2192} nav  s search  e export  c csv  i import  q quit"
            )
        }
        InputMode::QuickSearch => format!("Filter: {}", app.input),
        InputMode::GotoPage => format!("Go to page: {}", app.input),
        InputMode::ImportPath => format!("Import file (.xls/.xlsx): {}", app.input),
    };
    let status_block = Paragraph::new(prompt)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    frame.render_widget(status_block, layout[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_core::snapshot::SnapshotMonitoringApi;

    fn app() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(SnapshotMonitoringApi::from_dir(dir.path()).unwrap());
        let settings = Settings::default();
        let date = NaiveDate::from_ymd_opt(2025, 12, 23).unwrap();
        let dashboard = Dashboard::new(date).with_mock(MockGenerator::with_seed(3), 147);
        let mut app = AppState::new(RecordFetcher::new(api, &settings), dashboard);
        app.out_dir = dir.path().to_path_buf();
        (dir, app)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn load_sample(app: &mut AppState) {
        let LoadPlan::Fetch(ticket) = app.dashboard.begin_load() else {
            panic!("expected fetch");
        };
        let outcome = Err(std::io::Error::other("offline").into());
        app.events_tx
            .send(AppEvent::RecordsLoaded { ticket, outcome })
            .unwrap();
    }

    #[test]
    fn completed_fetch_is_applied_from_the_channel() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        load_sample(&mut app);
        drain_events(&runtime, &mut app, &token);
        assert_eq!(app.dashboard.source(), DataSource::Mock);
        assert_eq!(app.status, "Showing sample data");
        assert_eq!(app.dashboard.view().page_info, "1/8");
    }

    #[test]
    fn failed_fleet_listing_is_flagged_as_sample() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        let err = std::io::Error::other("connection refused");
        app.events_tx
            .send(AppEvent::OrganizationsLoaded(Err(err.into())))
            .unwrap();
        drain_events(&runtime, &mut app, &token);

        assert_eq!(app.dashboard.organizations().len(), mock_organizations().len());
        assert_eq!(app.status, "Showing sample fleets");
        assert!(app.error.as_deref().is_some_and(|e| e.contains("connection refused")));

        // The fleet warning outlives the status line of later loads.
        load_sample(&mut app);
        drain_events(&runtime, &mut app, &token);
        assert!(app
            .fleet_warning
            .as_deref()
            .is_some_and(|w| w.starts_with("Fleets unavailable")));

        let fleets = vec![Organization {
            id: "1".to_string(),
            name: "第一车队".to_string(),
        }];
        app.events_tx
            .send(AppEvent::OrganizationsLoaded(Ok(fleets)))
            .unwrap();
        drain_events(&runtime, &mut app, &token);
        assert!(app.fleet_warning.is_none());
    }

    #[test]
    fn export_from_snapshot_reports_unsupported() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        let err = FleetError::from(ErrorKind::Unsupported("export".to_string()));
        app.events_tx.send(AppEvent::Exported(Err(err))).unwrap();
        drain_events(&runtime, &mut app, &token);
        assert_eq!(app.status, "Export not available from this source");
        assert!(app.error.is_some());
    }

    #[test]
    fn goto_page_input_is_validated() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        load_sample(&mut app);
        drain_events(&runtime, &mut app, &token);

        for code in [KeyCode::Char('g'), KeyCode::Char('9'), KeyCode::Enter] {
            handle_key(key(code), &runtime, &mut app, &token);
        }
        assert!(app.error.is_some());
        assert_eq!(app.dashboard.page_state().current_page, 1);

        for code in [KeyCode::Char('g'), KeyCode::Char('8'), KeyCode::Enter] {
            handle_key(key(code), &runtime, &mut app, &token);
        }
        assert_eq!(app.dashboard.page_state().current_page, 8);
        assert_eq!(app.mode, InputMode::Normal);
    }

    #[test]
    fn non_spreadsheet_import_is_rejected_and_input_reset() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        handle_key(key(KeyCode::Char('i')), &runtime, &mut app, &token);
        for ch in "notes.txt".chars() {
            handle_key(key(KeyCode::Char(ch)), &runtime, &mut app, &token);
        }
        handle_key(key(KeyCode::Enter), &runtime, &mut app, &token);
        assert_eq!(app.status, "Import rejected");
        assert!(app.input.is_empty());
        assert_eq!(app.mode, InputMode::Normal);
    }

    #[test]
    fn page_size_cycles_through_options() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        let mut seen = Vec::new();
        for _ in 0..PAGE_SIZE_OPTIONS.len() {
            handle_key(key(KeyCode::Char('p')), &runtime, &mut app, &token);
            seen.push(app.dashboard.page_state().page_size);
        }
        assert_eq!(seen, [50, 100, 10, 20]);
    }

    #[test]
    fn quit_keys() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let token = CancellationToken::new();
        let (_dir, mut app) = app();
        assert!(handle_key(key(KeyCode::Char('q')), &runtime, &mut app, &token));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(handle_key(ctrl_c, &runtime, &mut app, &token));
    }
}
