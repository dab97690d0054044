use crate::batch;
use crate::config::{AppConfig, Theme};
use crate::console::{self, Console};
use crate::probe::{self, DocumentInfo};
use crate::raster::{self, MAX_DPI, MIN_DPI, RasterJob, Rasterizer};
use crate::worker::{self, JobEvent, Worker};
use anyhow::{Context, Result};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::execute as crossterm_execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, TableState};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

const DPI_STEP: u32 = 10;
const DPI_PAGE_STEP: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileStatus {
    Idle,
    Queued,
    Running,
    Done,
    Failed,
}

impl FileStatus {
    fn label(self) -> &'static str {
        match self {
            FileStatus::Idle => "",
            FileStatus::Queued => "queued",
            FileStatus::Running => "running",
            FileStatus::Done => "done",
            FileStatus::Failed => "error",
        }
    }
}

struct FileRow {
    info: DocumentInfo,
    status: FileStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EditTarget {
    AddFiles,
    OutputDir,
}

struct EditState {
    target: EditTarget,
    buffer: String,
}

struct ActiveRun {
    worker: Option<Worker>,
    events: mpsc::Receiver<JobEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct App {
    config: AppConfig,
    files: Vec<FileRow>,
    selected: usize,
    output_dir: String,
    dpi: u32,
    strip_metadata: bool,
    console: Console,
    run: Option<ActiveRun>,
    edit: Option<EditState>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let output_dir = config
            .options
            .output_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        Self {
            dpi: config.options.dpi,
            strip_metadata: config.options.strip_metadata,
            output_dir,
            config,
            files: Vec::new(),
            selected: 0,
            console: Console::new(),
            run: None,
            edit: None,
        }
    }

    fn theme(&self) -> &Theme {
        &self.config.theme
    }

    fn is_running(&self) -> bool {
        self.run.is_some()
    }

    fn add_sources(&mut self, sources: Vec<PathBuf>) {
        for source in sources {
            if self.files.iter().any(|row| row.info.path == source) {
                continue;
            }
            let info = probe::describe(&source, &self.config.options.ghostscript);
            self.files.push(FileRow {
                info,
                status: FileStatus::Idle,
            });
        }
    }

    fn remove_selected(&mut self) {
        if self.selected < self.files.len() {
            self.files.remove(self.selected);
        }
        if self.selected >= self.files.len() {
            self.selected = self.files.len().saturating_sub(1);
        }
    }

    fn clear(&mut self) {
        self.files.clear();
        self.selected = 0;
    }

    fn move_selection(&mut self, delta: isize) {
        if self.files.is_empty() {
            return;
        }
        let max = self.files.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, max) as usize;
    }

    fn adjust_dpi(&mut self, delta: i64) {
        let next = (self.dpi as i64 + delta).clamp(MIN_DPI as i64, MAX_DPI as i64);
        self.dpi = next as u32;
    }

    fn start_run(&mut self) {
        if self.is_running() {
            return;
        }
        if self.files.is_empty() || self.output_dir.trim().is_empty() {
            self.console
                .push("Error: Missing input files or output folder.");
            return;
        }
        let output_dir = batch::expand_tilde(self.output_dir.trim());
        let jobs: Vec<RasterJob> = self
            .files
            .iter()
            .map(|row| RasterJob {
                source: row.info.path.clone(),
                output_dir: output_dir.clone(),
                dpi: self.dpi,
                strip_metadata: self.strip_metadata,
            })
            .collect();
        let shared = raster::shared_outputs(&jobs);
        if !shared.is_empty() {
            for path in shared {
                self.console
                    .push(format!("Error: Several files would write {}.", path.display()));
            }
            return;
        }
        let (events_tx, events_rx) = mpsc::channel();
        let mut worker = Worker::spawn(
            Rasterizer::new(self.config.options.ghostscript.clone()),
            self.console.clone(),
            events_tx,
        );
        for (row, job) in self.files.iter_mut().zip(jobs) {
            row.status = match worker.submit(job) {
                Ok(()) => FileStatus::Queued,
                Err(_) => FileStatus::Failed,
            };
        }
        worker.close();
        self.run = Some(ActiveRun {
            worker: Some(worker),
            events: events_rx,
        });
    }

    /// Applies pending worker events; returns true once the run has finished.
    fn drain_events(&mut self) -> bool {
        let Some(run) = self.run.as_mut() else {
            return false;
        };
        let mut finished = false;
        let mut disconnected = false;
        loop {
            match run.events.try_recv() {
                Ok(JobEvent::Started { source }) => {
                    set_status(&mut self.files, &source, FileStatus::Running)
                }
                Ok(JobEvent::Done { source, .. }) => {
                    set_status(&mut self.files, &source, FileStatus::Done)
                }
                Ok(JobEvent::Failed { source, .. }) => {
                    set_status(&mut self.files, &source, FileStatus::Failed)
                }
                Ok(JobEvent::Finished(_)) => finished = true,
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if !(finished || disconnected) {
            return false;
        }
        if let Some(worker) = run.worker.take()
            && let Err(err) = worker.finish()
        {
            self.console.push(format!("Error: {err}"));
        }
        self.run = None;
        true
    }

    fn open_selected(&self) {
        let Some(row) = self.files.get(self.selected) else {
            return;
        };
        let name = worker::display_name(&row.info.path);
        match open_in_viewer(&row.info.path) {
            Ok(()) => self.console.push(format!("Opened: {name}")),
            Err(err) => self.console.push(format!("Error opening PDF: {err:#}")),
        }
    }

    fn begin_edit(&mut self, target: EditTarget) {
        let buffer = match target {
            EditTarget::AddFiles => String::new(),
            EditTarget::OutputDir => self.output_dir.clone(),
        };
        self.edit = Some(EditState { target, buffer });
    }

    fn commit_edit(&mut self, edit: EditState) {
        let value = edit.buffer.trim().to_string();
        match edit.target {
            EditTarget::OutputDir => self.output_dir = value,
            EditTarget::AddFiles => {
                if value.is_empty() {
                    return;
                }
                match batch::collect_sources(&[value], Vec::new(), false) {
                    Ok(sources) if sources.is_empty() => {
                        self.console.push("No PDF files found.");
                    }
                    Ok(sources) => self.add_sources(sources),
                    Err(err) => self.console.push(format!("Error: {err}")),
                }
            }
        }
    }

    fn handle_edit_key(&mut self, key: KeyCode) {
        let Some(edit) = self.edit.as_mut() else {
            return;
        };
        match key {
            KeyCode::Esc => self.edit = None,
            KeyCode::Enter => {
                if let Some(edit) = self.edit.take() {
                    self.commit_edit(edit);
                }
            }
            KeyCode::Backspace => {
                edit.buffer.pop();
            }
            KeyCode::Char(ch) => edit.buffer.push(ch),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyCode) -> Flow {
        if self.edit.is_some() {
            self.handle_edit_key(key);
            return Flow::Continue;
        }
        let running = self.is_running();
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                if !running {
                    return Flow::Quit;
                }
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_dpi(DPI_STEP as i64),
            KeyCode::Char('-') => self.adjust_dpi(-(DPI_STEP as i64)),
            KeyCode::PageUp => self.adjust_dpi(DPI_PAGE_STEP as i64),
            KeyCode::PageDown => self.adjust_dpi(-(DPI_PAGE_STEP as i64)),
            KeyCode::Char('m') => self.strip_metadata = !self.strip_metadata,
            KeyCode::Char('r') | KeyCode::F(5) => self.start_run(),
            KeyCode::Char('a') if !running => self.begin_edit(EditTarget::AddFiles),
            KeyCode::Char('o') if !running => self.begin_edit(EditTarget::OutputDir),
            KeyCode::Char('d') | KeyCode::Delete if !running => self.remove_selected(),
            KeyCode::Char('c') if !running => self.clear(),
            _ => {}
        }
        Flow::Continue
    }
}

fn set_status(files: &mut [FileRow], source: &Path, status: FileStatus) {
    if let Some(row) = files.iter_mut().find(|row| row.info.path == source) {
        row.status = status;
    }
}

fn open_in_viewer(path: &Path) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to launch viewer")?;
    Ok(())
}

pub fn run(config: AppConfig, sources: Vec<PathBuf>) -> Result<()> {
    let mut app = App::new(config);
    app.add_sources(sources);

    let _guard = TerminalGuard::new()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    let tick_rate = Duration::from_millis(120);

    loop {
        app.drain_events();
        terminal.draw(|frame| render(frame, &app))?;

        if event::poll(tick_rate)?
            && let CEvent::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && app.handle_key(key.code) == Flow::Quit
        {
            break;
        }
    }
    Ok(())
}

fn title_style(theme: &Theme) -> Style {
    Style::default()
        .fg(theme.primary)
        .add_modifier(Modifier::BOLD)
}

fn render(frame: &mut Frame<'_>, app: &App) {
    let theme = app.theme();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(9),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let (done, failed) = app.files.iter().fold((0, 0), |(done, failed), row| {
        match row.status {
            FileStatus::Done => (done + 1, failed),
            FileStatus::Failed => (done, failed + 1),
            _ => (done, failed),
        }
    });
    let state = if app.is_running() {
        Span::styled("running", Style::default().fg(theme.accent))
    } else {
        Span::styled("idle", Style::default().fg(theme.muted))
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled("pdfraster", title_style(theme)),
        Span::raw("  files "),
        Span::styled(app.files.len().to_string(), Style::default().fg(theme.primary)),
        Span::raw("  done "),
        Span::styled(done.to_string(), Style::default().fg(theme.good)),
        Span::raw("  failed "),
        Span::styled(failed.to_string(), Style::default().fg(theme.bad)),
        Span::raw("  "),
        state,
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Status", title_style(theme))),
    );
    frame.render_widget(header, layout[0]);

    render_table(frame, app, layout[1]);
    render_settings(frame, app, layout[2]);

    let log_height = layout[3].height.saturating_sub(2) as usize;
    let log_items: Vec<ListItem> = app
        .console
        .tail(log_height)
        .into_iter()
        .map(|line| {
            ListItem::new(Line::from(Span::styled(
                format!("{}{line}", console::prompt()),
                Style::default().fg(theme.console),
            )))
        })
        .collect();
    let logs = List::new(log_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Console", title_style(theme))),
    );
    frame.render_widget(logs, layout[3]);

    let help = if app.edit.is_some() {
        "Enter confirm  Esc cancel"
    } else if app.is_running() {
        "Rasterizing... (+/- dpi and m apply to the next run)"
    } else {
        "a add  d remove  c clear  o output  +/- PgUp/PgDn dpi  m metadata  r rasterize  Enter open  q quit"
    };
    let footer = Paragraph::new(Line::from(Span::styled(
        help,
        Style::default().fg(theme.muted),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Help", Style::default().fg(theme.muted))),
    );
    frame.render_widget(footer, layout[4]);
}

fn render_table(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let theme = app.theme();
    let header = Row::new(["#", "Title", "Pages", "Size", "Status", "Path"])
        .style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = app
        .files
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let status_color = match row.status {
                FileStatus::Done => theme.good,
                FileStatus::Failed => theme.bad,
                FileStatus::Running | FileStatus::Queued => theme.accent,
                FileStatus::Idle => theme.muted,
            };
            Row::new(vec![
                Cell::from((index + 1).to_string()),
                Cell::from(row.info.title.clone()),
                Cell::from(row.info.pages.to_string()),
                Cell::from(row.info.size_label()),
                Cell::from(Span::styled(
                    row.status.label(),
                    Style::default().fg(status_color),
                )),
                Cell::from(row.info.path.display().to_string()),
            ])
        })
        .collect();
    let widths = [
        Constraint::Length(4),
        Constraint::Percentage(30),
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled("Files", title_style(theme))),
        )
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        );
    let mut state = TableState::default();
    if !app.files.is_empty() {
        state.select(Some(app.selected));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_settings(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let theme = app.theme();
    let line = match &app.edit {
        Some(edit) => {
            let label = match edit.target {
                EditTarget::AddFiles => "Add PDF(s): ",
                EditTarget::OutputDir => "Output: ",
            };
            Line::from(vec![
                Span::styled(label, Style::default().fg(theme.accent)),
                Span::raw(edit.buffer.clone()),
                Span::styled("_", Style::default().fg(theme.accent)),
            ])
        }
        None => {
            let output = if app.output_dir.is_empty() {
                Span::styled("(not set)", Style::default().fg(theme.bad))
            } else {
                Span::raw(app.output_dir.clone())
            };
            Line::from(vec![
                Span::raw("Output: "),
                output,
                Span::raw("  DPI: "),
                Span::styled(app.dpi.to_string(), Style::default().fg(theme.primary)),
                Span::raw("  Strip metadata: "),
                Span::raw(if app.strip_metadata { "yes" } else { "no" }),
            ])
        }
    };
    let settings = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Settings", title_style(theme))),
    );
    frame.render_widget(settings, area);
}

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        crossterm_execute!(stdout, EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = std::io::stdout();
        let _ = crossterm_execute!(stdout, LeaveAlternateScreen);
    }
}
