// ABOUTME: Main dashboard layout and rendering logic
// Upload panel and model choice on the left, OCR result and session cost on the right

use crate::app::state::{AppEvent, AppState, InputMode, ResultRecord, RunPhase, SessionState, ViewMode};
use crate::data::upload::{expand_path, format_label, load_image};
use crate::utils::cost_calculator::{CostCalculator, OcrModel};
use crate::utils::error::OcrError;
use byte_unit::{Byte, UnitType};
use chrono::Local;
use crossbeam_channel::Sender;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct Dashboard {
    state: Arc<AppState>,
    event_tx: Sender<AppEvent>,
    show_help: bool,
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let rounded = Duration::from_millis(elapsed.as_millis() as u64);
    humantime::format_duration(rounded).to_string()
}

pub fn format_size(bytes: usize) -> String {
    let adjusted = Byte::from_u64(bytes as u64).get_appropriate_unit(UnitType::Decimal);
    format!("{:.1}", adjusted)
}

impl Dashboard {
    pub fn new(state: Arc<AppState>, event_tx: Sender<AppEvent>) -> Self {
        Self {
            state,
            event_tx,
            show_help: false,
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let size = frame.size();
        // One copy of the session per frame
        let session = self.state.snapshot();

        // Main layout: header, body, footer
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Body
                Constraint::Length(3), // Footer
            ])
            .split(size);

        self.render_header(frame, chunks[0], &session);
        self.render_body(frame, chunks[1], &session);
        self.render_footer(frame, chunks[2]);

        if self.show_help {
            self.render_help_overlay(frame, size);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, session: &SessionState) {
        let model = self.state.selected_model();

        let (status, status_color) = match session.phase {
            RunPhase::PendingSubmit | RunPhase::Running => ("Running", Color::Yellow),
            _ if session.last_error.is_some() => ("Error", Color::Red),
            _ => ("Ready", Color::Green),
        };

        let header_text = vec![
            Span::styled("Gemini OCR", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" v0.1.0  ["),
            Span::styled(model.display_name(), Style::default().fg(Color::Cyan)),
            Span::raw("] ["),
            Span::styled(status, Style::default().fg(status_color)),
            Span::raw("]"),
        ];

        let header = Paragraph::new(Line::from(header_text))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Blue)),
            )
            .alignment(Alignment::Center);

        frame.render_widget(header, area);
    }

    fn render_body(&self, frame: &mut Frame, area: Rect, session: &SessionState) {
        let view_mode = *self.state.view_mode.lock().unwrap();

        match view_mode {
            ViewMode::Main => {
                let columns = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                    .split(area);

                let left = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(8), // Upload
                        Constraint::Length(5), // Model selector
                        Constraint::Min(0),    // How to use
                    ])
                    .split(columns[0]);

                let right = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Min(5),    // Result
                        Constraint::Length(3), // Session totals
                    ])
                    .split(columns[1]);

                self.render_upload_panel(frame, left[0]);
                self.render_model_selector(frame, left[1]);
                self.render_instructions(frame, left[2]);
                self.render_result_panel(frame, right[0], session);
                self.render_session_totals(frame, right[1], session);
            }
            ViewMode::History => self.render_history(frame, area, session),
        }
    }

    fn render_upload_panel(&self, frame: &mut Frame, area: Rect) {
        let input_mode = self.state.input_mode.lock().unwrap().clone();
        let uploaded = self.state.uploaded_image.lock().unwrap().clone();
        let upload_error = self.state.upload_error.lock().unwrap().clone();

        let mut text = vec![];

        match input_mode {
            InputMode::EditingPath(ref buffer) => {
                text.push(Line::from(Span::styled(
                    "Image path (Enter to load, Esc to cancel):",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                text.push(Line::from(vec![
                    Span::styled("> ", Style::default().fg(Color::Cyan)),
                    Span::raw(buffer.clone()),
                    Span::styled("█", Style::default().fg(Color::Cyan)),
                ]));
            }
            InputMode::Normal => {
                text.push(Line::from("Press 'o' to choose an image (PNG, JPG)"));
            }
        }

        text.push(Line::from(""));

        if let Some(ref message) = upload_error {
            text.push(Line::from(Span::styled(
                format!("Could not load image: {}", message),
                Style::default().fg(Color::Red),
            )));
        } else if let Some(ref image) = uploaded {
            text.push(Line::from(vec![
                Span::styled("File: ", Style::default().fg(Color::Cyan)),
                Span::raw(image.file_name()),
            ]));
            let mut format_line = format!(
                "{} | {}x{} | {}",
                format_label(image.source_format),
                image.width,
                image.height,
                format_size(image.payload.len())
            );
            if image.was_normalized() {
                format_line.push_str(" | sent as PNG");
            }
            text.push(Line::from(format_line));
        } else {
            text.push(Line::from(Span::styled(
                "No image loaded",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let panel = Paragraph::new(text)
            .block(
                Block::default()
                    .title("Image Upload")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Magenta)),
            )
            .wrap(Wrap { trim: true });

        frame.render_widget(panel, area);
    }

    fn render_model_selector(&self, frame: &mut Frame, area: Rect) {
        let selected = self.state.selected_model();

        let text: Vec<Line> = OcrModel::ALL
            .iter()
            .map(|model| {
                let marker = if *model == selected { "(•) " } else { "( ) " };
                let style = if *model == selected {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::styled(format!("{}{}", marker, model.display_name()), style),
                    Span::styled(
                        format!("  {}", model.tagline()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            })
            .collect();

        let panel = Paragraph::new(text).block(
            Block::default()
                .title("Model (m to switch)")
                .borders(Borders::ALL),
        );

        frame.render_widget(panel, area);
    }

    fn render_instructions(&self, frame: &mut Frame, area: Rect) {
        let text = vec![
            Line::from("1. Press 'o' and enter the path of a JPG or PNG image."),
            Line::from("2. Pick a model with 'm'."),
            Line::from("3. Press Enter to run OCR."),
            Line::from("4. The extracted text appears on the right."),
            Line::from(""),
            Line::from(Span::styled(
                "Uses the Google Gemini API.",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        let panel = Paragraph::new(text)
            .block(Block::default().title("How to use").borders(Borders::ALL))
            .wrap(Wrap { trim: true });

        frame.render_widget(panel, area);
    }

    fn render_result_panel(&self, frame: &mut Frame, area: Rect, session: &SessionState) {
        let scroll = *self.state.scroll_offset.lock().unwrap();

        let mut text = vec![];
        let mut border_color = Color::Green;

        if session.run_pending {
            let model_name = session
                .pending_run
                .as_ref()
                .and_then(|run| OcrModel::from_str(&run.model_id))
                .map(|m| m.display_name().to_string())
                .unwrap_or_default();
            let started = *self.state.run_started.lock().unwrap();
            let elapsed = started
                .map(|s| (Local::now() - s).to_std().unwrap_or_default())
                .unwrap_or_default();
            let frame_idx = (elapsed.as_millis() / 100) as usize % SPINNER.len();

            border_color = Color::Yellow;
            text.push(Line::from(Span::styled(
                format!("{} Processing with `{}`... {}s", SPINNER[frame_idx], model_name, elapsed.as_secs()),
                Style::default().fg(Color::Yellow),
            )));
        } else if let Some(ref message) = session.last_error {
            border_color = Color::Red;
            text.push(Line::from(Span::styled(
                "An error occurred during OCR:",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            text.push(Line::from(message.clone()));
        } else if let Some(ref record) = session.current_result {
            text.push(Line::from(Span::styled(
                result_summary(record),
                Style::default().fg(Color::Cyan),
            )));
            text.push(Line::from(""));
            text.extend(record.text.lines().map(|l| Line::from(l.to_string())));
        } else {
            text.push(Line::from(Span::styled(
                "Load an image and press Enter to run OCR.",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let panel = Paragraph::new(text)
            .block(
                Block::default()
                    .title("OCR Result")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color)),
            )
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));

        frame.render_widget(panel, area);
    }

    fn render_session_totals(&self, frame: &mut Frame, area: Rect, session: &SessionState) {

        let text = format!(
            "Runs: {} | Session cost: {}",
            session.run_count(),
            CostCalculator::format_cost(session.total_cost)
        );

        let panel = Paragraph::new(text)
            .block(
                Block::default()
                    .title("Session")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .alignment(Alignment::Center);

        frame.render_widget(panel, area);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect, session: &SessionState) {
        if session.history.is_empty() {
            let empty = Paragraph::new("No OCR runs yet in this session")
                .block(Block::default().title("History").borders(Borders::ALL))
                .alignment(Alignment::Center);
            frame.render_widget(empty, area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let total = session.history.len();
        let items: Vec<ListItem> = session
            .history
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("#{:<3}", total - idx), Style::default().fg(Color::DarkGray)),
                    Span::raw(format!("{}  ", record.timestamp.format("%H:%M:%S"))),
                    Span::styled(format!("{:<18}", record.model_name()), Style::default().fg(Color::Cyan)),
                    Span::raw(format!(
                        "in {:>6} / out {:>6}  ",
                        record.input_tokens, record.output_tokens
                    )),
                    Span::styled(
                        CostCalculator::format_cost(record.total_cost()),
                        Style::default().fg(Color::Green),
                    ),
                ]))
            })
            .collect();

        let selected = (*self.state.selected_history_index.lock().unwrap()).min(total - 1);
        let mut list_state = ListState::default().with_selected(Some(selected));

        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!(
                        "History ({} runs, {} total)",
                        total,
                        CostCalculator::format_cost(session.total_cost)
                    ))
                    .borders(Borders::ALL),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, chunks[0], &mut list_state);

        let record = &session.history[selected];
        let mut detail = vec![
            Line::from(Span::styled(result_summary(record), Style::default().fg(Color::Cyan))),
            Line::from(""),
        ];
        detail.extend(record.text.lines().map(|l| Line::from(l.to_string())));

        let scroll = *self.state.scroll_offset.lock().unwrap();
        let panel = Paragraph::new(detail)
            .block(Block::default().title("Extracted Text").borders(Borders::ALL))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));

        frame.render_widget(panel, chunks[1]);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let input_mode = self.state.input_mode.lock().unwrap().clone();
        let view_mode = *self.state.view_mode.lock().unwrap();

        let hints = match (input_mode, view_mode) {
            (InputMode::EditingPath(_), _) => "[Enter] Load  [Esc] Cancel",
            (InputMode::Normal, ViewMode::Main) => {
                "[o] Open image  [m] Model  [Enter] Run OCR  [h] History  [↑↓] Scroll  [?] Help  [q] Quit"
            }
            (InputMode::Normal, ViewMode::History) => "[↑↓] Select  [PgUp/PgDn] Scroll text  [h/Esc] Back  [q] Quit",
        };

        let footer = Paragraph::new(hints)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));

        frame.render_widget(footer, area);
    }

    fn render_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let popup = centered_rect(60, 50, area);

        let text = vec![
            Line::from(Span::styled("Keys", Style::default().add_modifier(Modifier::BOLD))),
            Line::from(""),
            Line::from("o       enter an image path"),
            Line::from("m       switch between Flash and Pro"),
            Line::from("Enter   run OCR on the loaded image"),
            Line::from("h       show or hide the run history"),
            Line::from("↑ / ↓   scroll result or select history entry"),
            Line::from("?       close this help"),
            Line::from("q       quit"),
            Line::from(""),
            Line::from("Costs are estimates from the token counts Gemini reports."),
        ];

        let help = Paragraph::new(text)
            .block(
                Block::default()
                    .title("Help")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        frame.render_widget(Clear, popup);
        frame.render_widget(help, popup);
    }

    /// Handle a key press. Returns false when the user asked to quit.
    pub fn handle_key(&mut self, key: crossterm::event::KeyCode) -> bool {
        use crossterm::event::KeyCode;

        let input_mode = self.state.input_mode.lock().unwrap().clone();
        if let InputMode::EditingPath(buffer) = input_mode {
            self.handle_path_input(key, buffer);
            return true;
        }

        let view_mode = *self.state.view_mode.lock().unwrap();

        match key {
            KeyCode::Char('o') | KeyCode::Char('O') => {
                let current = self
                    .state
                    .uploaded_image
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map(|img| img.path.display().to_string())
                    .unwrap_or_default();
                *self.state.input_mode.lock().unwrap() = InputMode::EditingPath(current);
                true
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                let model = self.state.toggle_model();
                debug!(model = model.id(), "model switched");
                true
            }
            KeyCode::Enter => {
                if matches!(view_mode, ViewMode::Main) {
                    self.request_run();
                }
                true
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                let mut view = self.state.view_mode.lock().unwrap();
                *view = match *view {
                    ViewMode::Main => ViewMode::History,
                    ViewMode::History => ViewMode::Main,
                };
                *self.state.scroll_offset.lock().unwrap() = 0;
                *self.state.selected_history_index.lock().unwrap() = 0;
                true
            }
            KeyCode::Esc => {
                if matches!(view_mode, ViewMode::History) {
                    *self.state.view_mode.lock().unwrap() = ViewMode::Main;
                    *self.state.scroll_offset.lock().unwrap() = 0;
                }
                true
            }
            KeyCode::Up => {
                match view_mode {
                    ViewMode::Main => {
                        let mut scroll = self.state.scroll_offset.lock().unwrap();
                        *scroll = scroll.saturating_sub(1);
                    }
                    ViewMode::History => {
                        let mut selected = self.state.selected_history_index.lock().unwrap();
                        if *selected > 0 {
                            *selected -= 1;
                            *self.state.scroll_offset.lock().unwrap() = 0;
                        }
                    }
                }
                true
            }
            KeyCode::Down => {
                match view_mode {
                    ViewMode::Main => {
                        let mut scroll = self.state.scroll_offset.lock().unwrap();
                        *scroll = scroll.saturating_add(1);
                    }
                    ViewMode::History => {
                        let max_idx = self.state.session.lock().unwrap().history.len();
                        let mut selected = self.state.selected_history_index.lock().unwrap();
                        if *selected < max_idx.saturating_sub(1) {
                            *selected += 1;
                            *self.state.scroll_offset.lock().unwrap() = 0;
                        }
                    }
                }
                true
            }
            KeyCode::PageUp => {
                let mut scroll = self.state.scroll_offset.lock().unwrap();
                *scroll = scroll.saturating_sub(10);
                true
            }
            KeyCode::PageDown => {
                let mut scroll = self.state.scroll_offset.lock().unwrap();
                *scroll = scroll.saturating_add(10);
                true
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                true
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => false,
            _ => true,
        }
    }

    fn handle_path_input(&mut self, key: crossterm::event::KeyCode, mut buffer: String) {
        use crossterm::event::KeyCode;

        let next_mode = match key {
            KeyCode::Esc => InputMode::Normal,
            KeyCode::Enter => {
                self.load_from_path(&buffer);
                InputMode::Normal
            }
            KeyCode::Backspace => {
                buffer.pop();
                InputMode::EditingPath(buffer)
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                InputMode::EditingPath(buffer)
            }
            _ => InputMode::EditingPath(buffer),
        };

        *self.state.input_mode.lock().unwrap() = next_mode;
    }

    fn load_from_path(&self, input: &str) {
        if input.trim().is_empty() {
            return;
        }

        let path = expand_path(input);
        match load_image(&path, &self.state.config.accepted_extensions) {
            Ok(image) => self.state.set_uploaded_image(image),
            Err(e) => {
                warn!(path = %path.display(), "image rejected: {}", e);
                let message = match e {
                    OcrError::ImageDecode(msg) => msg,
                    other => other.to_string(),
                };
                self.state.set_upload_error(message);
            }
        }
    }

    fn request_run(&self) {
        match self.state.trigger_run() {
            Ok(_) => {
                if let Err(e) = self.event_tx.send(AppEvent::RunRequested) {
                    warn!("Failed to queue OCR run: {}", e);
                }
            }
            Err(OcrError::RunInProgress) => {}
            Err(e) => self.state.set_upload_error(match e {
                OcrError::ImageDecode(msg) => msg,
                other => other.to_string(),
            }),
        }
    }
}

fn result_summary(record: &ResultRecord) -> String {
    format!(
        "{} | {} | in {} tok ({}) / out {} tok ({}) | total {} | {}",
        record.timestamp.format("%H:%M:%S"),
        record.model_name(),
        record.input_tokens,
        CostCalculator::format_cost(record.cost.input_cost),
        record.output_tokens,
        CostCalculator::format_cost(record.cost.output_cost),
        CostCalculator::format_cost(record.total_cost()),
        format_elapsed(record.elapsed),
    )
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}
