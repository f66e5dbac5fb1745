//! The render loop and key capture: a persistent transcript plus a bottom
//! input line, redrawn on a bounded tick and on every event rather than a
//! full alternate-buffer repaint per keystroke (§4.6).

use std::io::{self, Stdout};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Terminal;

use super::mode::Mode;
use super::state::TuiState;

const TICK_MS: u64 = 100;

pub type SharedState = Arc<Mutex<TuiState>>;

pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: SharedState,
    events: EventStream,
    line: String,
}

impl Tui {
    pub fn new(state: SharedState) -> io::Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self { terminal, state, events: EventStream::new(), line: String::new() })
    }

    pub fn enter(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen, EnableBracketedPaste)?;
        self.terminal.clear()
    }

    pub fn exit(&mut self) -> io::Result<()> {
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)?;
        disable_raw_mode()
    }

    fn draw(&mut self) -> io::Result<()> {
        let (mut lines, prompt_line) = {
            let state = self.state.lock().unwrap();
            let mut lines: Vec<Line> = state.transcript.iter().map(|t| Line::from(t.clone())).collect();
            if !state.stream_buf.is_empty() {
                lines.push(Line::from(state.stream_buf.clone()));
            }
            let prompt_line = match state.mode {
                Mode::Prompting => format!("> {}", self.line),
                Mode::Running if state.spinner.is_active() => format!("{} working… (Esc to stop)", state.spinner.current_frame()),
                Mode::Running => "… (Esc to stop)".to_string(),
            };
            (lines, prompt_line)
        };
        if lines.is_empty() {
            lines.push(Line::from(""));
        }

        self.terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(1)])
                .split(frame.area());
            frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[0]);
            frame.render_widget(Paragraph::new(Line::from(prompt_line)).style(Style::default().fg(Color::Cyan)), chunks[1]);
        })?;
        Ok(())
    }

    /// Prompting mode: reads one line from the raw key stream. `None` is
    /// EOF - either a real end of input or `exit`/`quit`/`q`.
    pub async fn prompt(&mut self) -> io::Result<Option<String>> {
        self.line.clear();
        self.state.lock().unwrap().mode = Mode::Prompting;
        self.draw()?;

        let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.draw()?;
                }
                event = self.events.next() => {
                    let Some(event) = event else { return Ok(None) };
                    let Event::Key(key) = event? else { continue };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Enter => {
                            let text = std::mem::take(&mut self.line);
                            return Ok(match text.trim() {
                                "exit" | "quit" | "q" => None,
                                _ => Some(text),
                            });
                        }
                        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(None),
                        KeyCode::Char(c) => self.line.push(c),
                        KeyCode::Backspace => { self.line.pop(); }
                        _ => continue,
                    }
                    self.draw()?;
                }
            }
        }
    }

    /// Running mode: races alongside `Agent::run`, capturing Escape as a
    /// one-shot cancel and queuing lines typed mid-run. Returns once the
    /// agent flips the mode back to Prompting.
    pub async fn drive_while_running(&mut self) -> io::Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
        let mut line = String::new();

        loop {
            if !self.state.lock().unwrap().mode.is_running() {
                return Ok(());
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.state.lock().unwrap().spinner.tick();
                    self.draw()?;
                }
                event = self.events.next() => {
                    let Some(event) = event else { return Ok(()) };
                    let Event::Key(key) = event? else { continue };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Esc => {
                            let mut state = self.state.lock().unwrap();
                            if let Some(token) = state.cancel.clone() {
                                if !token.is_cancelled() {
                                    token.cancel();
                                    state.push_line("stopped");
                                }
                            }
                        }
                        KeyCode::Enter => {
                            let text = std::mem::take(&mut line);
                            if !text.is_empty() {
                                self.state.lock().unwrap().input_queue.push_back(text);
                            }
                        }
                        KeyCode::Char(c) => line.push(c),
                        KeyCode::Backspace => { line.pop(); }
                        _ => continue,
                    }
                    self.draw()?;
                }
            }
        }
    }
}
