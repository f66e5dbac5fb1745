//! Implements `agent::AgentUi` over the shared `TuiState`. Every method here
//! is a fast, synchronous state mutation; the actual screen redraw happens
//! on the render loop's own tick, not inline with these calls.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentUi;
use crate::tools::ToolOutcome;

use super::mode::Mode;
use super::state::TuiState;

pub type SharedState = Arc<Mutex<TuiState>>;

pub struct TerminalUi {
    state: SharedState,
}

impl TerminalUi {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl AgentUi for TerminalUi {
    fn set_running(&self, running: bool) {
        let mut state = self.state.lock().unwrap();
        state.mode = if running { Mode::Running } else { Mode::Prompting };
        if !running {
            state.spinner.set_active(false);
        }
        state.dirty = true;
    }

    fn new_cancel_signal(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut state = self.state.lock().unwrap();
        state.cancel = Some(token.clone());
        state.spinner.set_active(true);
        state.dirty = true;
        token
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().unwrap().cancel.as_ref().map(|t| t.is_cancelled()).unwrap_or(false)
    }

    fn drain_running_input(&self) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        state.input_queue.drain(..).collect()
    }

    fn stream_text(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.spinner.set_active(false);
        state.stream_buf.push_str(text);
        state.dirty = true;
    }

    fn end_stream(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.stream_buf.is_empty() {
            let text = std::mem::take(&mut state.stream_buf);
            state.push_line(text);
        }
    }

    fn interjection(&self, text: &str) {
        self.state.lock().unwrap().push_line(format!("queued: {text}"));
    }

    fn tool_call(&self, name: &str, args: &Value) {
        self.state.lock().unwrap().push_line(format!("→ {name} {args}"));
    }

    fn tool_result(&self, outcome: &ToolOutcome) {
        let mut state = self.state.lock().unwrap();
        state.push_line(outcome.display_summary.clone());
        if let Some(diff) = &outcome.display_diff {
            state.push_line(diff.clone());
        }
    }

    fn info(&self, message: &str) {
        self.state.lock().unwrap().push_line(format!("info: {message}"));
    }

    fn error(&self, message: &str) {
        self.state.lock().unwrap().push_line(format!("error: {message}"));
    }

    fn handover_banner(&self) {
        self.state.lock().unwrap().push_line("── handover: context cleared ──");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ui() -> (TerminalUi, SharedState) {
        let state = Arc::new(Mutex::new(TuiState::default()));
        (TerminalUi::new(state.clone()), state)
    }

    #[test]
    fn set_running_toggles_mode_and_spinner() {
        let (ui, state) = ui();
        ui.set_running(true);
        assert_eq!(state.lock().unwrap().mode, Mode::Running);
        ui.set_running(false);
        let s = state.lock().unwrap();
        assert_eq!(s.mode, Mode::Prompting);
        assert!(!s.spinner.is_active());
    }

    #[test]
    fn drain_running_input_empties_the_queue() {
        let (ui, state) = ui();
        state.lock().unwrap().input_queue.push_back("typed".into());
        let drained = ui.drain_running_input();
        assert_eq!(drained, vec!["typed".to_string()]);
        assert!(state.lock().unwrap().input_queue.is_empty());
    }

    #[test]
    fn stream_text_then_end_stream_moves_buffer_to_transcript() {
        let (ui, state) = ui();
        ui.stream_text("hello ");
        ui.stream_text("world");
        assert_eq!(state.lock().unwrap().stream_buf, "hello world");
        ui.end_stream();
        let s = state.lock().unwrap();
        assert!(s.stream_buf.is_empty());
        assert_eq!(s.transcript, vec!["hello world".to_string()]);
    }

    #[test]
    fn tool_result_appends_diff_when_present() {
        let (ui, state) = ui();
        ui.tool_result(&ToolOutcome {
            output: "edited f.txt".into(),
            display_summary: "edited f.txt (+1, -1)".into(),
            display_diff: Some("--- a\n+++ b\n".into()),
            is_error: false,
        });
        let s = state.lock().unwrap();
        assert_eq!(s.transcript, vec!["edited f.txt (+1, -1)".to_string(), "--- a\n+++ b\n".to_string()]);
    }

    #[test]
    fn tool_call_renders_name_and_args() {
        let (ui, state) = ui();
        ui.tool_call("read", &json!({"path": "a.rs"}));
        assert!(state.lock().unwrap().transcript[0].contains("read"));
    }
}
