//! Shared mutable state behind the `AgentUi` implementation and the render
//! loop. Plain `std::sync::Mutex` - every hold is a quick field mutation,
//! never across an `.await`.

use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;

use super::mode::Mode;
use super::spinner::Spinner;

#[derive(Default)]
pub struct TuiState {
    pub transcript: Vec<String>,
    pub stream_buf: String,
    pub input_queue: VecDeque<String>,
    pub mode: Mode,
    pub spinner: Spinner,
    pub cancel: Option<CancellationToken>,
    pub dirty: bool,
}

impl TuiState {
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.transcript.push(line.into());
        self.dirty = true;
    }
}
